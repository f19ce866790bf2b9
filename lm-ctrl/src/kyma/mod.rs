mod deletion;
mod modules;
mod status;

use std::ops::Deref;
use std::sync::Arc;

use kube::runtime::controller::Action;
use lm_api::v1beta2::{
    KymaStatus,
    ModuleStatus,
};
use lm_core::client::{
    is_conflict,
    key_of,
};
use lm_core::errors::*;
use lm_core::k8s::add_finalizer;
use lm_core::prelude::*;
use serde_json::json;
use tracing::*;

pub use self::modules::*;
use self::status::*;
use crate::context::KymaContext;
use crate::errors::AnyhowError;
use crate::lookup::Catalog;
use crate::metrics::{
    record_kyma_state,
    record_module_state,
    record_requeue,
};
use crate::remote::{
    effective_modules,
    sync_catalog,
    sync_crds,
    sync_remote_kyma,
    sync_status_to_remote,
};

// The outcome of pushing the module catalog to the runtime cluster; None when remote sync is off
type CatalogSync = Option<Result<(), String>>;

#[instrument(parent=None, skip_all, fields(kyma=kyma.namespaced_name()))]
pub async fn reconcile(kyma: Arc<Kyma>, ctx: Arc<KymaContext>) -> Result<Action, AnyhowError> {
    reconcile_kyma(&ctx, kyma.deref()).await.map_err(|e| e.into())
}

pub fn error_policy(kyma: Arc<Kyma>, err: &AnyhowError, ctx: Arc<KymaContext>) -> Action {
    lmerr!(err, "reconcile failed on kyma {}", kyma.namespaced_name());
    record_requeue("kyma_reconcile_failed", "unexpected");
    Action::requeue(ctx.opts.requeue.error)
}

pub async fn reconcile_kyma(ctx: &KymaContext, kyma: &Kyma) -> anyhow::Result<Action> {
    if kyma.skip_reconciliation() {
        debug!("skip-reconciliation label set, nothing to do");
        record_requeue("kyma_skip_reconciliation", "intended");
        return Ok(Action::requeue(ctx.opts.requeue.success));
    }

    if kyma.is_being_deleted() {
        return deletion::delete_kyma(ctx, kyma).await;
    }

    let mut meta = kyma.metadata.clone();
    if add_finalizer(&mut meta, KYMA_FINALIZER) {
        info!("adding finalizer to {}", kyma.namespaced_name());
        let patch = json!({"metadata": {"finalizers": meta.finalizers, "resourceVersion": kyma.resource_version()}});
        ctx.kcp.patch_merge(&key_of(kyma), &patch).await?;
        record_requeue("kyma_finalizer_added", "intended");
        return Ok(Action::requeue(ctx.opts.requeue.busy));
    }

    if kyma.status.as_ref().and_then(|s| s.state).is_none() {
        let status = KymaStatus {
            state: Some(State::Processing),
            last_operation: Some(last_operation("started processing", ctx.clock.now())),
            ..kyma.status.clone().unwrap_or_default()
        };
        ctx.kcp.patch_status_typed(kyma, &status, FIELD_MANAGER).await?;
        record_kyma_state(kyma, Some(State::Processing));
        record_requeue("kyma_initial_state", "intended");
        return Ok(Action::requeue(ctx.opts.requeue.busy));
    }

    let remote = match ctx.remotes.client_for(kyma).await {
        Ok(remote) => remote,
        Err(err) => {
            warn!("no client for the runtime of {}: {err}", kyma.namespaced_name());
            ctx.remotes.evict(kyma);
            return write_error(ctx, kyma, &format!("could not get runtime client: {err}")).await;
        },
    };

    match sync_and_reconcile(ctx, kyma, &remote).await {
        Ok(action) => Ok(action),
        Err(err) if is_conflict(&err) => Err(err),
        Err(err) => {
            warn!("reconcile of {} failed: {err}", kyma.namespaced_name());
            write_error(ctx, kyma, &err.to_string()).await
        },
    }
}

async fn sync_and_reconcile(ctx: &KymaContext, kyma: &Kyma, remote: &RemoteClient) -> anyhow::Result<Action> {
    let kcp_namespace = kyma.namespace().unwrap_or_default();
    let remote_namespace = &ctx.opts.remote_sync_namespace;
    let sync_enabled = ctx.remote_sync_enabled(kyma);

    // The modules from the runtime's Kyma only ever live in this copy
    let mut effective = kyma.clone();
    let mut remote_kyma = None;
    if sync_enabled {
        let updates = sync_crds(&ctx.kcp, remote, kyma, &ctx.crd_cache).await?;
        if !updates.is_empty() {
            ctx.kcp.patch_merge(&key_of(kyma), &json!({"metadata": {"annotations": updates}})).await?;
        }

        let rk = sync_remote_kyma(&ctx.kcp, remote, kyma, remote_namespace).await?;
        effective.spec.modules = effective_modules(kyma, &rk);
        remote_kyma = Some(rk);
    }

    let catalog = Catalog::fetch(&ctx.kcp, &kcp_namespace).await?;
    let catalog_sync = if sync_enabled {
        match sync_catalog(remote, kyma, &catalog, remote_namespace).await {
            Ok(()) => Some(Ok(())),
            Err(err) if is_conflict(&err) => return Err(err),
            Err(err) => {
                warn!("could not sync module catalog for {}: {err}", kyma.namespaced_name());
                Some(Err(format!("could not sync module catalog: {err}")))
            },
        }
    } else {
        None
    };

    reconcile_mandatory_modules(ctx, &effective, &catalog).await?;
    let modules = reconcile_modules(ctx, &effective, remote, &catalog).await?;

    let status = build_status(ctx, kyma, modules, catalog_sync);
    let state = status.state.unwrap_or(State::Processing);
    if kyma.status.as_ref() != Some(&status) {
        debug!("updating status of {} to {state}", kyma.namespaced_name());
        ctx.kcp.patch_status_typed(kyma, &status, FIELD_MANAGER).await?;
    }

    if let Some(rk) = &remote_kyma
        && let Err(err) = sync_status_to_remote(remote, rk, &status).await
    {
        warn!("could not copy status to the runtime kyma of {}: {err}", kyma.namespaced_name());
    }

    record_kyma_state(kyma, Some(state));
    for m in &status.modules {
        record_module_state(kyma, &m.name, Some(m.state));
    }
    record_requeue(requeue_reason(state), "intended");
    Ok(Action::requeue(ctx.opts.requeue.for_state(state)))
}

fn build_status(ctx: &KymaContext, kyma: &Kyma, modules: Vec<ModuleStatus>, catalog_sync: CatalogSync) -> KymaStatus {
    let now = ctx.clock.now();
    let generation = kyma.metadata.generation;
    let previous = kyma.status.clone().unwrap_or_default();
    let mut status = previous.clone();

    let state = aggregate_state(&modules, catalog_sync.as_ref().map(Result::is_ok));
    let modules_ready = modules.iter().all(|m| matches!(m.state, State::Ready | State::Unmanaged));
    let modules_message = if modules_ready { "all modules are ready" } else { "not all modules are ready" };
    set_condition(&mut status.conditions, MODULES_CONDITION, modules_ready, modules_message, generation, now);

    match &catalog_sync {
        Some(Ok(())) => set_condition(
            &mut status.conditions,
            MODULE_CATALOG_CONDITION,
            true,
            "module catalog is synced",
            generation,
            now,
        ),
        Some(Err(msg)) => set_condition(&mut status.conditions, MODULE_CATALOG_CONDITION, false, msg, generation, now),
        None => remove_condition(&mut status.conditions, MODULE_CATALOG_CONDITION),
    }

    let message = match catalog_sync {
        Some(Err(msg)) if state == State::Error => msg,
        _ => summarize(&modules, state),
    };

    status.modules = modules;
    status.state = Some(state);
    status.active_channel = Some(kyma.desired_channel(None));

    // Only touched when something changed, otherwise every pass would write the status again
    let previous_message = previous.last_operation.as_ref().map(|o| o.operation.as_str());
    if previous.state != status.state || previous_message != Some(message.as_str()) {
        status.last_operation = Some(last_operation(&message, now));
    }
    status
}

async fn write_error(ctx: &KymaContext, kyma: &Kyma, message: &str) -> anyhow::Result<Action> {
    let mut status = kyma.status.clone().unwrap_or_default();
    status.state = Some(State::Error);
    status.last_operation = Some(last_operation(message, ctx.clock.now()));
    ctx.kcp.patch_status_typed(kyma, &status, FIELD_MANAGER).await?;

    record_kyma_state(kyma, Some(State::Error));
    record_requeue("kyma_error", "unexpected");
    Ok(Action::requeue(ctx.opts.requeue.error))
}

fn requeue_reason(state: State) -> &'static str {
    match state {
        State::Ready | State::Unmanaged => "kyma_ready",
        State::Processing => "kyma_processing",
        State::Deleting => "kyma_deleting",
        State::Warning => "kyma_warning",
        State::Error => "kyma_error",
    }
}

#[cfg(test)]
mod tests;
