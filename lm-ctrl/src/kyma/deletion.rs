use kube::runtime::controller::Action;
use lm_core::client::{
    ObjectKey,
    key_of,
};
use lm_core::k8s::remove_finalizer;
use lm_core::prelude::*;
use serde_json::json;
use tracing::*;

use super::status::last_operation;
use crate::context::KymaContext;
use crate::errors::is_invalid_kubeconfig;
use crate::metrics::{
    record_kyma_state,
    record_requeue,
    remove_kyma_metrics,
};
use crate::remote::{
    SYNCED_CRDS,
    delete_catalog,
    delete_remote_kyma,
};

// Tear down everything the Kyma owns: the runtime-side copies first (in KCP mode), then the
// Manifests.  The finalizer only comes off once no Manifest is left.
pub async fn delete_kyma(ctx: &KymaContext, kyma: &Kyma) -> anyhow::Result<Action> {
    if kyma.status.as_ref().and_then(|s| s.state) != Some(State::Deleting) {
        info!("kyma {} is being deleted", kyma.namespaced_name());
        let mut status = kyma.status.clone().unwrap_or_default();
        status.state = Some(State::Deleting);
        status.last_operation = Some(last_operation("waiting for modules to be deleted", ctx.clock.now()));
        ctx.kcp.patch_status_typed(kyma, &status, FIELD_MANAGER).await?;
        record_kyma_state(kyma, Some(State::Deleting));
    }

    if ctx.remote_sync_enabled(kyma) && !cleanup_runtime(ctx, kyma).await? {
        record_requeue("remote_kyma_deletion", "intended");
        return Ok(Action::requeue(ctx.opts.requeue.busy));
    }

    if !delete_manifests(ctx, kyma).await? {
        debug!("waiting for manifests of {} to be removed", kyma.namespaced_name());
        record_requeue("manifest_deletion", "intended");
        return Ok(Action::requeue(ctx.opts.requeue.busy));
    }

    remove_kyma_finalizer(ctx, kyma).await?;
    ctx.remotes.evict(kyma);
    remove_kyma_metrics(kyma);
    Ok(Action::await_change())
}

// Returns false while the remote Kyma is still on its way out.  A runtime whose kubeconfig secret
// is already gone can't be cleaned up anymore, and that's left to the purge controller.
async fn cleanup_runtime(ctx: &KymaContext, kyma: &Kyma) -> anyhow::Result<bool> {
    let remote = match ctx.remotes.client_for(kyma).await {
        Ok(remote) => remote,
        Err(err) if is_invalid_kubeconfig(&err) => {
            warn!("skipping runtime cleanup for {}: {err}", kyma.namespaced_name());
            return Ok(true);
        },
        Err(err) => return Err(err),
    };

    let ns = &ctx.opts.remote_sync_namespace;
    if !delete_remote_kyma(&remote, kyma, ns).await? {
        return Ok(false);
    }
    delete_catalog(&remote, ns).await?;
    for (name, _) in SYNCED_CRDS {
        if remote.delete(&ObjectKey::new(&CRD_GVK, None, name)).await? {
            info!("deleted CRD {name} from runtime of {}", kyma.namespaced_name());
        }
    }
    Ok(true)
}

// Returns true once no Manifest labelled with this Kyma is left
async fn delete_manifests(ctx: &KymaContext, kyma: &Kyma) -> anyhow::Result<bool> {
    let selector = format!("{KYMA_NAME_LABEL}={}", kyma.name_any());
    let ns = kyma.namespace();
    for manifest in ctx.kcp.list_typed::<Manifest>(ns.as_deref(), Some(&selector)).await? {
        if !manifest.is_being_deleted() {
            info!("deleting manifest {}", manifest.namespaced_name());
            ctx.kcp.delete_typed(&manifest).await?;
        }
    }
    Ok(ctx.kcp.list_typed::<Manifest>(ns.as_deref(), Some(&selector)).await?.is_empty())
}

// Re-read first: the status write at the start of the deletion has moved the resourceVersion on
async fn remove_kyma_finalizer(ctx: &KymaContext, kyma: &Kyma) -> EmptyResult {
    let Some(current) = ctx.kcp.get_typed::<Kyma>(kyma.namespace().as_deref(), &kyma.name_any()).await? else {
        return Ok(());
    };
    let mut meta = current.metadata.clone();
    if !remove_finalizer(&mut meta, KYMA_FINALIZER) {
        return Ok(());
    }
    info!("removing finalizer from {}", kyma.namespaced_name());
    let patch = json!({"metadata": {"finalizers": meta.finalizers, "resourceVersion": current.resource_version()}});
    ctx.kcp.patch_merge(&key_of(&current), &patch).await?;
    Ok(())
}
