use std::collections::BTreeSet;

use lm_api::v1beta2::{
    CustomStateCheck,
    ModuleStatus,
    TrackingObject,
};
use lm_core::client::{
    is_conflict,
    key_of,
};
use lm_core::jsonutils::lookup_path;
use lm_core::prelude::*;
use serde_json::json;
use tracing::*;

use super::status::tracking_of;
use crate::context::KymaContext;
use crate::errors::{
    LookupError,
    lookup_error,
};
use crate::guard::{
    WAITING_FOR_CRS_MESSAGE,
    can_delete_module,
    default_cr_key,
    module_cr_gvk,
};
use crate::lookup::{
    Catalog,
    ModuleInfo,
    ResolvedTemplate,
    discover_modules,
    status_for,
};
use crate::manifest::{
    build_manifest,
    default_resource_key,
};
use crate::metrics::remove_module_state;

// Walks every module the Kyma mentions (spec first, then status-only leftovers) and returns the
// new status.modules list.  Modules that have finished uninstalling are dropped from the list.
pub async fn reconcile_modules(
    ctx: &KymaContext,
    kyma: &Kyma,
    remote: &RemoteClient,
    catalog: &Catalog,
) -> anyhow::Result<Vec<ModuleStatus>> {
    let mut statuses = vec![];
    for info in discover_modules(kyma) {
        let previous = status_for(kyma, info.name()).cloned();
        let status = if info.enabled {
            Some(enable_module(ctx, kyma, remote, catalog, &info, previous).await?)
        } else {
            disable_module(ctx, kyma, remote, catalog, &info, previous).await?
        };

        match status {
            Some(s) => statuses.push(s),
            None => {
                info!("module {} is gone from {}, dropping its status", info.name(), kyma.namespaced_name());
                remove_module_state(kyma, info.name());
            },
        }
    }
    Ok(statuses)
}

async fn enable_module(
    ctx: &KymaContext,
    kyma: &Kyma,
    remote: &RemoteClient,
    catalog: &Catalog,
    info: &ModuleInfo,
    previous: Option<ModuleStatus>,
) -> anyhow::Result<ModuleStatus> {
    let template_info = ctx.lookup.resolve(info, kyma, catalog);
    let resolved = match template_info.outcome {
        Ok(resolved) => resolved,
        Err(err) => return Ok(status_for_lookup_error(info.name(), previous, &err)),
    };

    match install_module(ctx, kyma, remote, info, &template_info.desired_channel, &resolved).await {
        Ok(status) => Ok(status),
        Err(err) if is_conflict(&err) => Err(err),
        Err(err) => {
            warn!("could not install module {} for {}: {err}", info.name(), kyma.namespaced_name());
            let mut status = previous.unwrap_or_else(|| ModuleStatus::new(info.name(), State::Error));
            status.state = State::Error;
            status.message = Some(err.to_string());
            Ok(status)
        },
    }
}

// How each resolution failure shows up on the module.  The previous status entry is the starting
// point so that a module that was installed before keeps pointing at its Manifest.
pub fn status_for_lookup_error(name: &str, previous: Option<ModuleStatus>, err: &anyhow::Error) -> ModuleStatus {
    let mut status = previous.unwrap_or_else(|| ModuleStatus::new(name, State::Processing));
    let deployed = status.manifest.is_some();

    status.state = match lookup_error(err) {
        Some(LookupError::TemplateUpdateNotAllowed(_)) => State::Warning,
        Some(LookupError::TemplateNotAllowed(_)) if deployed => State::Warning,
        Some(LookupError::MissingChannelVersion(_) | LookupError::NotInCatalog(_)) => State::Warning,
        Some(LookupError::WaitingForMaintenanceWindow(_)) => status.state,
        _ => State::Error,
    };
    status.message = Some(err.to_string());
    status
}

async fn install_module(
    ctx: &KymaContext,
    kyma: &Kyma,
    remote: &RemoteClient,
    info: &ModuleInfo,
    channel: &str,
    resolved: &ResolvedTemplate,
) -> anyhow::Result<ModuleStatus> {
    let desired = build_manifest(kyma, &info.module, channel, resolved, &ctx.synthesis_options(kyma))?;

    let mut status = ModuleStatus::new(info.name(), State::Processing);
    status.fqdn = Some(resolved.descriptor.name.clone());
    status.channel = Some(channel.into());
    status.version = Some(resolved.version().into());
    status.template = Some(tracking_of(&resolved.template));

    if info.is_unmanaged() {
        unmanage_module(ctx, &desired).await?;
        status.state = State::Unmanaged;
        return Ok(status);
    }

    let manifest = ctx.kcp.apply_typed(&desired, FIELD_MANAGER).await?;
    let checks = resolved.template.spec.custom_state_check.as_deref().filter(|_| manifest.spec.resource.is_some());

    status.manifest = Some(tracking_of(&manifest));
    status.resource = resource_tracking(&manifest);
    status.custom_state_check = checks.map(<[CustomStateCheck]>::to_vec);
    status.state = module_state(remote, &manifest, checks).await?;
    Ok(status)
}

fn resource_tracking(manifest: &Manifest) -> Option<TrackingObject> {
    let (api_version, kind, name, namespace) = default_resource_key(manifest)?;
    Some(TrackingObject {
        api_version,
        kind,
        name,
        namespace: namespace.unwrap_or_default(),
        generation: None,
    })
}

// The Manifest's own state, unless the template says to look at the module's CR instead; the
// first check whose path holds the expected value decides.  An Error or Deleting Manifest always
// wins over what the CR says.
async fn module_state(
    remote: &RemoteClient,
    manifest: &Manifest,
    checks: Option<&[CustomStateCheck]>,
) -> anyhow::Result<State> {
    let manifest_state = manifest.status.as_ref().and_then(|s| s.state).unwrap_or(State::Processing);
    let (Some(checks), Some(key)) = (checks.filter(|c| !c.is_empty()), default_cr_key(manifest)) else {
        return Ok(manifest_state);
    };
    if matches!(manifest_state, State::Error | State::Deleting) {
        return Ok(manifest_state);
    }

    let Some(cr) = remote.get(&key).await? else {
        return Ok(State::Processing);
    };
    let doc = serde_json::to_value(&cr)?;
    let state = checks
        .iter()
        .find(|check| lookup_path(&doc, &check.json_path).and_then(|v| v.as_str()) == Some(check.value.as_str()))
        .map_or(State::Processing, |check| check.mapped_state);
    Ok(state)
}

// The Manifest is removed from the control plane, but the annotation tells the manifest
// controller to leave everything it installed in the runtime cluster alone
async fn unmanage_module(ctx: &KymaContext, desired: &Manifest) -> EmptyResult {
    let Some(existing) = ctx.kcp.get_typed::<Manifest>(desired.namespace().as_deref(), &desired.name_any()).await? else {
        return Ok(());
    };

    if existing.annotations().get(UNMANAGED_ANNOTATION).map(String::as_str) != Some(TRUE_VALUE) {
        info!("marking manifest {} as unmanaged", existing.namespaced_name());
        let patch = json!({"metadata": {"annotations": {UNMANAGED_ANNOTATION: TRUE_VALUE}}});
        ctx.kcp.patch_merge(&key_of(&existing), &patch).await?;
    }
    if !existing.is_being_deleted() {
        ctx.kcp.delete_typed(&existing).await?;
    }
    Ok(())
}

// A module that was removed from the spec.  Returns None once its Manifest is gone.
async fn disable_module(
    ctx: &KymaContext,
    kyma: &Kyma,
    remote: &RemoteClient,
    catalog: &Catalog,
    info: &ModuleInfo,
    previous: Option<ModuleStatus>,
) -> anyhow::Result<Option<ModuleStatus>> {
    let Some(mut status) = previous else {
        return Ok(None);
    };
    if let Err(err) = info.validate() {
        debug!("{err}");
    }

    let Some(manifest_ref) = status.manifest.clone() else {
        return Ok(None);
    };
    let namespace = Some(manifest_ref.namespace).filter(|ns| !ns.is_empty()).or_else(|| kyma.namespace());
    let Some(manifest) = ctx.kcp.get_typed::<Manifest>(namespace.as_deref(), &manifest_ref.name).await? else {
        return Ok(None);
    };

    let template = status.template.as_ref().and_then(|t| catalog.template_named(&t.name));
    let cr_gvk = module_cr_gvk(&manifest, template);

    status.state = State::Deleting;
    match can_delete_module(remote, &manifest, cr_gvk.as_ref()).await {
        Ok(true) => {
            if !manifest.is_being_deleted() {
                info!("deleting manifest {} for disabled module {}", manifest.namespaced_name(), info.name());
                ctx.kcp.delete_typed(&manifest).await?;
            }
            status.message = None;
        },
        Ok(false) => status.message = Some(WAITING_FOR_CRS_MESSAGE.into()),
        Err(err) => {
            warn!("could not check remaining CRs for module {}: {err}", info.name());
            status.state = State::Error;
            status.message = Some(format!("could not check for remaining module CRs: {err}"));
        },
    }
    Ok(Some(status))
}

// Mandatory modules never show up in the Kyma status; their Manifests are just kept in line with
// the catalog, and the ones for modules that stopped being mandatory are cleaned up.
pub async fn reconcile_mandatory_modules(ctx: &KymaContext, kyma: &Kyma, catalog: &Catalog) -> EmptyResult {
    let opts = ctx.synthesis_options(kyma);
    let channel = kyma.desired_channel(None);
    let mut expected = BTreeSet::new();

    for (name, outcome) in ctx.lookup.resolve_mandatory(catalog) {
        let resolved = match outcome {
            Ok(resolved) => resolved,
            Err(err) => {
                warn!("skipping mandatory module {name} for {}: {err}", kyma.namespaced_name());
                continue;
            },
        };
        let manifest = build_manifest(kyma, &Module::new(&name), &channel, &resolved, &opts)?;
        expected.insert(manifest.name_any());
        ctx.kcp.apply_typed(&manifest, FIELD_MANAGER).await?;
    }

    let selector = format!("{KYMA_NAME_LABEL}={},{IS_MANDATORY_MODULE_LABEL}={TRUE_VALUE}", kyma.name_any());
    for manifest in ctx.kcp.list_typed::<Manifest>(kyma.namespace().as_deref(), Some(&selector)).await? {
        if !expected.contains(&manifest.name_any()) && !manifest.is_being_deleted() {
            info!("deleting manifest {} for module that is no longer mandatory", manifest.namespaced_name());
            ctx.kcp.delete_typed(&manifest).await?;
        }
    }
    Ok(())
}
