use lm_api::v1beta2::CustomResourcePolicy;
use lm_core::client::{
    ObjectKey,
    is_not_found,
};
use lm_core::k8s::GVK;
use lm_core::prelude::*;
use serde_json as json;
use tracing::*;

use crate::manifest::default_resource_key;

pub const WAITING_FOR_CRS_MESSAGE: &str = "waiting for module CRs deletion";

fn gvk_of(doc: &json::Value) -> Option<GVK> {
    let api_version = doc.get("apiVersion")?.as_str()?;
    let kind = doc.get("kind")?.as_str()?;
    GVK::from_api_version_kind(api_version, kind).ok()
}

// The kind of the module's custom resource.  Manifests with the Ignore policy don't carry the
// default CR, so fall back to the template's copy of it.
pub fn module_cr_gvk(manifest: &Manifest, template: Option<&ModuleTemplate>) -> Option<GVK> {
    manifest
        .spec
        .resource
        .as_ref()
        .and_then(gvk_of)
        .or_else(|| template.and_then(|t| t.spec.data.as_ref()).and_then(gvk_of))
}

pub fn default_cr_key(manifest: &Manifest) -> Option<ObjectKey> {
    let (api_version, kind, name, namespace) = default_resource_key(manifest)?;
    let gvk = GVK::from_api_version_kind(&api_version, &kind).ok()?;
    Some(ObjectKey::new(&gvk, namespace.as_deref(), &name))
}

// Cluster-scoped CRs have no namespace, so only the name has to match
fn is_default_cr(obj: &kube::api::DynamicObject, default: &ObjectKey) -> bool {
    obj.name_any() == default.name && (obj.metadata.namespace.is_none() || obj.metadata.namespace == default.namespace)
}

// Returns true once the default CR is gone from the runtime cluster; it's deleted here if it's
// still around, but we wait to see it disappear because the module operator may hold a finalizer
// on it while it cleans up.
pub async fn remove_default_cr(remote: &RemoteClient, manifest: &Manifest) -> anyhow::Result<bool> {
    let Some(key) = default_cr_key(manifest) else {
        return Ok(true);
    };

    match remote.get(&key).await {
        Ok(None) => Ok(true),
        Ok(Some(obj)) => {
            if !obj.is_being_deleted() {
                info!("deleting default CR {key} for manifest {}", manifest.name_any());
                remote.delete(&key).await?;
            }
            Ok(false)
        },
        Err(err) if is_not_found(&err) => Ok(true),
        Err(err) => Err(err),
    }
}

// A module can only go away once no instances of its CR are left anywhere in the runtime
// cluster.  Under CreateAndDelete the default CR is ours to remove and doesn't count; under Ignore
// every instance, default or not, blocks.
pub async fn can_delete_module(remote: &RemoteClient, manifest: &Manifest, cr_gvk: Option<&GVK>) -> anyhow::Result<bool> {
    let policy = manifest.spec.custom_resource_policy;
    if policy == CustomResourcePolicy::CreateAndDelete && !remove_default_cr(remote, manifest).await? {
        return Ok(false);
    }

    let Some(gvk) = cr_gvk else {
        return Ok(true);
    };

    let crs = match remote.list(gvk, None, None).await {
        Ok(crs) => crs,
        Err(err) if is_not_found(&err) => vec![],
        Err(err) => return Err(err),
    };

    let default = default_cr_key(manifest).filter(|_| policy == CustomResourcePolicy::CreateAndDelete);
    let blocking: Vec<_> = crs
        .iter()
        .filter(|cr| default.as_ref().is_none_or(|d| !is_default_cr(cr, d)))
        .map(|cr| cr.namespaced_name())
        .collect();

    if blocking.is_empty() {
        return Ok(true);
    }
    info!("module {} still has {} CR(s) of kind {gvk}: {}", manifest.name_any(), blocking.len(), blocking.join(", "));
    Ok(false)
}
