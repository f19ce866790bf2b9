use std::sync::Arc;
use std::time::{
    Duration,
    Instant,
};

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::Resource;
use lm_core::client::{
    ObjectKey,
    key_of,
};
use lm_core::errors::*;
use lm_core::k8s::{
    GVK,
    add_finalizer,
    remove_finalizer,
};
use lm_core::prelude::*;
use serde_json::json;
use tracing::*;

use crate::context::PurgeContext;
use crate::errors::is_invalid_kubeconfig;
use crate::metrics::{
    record_purge_error,
    record_purge_request,
    record_purge_time,
};

// The key the purge queue works on: namespace and name of a control-plane Kyma
pub type PurgeKey = (String, String);

pub fn purge_key(kyma: &Kyma) -> PurgeKey {
    (kyma.namespace().unwrap_or_default(), kyma.name_any())
}

fn crd_gvk(crd: &CustomResourceDefinition) -> Option<GVK> {
    let version = crd
        .spec
        .versions
        .iter()
        .find(|v| v.storage)
        .or_else(|| crd.spec.versions.first())?;
    Some(GVK::new(&crd.spec.group, &version.name, &crd.spec.names.kind))
}

// Selects CRDs by "kind.group" entries, where kind is the plural, singular or kind name of the CRD
// (case-insensitive) or "*" for every CRD in the group.  Entries without a group match nothing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CrdMatcher {
    rules: Vec<(String, String)>,
}

impl CrdMatcher {
    pub fn new<S: AsRef<str>>(entries: &[S]) -> CrdMatcher {
        let rules = entries
            .iter()
            .filter_map(|entry| {
                let entry = entry.as_ref().trim().to_lowercase();
                let Some((kind, group)) = entry.split_once('.') else {
                    if !entry.is_empty() {
                        warn!("ignoring CRD skip entry {entry} without a group");
                    }
                    return None;
                };
                let (kind, group) = (kind.trim(), group.trim());
                if kind.is_empty() || group.is_empty() {
                    warn!("ignoring malformed CRD skip entry {entry}");
                    return None;
                }
                Some((kind.to_string(), group.to_string()))
            })
            .collect();
        CrdMatcher { rules }
    }

    pub fn matches(&self, crd: &CustomResourceDefinition) -> bool {
        let group = crd.spec.group.to_lowercase();
        let names = &crd.spec.names;
        let candidates = [
            names.plural.to_lowercase(),
            names.singular.as_deref().unwrap_or_default().to_lowercase(),
            names.kind.to_lowercase(),
        ];
        self.rules.iter().any(|(kind, g)| *g == group && (kind == "*" || candidates.contains(kind)))
    }
}

// The Kyma CRD is never purged: the runtime's own Kyma holds the deletion of everything else
fn is_kyma_crd(crd: &CustomResourceDefinition) -> bool {
    crd.spec.group == Kyma::group(&()) && crd.spec.names.kind == Kyma::kind(&())
}

// Strips the finalizers off every custom resource in the runtime cluster, except for the Kyma CRD
// and whatever the matcher selects.  Returns how many objects were patched.
pub async fn strip_remote_finalizers(remote: &RemoteClient, skip: &CrdMatcher) -> anyhow::Result<usize> {
    let mut patched = 0;
    for crd in remote.list_typed::<CustomResourceDefinition>(None, None).await? {
        let name = crd.name_any();
        if is_kyma_crd(&crd) || skip.matches(&crd) {
            debug!("not touching CRs of skipped CRD {name}");
            continue;
        }
        let Some(gvk) = crd_gvk(&crd) else {
            warn!("CRD {name} has no versions");
            continue;
        };

        for cr in remote.list(&gvk, None, None).await? {
            if cr.finalizers().is_empty() {
                continue;
            }
            let key = ObjectKey::new(&gvk, cr.namespace().as_deref(), &cr.name_any());
            debug!("removing finalizers from {key}");
            remote.patch_merge(&key, &json!({"metadata": {"finalizers": null}})).await?;
            patched += 1;
        }
    }
    Ok(patched)
}

async fn set_purge_finalizer(ctx: &PurgeContext, kyma: &Kyma, present: bool) -> EmptyResult {
    let mut meta = kyma.metadata.clone();
    let changed =
        if present { add_finalizer(&mut meta, PURGE_FINALIZER) } else { remove_finalizer(&mut meta, PURGE_FINALIZER) };
    if !changed {
        return Ok(());
    }
    let patch = json!({"metadata": {"finalizers": meta.finalizers, "resourceVersion": kyma.resource_version()}});
    ctx.kcp.patch_merge(&key_of(kyma), &patch).await?;
    Ok(())
}

// How long until the Kyma has been in deletion for the configured timeout; zero once it's due
fn remaining(ctx: &PurgeContext, kyma: &Kyma) -> Duration {
    let Some(deleted_at) = kyma.metadata.deletion_timestamp.as_ref() else {
        return ctx.timeout;
    };
    let elapsed = (ctx.clock.now() - deleted_at.0).to_std().unwrap_or_default();
    ctx.timeout.saturating_sub(elapsed)
}

// Returns when to look at the Kyma again, if at all
#[instrument(parent=None, skip_all, fields(kyma=kyma.namespaced_name()))]
pub async fn reconcile_purge(ctx: &PurgeContext, kyma: &Kyma) -> anyhow::Result<Option<Duration>> {
    if !kyma.is_being_deleted() {
        if !kyma.has_finalizer(PURGE_FINALIZER) {
            info!("adding purge finalizer to {}", kyma.namespaced_name());
            set_purge_finalizer(ctx, kyma, true).await?;
        }
        return Ok(None);
    }
    if !kyma.has_finalizer(PURGE_FINALIZER) {
        return Ok(None);
    }

    // Nothing is touched, not even the runtime connection, before the timeout is up
    let wait = remaining(ctx, kyma);
    if !wait.is_zero() {
        debug!("purge of {} due in {wait:?}", kyma.namespaced_name());
        return Ok(Some(wait));
    }

    let remote = match ctx.remotes.client_for(kyma).await {
        Ok(remote) => remote,
        Err(err) if is_invalid_kubeconfig(&err) => {
            info!("runtime of {} is gone, dropping purge finalizer: {err}", kyma.namespaced_name());
            set_purge_finalizer(ctx, kyma, false).await?;
            return Ok(None);
        },
        Err(err) => {
            record_purge_error(kyma, "remote_client");
            return Err(err);
        },
    };

    record_purge_request();
    let start = Instant::now();
    match strip_remote_finalizers(&remote, &ctx.skip_crds).await {
        Ok(n) => info!("purged finalizers from {n} objects in runtime of {}", kyma.namespaced_name()),
        Err(err) => {
            record_purge_error(kyma, "cleanup_failed");
            return Err(err);
        },
    }
    set_purge_finalizer(ctx, kyma, false).await?;
    record_purge_time(start.elapsed().as_secs_f64());
    Ok(None)
}

// Queue handler: errors are logged and retried after the error interval
pub async fn handle_purge(ctx: Arc<PurgeContext>, key: PurgeKey) -> Option<Duration> {
    let (ns, name) = &key;
    let kyma = match ctx.kcp.get_typed::<Kyma>(Some(ns), name).await {
        Ok(Some(kyma)) => kyma,
        Ok(None) => return None,
        Err(err) => {
            lmerr!(err, "could not fetch kyma {}/{} for purging", ns, name);
            return Some(ctx.error_requeue);
        },
    };

    match reconcile_purge(&ctx, &kyma).await {
        Ok(requeue) => requeue,
        Err(err) => {
            lmerr!(err, "purge failed on kyma {}/{}", ns, name);
            Some(ctx.error_requeue)
        },
    }
}
