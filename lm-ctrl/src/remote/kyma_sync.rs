use std::collections::BTreeMap;

use kube::api::DynamicObject;
use lm_api::v1beta2::{
    KymaSpec,
    KymaStatus,
};
use lm_core::client::{
    ObjectKey,
    from_dynamic,
    key_of,
};
use lm_core::k8s::{
    add_finalizer,
    remove_finalizer,
};
use lm_core::prelude::*;
use serde_json::json;
use tracing::*;

// Labels the watcher webhook keys off of; every Watcher contributes its own, and without any
// Watchers the remote Kyma still gets lifecycle-manager's default
async fn watch_labels(kcp: &ControlPlaneClient, kyma: &Kyma) -> anyhow::Result<BTreeMap<String, String>> {
    let watchers = kcp.list_typed::<Watcher>(kyma.namespace().as_deref(), None).await?;
    let mut labels: BTreeMap<String, String> =
        watchers.into_iter().flat_map(|w| w.spec.labels_to_watch.into_iter()).collect();
    labels.entry(WATCHED_BY_LABEL.into()).or_insert_with(|| WATCHED_BY_LABEL_VALUE.into());
    Ok(labels)
}

fn remote_kyma_key(kyma: &Kyma, remote_namespace: &str) -> ObjectKey {
    ObjectKey::new(&KYMA_GVK, Some(remote_namespace), &kyma.name_any())
}

// Pushes the control-plane view of the Kyma (channel, identity labels, watcher labels) to the
// runtime cluster, creating an empty shell there if needed.  The remote spec.modules is never
// written here: that list belongs to the runtime cluster's users.
pub async fn sync_remote_kyma(
    kcp: &ControlPlaneClient,
    remote: &RemoteClient,
    kyma: &Kyma,
    remote_namespace: &str,
) -> anyhow::Result<Kyma> {
    let name = kyma.name_any();
    if remote.get_typed::<Kyma>(Some(remote_namespace), &name).await?.is_none() {
        info!("creating remote kyma {remote_namespace}/{name}");
        let mut shell = Kyma::new(&name, KymaSpec { channel: kyma.spec.channel.clone(), ..Default::default() });
        shell.metadata.namespace = Some(remote_namespace.into());
        remote.create_typed(&shell).await?;
    }

    let mut labels: BTreeMap<String, String> =
        kyma.runtime_labels().into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    labels.extend(watch_labels(kcp, kyma).await?);
    labels.insert(MANAGED_BY_LABEL.into(), MANAGED_BY_LABEL_VALUE.into());

    let mut desired = DynamicObject::new(&name, &KYMA_GVK.api_resource())
        .within(remote_namespace)
        .data(json!({"spec": {"channel": kyma.spec.channel}}));
    desired.metadata.labels = Some(labels);
    desired.metadata.annotations = Some(BTreeMap::from([(OWNED_BY_ANNOTATION.into(), kyma.namespaced_name())]));
    let applied = remote.apply(&desired, FIELD_MANAGER).await?;

    let mut meta = applied.metadata.clone();
    if add_finalizer(&mut meta, KYMA_FINALIZER) {
        let patch = json!({"metadata": {"finalizers": meta.finalizers}});
        let patched = remote.patch_merge(&remote_kyma_key(kyma, remote_namespace), &patch).await?;
        return from_dynamic(patched);
    }
    from_dynamic(applied)
}

// The modules to reconcile this pass: everything the control plane asks for, plus whatever the
// runtime cluster's users enabled themselves.  On a name collision the control plane wins.  This is
// never written back to the control-plane Kyma, so the two sides can't keep feeding each other.
pub fn effective_modules(kcp_kyma: &Kyma, remote_kyma: &Kyma) -> Vec<Module> {
    let mut modules = kcp_kyma.spec.modules.clone();
    for m in &remote_kyma.spec.modules {
        if !modules.iter().any(|existing| existing.name == m.name) {
            modules.push(m.clone());
        }
    }
    modules
}

pub async fn sync_status_to_remote(remote: &RemoteClient, remote_kyma: &Kyma, status: &KymaStatus) -> EmptyResult {
    remote.patch_status(&key_of(remote_kyma), &serde_json::to_value(status)?, FIELD_MANAGER).await
}

// Returns true once the remote Kyma is gone
pub async fn delete_remote_kyma(remote: &RemoteClient, kyma: &Kyma, remote_namespace: &str) -> anyhow::Result<bool> {
    let key = remote_kyma_key(kyma, remote_namespace);
    let Some(remote_kyma) = remote.get(&key).await? else {
        return Ok(true);
    };

    let mut meta = remote_kyma.metadata.clone();
    if remove_finalizer(&mut meta, KYMA_FINALIZER) {
        remote.patch_merge(&key, &json!({"metadata": {"finalizers": meta.finalizers}})).await?;
    }
    remote.delete(&key).await?;
    Ok(remote.get(&key).await?.is_none())
}
