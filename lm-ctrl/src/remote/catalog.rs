use std::collections::BTreeSet;

use kube::Resource;
use lm_core::k8s::sanitize_for_copy;
use lm_core::prelude::*;
use tracing::*;

use crate::lookup::{
    Catalog,
    is_mandatory,
    is_visible,
    template_module_name,
};

fn managed_selector() -> String {
    format!("{MANAGED_BY_LABEL}={MANAGED_BY_LABEL_VALUE}")
}

fn meta_visible(meta: &ModuleReleaseMeta, kyma: &Kyma) -> bool {
    (!meta.spec.beta || kyma.is_beta()) && (!meta.spec.internal || kyma.is_internal())
}

// Templates that go to the runtime cluster: only the new (release-meta based) format, never the
// mandatory ones, and only what this Kyma is allowed to see
pub fn remote_templates<'a>(kyma: &Kyma, catalog: &'a Catalog) -> Vec<&'a ModuleTemplate> {
    catalog
        .templates
        .iter()
        .filter(|t| !is_mandatory(t))
        .filter(|t| match catalog.release_meta(template_module_name(t)) {
            Some(meta) => is_visible(t, Some(meta), kyma),
            None => false,
        })
        .collect()
}

pub fn remote_release_metas<'a>(kyma: &Kyma, catalog: &'a Catalog) -> Vec<&'a ModuleReleaseMeta> {
    catalog.metas.iter().filter(|m| meta_visible(m, kyma)).collect()
}

fn prepare_copy<K: Resource + Clone>(obj: &K, remote_namespace: &str) -> K {
    let mut copy = obj.clone();
    let meta = copy.meta_mut();
    sanitize_for_copy(meta);
    meta.namespace = Some(remote_namespace.into());
    meta.labels
        .get_or_insert_default()
        .insert(MANAGED_BY_LABEL.into(), MANAGED_BY_LABEL_VALUE.into());
    copy
}

// Makes the runtime cluster's catalog match what this Kyma can use, and removes whatever
// lifecycle-manager put there earlier that no longer qualifies
pub async fn sync_catalog(remote: &RemoteClient, kyma: &Kyma, catalog: &Catalog, remote_namespace: &str) -> EmptyResult {
    let templates = remote_templates(kyma, catalog);
    let metas = remote_release_metas(kyma, catalog);

    for template in &templates {
        remote
            .apply_typed(&prepare_copy(*template, remote_namespace), CATALOG_SYNC_FIELD_MANAGER)
            .await?;
    }
    for meta in &metas {
        remote.apply_typed(&prepare_copy(*meta, remote_namespace), CATALOG_SYNC_FIELD_MANAGER).await?;
    }

    let wanted: BTreeSet<_> = templates.iter().map(|t| t.name_any()).collect();
    for stale in remote
        .list_typed::<ModuleTemplate>(Some(remote_namespace), Some(&managed_selector()))
        .await?
        .into_iter()
        .filter(|t| !wanted.contains(&t.name_any()))
    {
        info!("removing stale template {} from runtime of {}", stale.name_any(), kyma.namespaced_name());
        remote.delete_typed(&stale).await?;
    }

    let wanted: BTreeSet<_> = metas.iter().map(|m| m.name_any()).collect();
    for stale in remote
        .list_typed::<ModuleReleaseMeta>(Some(remote_namespace), Some(&managed_selector()))
        .await?
        .into_iter()
        .filter(|m| !wanted.contains(&m.name_any()))
    {
        info!("removing stale release meta {} from runtime of {}", stale.name_any(), kyma.namespaced_name());
        remote.delete_typed(&stale).await?;
    }

    debug!("synced {} templates and {} release metas to {}", templates.len(), metas.len(), kyma.namespaced_name());
    Ok(())
}

// Used when the Kyma goes away
pub async fn delete_catalog(remote: &RemoteClient, remote_namespace: &str) -> EmptyResult {
    for t in remote
        .list_typed::<ModuleTemplate>(Some(remote_namespace), Some(&managed_selector()))
        .await?
    {
        remote.delete_typed(&t).await?;
    }
    for m in remote
        .list_typed::<ModuleReleaseMeta>(Some(remote_namespace), Some(&managed_selector()))
        .await?
    {
        remote.delete_typed(&m).await?;
    }
    Ok(())
}
