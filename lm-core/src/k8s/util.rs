use std::collections::BTreeMap;

use kube::api::Resource;

use super::*;
use crate::prelude::*;

const LAST_APPLIED_CONFIG_ANNOTATION: &str = "kubectl.kubernetes.io/last-applied-configuration";

// Returns None if the owner hasn't been persisted yet; owner references without a uid are
// rejected by the apiserver.
pub fn build_owner_reference<K>(owner: &K) -> Option<metav1::OwnerReference>
where
    K: Resource<DynamicType = ()>,
{
    Some(metav1::OwnerReference {
        api_version: K::api_version(&()).into(),
        kind: K::kind(&()).into(),
        name: owner.name_any(),
        uid: owner.uid()?,
        block_owner_deletion: Some(true),
        controller: Some(true),
    })
}

// Strip all the server-populated fields off of an object so that it can be applied to a different
// cluster (e.g., when copying ModuleTemplates from the control plane to a runtime cluster)
pub fn sanitize_for_copy(meta: &mut metav1::ObjectMeta) {
    meta.creation_timestamp = None;
    meta.deletion_timestamp = None;
    meta.deletion_grace_period_seconds = None;
    meta.generation = None;
    meta.managed_fields = None;
    meta.owner_references = None;
    meta.resource_version = None;
    meta.uid = None;
    meta.finalizers = None;

    if let Some(a) = meta.annotations.as_mut() {
        a.remove(LAST_APPLIED_CONFIG_ANNOTATION);
    }
}

// Returns true if the finalizer list was modified
pub fn add_finalizer(meta: &mut metav1::ObjectMeta, finalizer: &str) -> bool {
    let finalizers = meta.finalizers.get_or_insert_with(Vec::new);
    if finalizers.iter().any(|f| f == finalizer) {
        return false;
    }
    finalizers.push(finalizer.into());
    true
}

// Returns true if the finalizer list was modified
pub fn remove_finalizer(meta: &mut metav1::ObjectMeta, finalizer: &str) -> bool {
    let Some(finalizers) = meta.finalizers.as_mut() else {
        return false;
    };
    let len = finalizers.len();
    finalizers.retain(|f| f != finalizer);
    len != finalizers.len()
}

// Only equality-based selectors ("a=b,c=d") are supported, which is all we ever generate
pub fn matches_label_selector(labels: &BTreeMap<String, String>, selector: &str) -> bool {
    selector
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .all(|term| match term.split_once('=') {
            Some((k, v)) => labels.get(k).map(String::as_str) == Some(v.trim_start_matches('=')),
            None => labels.contains_key(term),
        })
}

impl<T: Resource> KubeResourceExt for T {
    fn namespaced_name(&self) -> String {
        match self.namespace() {
            Some(ns) => format!("{}/{}", ns, self.name_any()),
            None => self.name_any().clone(),
        }
    }

    fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers().iter().any(|f| f == finalizer)
    }

    fn is_being_deleted(&self) -> bool {
        self.meta().deletion_timestamp.is_some()
    }

    fn label_is_true(&self, key: &str) -> bool {
        self.labels().get(key).is_some_and(|v| v.eq_ignore_ascii_case(TRUE_VALUE))
    }
}
