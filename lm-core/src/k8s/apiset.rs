use std::collections::HashMap;
use std::collections::hash_map::Entry;

use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1 as apiextv1;
use kube::api::{
    ApiResource,
    DynamicObject,
};
use kube::discovery::Scope;
use lm_api::v1beta2::*;
use tracing::*;

use crate::k8s::GVK;

// An ApiSet caches the ApiResource (plural, scope) for every GVK we talk to, so that we don't
// have to repeatedly make "discovery" calls against the apiserver.  Our own kinds and a couple of
// built-ins are known up front; anything else (e.g. arbitrary module CRDs) is discovered lazily.
pub struct ApiSet {
    client: kube::Client,
    resources: HashMap<GVK, (ApiResource, bool)>,
}

impl ApiSet {
    pub fn new(client: kube::Client) -> ApiSet {
        let mut resources = HashMap::new();
        register::<Kyma>(&mut resources, true);
        register::<Manifest>(&mut resources, true);
        register::<ModuleTemplate>(&mut resources, true);
        register::<ModuleReleaseMeta>(&mut resources, true);
        register::<Watcher>(&mut resources, true);
        register::<corev1::Secret>(&mut resources, true);
        register::<corev1::Namespace>(&mut resources, false);
        register::<apiextv1::CustomResourceDefinition>(&mut resources, false);
        ApiSet { client, resources }
    }

    // A namespace of None means "all namespaces" for namespaced kinds
    pub async fn api_for(&mut self, gvk: &GVK, namespace: Option<&str>) -> anyhow::Result<kube::Api<DynamicObject>> {
        let client = self.client.clone();
        let (ar, namespaced) = self.api_meta_for(gvk).await?;
        Ok(match (namespaced, namespace) {
            (true, Some(ns)) => kube::Api::namespaced_with(client, ns, ar),
            _ => kube::Api::all_with(client, ar),
        })
    }

    async fn api_meta_for(&mut self, gvk: &GVK) -> anyhow::Result<&(ApiResource, bool)> {
        match self.resources.entry(gvk.clone()) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(e) => {
                debug!("discovering api resource for {}", e.key());
                let (ar, cap) = kube::discovery::pinned_kind(&self.client, e.key()).await?;
                Ok(e.insert((ar, cap.scope == Scope::Namespaced)))
            },
        }
    }
}

fn register<K: kube::Resource<DynamicType = ()>>(resources: &mut HashMap<GVK, (ApiResource, bool)>, namespaced: bool) {
    resources.insert(GVK::of::<K>(), (ApiResource::erase::<K>(&()), namespaced));
}
