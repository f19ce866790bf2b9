use std::collections::HashMap;
use std::sync::RwLock;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;

// Process-wide cache of control-plane CRDs, keyed by CRD name.  The remote sync engine compares
// generations against it to decide whether a runtime cluster's copy needs to be replaced.
#[derive(Default)]
pub struct CrdCache {
    crds: RwLock<HashMap<String, CustomResourceDefinition>>,
}

impl CrdCache {
    pub fn new() -> CrdCache {
        Default::default()
    }

    pub fn get(&self, name: &str) -> Option<CustomResourceDefinition> {
        self.crds.read().unwrap_or_else(|e| e.into_inner()).get(name).cloned()
    }

    pub fn insert(&self, name: &str, crd: CustomResourceDefinition) {
        self.crds.write().unwrap_or_else(|e| e.into_inner()).insert(name.into(), crd);
    }

    pub fn invalidate(&self, name: &str) {
        self.crds.write().unwrap_or_else(|e| e.into_inner()).remove(name);
    }
}
