use std::fmt;
use std::ops::Deref;

use kube::api::{
    ApiResource,
    DynamicObject,
    GroupVersionKind,
    TypeMeta,
};
use kube::Resource;

use super::KubernetesError;
use crate::errors::*;

// GVK is a "newtype" wrapper around GroupVersionKind so that we can hash it, print it, and hang
// conversion helpers off of it; the dynamic cluster client keys everything on these.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct GVK(GroupVersionKind);

impl GVK {
    pub fn new(group: &str, version: &str, kind: &str) -> GVK {
        GVK(GroupVersionKind::gvk(group, version, kind))
    }

    pub fn of<K: Resource<DynamicType = ()>>() -> GVK {
        GVK::new(&K::group(&()), &K::version(&()), &K::kind(&()))
    }

    pub fn from_api_version_kind(api_version: &str, kind: &str) -> anyhow::Result<GVK> {
        match api_version.split_once('/') {
            Some((group, version)) if !version.contains('/') => Ok(GVK::new(group, version, kind)),
            Some(_) => Err(KubernetesError::malformed_api_version(api_version)),
            None => Ok(GVK::new("", api_version, kind)),
        }
    }

    pub fn from_dynamic_obj(obj: &DynamicObject) -> anyhow::Result<GVK> {
        match &obj.types {
            Some(t) => GVK::from_api_version_kind(&t.api_version, &t.kind),
            None => Err(KubernetesError::missing_type_meta(&obj.metadata.name.clone().unwrap_or_default())),
        }
    }

    pub fn into_type_meta(&self) -> TypeMeta {
        TypeMeta {
            api_version: self.0.api_version(),
            kind: self.0.kind.clone(),
        }
    }

    pub fn api_resource(&self) -> ApiResource {
        ApiResource::from_gvk(&self.0)
    }
}

// Impl Deref lets a GVK act like a GroupVersionKind anywhere one of those is expected
impl Deref for GVK {
    type Target = GroupVersionKind;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for GVK {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.0.group.is_empty() {
            write!(f, "{}.{}", self.0.version, self.0.kind)
        } else {
            write!(f, "{}/{}.{}", self.0.group, self.0.version, self.0.kind)
        }
    }
}
