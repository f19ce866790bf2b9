use std::collections::HashMap;
use std::sync::{
    Arc,
    RwLock,
};

use kube::ResourceExt;
use lm_api::v1beta2::ModuleTemplate;
#[cfg(feature = "mock")]
use mockall::automock;
use serde::{
    Deserialize,
    Serialize,
};
use serde_json as json;
use tracing::*;

use crate::errors::*;
use crate::jsonutils;

err_impl! {DescriptorError,
    #[error("module template has no descriptor: {0}")]
    MissingDescriptor(String),

    #[error("could not parse descriptor: {0}")]
    Malformed(String),
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryContext {
    pub base_url: String,

    #[serde(rename = "type", default)]
    pub type_: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAccess {
    #[serde(rename = "type", default)]
    pub type_: String,
    pub digest: Option<String>,
    pub local_reference: Option<String>,
    pub image_reference: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptorResource {
    pub name: String,

    #[serde(default)]
    pub version: String,

    #[serde(rename = "type", default)]
    pub type_: String,

    #[serde(default)]
    pub access: ResourceAccess,
}

// The parts of an OCM component descriptor that lifecycle-manager cares about
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub name: String,
    pub version: String,
    pub repository_context: Option<RepositoryContext>,

    #[serde(default)]
    pub resources: Vec<DescriptorResource>,
}

impl Descriptor {
    pub fn resource(&self, name: &str) -> Option<&DescriptorResource> {
        self.resources.iter().find(|r| r.name == name)
    }

    // "kyma-project.io/module/template-operator" -> "template-operator"
    pub fn short_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    pub fn base_url(&self) -> &str {
        self.repository_context.as_ref().map(|rc| rc.base_url.as_str()).unwrap_or_default()
    }
}

#[cfg_attr(feature = "mock", automock)]
pub trait DescriptorProvider: Send + Sync {
    fn get_descriptor(&self, template: &ModuleTemplate) -> anyhow::Result<Arc<Descriptor>>;
}

// Parsing descriptors isn't free and every reconcile of every Kyma asks for the same handful of
// them, so we keep the parsed result around keyed by the content fingerprint of the raw
// document.  Two writers racing on the same key compute the same value, so last-write-wins is fine.
#[derive(Default)]
pub struct CachedDescriptorProvider {
    cache: RwLock<HashMap<String, Arc<Descriptor>>>,
}

impl CachedDescriptorProvider {
    pub fn new() -> CachedDescriptorProvider {
        Default::default()
    }

    pub fn len(&self) -> usize {
        self.cache.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn invalidate(&self, fingerprint: &str) {
        self.cache.write().unwrap_or_else(|e| e.into_inner()).remove(fingerprint);
    }
}

impl DescriptorProvider for CachedDescriptorProvider {
    fn get_descriptor(&self, template: &ModuleTemplate) -> anyhow::Result<Arc<Descriptor>> {
        let Some(raw) = template.spec.descriptor.as_ref().filter(|d| !d.is_null()) else {
            bail!(DescriptorError::missing_descriptor(&template.name_any()));
        };

        let key = jsonutils::fingerprint(raw);
        if let Some(desc) = self.cache.read().unwrap_or_else(|e| e.into_inner()).get(&key) {
            return Ok(desc.clone());
        }

        debug!("parsing descriptor for template {}", template.name_any());
        let desc: Descriptor = json::from_value(raw.clone())
            .map_err(|e| DescriptorError::malformed(&format!("{}: {e}", template.name_any())))?;
        let desc = Arc::new(desc);
        self.cache.write().unwrap_or_else(|e| e.into_inner()).insert(key, desc.clone());
        Ok(desc)
    }
}
