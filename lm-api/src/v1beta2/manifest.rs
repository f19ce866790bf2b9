use kube::CustomResource;
use schemars::JsonSchema;
use serde::{
    Deserialize,
    Serialize,
};

use super::shared::*;

pub const RAW_MANIFEST_LAYER: &str = "raw-manifest";

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub enum RefType {
    #[default]
    #[serde(rename = "oci-ref")]
    OciRef,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSpec {
    pub name: String,
    pub repo: String,
    #[serde(rename = "ref")]
    pub ref_: String,
    #[serde(rename = "type", default)]
    pub type_: RefType,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallInfo {
    pub name: String,
    pub source: ImageSpec,
}

#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(group = "operator.kyma-project.io", version = "v1beta2", kind = "Manifest", namespaced)]
#[kube(status = "ManifestStatus")]
#[kube(
    printcolumn = r#"{"name":"state", "type":"string", "description":"module install state", "jsonPath":".status.state"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ManifestSpec {
    // Set when the module is installed into a runtime cluster other than the one this object lives in
    #[serde(default)]
    pub remote: bool,

    #[serde(default)]
    pub version: String,

    pub config: Option<ImageSpec>,
    pub install: InstallInfo,

    // The module's default CR; kept opaque so that unknown fields survive round trips
    #[schemars(schema_with = "super::opaque_document")]
    pub resource: Option<serde_json::Value>,

    #[serde(default)]
    pub custom_resource_policy: CustomResourcePolicy,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, Hash, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncedResource {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestStatus {
    pub state: Option<State>,

    #[serde(default)]
    pub synced: Vec<SyncedResource>,

    #[serde(default)]
    pub conditions: Vec<StatusCondition>,

    pub last_operation: Option<LastOperation>,
}
