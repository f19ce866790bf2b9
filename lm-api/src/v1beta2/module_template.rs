use kube::CustomResource;
use schemars::JsonSchema;
use serde::{
    Deserialize,
    Serialize,
};

use super::shared::*;

#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(group = "operator.kyma-project.io", version = "v1beta2", kind = "ModuleTemplate", namespaced)]
#[kube(shortname = "mt")]
#[kube(
    printcolumn = r#"{"name":"module", "type":"string", "jsonPath":".spec.moduleName"}"#,
    printcolumn = r#"{"name":"version", "type":"string", "jsonPath":".spec.version"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ModuleTemplateSpec {
    // Legacy release-channel binding; templates resolved through a ModuleReleaseMeta leave this empty
    #[serde(default)]
    pub channel: String,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub module_name: String,

    #[serde(default)]
    pub mandatory: bool,

    #[serde(default)]
    pub requires_downtime: bool,

    #[schemars(schema_with = "super::opaque_document")]
    pub data: Option<serde_json::Value>,

    #[schemars(schema_with = "super::opaque_document")]
    pub descriptor: Option<serde_json::Value>,

    pub custom_state_check: Option<Vec<CustomStateCheck>>,
}
