use kube::CustomResource;
use schemars::JsonSchema;
use serde::{
    Deserialize,
    Serialize,
};

use super::shared::*;

fn default_managed() -> bool {
    true
}

#[derive(Clone, Debug, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub name: String,

    // A module is selected either through a release channel or a pinned version, never both
    pub channel: Option<String>,
    pub version: Option<String>,

    pub controller_name: Option<String>,
    #[serde(default)]
    pub custom_resource_policy: CustomResourcePolicy,
    pub remote_module_template_ref: Option<String>,

    #[serde(default = "default_managed")]
    pub managed: bool,
}

impl Module {
    pub fn new(name: &str) -> Module {
        Module {
            name: name.into(),
            channel: None,
            version: None,
            controller_name: None,
            custom_resource_policy: Default::default(),
            remote_module_template_ref: None,
            managed: true,
        }
    }

    pub fn with_channel(mut self, channel: &str) -> Module {
        self.channel = Some(channel.into());
        self
    }

    pub fn with_version(mut self, version: &str) -> Module {
        self.version = Some(version.into());
        self
    }
}

#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(group = "operator.kyma-project.io", version = "v1beta2", kind = "Kyma", namespaced)]
#[kube(shortname = "kyma", shortname = "kymas")]
#[kube(status = "KymaStatus")]
#[kube(derive = "PartialEq")]
#[kube(
    printcolumn = r#"{"name":"state", "type":"string", "description":"overall kyma state", "jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct KymaSpec {
    // Default release channel for every module that doesn't pick its own
    #[serde(default)]
    pub channel: String,

    #[serde(default)]
    pub modules: Vec<Module>,

    #[serde(default)]
    pub skip_maintenance_windows: bool,
}

#[derive(Clone, Debug, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleStatus {
    pub name: String,
    pub fqdn: Option<String>,
    pub channel: Option<String>,
    pub version: Option<String>,
    pub state: State,
    pub message: Option<String>,

    pub manifest: Option<TrackingObject>,
    pub template: Option<TrackingObject>,
    pub resource: Option<TrackingObject>,
    pub custom_state_check: Option<Vec<CustomStateCheck>>,
}

impl ModuleStatus {
    pub fn new(name: &str, state: State) -> ModuleStatus {
        ModuleStatus {
            name: name.into(),
            fqdn: None,
            channel: None,
            version: None,
            state,
            message: None,
            manifest: None,
            template: None,
            resource: None,
            custom_state_check: None,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KymaStatus {
    pub state: Option<State>,

    #[serde(default)]
    pub conditions: Vec<StatusCondition>,

    #[serde(default)]
    pub modules: Vec<ModuleStatus>,

    pub active_channel: Option<String>,
    pub last_operation: Option<LastOperation>,
}
