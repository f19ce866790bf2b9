use kube::CustomResource;
use schemars::JsonSchema;
use serde::{
    Deserialize,
    Serialize,
};

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelVersionAssignment {
    pub channel: String,
    pub version: String,
}

#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(group = "operator.kyma-project.io", version = "v1beta2", kind = "ModuleReleaseMeta", namespaced)]
#[kube(shortname = "mrm")]
#[serde(rename_all = "camelCase")]
pub struct ModuleReleaseMetaSpec {
    pub module_name: String,

    #[serde(default)]
    pub ocm_component_name: String,

    #[serde(default)]
    pub beta: bool,

    #[serde(default)]
    pub internal: bool,

    #[serde(default)]
    pub channels: Vec<ChannelVersionAssignment>,
}

impl ModuleReleaseMetaSpec {
    pub fn version_for_channel(&self, channel: &str) -> Option<&str> {
        self.channels
            .iter()
            .find(|assignment| assignment.channel == channel)
            .map(|assignment| assignment.version.as_str())
    }
}
