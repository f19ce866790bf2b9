use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{
    Deserialize,
    Serialize,
};

use super::shared::*;

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WatchedField {
    #[default]
    Spec,
    Status,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    pub name: String,
    pub port: i64,
    pub namespace: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    #[serde(default)]
    pub selector: BTreeMap<String, String>,
}

#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(group = "operator.kyma-project.io", version = "v1beta2", kind = "Watcher", namespaced)]
#[kube(status = "WatcherStatus")]
#[serde(rename_all = "camelCase")]
pub struct WatcherSpec {
    pub service_info: ServiceInfo,

    // Labels that runtime-cluster objects must carry for the watcher webhook to forward their events
    #[serde(default)]
    pub labels_to_watch: BTreeMap<String, String>,

    #[serde(default)]
    pub field: WatchedField,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub manager: String,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatcherStatus {
    pub state: Option<State>,

    #[serde(default)]
    pub conditions: Vec<StatusCondition>,
}
