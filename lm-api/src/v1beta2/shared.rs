use std::fmt;

use clockabilly::{
    DateTime,
    Utc,
};
use schemars::JsonSchema;
use serde::{
    Deserialize,
    Serialize,
};

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, JsonSchema, PartialEq, Serialize)]
pub enum State {
    Processing,
    Deleting,
    Ready,
    Error,
    Warning,
    Unmanaged,
}

impl State {
    pub const ALL: [State; 6] = [
        State::Processing,
        State::Deleting,
        State::Ready,
        State::Error,
        State::Warning,
        State::Unmanaged,
    ];
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            State::Processing => "Processing",
            State::Deleting => "Deleting",
            State::Ready => "Ready",
            State::Error => "Error",
            State::Warning => "Warning",
            State::Unmanaged => "Unmanaged",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub enum CustomResourcePolicy {
    #[default]
    CreateAndDelete,
    Ignore,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCondition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
    pub observed_generation: Option<i64>,
    pub last_transition_time: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastOperation {
    pub operation: String,
    pub last_update_time: Option<DateTime<Utc>>,
}

// A pointer to an object that a status entry is tracking (the Manifest, the ModuleTemplate, or the
// module's default CR)
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingObject {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    pub generation: Option<i64>,
}

#[derive(Clone, Debug, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomStateCheck {
    pub json_path: String,
    pub value: String,
    pub mapped_state: State,
}
