use clockabilly::{
    DateTime,
    Utc,
};
use kube::Resource;
use lm_api::v1beta2::{
    ConditionStatus,
    LastOperation,
    ModuleStatus,
    StatusCondition,
    TrackingObject,
};
use lm_core::prelude::*;

pub fn tracking_of<K: Resource<DynamicType = ()>>(obj: &K) -> TrackingObject {
    TrackingObject {
        api_version: K::api_version(&()).into(),
        kind: K::kind(&()).into(),
        name: obj.name_any(),
        namespace: obj.namespace().unwrap_or_default(),
        generation: obj.meta().generation,
    }
}

fn severity(state: State) -> u8 {
    match state {
        State::Error => 3,
        State::Warning => 2,
        State::Processing | State::Deleting => 1,
        State::Ready | State::Unmanaged => 0,
    }
}

// Highest severity wins.  Unmanaged modules are the user's business and don't count; a catalog
// that didn't make it to the runtime cluster keeps the Kyma from being Ready.
pub fn aggregate_state(modules: &[ModuleStatus], catalog_synced: Option<bool>) -> State {
    let worst = modules
        .iter()
        .map(|m| m.state)
        .filter(|s| *s != State::Unmanaged)
        .max_by_key(|s| severity(*s))
        .unwrap_or(State::Ready);

    match (worst, catalog_synced) {
        (State::Ready | State::Processing | State::Deleting, Some(false)) => State::Error,
        (state, _) => state,
    }
}

// Keeps lastTransitionTime stable unless the condition actually flips
pub fn set_condition(
    conditions: &mut Vec<StatusCondition>,
    type_: &str,
    ok: bool,
    message: &str,
    generation: Option<i64>,
    now: DateTime<Utc>,
) {
    let status = if ok { ConditionStatus::True } else { ConditionStatus::False };
    let reason = if ok { "Ready" } else { "Processing" };
    let transition = match conditions.iter().find(|c| c.type_ == type_) {
        Some(c) if c.status == status => c.last_transition_time,
        _ => Some(now),
    };

    conditions.retain(|c| c.type_ != type_);
    conditions.push(StatusCondition {
        type_: type_.into(),
        status,
        reason: reason.into(),
        message: message.into(),
        observed_generation: generation,
        last_transition_time: transition,
    });
    conditions.sort_by(|a, b| a.type_.cmp(&b.type_));
}

pub fn remove_condition(conditions: &mut Vec<StatusCondition>, type_: &str) {
    conditions.retain(|c| c.type_ != type_);
}

// What the Kyma is waiting on, in a sentence
pub fn summarize(modules: &[ModuleStatus], state: State) -> String {
    let failing: Vec<_> = modules
        .iter()
        .filter(|m| severity(m.state) >= 2)
        .map(|m| match &m.message {
            Some(msg) => format!("{}: {msg}", m.name),
            None => format!("{} is in {} state", m.name, m.state),
        })
        .collect();

    match state {
        State::Ready => "kyma is ready".into(),
        State::Error | State::Warning if !failing.is_empty() => failing.join("; "),
        State::Deleting => "waiting for modules to be deleted".into(),
        _ => "waiting for modules to be ready".into(),
    }
}

pub fn last_operation(message: &str, now: DateTime<Utc>) -> LastOperation {
    LastOperation { operation: message.into(), last_update_time: Some(now) }
}
