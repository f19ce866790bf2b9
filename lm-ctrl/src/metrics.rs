use lm_core::metrics::*;
use lm_core::prelude::*;
use metrics::{
    counter,
    gauge,
    histogram,
};

fn shoot_of(kyma: &Kyma) -> String {
    kyma.labels().get(SHOOT_NAME_LABEL).cloned().unwrap_or_default()
}

fn instance_of(kyma: &Kyma) -> String {
    kyma.labels().get(INSTANCE_ID_LABEL).cloned().unwrap_or_default()
}

// One series per possible state; the current one is 1, everything else 0
pub fn record_kyma_state(kyma: &Kyma, current: Option<State>) {
    for state in State::ALL {
        gauge!(
            KYMA_STATE_METRIC,
            KYMA_NAME_METRIC_LABEL => kyma.name_any(),
            STATE_METRIC_LABEL => state.to_string(),
            SHOOT_METRIC_LABEL => shoot_of(kyma),
            INSTANCE_ID_METRIC_LABEL => instance_of(kyma),
        )
        .set(if Some(state) == current { 1.0 } else { 0.0 });
    }
}

pub fn record_module_state(kyma: &Kyma, module: &str, current: Option<State>) {
    for state in State::ALL {
        gauge!(
            MODULE_STATE_METRIC,
            KYMA_NAME_METRIC_LABEL => kyma.name_any(),
            MODULE_NAME_METRIC_LABEL => module.to_string(),
            STATE_METRIC_LABEL => state.to_string(),
            SHOOT_METRIC_LABEL => shoot_of(kyma),
            INSTANCE_ID_METRIC_LABEL => instance_of(kyma),
        )
        .set(if Some(state) == current { 1.0 } else { 0.0 });
    }
}

// The metrics facade has no way to drop a series, so a removed module just reads 0 everywhere
pub fn remove_module_state(kyma: &Kyma, module: &str) {
    record_module_state(kyma, module, None);
}

pub fn remove_kyma_metrics(kyma: &Kyma) {
    record_kyma_state(kyma, None);
    if let Some(status) = kyma.status.as_ref() {
        for m in &status.modules {
            remove_module_state(kyma, &m.name);
        }
    }
}

pub fn record_requeue(reason: &'static str, requeue_type: &'static str) {
    counter!(REQUEUE_REASON_METRIC, REQUEUE_REASON_METRIC_LABEL => reason, REQUEUE_TYPE_METRIC_LABEL => requeue_type)
        .increment(1);
}

// Counted when a purge starts, whether or not it succeeds
pub fn record_purge_request() {
    counter!(PURGE_REQUESTS_METRIC).increment(1);
}

pub fn record_purge_time(duration_secs: f64) {
    histogram!(PURGE_TIME_METRIC).record(duration_secs);
}

pub fn record_purge_error(kyma: &Kyma, reason: &'static str) {
    counter!(
        PURGE_ERROR_METRIC,
        KYMA_NAME_METRIC_LABEL => kyma.name_any(),
        SHOOT_METRIC_LABEL => shoot_of(kyma),
        REASON_METRIC_LABEL => reason,
    )
    .increment(1);
}
