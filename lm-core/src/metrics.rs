use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::anyhow;
use metrics::{
    Counter,
    Gauge,
    Histogram,
    Key,
    KeyName,
    Label,
    Metadata,
    Recorder,
    SharedString,
    Unit,
    set_global_recorder,
};
use metrics_util::registry::{
    AtomicStorage,
    Registry,
};

pub const PURGE_REQUESTS_METRIC: &str = "lifecycle_mgr_purgectrl_requests_total";
pub const PURGE_TIME_METRIC: &str = "lifecycle_mgr_purgectrl_time";
pub const PURGE_ERROR_METRIC: &str = "lifecycle_mgr_purgectrl_error";
pub const KYMA_STATE_METRIC: &str = "lifecycle_mgr_kyma_state";
pub const MODULE_STATE_METRIC: &str = "lifecycle_mgr_module_state";
pub const REQUEUE_REASON_METRIC: &str = "lifecycle_mgr_requeue_reason_total";

pub const KYMA_NAME_METRIC_LABEL: &str = "kyma_name";
pub const MODULE_NAME_METRIC_LABEL: &str = "module_name";
pub const STATE_METRIC_LABEL: &str = "state";
pub const SHOOT_METRIC_LABEL: &str = "shoot";
pub const INSTANCE_ID_METRIC_LABEL: &str = "instance_id";
pub const REASON_METRIC_LABEL: &str = "reason";
pub const REQUEUE_REASON_METRIC_LABEL: &str = "requeue_reason";
pub const REQUEUE_TYPE_METRIC_LABEL: &str = "requeue_type";

// The MemoryRecorder keeps every metric in-process so that tests (and debug tooling) can read the
// values back; exposition to Prometheus is somebody else's problem.
#[derive(Clone)]
pub struct MemoryRecorder {
    registry: Arc<Registry<Key, AtomicStorage>>,
}

impl MemoryRecorder {
    pub fn new() -> MemoryRecorder {
        MemoryRecorder { registry: Arc::new(Registry::atomic()) }
    }

    pub fn install(self) -> anyhow::Result<MemoryRecorder> {
        set_global_recorder(self.clone())?;
        Ok(self)
    }

    pub fn get_counter(&self, key: &Key) -> anyhow::Result<u64> {
        self.registry
            .get_counter(key)
            .map(|v| v.load(Ordering::Relaxed))
            .ok_or(anyhow!("no counter with key {key}"))
    }

    pub fn get_gauge(&self, key: &Key) -> anyhow::Result<f64> {
        self.registry
            .get_gauge(key)
            .map(|v| f64::from_bits(v.load(Ordering::Relaxed)))
            .ok_or(anyhow!("no gauge with key {key}"))
    }

    pub fn get_histogram_samples(&self, key: &Key) -> anyhow::Result<Vec<f64>> {
        self.registry
            .get_histogram(key)
            .map(|h| h.data())
            .ok_or(anyhow!("no histogram with key {key}"))
    }
}

impl Default for MemoryRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Recorder for MemoryRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        self.registry.get_or_create_counter(key, |c| Counter::from_arc(c.clone()))
    }

    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        self.registry.get_or_create_gauge(key, |g| Gauge::from_arc(g.clone()))
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        self.registry.get_or_create_histogram(key, |h| Histogram::from_arc(h.clone()))
    }
}

pub fn metric_key(name: &'static str, labels: &[(&'static str, String)]) -> Key {
    let labels: Vec<_> = labels.iter().map(|(k, v)| Label::new(*k, v.clone())).collect();
    Key::from_parts(name, labels)
}

#[cfg(test)]
mod test {
    use metrics::with_local_recorder;
    use rstest::*;

    use super::*;

    #[rstest]
    fn test_memory_recorder_reads_back() {
        let recorder = MemoryRecorder::new();
        with_local_recorder(&recorder, || {
            metrics::counter!(PURGE_REQUESTS_METRIC).increment(2);
            metrics::gauge!(KYMA_STATE_METRIC, KYMA_NAME_METRIC_LABEL => "kyma-sample").set(1.0);
            metrics::histogram!(PURGE_TIME_METRIC).record(0.5);
        });

        assert_eq!(recorder.get_counter(&Key::from_name(PURGE_REQUESTS_METRIC)).unwrap(), 2);
        let gauge_key = metric_key(KYMA_STATE_METRIC, &[(KYMA_NAME_METRIC_LABEL, "kyma-sample".into())]);
        assert_eq!(recorder.get_gauge(&gauge_key).unwrap(), 1.0);
        assert_eq!(recorder.get_histogram_samples(&Key::from_name(PURGE_TIME_METRIC)).unwrap(), vec![0.5]);
        assert!(recorder.get_counter(&Key::from_name(PURGE_ERROR_METRIC)).is_err());
    }
}
