use std::fs;
use std::sync::Arc;

use chrono::{
    DateTime,
    Datelike,
    Duration,
    FixedOffset,
    NaiveTime,
    Offset,
    TimeZone,
    Utc,
};
use clockabilly::Clockable;
use lm_api::v1beta2::{
    Kyma,
    ModuleTemplate,
};
use lm_core::errors::*;
use lm_core::prelude::*;
#[cfg(test)]
use mockall::automock;
use serde::{
    Deserialize,
    Deserializer,
};
use tracing::*;

use crate::lookup::template_module_name;

const TIME_OF_DAY_FORMAT: &str = "%H:%M:%S%:z";

err_impl! {MaintenancePolicyError,
    #[error("could not parse maintenance policy: {0}")]
    Malformed(String),

    #[error("neither the matching rules nor the default provide a window: {0}")]
    NoWindowFound(String),
}

// A window boundary is either an absolute timestamp, or a time of day (with zone offset) that
// repeats on the window's weekdays.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WindowTime {
    Absolute(DateTime<Utc>),
    TimeOfDay(NaiveTime, FixedOffset),
}

impl WindowTime {
    fn parse(s: &str) -> anyhow::Result<WindowTime> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
            return Ok(WindowTime::Absolute(ts.with_timezone(&Utc)));
        }

        // chrono won't parse a bare "Z" as an offset with %:z
        let normalized = match s.strip_suffix('Z') {
            Some(t) => format!("{t}+00:00"),
            None => s.into(),
        };
        let parsed = DateTime::parse_from_str(&format!("1970-01-01 {normalized}"), &format!("%Y-%m-%d {TIME_OF_DAY_FORMAT}"))
            .map_err(|e| MaintenancePolicyError::malformed(&format!("{s}: {e}")))?;
        Ok(WindowTime::TimeOfDay(parsed.time(), *parsed.offset()))
    }

    fn on_day(&self, day: &DateTime<Utc>) -> DateTime<Utc> {
        let (t, offset) = match self {
            WindowTime::Absolute(ts) => (ts.time(), Utc.fix()),
            WindowTime::TimeOfDay(t, offset) => (*t, *offset),
        };
        match offset.from_local_datetime(&day.date_naive().and_time(t)).single() {
            Some(ts) => ts.with_timezone(&Utc),
            None => *day,
        }
    }

    fn absolute(&self) -> DateTime<Utc> {
        match self {
            WindowTime::Absolute(ts) => *ts,
            WindowTime::TimeOfDay(..) => self.on_day(&DateTime::<Utc>::UNIX_EPOCH),
        }
    }
}

impl<'de> Deserialize<'de> for WindowTime {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        WindowTime::parse(&s).map_err(serde::de::Error::custom)
    }
}

fn deserialize_matcher<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Regex>, D::Error> {
    match Option::<String>::deserialize(d)? {
        Some(s) if !s.is_empty() => Regex::new(&s).map(Some).map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Window {
    #[serde(default)]
    pub days: Vec<String>,
    pub begin: WindowTime,
    pub end: WindowTime,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedWindow {
    pub begin: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ResolvedWindow {
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        self.begin <= now && now < self.end
    }
}

impl Window {
    // Finds the first window that hasn't ended yet (ongoing windows count)
    fn next_window(&self, now: DateTime<Utc>) -> Option<ResolvedWindow> {
        if self.days.is_empty() {
            let (begin, end) = (self.begin.absolute(), self.end.absolute());
            return (now < end).then_some(ResolvedWindow { begin, end });
        }

        let mut begin = self.begin.on_day(&now);
        let mut end = self.end.on_day(&now);
        if end <= begin {
            end += Duration::days(1);
        }

        // start one day back so that a window that wrapped past midnight is still found, then look
        // a full week ahead
        begin -= Duration::days(1);
        end -= Duration::days(1);
        for _ in 0..9 {
            let weekday = begin.weekday().to_string();
            if self.days.iter().any(|d| d.eq_ignore_ascii_case(&weekday)) && now < end {
                return Some(ResolvedWindow { begin, end });
            }
            begin += Duration::days(1);
            end += Duration::days(1);
        }
        None
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyMatch {
    #[serde(default, rename = "globalAccountID", deserialize_with = "deserialize_matcher")]
    pub global_account_id: Option<Regex>,
    #[serde(default, deserialize_with = "deserialize_matcher")]
    pub plan: Option<Regex>,
    #[serde(default, deserialize_with = "deserialize_matcher")]
    pub region: Option<Regex>,
    #[serde(default, deserialize_with = "deserialize_matcher")]
    pub platform_region: Option<Regex>,
}

impl PolicyMatch {
    // Any single populated matcher hitting its (non-empty) runtime label is a match
    fn matches(&self, kyma: &Kyma) -> bool {
        let labels = kyma.runtime_labels();
        [
            (&self.global_account_id, GLOBAL_ACCOUNT_ID_LABEL),
            (&self.plan, PLAN_LABEL),
            (&self.region, REGION_LABEL),
            (&self.platform_region, PLATFORM_REGION_LABEL),
        ]
        .into_iter()
        .any(|(re, label)| match (re, labels.get(label)) {
            (Some(re), Some(value)) => re.is_match(value),
            _ => false,
        })
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct PolicyRule {
    #[serde(rename = "match")]
    pub match_: PolicyMatch,
    #[serde(default)]
    pub windows: Vec<Window>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MaintenancePolicy {
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
    pub default: Window,
}

impl MaintenancePolicy {
    pub fn from_json(raw: &str) -> anyhow::Result<MaintenancePolicy> {
        serde_json::from_str(raw).map_err(|e| MaintenancePolicyError::malformed(&e.to_string()))
    }

    pub fn from_file(path: &str) -> anyhow::Result<MaintenancePolicy> {
        MaintenancePolicy::from_json(&fs::read_to_string(path)?)
    }

    // Only the first matching rule is considered; if it has nothing left, fall back to the default
    pub fn resolve(&self, kyma: &Kyma, now: DateTime<Utc>) -> anyhow::Result<ResolvedWindow> {
        if let Some(rule) = self.rules.iter().find(|r| r.match_.matches(kyma))
            && let Some(window) = rule.windows.iter().find_map(|w| w.next_window(now))
        {
            return Ok(window);
        }

        self.default
            .next_window(now)
            .ok_or_else(|| MaintenancePolicyError::no_window_found(&kyma.namespaced_name()))
    }
}

#[cfg_attr(test, automock)]
pub trait MaintenanceWindow: Send + Sync {
    fn is_required(&self, template: &ModuleTemplate, kyma: &Kyma) -> bool;
    fn is_active(&self, kyma: &Kyma) -> anyhow::Result<bool>;
}

pub struct PolicyMaintenanceWindow {
    policy: Option<MaintenancePolicy>,
    clock: Arc<dyn Clockable + Send + Sync>,
}

impl PolicyMaintenanceWindow {
    pub fn new(policy: Option<MaintenancePolicy>, clock: Arc<dyn Clockable + Send + Sync>) -> PolicyMaintenanceWindow {
        PolicyMaintenanceWindow { policy, clock }
    }
}

impl MaintenanceWindow for PolicyMaintenanceWindow {
    // A window only matters for upgrades of an already-installed module that need downtime
    fn is_required(&self, template: &ModuleTemplate, kyma: &Kyma) -> bool {
        if !template.spec.requires_downtime || kyma.spec.skip_maintenance_windows {
            return false;
        }

        let Some(status) = kyma.status.as_ref() else {
            return false;
        };
        status
            .modules
            .iter()
            .find(|m| m.name == template_module_name(template))
            .is_some_and(|m| m.version.as_deref() != Some(template.spec.version.as_str()))
    }

    fn is_active(&self, kyma: &Kyma) -> anyhow::Result<bool> {
        let Some(policy) = self.policy.as_ref() else {
            return Ok(true);
        };

        let now = self.clock.now();
        let window = policy.resolve(kyma, now)?;
        debug!("resolved maintenance window {} - {} for {}", window.begin, window.end, kyma.namespaced_name());
        Ok(window.contains(now))
    }
}
