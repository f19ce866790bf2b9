use std::collections::BTreeMap;

use kube::ResourceExt;
use lm_api::v1beta2::Kyma;

use super::KubeResourceExt;
use crate::constants::*;

// Convenience accessors for the labels that the provisioner and operators set on a Kyma
pub trait KymaExt {
    fn is_beta(&self) -> bool;
    fn is_internal(&self) -> bool;
    fn skip_reconciliation(&self) -> bool;
    fn sync_disabled(&self) -> bool;
    fn desired_channel(&self, module_channel: Option<&str>) -> String;
    fn runtime_labels(&self) -> BTreeMap<&'static str, String>;
}

impl KymaExt for Kyma {
    fn is_beta(&self) -> bool {
        self.label_is_true(BETA_LABEL)
    }

    fn is_internal(&self) -> bool {
        self.label_is_true(INTERNAL_LABEL)
    }

    fn skip_reconciliation(&self) -> bool {
        self.label_is_true(SKIP_RECONCILIATION_LABEL)
    }

    fn sync_disabled(&self) -> bool {
        self.labels().get(SYNC_LABEL).is_some_and(|v| v.eq_ignore_ascii_case(FALSE_VALUE))
    }

    // The module's own channel wins, then the Kyma-wide channel, then the global default
    fn desired_channel(&self, module_channel: Option<&str>) -> String {
        match module_channel {
            Some(c) if !c.is_empty() => c.into(),
            _ if !self.spec.channel.is_empty() => self.spec.channel.clone(),
            _ => DEFAULT_CHANNEL.into(),
        }
    }

    // Only non-empty values are returned
    fn runtime_labels(&self) -> BTreeMap<&'static str, String> {
        [GLOBAL_ACCOUNT_ID_LABEL, REGION_LABEL, PLAN_LABEL, PLATFORM_REGION_LABEL, SHOOT_NAME_LABEL, INSTANCE_ID_LABEL]
            .into_iter()
            .filter_map(|k| self.labels().get(k).filter(|v| !v.is_empty()).map(|v| (k, v.clone())))
            .collect()
    }
}
