use lazy_static::lazy_static;

use crate::k8s::GVK;

// Labels and annotations owned by lifecycle-manager
pub const KYMA_NAME_LABEL: &str = "operator.kyma-project.io/kyma-name";
pub const MODULE_NAME_LABEL: &str = "operator.kyma-project.io/module-name";
pub const CHANNEL_LABEL: &str = "operator.kyma-project.io/channel";
pub const MANAGED_BY_LABEL: &str = "operator.kyma-project.io/managed-by";
pub const BETA_LABEL: &str = "operator.kyma-project.io/beta";
pub const INTERNAL_LABEL: &str = "operator.kyma-project.io/internal";
pub const MANDATORY_MODULE_LABEL: &str = "operator.kyma-project.io/mandatory-module";
pub const IS_MANDATORY_MODULE_LABEL: &str = "operator.kyma-project.io/is-mandatory-module";
pub const SYNC_LABEL: &str = "operator.kyma-project.io/sync";
pub const SKIP_RECONCILIATION_LABEL: &str = "operator.kyma-project.io/skip-reconciliation";
pub const WATCHED_BY_LABEL: &str = "operator.kyma-project.io/watched-by";
pub const OWNED_BY_ANNOTATION: &str = "operator.kyma-project.io/owned-by";
pub const FQDN_ANNOTATION: &str = "operator.kyma-project.io/fqdn";
pub const CUSTOM_STATE_CHECK_ANNOTATION: &str = "operator.kyma-project.io/custom-state-check";
pub const UNMANAGED_ANNOTATION: &str = "operator.kyma-project.io/is-unmanaged";

pub const MANAGED_BY_LABEL_VALUE: &str = "lifecycle-manager";
pub const WATCHED_BY_LABEL_VALUE: &str = "lifecycle-manager";
pub const TRUE_VALUE: &str = "true";
pub const FALSE_VALUE: &str = "false";

// Runtime identity labels, set by the provisioner on the control-plane Kyma
pub const GLOBAL_ACCOUNT_ID_LABEL: &str = "kyma-project.io/global-account-id";
pub const REGION_LABEL: &str = "kyma-project.io/region";
pub const PLAN_LABEL: &str = "kyma-project.io/broker-plan-name";
pub const PLATFORM_REGION_LABEL: &str = "kyma-project.io/platform-region";
pub const SHOOT_NAME_LABEL: &str = "kyma-project.io/shoot-name";
pub const INSTANCE_ID_LABEL: &str = "kyma-project.io/instance-id";

// Finalizers
pub const KYMA_FINALIZER: &str = "operator.kyma-project.io/Kyma";
pub const PURGE_FINALIZER: &str = "operator.kyma-project.io/purge-finalizer";

// Field managers
pub const FIELD_MANAGER: &str = "lifecycle-manager";
pub const LEGACY_FIELD_MANAGER: &str = "lifecycle-manager-legacy";
pub const CATALOG_SYNC_FIELD_MANAGER: &str = "catalog-sync";

// Condition types
pub const MODULES_CONDITION: &str = "Modules";
pub const MODULE_CATALOG_CONDITION: &str = "ModuleCatalog";

// CRD generation handshake annotations look like "kyma-kcp-crd-generation"
pub const KCP_CRD_GENERATION_SUFFIX: &str = "kcp-crd-generation";
pub const SKR_CRD_GENERATION_SUFFIX: &str = "skr-crd-generation";

// Defaults
pub const DEFAULT_CHANNEL: &str = "regular";
pub const NONE_CHANNEL: &str = "none";
pub const DEFAULT_REMOTE_SYNC_NAMESPACE: &str = "kyma-system";
pub const KUBECONFIG_SECRET_KEY: &str = "config";

// Timing
pub const REQUEUE_SUCCESS_SECONDS: u64 = 30;
pub const REQUEUE_BUSY_SECONDS: u64 = 5;
pub const REQUEUE_WARNING_SECONDS: u64 = 30;
pub const REQUEUE_ERROR_SECONDS: u64 = 2;

// Kinds
pub const CRD_KIND: &str = "CustomResourceDefinition";
pub const SECRET_KIND: &str = "Secret";

lazy_static! {
    pub static ref KYMA_GVK: GVK = GVK::new(lm_api::API_GROUP, lm_api::API_VERSION, "Kyma");
    pub static ref MANIFEST_GVK: GVK = GVK::new(lm_api::API_GROUP, lm_api::API_VERSION, "Manifest");
    pub static ref MODULE_TEMPLATE_GVK: GVK = GVK::new(lm_api::API_GROUP, lm_api::API_VERSION, "ModuleTemplate");
    pub static ref MODULE_RELEASE_META_GVK: GVK =
        GVK::new(lm_api::API_GROUP, lm_api::API_VERSION, "ModuleReleaseMeta");
    pub static ref WATCHER_GVK: GVK = GVK::new(lm_api::API_GROUP, lm_api::API_VERSION, "Watcher");
    pub static ref CRD_GVK: GVK = GVK::new("apiextensions.k8s.io", "v1", CRD_KIND);
    pub static ref SECRET_GVK: GVK = GVK::new("", "v1", SECRET_KIND);
}
