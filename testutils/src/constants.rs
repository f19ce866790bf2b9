use lazy_static::lazy_static;
use lm_core::k8s::GVK;

pub const TEST_KYMA_NAME: &str = "test-kyma";
pub const TEST_NAMESPACE: &str = "kcp-system";
pub const TEST_REMOTE_NAMESPACE: &str = "kyma-system";
pub const TEST_MODULE: &str = "template-operator";
pub const TEST_OTHER_MODULE: &str = "keda";
pub const TEST_KYMA_UID: &str = "6e5cd2b4-0000-4000-8000-000000000001";
pub const TEST_GLOBAL_ACCOUNT: &str = "ga-0123";
pub const TEST_SAMPLE_CR_NAME: &str = "sample-yaml";
pub const TEST_DIGEST: &str = "sha256:0a1b2c3d4e5f";
pub const TEST_REGISTRY: &str = "europe-docker.pkg.dev/kyma-project/modules";

lazy_static! {
    // The default CR kind shipped by the template-operator test module
    pub static ref SAMPLE_GVK: GVK = GVK::new("operator.kyma-project.io", "v1alpha1", "Sample");
}
