use std::collections::BTreeMap;

use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use kube::api::DynamicObject;
use lm_api::v1beta2::*;
use lm_core::constants::*;
use lm_core::macros::*;
use rstest::fixture;
use serde_json::json;

use crate::constants::*;

#[fixture]
pub fn test_kyma(#[default(TEST_KYMA_NAME)] name: &str) -> Kyma {
    let mut kyma = Kyma::new(name, KymaSpec { channel: DEFAULT_CHANNEL.into(), ..Default::default() });
    kyma.metadata.namespace = Some(TEST_NAMESPACE.into());
    kyma.metadata.uid = Some(TEST_KYMA_UID.into());
    kyma.metadata.labels = klabel!(
        GLOBAL_ACCOUNT_ID_LABEL => TEST_GLOBAL_ACCOUNT,
        REGION_LABEL => "europe-west1",
        PLAN_LABEL => "gcp",
        SHOOT_NAME_LABEL => "c-1234",
        INSTANCE_ID_LABEL => "instance-1234",
    );
    kyma
}

pub fn test_descriptor(module: &str, version: &str) -> serde_json::Value {
    json!({
        "name": format!("kyma-project.io/module/{module}"),
        "version": version,
        "repositoryContext": {"baseUrl": TEST_REGISTRY, "type": "OCIRegistry"},
        "resources": [
            {
                "name": RAW_MANIFEST_LAYER,
                "version": version,
                "type": "directoryTree",
                "access": {"type": "localBlob", "digest": TEST_DIGEST, "localReference": TEST_DIGEST},
            },
        ],
    })
}

pub fn test_default_cr() -> serde_json::Value {
    json!({
        "apiVersion": "operator.kyma-project.io/v1alpha1",
        "kind": "Sample",
        "metadata": {"name": TEST_SAMPLE_CR_NAME},
        "spec": {"resourceFilePath": "./module-data/yaml"},
    })
}

// A template as published for ModuleReleaseMeta-based resolution: named "<module>-<version>", no
// channel of its own
pub fn build_module_template(module: &str, version: &str) -> ModuleTemplate {
    let mut mt = ModuleTemplate::new(
        &format!("{module}-{version}"),
        ModuleTemplateSpec {
            module_name: module.into(),
            version: version.into(),
            data: Some(test_default_cr()),
            descriptor: Some(test_descriptor(module, version)),
            ..Default::default()
        },
    );
    mt.metadata.namespace = Some(TEST_NAMESPACE.into());
    mt.metadata.labels = klabel!(MODULE_NAME_LABEL => module);
    mt
}

// A legacy template bound directly to a channel
pub fn build_channel_template(module: &str, channel: &str, version: &str) -> ModuleTemplate {
    let mut mt = build_module_template(module, version);
    mt.metadata.name = Some(format!("{module}-{channel}"));
    mt.spec.channel = channel.into();
    mt
}

pub fn build_mandatory_template(module: &str, version: &str) -> ModuleTemplate {
    let mut mt = build_module_template(module, version);
    mt.spec.mandatory = true;
    mt.metadata.labels = klabel!(MODULE_NAME_LABEL => module, MANDATORY_MODULE_LABEL => TRUE_VALUE);
    mt
}

pub fn build_release_meta(module: &str, channels: &[(&str, &str)]) -> ModuleReleaseMeta {
    let mut mrm = ModuleReleaseMeta::new(
        module,
        ModuleReleaseMetaSpec {
            module_name: module.into(),
            ocm_component_name: format!("kyma-project.io/module/{module}"),
            channels: channels
                .iter()
                .map(|(c, v)| ChannelVersionAssignment { channel: c.to_string(), version: v.to_string() })
                .collect(),
            ..Default::default()
        },
    );
    mrm.metadata.namespace = Some(TEST_NAMESPACE.into());
    mrm
}

pub fn build_watcher(name: &str, labels_to_watch: BTreeMap<String, String>) -> Watcher {
    let mut w = Watcher::new(
        name,
        WatcherSpec {
            service_info: ServiceInfo { name: name.into(), port: 8082, namespace: TEST_NAMESPACE.into() },
            labels_to_watch,
            ..Default::default()
        },
    );
    w.metadata.namespace = Some(TEST_NAMESPACE.into());
    w
}

pub fn build_kubeconfig_secret(kyma_name: &str, kubeconfig: &str) -> corev1::Secret {
    corev1::Secret {
        metadata: metav1::ObjectMeta {
            name: Some(kyma_name.into()),
            namespace: Some(TEST_NAMESPACE.into()),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(KUBECONFIG_SECRET_KEY.into(), ByteString(kubeconfig.as_bytes().to_vec()))])),
        ..Default::default()
    }
}

pub fn build_sample_cr(namespace: &str, name: &str) -> DynamicObject {
    DynamicObject::new(name, &SAMPLE_GVK.api_resource())
        .within(namespace)
        .data(json!({"spec": {"resourceFilePath": "./module-data/yaml"}}))
}

// A CRD for the Sample kind, as the module would install it into the runtime cluster
pub fn build_sample_crd() -> DynamicObject {
    DynamicObject::new("samples.operator.kyma-project.io", &CRD_GVK.api_resource()).data(json!({
        "spec": {
            "group": "operator.kyma-project.io",
            "names": {"kind": "Sample", "plural": "samples", "singular": "sample", "listKind": "SampleList"},
            "scope": "Namespaced",
            "versions": [{"name": "v1alpha1", "served": true, "storage": true}],
        },
    }))
}
