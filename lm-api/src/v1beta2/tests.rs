use kube::CustomResourceExt;
use rstest::*;
use serde_json::json;

use super::*;

#[rstest]
fn test_module_defaults() {
    let module: Module = serde_json::from_value(json!({"name": "skr-module"})).unwrap();
    assert!(module.managed);
    assert_eq!(module.custom_resource_policy, CustomResourcePolicy::CreateAndDelete);
    assert_eq!(module.channel, None);
}

#[rstest]
fn test_image_spec_wire_names() {
    let spec = ImageSpec {
        name: "kyma-project.io/module/skr-module".into(),
        repo: "registry.example.com/component-descriptors".into(),
        ref_: "sha256:abc".into(),
        type_: RefType::OciRef,
    };
    let v = serde_json::to_value(&spec).unwrap();
    assert_eq!(v["ref"], "sha256:abc");
    assert_eq!(v["type"], "oci-ref");
}

#[rstest]
fn test_release_meta_channel_lookup() {
    let spec = ModuleReleaseMetaSpec {
        module_name: "skr-module".into(),
        channels: vec![
            ChannelVersionAssignment { channel: "regular".into(), version: "1.0.1".into() },
            ChannelVersionAssignment { channel: "fast".into(), version: "1.2.0".into() },
        ],
        ..Default::default()
    };
    assert_eq!(spec.version_for_channel("fast"), Some("1.2.0"));
    assert_eq!(spec.version_for_channel("experimental"), None);
}

#[rstest]
fn test_opaque_fields_preserve_unknown() {
    let crd = serde_json::to_value(Manifest::crd()).unwrap();
    let resource = &crd["spec"]["versions"][0]["schema"]["openAPIV3Schema"]["properties"]["spec"]["properties"]["resource"];
    assert_eq!(resource["x-kubernetes-preserve-unknown-fields"], true);
}
