use std::collections::BTreeMap;

use lm_api::v1beta2::{
    CustomResourcePolicy,
    ImageSpec,
    InstallInfo,
    Manifest,
    ManifestSpec,
    RAW_MANIFEST_LAYER,
    RefType,
};
use lm_core::cache::Descriptor;
use lm_core::jsonutils::short_fingerprint;
use lm_core::k8s::build_owner_reference;
use lm_core::prelude::*;
use serde_json as json;

use crate::errors::{
    KymaControllerError,
    LookupError,
};
use crate::lookup::{
    ResolvedTemplate,
    is_mandatory,
};

#[derive(Clone, Debug)]
pub struct SynthesisOptions {
    // Set in KCP mode, where the module is installed into a different cluster than this one
    pub remote: bool,
    pub remote_sync_namespace: String,
}

// Deterministic, so that looking up an existing Manifest never needs a list call
pub fn manifest_name(kyma_name: &str, module_name: &str, descriptor: &Descriptor) -> String {
    format!("{kyma_name}-{module_name}-{}", short_fingerprint(descriptor.short_name()))
}

fn install_source(descriptor: &Descriptor) -> anyhow::Result<ImageSpec> {
    let Some(layer) = descriptor.resource(RAW_MANIFEST_LAYER) else {
        return Err(LookupError::descriptor(&format!("{}: no {RAW_MANIFEST_LAYER} resource", descriptor.name)));
    };
    let Some(digest) = layer.access.digest.as_ref().or(layer.access.local_reference.as_ref()) else {
        return Err(LookupError::descriptor(&format!("{}: {RAW_MANIFEST_LAYER} has no digest", descriptor.name)));
    };

    Ok(ImageSpec {
        name: descriptor.name.clone(),
        repo: descriptor.base_url().into(),
        ref_: digest.clone(),
        type_: RefType::OciRef,
    })
}

// The module's default CR, copied out of the template.  Unknown fields are carried through
// untouched; only the name and namespace are filled in if the template left them blank.
fn default_resource(data: &json::Value, name: &str, namespace: &str) -> anyhow::Result<json::Value> {
    let mut resource = data.clone();
    let Some(metadata) = resource
        .as_object_mut()
        .map(|obj| obj.entry("metadata").or_insert_with(|| json::json!({})))
        .and_then(json::Value::as_object_mut)
    else {
        return Err(KymaControllerError::malformed_default_resource(name));
    };

    if metadata.get("name").and_then(json::Value::as_str).is_none_or(str::is_empty) {
        metadata.insert("name".into(), name.into());
    }
    if metadata.get("namespace").and_then(json::Value::as_str).is_none_or(str::is_empty) {
        metadata.insert("namespace".into(), namespace.into());
    }
    Ok(resource)
}

pub fn build_manifest(
    kyma: &Kyma,
    module: &Module,
    channel: &str,
    resolved: &ResolvedTemplate,
    opts: &SynthesisOptions,
) -> anyhow::Result<Manifest> {
    let template = &resolved.template;
    let descriptor = resolved.descriptor.as_ref();
    let mandatory = is_mandatory(template);
    let name = manifest_name(&kyma.name_any(), &module.name, descriptor);

    let policy = if mandatory { CustomResourcePolicy::CreateAndDelete } else { module.custom_resource_policy };
    let resource = match (&template.spec.data, policy) {
        (Some(data), CustomResourcePolicy::CreateAndDelete) if !data.is_null() => {
            Some(default_resource(data, &name, &opts.remote_sync_namespace)?)
        },
        _ => None,
    };

    let mut labels = BTreeMap::from([
        (KYMA_NAME_LABEL.to_string(), kyma.name_any()),
        (MODULE_NAME_LABEL.to_string(), module.name.clone()),
        (CHANNEL_LABEL.to_string(), channel.to_string()),
        (MANAGED_BY_LABEL.to_string(), MANAGED_BY_LABEL_VALUE.to_string()),
    ]);
    if mandatory {
        labels.insert(IS_MANDATORY_MODULE_LABEL.into(), TRUE_VALUE.into());
    }

    let mut annotations = BTreeMap::from([(FQDN_ANNOTATION.to_string(), descriptor.name.clone())]);
    if let (Some(checks), Some(_)) = (&template.spec.custom_state_check, &resource) {
        annotations.insert(CUSTOM_STATE_CHECK_ANNOTATION.into(), json::to_string(checks)?);
    }
    if !module.managed {
        annotations.insert(UNMANAGED_ANNOTATION.into(), TRUE_VALUE.into());
    }

    let mut manifest = Manifest::new(
        &name,
        ManifestSpec {
            remote: opts.remote,
            version: resolved.version().into(),
            config: None,
            install: InstallInfo { name: RAW_MANIFEST_LAYER.into(), source: install_source(descriptor)? },
            resource,
            custom_resource_policy: policy,
        },
    );
    manifest.metadata.namespace = kyma.namespace();
    manifest.metadata.labels = Some(labels);
    manifest.metadata.annotations = Some(annotations);
    manifest.metadata.owner_references = build_owner_reference(kyma).map(|o| vec![o]);
    Ok(manifest)
}

// The default CR's identity, as seen from the runtime cluster
pub fn default_resource_key(manifest: &Manifest) -> Option<(String, String, String, Option<String>)> {
    let resource = manifest.spec.resource.as_ref()?;
    let api_version = resource.get("apiVersion")?.as_str()?;
    let kind = resource.get("kind")?.as_str()?;
    let name = resource.pointer("/metadata/name")?.as_str()?;
    let namespace = resource.pointer("/metadata/namespace").and_then(json::Value::as_str).map(String::from);
    Some((api_version.into(), kind.into(), name.into(), namespace))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assertables::*;
    use lm_api::v1beta2::CustomStateCheck;
    use lm_core::cache::{
        CachedDescriptorProvider,
        DescriptorProvider,
    };
    use lm_testutils::*;
    use rstest::*;

    use super::*;

    fn resolved(template: ModuleTemplate) -> ResolvedTemplate {
        let descriptor = CachedDescriptorProvider::new().get_descriptor(&template).unwrap();
        ResolvedTemplate { template, descriptor, release_meta: None }
    }

    #[fixture]
    fn opts() -> SynthesisOptions {
        SynthesisOptions { remote: true, remote_sync_namespace: TEST_REMOTE_NAMESPACE.into() }
    }

    #[rstest]
    fn test_build_manifest(test_kyma: Kyma, opts: SynthesisOptions) {
        let module = Module::new(TEST_MODULE).with_channel("regular");
        let rt = resolved(build_module_template(TEST_MODULE, "1.0.0"));
        let manifest = build_manifest(&test_kyma, &module, "regular", &rt, &opts).unwrap();

        assert_eq!(manifest.name_any(), manifest_name(TEST_KYMA_NAME, TEST_MODULE, &rt.descriptor));
        assert_starts_with!(manifest.name_any(), "test-kyma-template-operator-");
        assert_eq!(manifest.namespace().as_deref(), Some(TEST_NAMESPACE));
        assert!(manifest.spec.remote);
        assert_eq!(manifest.spec.version, "1.0.0");
        assert_eq!(manifest.spec.install.source.ref_, TEST_DIGEST);
        assert_eq!(manifest.spec.install.source.repo, TEST_REGISTRY);
        assert_eq!(manifest.spec.install.source.name, "kyma-project.io/module/template-operator");
        assert_eq!(manifest.labels().get(CHANNEL_LABEL).unwrap(), "regular");
        assert_eq!(manifest.labels().get(KYMA_NAME_LABEL).unwrap(), TEST_KYMA_NAME);
        assert_eq!(manifest.owner_references()[0].uid, TEST_KYMA_UID);

        let resource = manifest.spec.resource.as_ref().unwrap();
        assert_eq!(resource.pointer("/metadata/name").unwrap(), TEST_SAMPLE_CR_NAME);
        assert_eq!(resource.pointer("/metadata/namespace").unwrap(), TEST_REMOTE_NAMESPACE);
        assert_eq!(resource.pointer("/spec/resourceFilePath").unwrap(), "./module-data/yaml");
    }

    #[rstest]
    fn test_build_manifest_local_mode(test_kyma: Kyma) {
        let opts = SynthesisOptions { remote: false, remote_sync_namespace: TEST_REMOTE_NAMESPACE.into() };
        let rt = resolved(build_module_template(TEST_MODULE, "1.0.0"));
        let manifest = build_manifest(&test_kyma, &Module::new(TEST_MODULE), "regular", &rt, &opts).unwrap();
        assert!(!manifest.spec.remote);
    }

    #[rstest]
    fn test_build_manifest_no_default_cr(test_kyma: Kyma, opts: SynthesisOptions) {
        let mut template = build_module_template(TEST_MODULE, "1.0.0");
        template.spec.data = None;
        template.spec.custom_state_check =
            Some(vec![CustomStateCheck { json_path: "status.health".into(), value: "green".into(), mapped_state: State::Ready }]);
        let manifest = build_manifest(&test_kyma, &Module::new(TEST_MODULE), "regular", &resolved(template), &opts).unwrap();

        assert_none!(manifest.spec.resource);
        assert!(!manifest.annotations().contains_key(CUSTOM_STATE_CHECK_ANNOTATION));
        assert_none!(default_resource_key(&manifest));
    }

    #[rstest]
    fn test_build_manifest_ignore_policy(test_kyma: Kyma, opts: SynthesisOptions) {
        let mut module = Module::new(TEST_MODULE);
        module.custom_resource_policy = CustomResourcePolicy::Ignore;
        let rt = resolved(build_module_template(TEST_MODULE, "1.0.0"));
        let manifest = build_manifest(&test_kyma, &module, "regular", &rt, &opts).unwrap();

        assert_none!(manifest.spec.resource);
        assert_eq!(manifest.spec.custom_resource_policy, CustomResourcePolicy::Ignore);
    }

    #[rstest]
    fn test_build_manifest_default_cr_without_name(test_kyma: Kyma, opts: SynthesisOptions) {
        let mut template = build_module_template(TEST_MODULE, "1.0.0");
        template.spec.data = Some(serde_json::json!({
            "apiVersion": "operator.kyma-project.io/v1alpha1",
            "kind": "Sample",
            "spec": {"extra": {"unknown": [1, 2, 3]}},
        }));
        let manifest = build_manifest(&test_kyma, &Module::new(TEST_MODULE), "regular", &resolved(template), &opts).unwrap();

        let (api_version, kind, name, ns) = default_resource_key(&manifest).unwrap();
        assert_eq!(api_version, "operator.kyma-project.io/v1alpha1");
        assert_eq!(kind, "Sample");
        assert_eq!(name, manifest.name_any());
        assert_eq!(ns.as_deref(), Some(TEST_REMOTE_NAMESPACE));
        assert_eq!(manifest.spec.resource.unwrap().pointer("/spec/extra/unknown/2").unwrap(), 3);
    }

    #[rstest]
    fn test_build_manifest_mandatory(test_kyma: Kyma, opts: SynthesisOptions) {
        let rt = resolved(build_mandatory_template(TEST_OTHER_MODULE, "1.0.0"));
        let mut module = Module::new(TEST_OTHER_MODULE);
        module.custom_resource_policy = CustomResourcePolicy::Ignore;
        let manifest = build_manifest(&test_kyma, &module, "regular", &rt, &opts).unwrap();

        assert_eq!(manifest.labels().get(IS_MANDATORY_MODULE_LABEL).unwrap(), TRUE_VALUE);
        assert_eq!(manifest.spec.custom_resource_policy, CustomResourcePolicy::CreateAndDelete);
        assert_some!(manifest.spec.resource);
    }

    #[rstest]
    fn test_build_manifest_missing_layer(test_kyma: Kyma, opts: SynthesisOptions) {
        let mut rt = resolved(build_module_template(TEST_MODULE, "1.0.0"));
        let mut desc = (*rt.descriptor).clone();
        desc.resources.clear();
        rt.descriptor = Arc::new(desc);

        let err = build_manifest(&test_kyma, &Module::new(TEST_MODULE), "regular", &rt, &opts).unwrap_err();
        assert!(matches!(err.downcast_ref::<LookupError>(), Some(LookupError::Descriptor(_))));
    }

    #[rstest]
    fn test_custom_state_check_annotation(test_kyma: Kyma, opts: SynthesisOptions) {
        let mut template = build_module_template(TEST_MODULE, "1.0.0");
        template.spec.custom_state_check =
            Some(vec![CustomStateCheck { json_path: "status.health".into(), value: "green".into(), mapped_state: State::Ready }]);
        let manifest = build_manifest(&test_kyma, &Module::new(TEST_MODULE), "regular", &resolved(template), &opts).unwrap();
        assert_contains!(manifest.annotations().get(CUSTOM_STATE_CHECK_ANNOTATION).unwrap(), "status.health");
    }
}
