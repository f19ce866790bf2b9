use assertables::*;

use super::*;

#[rstest]
fn test_build_owner_reference() {
    let mut kyma = Kyma::new("test-kyma", Default::default());
    assert_none!(build_owner_reference(&kyma));

    kyma.metadata.uid = Some("abcd".into());
    let oref = build_owner_reference(&kyma).unwrap();
    assert_eq!(oref.kind, "Kyma");
    assert_eq!(oref.api_version, "operator.kyma-project.io/v1beta2");
    assert_eq!(oref.uid, "abcd");
    assert_eq!(oref.controller, Some(true));
}

#[rstest]
fn test_sanitize_for_copy() {
    let mut meta = metav1::ObjectMeta {
        name: Some("foo".into()),
        namespace: Some("kcp-system".into()),
        resource_version: Some("1234".into()),
        uid: Some("abcd".into()),
        generation: Some(3),
        finalizers: Some(vec![KYMA_FINALIZER.into()]),
        labels: klabel!(MODULE_NAME_LABEL => "foo"),
        annotations: klabel!(
            "kubectl.kubernetes.io/last-applied-configuration" => "{}",
            FQDN_ANNOTATION => "kyma-project.io/module/foo",
        ),
        ..Default::default()
    };
    sanitize_for_copy(&mut meta);

    assert_eq!(meta.name, Some("foo".into()));
    assert_none!(meta.resource_version);
    assert_none!(meta.uid);
    assert_none!(meta.generation);
    assert_none!(meta.finalizers);
    assert_eq!(meta.labels, klabel!(MODULE_NAME_LABEL => "foo"));
    assert_eq!(meta.annotations, klabel!(FQDN_ANNOTATION => "kyma-project.io/module/foo"));
}

#[rstest]
fn test_finalizers() {
    let mut meta = metav1::ObjectMeta::default();
    assert!(add_finalizer(&mut meta, KYMA_FINALIZER));
    assert!(!add_finalizer(&mut meta, KYMA_FINALIZER));
    assert!(add_finalizer(&mut meta, PURGE_FINALIZER));
    assert_eq!(meta.finalizers.as_ref().unwrap().len(), 2);

    assert!(remove_finalizer(&mut meta, KYMA_FINALIZER));
    assert!(!remove_finalizer(&mut meta, KYMA_FINALIZER));
    assert_eq!(meta.finalizers, Some(vec![PURGE_FINALIZER.into()]));
}

#[rstest]
#[case::empty("", true)]
#[case::single("operator.kyma-project.io/watched-by=lifecycle-manager", true)]
#[case::double_equals("operator.kyma-project.io/watched-by==lifecycle-manager", true)]
#[case::multiple("operator.kyma-project.io/watched-by=lifecycle-manager,operator.kyma-project.io/managed-by=lifecycle-manager", true)]
#[case::wrong_value("operator.kyma-project.io/watched-by=someone-else", false)]
#[case::existence("operator.kyma-project.io/watched-by", true)]
#[case::missing_key("operator.kyma-project.io/kyma-name", false)]
fn test_matches_label_selector(#[case] selector: &str, #[case] expected: bool) {
    let labels = klabel!(
        WATCHED_BY_LABEL => WATCHED_BY_LABEL_VALUE,
        MANAGED_BY_LABEL => MANAGED_BY_LABEL_VALUE,
    )
    .unwrap();
    assert_eq!(matches_label_selector(&labels, selector), expected);
}

#[rstest]
fn test_kube_resource_ext() {
    let mut kyma = Kyma::new("test-kyma", Default::default());
    kyma.metadata.namespace = Some("kcp-system".into());
    kyma.metadata.labels = klabel!(SKIP_RECONCILIATION_LABEL => "TRUE", BETA_LABEL => "false");
    kyma.metadata.finalizers = Some(vec![KYMA_FINALIZER.into()]);

    assert_eq!(kyma.namespaced_name(), "kcp-system/test-kyma");
    assert!(kyma.has_finalizer(KYMA_FINALIZER));
    assert!(!kyma.has_finalizer(PURGE_FINALIZER));
    assert!(!kyma.is_being_deleted());
    assert!(kyma.label_is_true(SKIP_RECONCILIATION_LABEL));
    assert!(!kyma.label_is_true(BETA_LABEL));
    assert!(!kyma.label_is_true(INTERNAL_LABEL));
}
