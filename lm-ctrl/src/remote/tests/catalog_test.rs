use super::*;

fn catalog() -> Catalog {
    let mut beta_meta = build_release_meta("beta-module", &[("regular", "0.1.0")]);
    beta_meta.spec.beta = true;
    Catalog {
        templates: vec![
            build_module_template(TEST_MODULE, "1.0.0"),
            build_module_template(TEST_MODULE, "1.1.0"),
            build_channel_template("legacy-module", "regular", "2.0.0"),
            build_mandatory_template(TEST_OTHER_MODULE, "1.0.0"),
            build_module_template("beta-module", "0.1.0"),
        ],
        metas: vec![build_release_meta(TEST_MODULE, &[("regular", "1.0.0"), ("fast", "1.1.0")]), beta_meta],
    }
}

#[rstest]
#[tokio::test]
async fn test_sync_catalog(clusters: Clusters, test_kyma: Kyma) {
    let cat = catalog();
    for _ in 0..2 {
        sync_catalog(&clusters.remote, &test_kyma, &cat, TEST_REMOTE_NAMESPACE).await.unwrap();
    }

    let mut names: Vec<_> = clusters.remote_fake.all_of::<ModuleTemplate>().iter().map(|t| t.name_any()).collect();
    names.sort();
    assert_eq!(names, vec!["template-operator-1.0.0", "template-operator-1.1.0"]);

    let metas = clusters.remote_fake.all_of::<ModuleReleaseMeta>();
    assert_len_eq_x!(&metas, 1);
    assert_eq!(metas[0].namespace().as_deref(), Some(TEST_REMOTE_NAMESPACE));
    assert_eq!(metas[0].labels().get(MANAGED_BY_LABEL).unwrap(), MANAGED_BY_LABEL_VALUE);
}

#[rstest]
#[tokio::test]
async fn test_sync_catalog_beta_kyma(clusters: Clusters, mut test_kyma: Kyma) {
    test_kyma.labels_mut().insert(BETA_LABEL.into(), TRUE_VALUE.into());
    sync_catalog(&clusters.remote, &test_kyma, &catalog(), TEST_REMOTE_NAMESPACE).await.unwrap();
    assert_len_eq_x!(clusters.remote_fake.all_of::<ModuleTemplate>(), 3);
    assert_len_eq_x!(clusters.remote_fake.all_of::<ModuleReleaseMeta>(), 2);
}

#[rstest]
#[tokio::test]
async fn test_sync_catalog_removes_stale(clusters: Clusters, test_kyma: Kyma) {
    let mut cat = catalog();
    sync_catalog(&clusters.remote, &test_kyma, &cat, TEST_REMOTE_NAMESPACE).await.unwrap();

    // dropping the meta turns the module's templates back into legacy ones
    cat.metas.retain(|m| m.name_any() != TEST_MODULE);
    let mut user_template = build_module_template("user-module", "1.0.0");
    user_template.metadata.namespace = Some(TEST_REMOTE_NAMESPACE.into());
    clusters.remote_fake.insert(&user_template);

    sync_catalog(&clusters.remote, &test_kyma, &cat, TEST_REMOTE_NAMESPACE).await.unwrap();
    let remaining = clusters.remote_fake.all_of::<ModuleTemplate>();
    assert_len_eq_x!(&remaining, 1);
    assert_eq!(remaining[0].name_any(), "user-module-1.0.0");
    assert_is_empty!(clusters.remote_fake.all_of::<ModuleReleaseMeta>());
}

#[rstest]
#[tokio::test]
async fn test_delete_catalog(clusters: Clusters, test_kyma: Kyma) {
    sync_catalog(&clusters.remote, &test_kyma, &catalog(), TEST_REMOTE_NAMESPACE).await.unwrap();
    delete_catalog(&clusters.remote, TEST_REMOTE_NAMESPACE).await.unwrap();
    assert_is_empty!(clusters.remote_fake.all_of::<ModuleTemplate>());
    assert_is_empty!(clusters.remote_fake.all_of::<ModuleReleaseMeta>());
}
