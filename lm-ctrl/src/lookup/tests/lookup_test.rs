use super::*;

fn catalog(templates: Vec<ModuleTemplate>, metas: Vec<ModuleReleaseMeta>) -> Catalog {
    Catalog { templates, metas }
}

#[rstest]
fn test_resolve_by_release_meta(lookup: TemplateLookup, mut test_kyma: Kyma) {
    test_kyma.spec.modules = vec![Module::new(TEST_MODULE).with_channel("fast")];
    let cat = catalog(
        vec![build_module_template(TEST_MODULE, "1.0.0"), build_module_template(TEST_MODULE, "1.1.0")],
        vec![build_release_meta(TEST_MODULE, &[("regular", "1.0.0"), ("fast", "1.1.0")])],
    );

    let infos = discover_modules(&test_kyma);
    let info = lookup.resolve(&infos[0], &test_kyma, &cat);
    assert_eq!(info.desired_channel, "fast");
    let resolved = info.outcome.unwrap();
    assert_eq!(resolved.template.name_any(), format!("{TEST_MODULE}-1.1.0"));
    assert_eq!(resolved.version(), "1.1.0");
    assert_some!(resolved.release_meta);
}

#[rstest]
fn test_descriptor_version_wins(lookup: TemplateLookup, mut test_kyma: Kyma) {
    test_kyma.spec.modules = vec![Module::new(TEST_MODULE).with_channel("fast")];
    let mut template = build_module_template(TEST_MODULE, "1.1.0");
    template.spec.descriptor = Some(test_descriptor(TEST_MODULE, "1.1.1"));
    let cat = catalog(vec![template], vec![build_release_meta(TEST_MODULE, &[("fast", "1.1.0")])]);

    let info = lookup.resolve(&discover_modules(&test_kyma)[0], &test_kyma, &cat);
    assert_eq!(info.outcome.unwrap().version(), "1.1.1");
}

#[rstest]
fn test_resolve_uses_kyma_channel(lookup: TemplateLookup, mut test_kyma: Kyma) {
    test_kyma.spec.channel = "fast".into();
    test_kyma.spec.modules = vec![Module::new(TEST_MODULE)];
    let cat = catalog(
        vec![build_module_template(TEST_MODULE, "1.1.0")],
        vec![build_release_meta(TEST_MODULE, &[("fast", "1.1.0")])],
    );
    let info = lookup.resolve(&discover_modules(&test_kyma)[0], &test_kyma, &cat);
    assert_ok!(info.outcome);
}

#[rstest]
fn test_resolve_missing_channel_version(lookup: TemplateLookup, mut test_kyma: Kyma) {
    test_kyma.spec.modules = vec![Module::new(TEST_MODULE).with_channel("experimental")];
    let cat = catalog(
        vec![build_module_template(TEST_MODULE, "1.0.0")],
        vec![build_release_meta(TEST_MODULE, &[("regular", "1.0.0")])],
    );
    let info = lookup.resolve(&discover_modules(&test_kyma)[0], &test_kyma, &cat);
    assert!(matches!(err_of(&info), LookupError::MissingChannelVersion(_)));
}

#[rstest]
fn test_resolve_meta_points_to_missing_template(lookup: TemplateLookup, mut test_kyma: Kyma) {
    test_kyma.spec.modules = vec![Module::new(TEST_MODULE)];
    let cat = catalog(
        vec![build_module_template(TEST_MODULE, "1.0.1")],
        vec![build_release_meta(TEST_MODULE, &[("regular", "1.2.3")])],
    );
    let info = lookup.resolve(&discover_modules(&test_kyma)[0], &test_kyma, &cat);
    assert!(matches!(err_of(&info), LookupError::TemplateNotFound(_)));
}

#[rstest]
fn test_resolve_legacy_channel(lookup: TemplateLookup, mut test_kyma: Kyma) {
    test_kyma.spec.modules = vec![Module::new(TEST_MODULE)];
    let cat = catalog(
        vec![
            build_channel_template(TEST_MODULE, "regular", "1.0.0"),
            build_channel_template(TEST_MODULE, "fast", "1.1.0"),
        ],
        vec![],
    );
    let resolved = lookup.resolve(&discover_modules(&test_kyma)[0], &test_kyma, &cat).outcome.unwrap();
    assert_eq!(resolved.template.name_any(), format!("{TEST_MODULE}-regular"));
    assert_none!(resolved.release_meta);
}

#[rstest]
fn test_resolve_legacy_channel_ambiguous(lookup: TemplateLookup, mut test_kyma: Kyma) {
    test_kyma.spec.modules = vec![Module::new(TEST_MODULE)];
    let mut other = build_channel_template(TEST_MODULE, "regular", "1.0.1");
    other.metadata.name = Some("template-operator-regular-copy".into());
    let cat = catalog(vec![build_channel_template(TEST_MODULE, "regular", "1.0.0"), other], vec![]);

    let info = lookup.resolve(&discover_modules(&test_kyma)[0], &test_kyma, &cat);
    let err = err_of(&info);
    assert!(matches!(err, LookupError::TemplateNotFound(_)));
    assert_contains!(err.to_string(), "template-operator-regular-copy");
}

#[rstest]
fn test_resolve_unknown_module(lookup: TemplateLookup, mut test_kyma: Kyma) {
    test_kyma.spec.modules = vec![Module::new("does-not-exist")];
    let info = lookup.resolve(&discover_modules(&test_kyma)[0], &test_kyma, &Catalog::default());
    assert!(matches!(err_of(&info), LookupError::NotInCatalog(_)));
}

#[rstest]
fn test_resolve_by_version(lookup: TemplateLookup, mut test_kyma: Kyma) {
    test_kyma.spec.modules = vec![Module::new(TEST_MODULE).with_version("1.0.0")];
    let cat = catalog(
        vec![
            build_module_template(TEST_MODULE, "1.0.0"),
            build_module_template(TEST_MODULE, "1.1.0"),
            build_channel_template(TEST_MODULE, "regular", "1.0.0"),
        ],
        vec![],
    );
    let info = lookup.resolve(&discover_modules(&test_kyma)[0], &test_kyma, &cat);
    assert_eq!(info.desired_channel, NONE_CHANNEL);
    assert_eq!(info.outcome.unwrap().template.name_any(), format!("{TEST_MODULE}-1.0.0"));
}

#[rstest]
fn test_resolve_by_version_not_found(lookup: TemplateLookup, mut test_kyma: Kyma) {
    test_kyma.spec.modules = vec![Module::new(TEST_MODULE).with_version("9.9.9")];
    let cat = catalog(vec![build_module_template(TEST_MODULE, "1.0.0")], vec![]);
    let info = lookup.resolve(&discover_modules(&test_kyma)[0], &test_kyma, &cat);
    assert!(matches!(err_of(&info), LookupError::TemplateNotFound(_)));
}

#[rstest]
#[case::beta_meta_plain_kyma(true, false, false)]
#[case::beta_meta_beta_kyma(true, true, true)]
#[case::plain_meta_plain_kyma(false, false, true)]
fn test_meta_visibility(
    lookup: TemplateLookup,
    mut test_kyma: Kyma,
    #[case] beta_meta: bool,
    #[case] beta_kyma: bool,
    #[case] allowed: bool,
) {
    if beta_kyma {
        test_kyma.labels_mut().insert(BETA_LABEL.into(), TRUE_VALUE.into());
    }
    test_kyma.spec.modules = vec![Module::new(TEST_MODULE)];
    let mut meta = build_release_meta(TEST_MODULE, &[("regular", "1.0.0")]);
    meta.spec.beta = beta_meta;
    let cat = catalog(vec![build_module_template(TEST_MODULE, "1.0.0")], vec![meta]);

    let info = lookup.resolve(&discover_modules(&test_kyma)[0], &test_kyma, &cat);
    if allowed {
        assert_ok!(info.outcome);
    } else {
        assert!(matches!(err_of(&info), LookupError::TemplateNotAllowed(_)));
    }
}

#[rstest]
fn test_legacy_internal_template_not_allowed(lookup: TemplateLookup, mut test_kyma: Kyma) {
    test_kyma.spec.modules = vec![Module::new(TEST_MODULE)];
    let mut template = build_channel_template(TEST_MODULE, "regular", "1.0.0");
    template.labels_mut().insert(INTERNAL_LABEL.into(), TRUE_VALUE.into());
    let cat = catalog(vec![template], vec![]);

    let info = lookup.resolve(&discover_modules(&test_kyma)[0], &test_kyma, &cat);
    assert!(matches!(err_of(&info), LookupError::TemplateNotAllowed(_)));
}

#[rstest]
fn test_mandatory_template_not_selectable(lookup: TemplateLookup, mut test_kyma: Kyma) {
    test_kyma.spec.modules = vec![Module::new(TEST_MODULE).with_version("1.0.0")];
    let cat = catalog(vec![build_mandatory_template(TEST_MODULE, "1.0.0")], vec![]);
    let info = lookup.resolve(&discover_modules(&test_kyma)[0], &test_kyma, &cat);
    assert!(matches!(err_of(&info), LookupError::MandatoryTemplate(_)));
}

#[rstest]
fn test_channel_skew_is_rejected(lookup: TemplateLookup, mut test_kyma: Kyma) {
    test_kyma.spec.modules = vec![Module::new(TEST_MODULE).with_channel("regular")];
    installed(&mut test_kyma, TEST_MODULE, "fast", "1.1.0");
    let cat = catalog(
        vec![build_module_template(TEST_MODULE, "1.0.0"), build_module_template(TEST_MODULE, "1.1.0")],
        vec![build_release_meta(TEST_MODULE, &[("regular", "1.0.0"), ("fast", "1.1.0")])],
    );

    let info = lookup.resolve(&discover_modules(&test_kyma)[0], &test_kyma, &cat);
    let err = err_of(&info);
    assert!(matches!(err, LookupError::TemplateUpdateNotAllowed(_)));
    assert_contains!(
        err.to_string(),
        "ignore channel skew (from fast to regular), as a higher version (1.1.0) of the module was previously installed"
    );
}

#[rstest]
fn test_channel_upgrade_is_allowed(lookup: TemplateLookup, mut test_kyma: Kyma) {
    test_kyma.spec.modules = vec![Module::new(TEST_MODULE).with_channel("fast")];
    installed(&mut test_kyma, TEST_MODULE, "regular", "1.0.0");
    let cat = catalog(
        vec![build_module_template(TEST_MODULE, "1.1.0")],
        vec![build_release_meta(TEST_MODULE, &[("regular", "1.0.0"), ("fast", "1.1.0")])],
    );
    assert_ok!(lookup.resolve(&discover_modules(&test_kyma)[0], &test_kyma, &cat).outcome);
}

#[rstest]
#[case::inactive(Ok(false), true)]
#[case::unknown(Err(()), false)]
fn test_maintenance_window_gating(mut test_kyma: Kyma, #[case] active: Result<bool, ()>, #[case] waiting: bool) {
    let mut mw = MockMaintenanceWindow::new();
    mw.expect_is_required().returning(|_, _| true);
    mw.expect_is_active()
        .returning(move |_| active.map_err(|_| anyhow::anyhow!("no window found")));
    let lookup = TemplateLookup::new(Arc::new(CachedDescriptorProvider::new()), Arc::new(mw));

    test_kyma.spec.modules = vec![Module::new(TEST_MODULE)];
    let cat = catalog(
        vec![build_module_template(TEST_MODULE, "1.1.0")],
        vec![build_release_meta(TEST_MODULE, &[("regular", "1.1.0")])],
    );
    let info = lookup.resolve(&discover_modules(&test_kyma)[0], &test_kyma, &cat);
    if waiting {
        assert!(matches!(err_of(&info), LookupError::WaitingForMaintenanceWindow(_)));
    } else {
        assert!(matches!(err_of(&info), LookupError::MaintenanceWindowUnknown(_)));
    }
}

#[rstest]
fn test_missing_descriptor(lookup: TemplateLookup, mut test_kyma: Kyma) {
    test_kyma.spec.modules = vec![Module::new(TEST_MODULE)];
    let mut template = build_module_template(TEST_MODULE, "1.0.0");
    template.spec.descriptor = None;
    let cat = catalog(vec![template], vec![build_release_meta(TEST_MODULE, &[("regular", "1.0.0")])]);
    let info = lookup.resolve(&discover_modules(&test_kyma)[0], &test_kyma, &cat);
    assert!(matches!(err_of(&info), LookupError::Descriptor(_)));
}

#[rstest]
fn test_resolve_mandatory_picks_highest_version(lookup: TemplateLookup) {
    let cat = catalog(
        vec![
            build_mandatory_template(TEST_OTHER_MODULE, "1.2.0"),
            build_mandatory_template(TEST_OTHER_MODULE, "1.10.0"),
            build_module_template(TEST_MODULE, "1.0.0"),
        ],
        vec![],
    );
    let mandatory = lookup.resolve_mandatory(&cat);
    assert_len_eq_x!(&mandatory, 1);
    let (name, outcome) = &mandatory[0];
    assert_eq!(name, TEST_OTHER_MODULE);
    assert_eq!(outcome.as_ref().unwrap().version(), "1.10.0");
}
