mod lookup_test;

use assertables::*;
use lm_api::v1beta2::*;
use lm_core::cache::CachedDescriptorProvider;
use lm_testutils::*;
use rstest::*;

use super::*;
use crate::errors::lookup_error;
use crate::maintenance::MockMaintenanceWindow;

fn no_maintenance() -> Arc<dyn MaintenanceWindow> {
    let mut mw = MockMaintenanceWindow::new();
    mw.expect_is_required().returning(|_, _| false);
    Arc::new(mw)
}

#[fixture]
fn lookup() -> TemplateLookup {
    TemplateLookup::new(Arc::new(CachedDescriptorProvider::new()), no_maintenance())
}

fn installed(kyma: &mut Kyma, module: &str, channel: &str, version: &str) {
    let mut status = ModuleStatus::new(module, State::Ready);
    status.channel = Some(channel.into());
    status.version = Some(version.into());
    status.template = Some(TrackingObject {
        api_version: "operator.kyma-project.io/v1beta2".into(),
        kind: "ModuleTemplate".into(),
        name: format!("{module}-{version}"),
        namespace: TEST_NAMESPACE.into(),
        generation: Some(1),
    });
    kyma.status.get_or_insert_default().modules.push(status);
}

fn err_of(info: &TemplateInfo) -> &LookupError {
    let Err(err) = &info.outcome else { panic!("expected a lookup error") };
    lookup_error(err).unwrap()
}
