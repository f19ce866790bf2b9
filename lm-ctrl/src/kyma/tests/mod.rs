
use std::sync::Arc;

use assertables::*;
use clockabilly::Clockable;
use clockabilly::mock::MockUtcClock;
use kube::runtime::controller::Action;
use lm_api::v1beta2::*;
use lm_core::cache::{
    CachedDescriptorProvider,
    CrdCache,
};
use lm_core::client::key_of;
use lm_testutils::*;
use rstest::*;
use serde_json::json;

use super::*;
use crate::context::ReconcileOptions;
use crate::lookup::TemplateLookup;
use crate::maintenance::{
    MaintenanceWindow,
    MockMaintenanceWindow,
};
use crate::remote::{
    LocalClientFactory,
    MockRemoteClientFactory,
    RemoteClientFactory,
};

const START_TS: i64 = 1_750_000_000;

fn no_maintenance() -> Arc<dyn MaintenanceWindow> {
    let mut mw = MockMaintenanceWindow::new();
    mw.expect_is_required().returning(|_, _| false);
    Arc::new(mw)
}

// Hands out the same in-memory runtime cluster for every Kyma
fn remotes_for(remote_fake: &Arc<FakeCluster>) -> Arc<dyn RemoteClientFactory> {
    let remote = RemoteClient::new(remote_fake.clone());
    let mut factory = MockRemoteClientFactory::new();
    factory.expect_client_for().returning(move |_| Ok(remote.clone()));
    factory.expect_evict().returning(|_| ());
    Arc::new(factory)
}

struct Harness {
    kcp_fake: Arc<FakeCluster>,
    remote_fake: Arc<FakeCluster>,
    ctx: KymaContext,
}

impl Harness {
    fn build(kcp_fake: Arc<FakeCluster>, remote_fake: Arc<FakeCluster>, remotes: Arc<dyn RemoteClientFactory>, kcp_mode: bool) -> Harness {
        let clock: Arc<dyn Clockable + Send + Sync> = Arc::new(MockUtcClock::new(START_TS));
        let ctx = KymaContext {
            kcp: ControlPlaneClient::new(kcp_fake.clone()),
            remotes,
            lookup: TemplateLookup::new(Arc::new(CachedDescriptorProvider::new()), no_maintenance()),
            crd_cache: Arc::new(CrdCache::new()),
            clock,
            opts: ReconcileOptions { kcp_mode, ..Default::default() },
        };
        Harness { kcp_fake, remote_fake, ctx }
    }

    // Single-cluster mode: the runtime is the control plane
    fn local() -> Harness {
        let kcp_fake = Arc::new(FakeCluster::new());
        let remotes = Arc::new(LocalClientFactory::new(&ControlPlaneClient::new(kcp_fake.clone())));
        Harness::build(kcp_fake.clone(), kcp_fake, remotes, false)
    }

    fn kcp_mode() -> Harness {
        let kcp_fake = Arc::new(FakeCluster::new());
        let remote_fake = Arc::new(FakeCluster::new());
        kcp_fake.insert(&Kyma::crd());
        kcp_fake.insert(&ModuleTemplate::crd());
        kcp_fake.insert(&ModuleReleaseMeta::crd());
        let remotes = remotes_for(&remote_fake);
        Harness::build(kcp_fake, remote_fake, remotes, true)
    }

    // template-operator: regular -> 1.0.0, fast -> 1.1.0
    fn seed_catalog(&self) {
        self.kcp_fake.insert(&build_release_meta(TEST_MODULE, &[("regular", "1.0.0"), ("fast", "1.1.0")]));
        self.kcp_fake.insert(&build_module_template(TEST_MODULE, "1.0.0"));
        self.kcp_fake.insert(&build_module_template(TEST_MODULE, "1.1.0"));
    }

    // A Kyma past its first two passes (finalizer added, initial state set)
    fn insert_kyma(&self, modules: Vec<Module>) -> Kyma {
        let mut kyma = test_kyma(TEST_KYMA_NAME);
        kyma.metadata.finalizers = Some(vec![KYMA_FINALIZER.into()]);
        kyma.spec.modules = modules;
        kyma.status = Some(KymaStatus { state: Some(State::Processing), ..Default::default() });
        self.kcp_fake.insert(&kyma)
    }

    fn kyma(&self) -> Kyma {
        self.kcp_fake.fetch(Some(TEST_NAMESPACE), TEST_KYMA_NAME).unwrap()
    }

    fn update_kyma(&self, f: impl FnOnce(&mut Kyma)) {
        let mut kyma = self.kyma();
        f(&mut kyma);
        self.kcp_fake.insert(&kyma);
    }

    async fn reconcile(&self) -> Action {
        reconcile_kyma(&self.ctx, &self.kyma()).await.unwrap()
    }

    fn state(&self) -> Option<State> {
        self.kyma().status.and_then(|s| s.state)
    }

    fn module_status(&self, name: &str) -> Option<ModuleStatus> {
        self.kyma().status?.modules.into_iter().find(|m| m.name == name)
    }

    fn manifests(&self) -> Vec<Manifest> {
        self.kcp_fake.all_of()
    }

    fn manifest_for(&self, module: &str) -> Option<Manifest> {
        self.manifests().into_iter().find(|m| m.labels().get(MODULE_NAME_LABEL).map(String::as_str) == Some(module))
    }

    // What the manifest controller would report once the module is installed
    fn set_manifest_state(&self, module: &str, state: State) {
        let manifest = self.manifest_for(module).unwrap();
        self.kcp_fake.set_status(&key_of(&manifest), json!({"state": state}));
    }
}

fn condition(kyma: &Kyma, type_: &str) -> Option<StatusCondition> {
    kyma.status.as_ref()?.conditions.iter().find(|c| c.type_ == type_).cloned()
}
