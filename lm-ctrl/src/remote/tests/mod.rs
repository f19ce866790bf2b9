mod catalog_test;

use std::sync::Arc;

use assertables::*;
use lm_api::v1beta2::*;
use lm_testutils::*;
use rstest::*;

use super::*;
use crate::lookup::Catalog;

struct Clusters {
    kcp_fake: Arc<FakeCluster>,
    remote_fake: Arc<FakeCluster>,
    kcp: ControlPlaneClient,
    remote: RemoteClient,
}

#[fixture]
fn clusters() -> Clusters {
    let kcp_fake = Arc::new(FakeCluster::new());
    let remote_fake = Arc::new(FakeCluster::new());
    Clusters {
        kcp: ControlPlaneClient::new(kcp_fake.clone()),
        remote: RemoteClient::new(remote_fake.clone()),
        kcp_fake,
        remote_fake,
    }
}
