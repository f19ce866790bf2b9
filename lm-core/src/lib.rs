pub mod cache;
pub mod client;
pub mod constants;
pub mod errors;
pub mod jsonutils;
pub mod k8s;
pub mod logging;
pub mod macros;
pub mod metrics;

pub mod prelude {
    pub use k8s_openapi::api::core::v1 as corev1;
    pub use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
    pub use kube::{
        CustomResourceExt,
        ResourceExt,
    };
    pub use lm_api::v1beta2::{
        Kyma,
        Manifest,
        Module,
        ModuleReleaseMeta,
        ModuleTemplate,
        State,
        Watcher,
    };

    pub use crate::client::{
        ClusterClient,
        ControlPlaneClient,
        RemoteClient,
        TypedClientExt,
    };
    pub use crate::constants::*;
    pub use crate::errors::EmptyResult;
    pub use crate::k8s::{
        KubeResourceExt,
        KymaExt,
    };
}
