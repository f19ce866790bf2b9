mod kube_client;
mod typed;

use std::ops::Deref;
use std::sync::Arc;

use async_trait::async_trait;
use kube::api::DynamicObject;
pub use kube_client::KubeClusterClient;
#[cfg(feature = "mock")]
use mockall::automock;
use serde_json as json;
pub use typed::*;

use crate::errors::*;
use crate::k8s::GVK;

err_impl! {ClientError,
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("object was modified concurrently: {0}")]
    Conflict(String),

    #[error("object already exists: {0}")]
    AlreadyExists(String),

    #[error("cluster unreachable: {0}")]
    Unreachable(String),
}

// Everything we need to address a single object in a cluster.  Namespace is None for
// cluster-scoped objects.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ObjectKey {
    pub gvk: GVK,
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn new(gvk: &GVK, namespace: Option<&str>, name: &str) -> ObjectKey {
        ObjectKey {
            gvk: gvk.clone(),
            namespace: namespace.map(String::from),
            name: name.into(),
        }
    }

    pub fn for_obj(obj: &DynamicObject) -> anyhow::Result<ObjectKey> {
        Ok(ObjectKey {
            gvk: GVK::from_dynamic_obj(obj)?,
            namespace: obj.metadata.namespace.clone(),
            name: obj.metadata.name.clone().unwrap_or_default(),
        })
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.gvk, ns, self.name),
            None => write!(f, "{} {}", self.gvk, self.name),
        }
    }
}

// The minimal cluster API that the reconcilers are written against.  Every write is
// resourceVersion-checked by the apiserver (or the in-memory fake used in tests); callers see a
// ClientError::Conflict when they lose a race and should requeue.
#[cfg_attr(feature = "mock", automock)]
#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn get(&self, key: &ObjectKey) -> anyhow::Result<Option<DynamicObject>>;

    // namespace == None lists across all namespaces
    async fn list(
        &self,
        gvk: &GVK,
        namespace: Option<String>,
        label_selector: Option<String>,
    ) -> anyhow::Result<Vec<DynamicObject>>;

    async fn create(&self, obj: &DynamicObject) -> anyhow::Result<DynamicObject>;
    async fn update(&self, obj: &DynamicObject) -> anyhow::Result<DynamicObject>;
    async fn apply(&self, obj: &DynamicObject, field_manager: &str) -> anyhow::Result<DynamicObject>;
    async fn patch_merge(&self, key: &ObjectKey, patch: &json::Value) -> anyhow::Result<DynamicObject>;
    async fn patch_status(&self, key: &ObjectKey, status: &json::Value, field_manager: &str) -> EmptyResult;

    // Returns false if the object was already gone
    async fn delete(&self, key: &ObjectKey) -> anyhow::Result<bool>;
}

// The control-plane (KCP) and runtime (SKR) clients are distinct types so that a component's
// signature says which cluster it is allowed to talk to.
macro_rules! scoped_client {
    ($name:ident) => {
        #[derive(Clone)]
        pub struct $name(Arc<dyn ClusterClient>);

        impl $name {
            pub fn new(inner: Arc<dyn ClusterClient>) -> $name {
                $name(inner)
            }

            pub fn inner(&self) -> Arc<dyn ClusterClient> {
                self.0.clone()
            }
        }

        impl Deref for $name {
            type Target = dyn ClusterClient;

            fn deref(&self) -> &Self::Target {
                self.0.as_ref()
            }
        }
    };
}

scoped_client!(ControlPlaneClient);
scoped_client!(RemoteClient);

pub fn is_not_found(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<ClientError>(), Some(ClientError::NotFound(_)))
}

pub fn is_conflict(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<ClientError>(), Some(ClientError::Conflict(_) | ClientError::AlreadyExists(_)))
}

// Anything that isn't a well-formed "the apiserver answered and said no" is treated as a broken
// connection: transport failures, auth failures, kubeconfig problems.
pub fn is_connectivity_error(err: &anyhow::Error) -> bool {
    if let Some(e) = err.downcast_ref::<ClientError>() {
        return matches!(e, ClientError::Unreachable(_));
    }
    match err.downcast_ref::<kube::Error>() {
        Some(kube::Error::Api(resp)) => resp.code == 401 || resp.code == 403,
        Some(_) => true,
        None => false,
    }
}

#[cfg(test)]
mod tests;
