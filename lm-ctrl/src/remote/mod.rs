mod catalog;
mod crd;
mod kyma_sync;

use std::collections::HashMap;
use std::sync::{
    Arc,
    Mutex,
};

use async_trait::async_trait;
use kube::api::DynamicObject;
use lm_core::client::{
    KubeClusterClient,
    ObjectKey,
    is_connectivity_error,
};
use lm_core::errors::*;
use lm_core::k8s::GVK;
use lm_core::prelude::*;
#[cfg(test)]
use mockall::automock;
use serde_json as json;
use tracing::*;

pub use self::catalog::*;
pub use self::crd::*;
pub use self::kyma_sync::*;
use crate::errors::KymaControllerError;

// Hands out the client for a Kyma's runtime cluster
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RemoteClientFactory: Send + Sync {
    async fn client_for(&self, kyma: &Kyma) -> anyhow::Result<RemoteClient>;
    fn evict(&self, kyma: &Kyma);
}

// Turns a kubeconfig into a live client; split out so that tests can hand back in-memory clusters
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterConnector: Send + Sync {
    async fn connect(&self, kubeconfig: &str) -> anyhow::Result<Arc<dyn ClusterClient>>;
}

pub struct KubeconfigConnector;

#[async_trait]
impl ClusterConnector for KubeconfigConnector {
    async fn connect(&self, kubeconfig: &str) -> anyhow::Result<Arc<dyn ClusterClient>> {
        Ok(Arc::new(KubeClusterClient::from_kubeconfig(kubeconfig).await?))
    }
}

struct CacheEntry {
    secret_version: Option<String>,
    client: RemoteClient,
}

type ClientMap = Arc<Mutex<HashMap<String, CacheEntry>>>;

// Remote clients are expensive to build (TLS handshakes, discovery), so they're cached per Kyma.
// There's no TTL: an entry is rebuilt when the kubeconfig secret changes and dropped as soon as the
// connection misbehaves.
pub struct KubeconfigClientCache {
    kcp: ControlPlaneClient,
    connector: Arc<dyn ClusterConnector>,
    clients: ClientMap,
}

impl KubeconfigClientCache {
    pub fn new(kcp: ControlPlaneClient, connector: Arc<dyn ClusterConnector>) -> KubeconfigClientCache {
        KubeconfigClientCache { kcp, connector, clients: Default::default() }
    }

    pub fn len(&self) -> usize {
        self.clients.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn read_kubeconfig(&self, kyma: &Kyma) -> anyhow::Result<(String, Option<String>)> {
        let key = kyma.namespaced_name();
        let Some(secret) = self.kcp.get_typed::<corev1::Secret>(kyma.namespace().as_deref(), &kyma.name_any()).await?
        else {
            bail!(KymaControllerError::invalid_kubeconfig_secret(&format!("secret {key} not found")));
        };
        let Some(raw) = secret.data.as_ref().and_then(|d| d.get(KUBECONFIG_SECRET_KEY)) else {
            bail!(KymaControllerError::invalid_kubeconfig_secret(&format!(
                "secret {key} has no {KUBECONFIG_SECRET_KEY} key"
            )));
        };
        let kubeconfig = String::from_utf8(raw.0.clone())
            .map_err(|e| KymaControllerError::invalid_kubeconfig_secret(&format!("secret {key}: {e}")))?;
        Ok((kubeconfig, secret.metadata.resource_version))
    }
}

#[async_trait]
impl RemoteClientFactory for KubeconfigClientCache {
    async fn client_for(&self, kyma: &Kyma) -> anyhow::Result<RemoteClient> {
        let cache_key = kyma.namespaced_name();
        let (kubeconfig, secret_version) = self.read_kubeconfig(kyma).await.inspect_err(|_| self.evict(kyma))?;

        let cached = {
            let clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
            clients
                .get(&cache_key)
                .filter(|e| e.secret_version == secret_version)
                .map(|e| e.client.clone())
        };
        if let Some(client) = cached {
            return Ok(client);
        }

        info!("building remote client for {cache_key}");
        let inner = self.connector.connect(&kubeconfig).await?;
        let client = RemoteClient::new(Arc::new(SelfEvictingClient {
            inner,
            cache_key: cache_key.clone(),
            clients: self.clients.clone(),
        }));
        self.clients
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(cache_key, CacheEntry { secret_version, client: client.clone() });
        Ok(client)
    }

    fn evict(&self, kyma: &Kyma) {
        if self.clients.lock().unwrap_or_else(|e| e.into_inner()).remove(&kyma.namespaced_name()).is_some() {
            debug!("evicted remote client for {}", kyma.namespaced_name());
        }
    }
}

// Wraps a cached client and drops it from the cache the first time a call fails in a way that
// suggests the connection itself is bad, so the next reconcile starts from the current secret.
struct SelfEvictingClient {
    inner: Arc<dyn ClusterClient>,
    cache_key: String,
    clients: ClientMap,
}

impl SelfEvictingClient {
    fn check<T>(&self, res: anyhow::Result<T>) -> anyhow::Result<T> {
        if let Err(err) = &res
            && is_connectivity_error(err)
        {
            warn!("remote client for {} failed, evicting: {err}", self.cache_key);
            self.clients.lock().unwrap_or_else(|e| e.into_inner()).remove(&self.cache_key);
        }
        res
    }
}

#[async_trait]
impl ClusterClient for SelfEvictingClient {
    async fn get(&self, key: &ObjectKey) -> anyhow::Result<Option<DynamicObject>> {
        self.check(self.inner.get(key).await)
    }

    async fn list(
        &self,
        gvk: &GVK,
        namespace: Option<String>,
        label_selector: Option<String>,
    ) -> anyhow::Result<Vec<DynamicObject>> {
        self.check(self.inner.list(gvk, namespace, label_selector).await)
    }

    async fn create(&self, obj: &DynamicObject) -> anyhow::Result<DynamicObject> {
        self.check(self.inner.create(obj).await)
    }

    async fn update(&self, obj: &DynamicObject) -> anyhow::Result<DynamicObject> {
        self.check(self.inner.update(obj).await)
    }

    async fn apply(&self, obj: &DynamicObject, field_manager: &str) -> anyhow::Result<DynamicObject> {
        self.check(self.inner.apply(obj, field_manager).await)
    }

    async fn patch_merge(&self, key: &ObjectKey, patch: &json::Value) -> anyhow::Result<DynamicObject> {
        self.check(self.inner.patch_merge(key, patch).await)
    }

    async fn patch_status(&self, key: &ObjectKey, status: &json::Value, field_manager: &str) -> EmptyResult {
        self.check(self.inner.patch_status(key, status, field_manager).await)
    }

    async fn delete(&self, key: &ObjectKey) -> anyhow::Result<bool> {
        self.check(self.inner.delete(key).await)
    }
}

// Single-cluster mode: the "remote" cluster is the one we're running in
pub struct LocalClientFactory {
    client: RemoteClient,
}

impl LocalClientFactory {
    pub fn new(kcp: &ControlPlaneClient) -> LocalClientFactory {
        LocalClientFactory { client: RemoteClient::new(kcp.inner()) }
    }
}

#[async_trait]
impl RemoteClientFactory for LocalClientFactory {
    async fn client_for(&self, _: &Kyma) -> anyhow::Result<RemoteClient> {
        Ok(self.client.clone())
    }

    fn evict(&self, _: &Kyma) {}
}

#[cfg(test)]
mod tests;
