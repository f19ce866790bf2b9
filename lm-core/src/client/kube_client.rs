use std::fmt::Display;

use async_trait::async_trait;
use kube::api::{
    DeleteParams,
    DynamicObject,
    ListParams,
    Patch,
    PatchParams,
    PostParams,
};
use kube::config::{
    KubeConfigOptions,
    Kubeconfig,
};
use serde_json as json;
use tokio::sync::Mutex;
use tracing::*;

use super::*;
use crate::k8s::ApiSet;

// ClusterClient backed by a real apiserver connection
pub struct KubeClusterClient {
    apiset: Mutex<ApiSet>,
}

impl KubeClusterClient {
    pub fn new(client: kube::Client) -> KubeClusterClient {
        KubeClusterClient { apiset: Mutex::new(ApiSet::new(client)) }
    }

    pub async fn from_kubeconfig(kubeconfig: &str) -> anyhow::Result<KubeClusterClient> {
        let kc = Kubeconfig::from_yaml(kubeconfig).map_err(|e| ClientError::unreachable(&e.to_string()))?;
        let config = kube::Config::from_custom_kubeconfig(kc, &KubeConfigOptions::default())
            .await
            .map_err(|e| ClientError::unreachable(&e.to_string()))?;
        let client = kube::Client::try_from(config)?;
        Ok(KubeClusterClient::new(client))
    }

    async fn api(&self, gvk: &GVK, namespace: Option<&str>) -> anyhow::Result<kube::Api<DynamicObject>> {
        self.apiset.lock().await.api_for(gvk, namespace).await
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn get(&self, key: &ObjectKey) -> anyhow::Result<Option<DynamicObject>> {
        let api = self.api(&key.gvk, key.namespace.as_deref()).await?;
        api.get_opt(&key.name).await.map_err(|e| map_kube_err(e, key))
    }

    async fn list(
        &self,
        gvk: &GVK,
        namespace: Option<String>,
        label_selector: Option<String>,
    ) -> anyhow::Result<Vec<DynamicObject>> {
        let api = self.api(gvk, namespace.as_deref()).await?;
        let lp = ListParams { label_selector, ..Default::default() };
        Ok(api.list(&lp).await.map_err(|e| map_kube_err(e, gvk))?.items)
    }

    async fn create(&self, obj: &DynamicObject) -> anyhow::Result<DynamicObject> {
        let key = ObjectKey::for_obj(obj)?;
        let api = self.api(&key.gvk, key.namespace.as_deref()).await?;
        api.create(&PostParams::default(), obj).await.map_err(|e| map_kube_err(e, &key))
    }

    async fn update(&self, obj: &DynamicObject) -> anyhow::Result<DynamicObject> {
        let key = ObjectKey::for_obj(obj)?;
        let api = self.api(&key.gvk, key.namespace.as_deref()).await?;
        api.replace(&key.name, &PostParams::default(), obj)
            .await
            .map_err(|e| map_kube_err(e, &key))
    }

    async fn apply(&self, obj: &DynamicObject, field_manager: &str) -> anyhow::Result<DynamicObject> {
        let key = ObjectKey::for_obj(obj)?;
        let api = self.api(&key.gvk, key.namespace.as_deref()).await?;
        debug!("applying {key} as {field_manager}");
        api.patch(&key.name, &PatchParams::apply(field_manager).force(), &Patch::Apply(obj))
            .await
            .map_err(|e| map_kube_err(e, &key))
    }

    async fn patch_merge(&self, key: &ObjectKey, patch: &json::Value) -> anyhow::Result<DynamicObject> {
        let api = self.api(&key.gvk, key.namespace.as_deref()).await?;
        api.patch(&key.name, &PatchParams::default(), &Patch::Merge(patch))
            .await
            .map_err(|e| map_kube_err(e, key))
    }

    async fn patch_status(&self, key: &ObjectKey, status: &json::Value, field_manager: &str) -> EmptyResult {
        let api = self.api(&key.gvk, key.namespace.as_deref()).await?;
        let pp = PatchParams { field_manager: Some(field_manager.into()), ..Default::default() };
        api.patch_status(&key.name, &pp, &Patch::Merge(json::json!({"status": status})))
            .await
            .map_err(|e| map_kube_err(e, key))?;
        Ok(())
    }

    async fn delete(&self, key: &ObjectKey) -> anyhow::Result<bool> {
        let api = self.api(&key.gvk, key.namespace.as_deref()).await?;
        match api.delete(&key.name, &DeleteParams::background()).await {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(resp)) if resp.code == 404 => Ok(false),
            Err(e) => Err(map_kube_err(e, key)),
        }
    }
}

fn map_kube_err(err: kube::Error, what: &impl Display) -> anyhow::Error {
    match &err {
        kube::Error::Api(resp) if resp.code == 404 => ClientError::not_found(&what.to_string()),
        kube::Error::Api(resp) if resp.code == 409 && resp.reason == "AlreadyExists" => {
            ClientError::already_exists(&what.to_string())
        },
        kube::Error::Api(resp) if resp.code == 409 => ClientError::conflict(&what.to_string()),
        _ => err.into(),
    }
}
