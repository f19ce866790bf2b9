use async_trait::async_trait;
use kube::api::DynamicObject;
use kube::{
    Resource,
    ResourceExt,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json as json;

use super::*;

// Anything the typed helpers can round-trip through a DynamicObject
pub trait KubeObject: Resource<DynamicType = ()> + Clone + DeserializeOwned + Serialize + Send + Sync + 'static {}

impl<T> KubeObject for T where T: Resource<DynamicType = ()> + Clone + DeserializeOwned + Serialize + Send + Sync + 'static {}

pub fn to_dynamic<K: KubeObject>(obj: &K) -> anyhow::Result<DynamicObject> {
    let mut dynobj: DynamicObject = json::from_value(json::to_value(obj)?)?;
    // k8s-openapi types always serialize their type information, but it doesn't hurt to be sure
    dynobj.types.get_or_insert_with(|| GVK::of::<K>().into_type_meta());
    Ok(dynobj)
}

pub fn from_dynamic<K: KubeObject>(obj: DynamicObject) -> anyhow::Result<K> {
    Ok(json::from_value(json::to_value(obj)?)?)
}

pub fn key_of<K: KubeObject>(obj: &K) -> ObjectKey {
    ObjectKey::new(&GVK::of::<K>(), obj.namespace().as_deref(), &obj.name_any())
}

#[async_trait]
pub trait TypedClientExt {
    async fn get_typed<K: KubeObject>(&self, namespace: Option<&str>, name: &str) -> anyhow::Result<Option<K>>;
    async fn list_typed<K: KubeObject>(
        &self,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> anyhow::Result<Vec<K>>;
    async fn create_typed<K: KubeObject>(&self, obj: &K) -> anyhow::Result<K>;
    async fn update_typed<K: KubeObject>(&self, obj: &K) -> anyhow::Result<K>;
    async fn apply_typed<K: KubeObject>(&self, obj: &K, field_manager: &str) -> anyhow::Result<K>;
    async fn patch_status_typed<K: KubeObject, S: Serialize + Send + Sync>(
        &self,
        obj: &K,
        status: &S,
        field_manager: &str,
    ) -> EmptyResult;
    async fn delete_typed<K: KubeObject>(&self, obj: &K) -> anyhow::Result<bool>;
}

#[async_trait]
impl<C: ClusterClient + ?Sized> TypedClientExt for C {
    async fn get_typed<K: KubeObject>(&self, namespace: Option<&str>, name: &str) -> anyhow::Result<Option<K>> {
        let key = ObjectKey::new(&GVK::of::<K>(), namespace, name);
        self.get(&key).await?.map(from_dynamic).transpose()
    }

    async fn list_typed<K: KubeObject>(
        &self,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> anyhow::Result<Vec<K>> {
        self.list(&GVK::of::<K>(), namespace.map(String::from), label_selector.map(String::from))
            .await?
            .into_iter()
            .map(from_dynamic)
            .collect()
    }

    async fn create_typed<K: KubeObject>(&self, obj: &K) -> anyhow::Result<K> {
        from_dynamic(self.create(&to_dynamic(obj)?).await?)
    }

    async fn update_typed<K: KubeObject>(&self, obj: &K) -> anyhow::Result<K> {
        from_dynamic(self.update(&to_dynamic(obj)?).await?)
    }

    async fn apply_typed<K: KubeObject>(&self, obj: &K, field_manager: &str) -> anyhow::Result<K> {
        from_dynamic(self.apply(&to_dynamic(obj)?, field_manager).await?)
    }

    async fn patch_status_typed<K: KubeObject, S: Serialize + Send + Sync>(
        &self,
        obj: &K,
        status: &S,
        field_manager: &str,
    ) -> EmptyResult {
        self.patch_status(&key_of(obj), &json::to_value(status)?, field_manager).await
    }

    async fn delete_typed<K: KubeObject>(&self, obj: &K) -> anyhow::Result<bool> {
        self.delete(&key_of(obj)).await
    }
}
