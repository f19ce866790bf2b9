use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{
    AtomicBool,
    Ordering,
};

use async_trait::async_trait;
use clockabilly::{
    DateTime,
    Utc,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use kube::api::DynamicObject;
use lm_core::client::*;
use lm_core::errors::*;
use lm_core::k8s::{
    GVK,
    matches_label_selector,
};
use serde_json::{
    self as json,
    json,
};

#[derive(Default)]
struct State {
    objects: HashMap<ObjectKey, DynamicObject>,
    next_rv: u64,
}

impl State {
    fn bump(&mut self) -> String {
        self.next_rv += 1;
        self.next_rv.to_string()
    }
}

// An in-memory "cluster" that behaves enough like an apiserver for the reconcilers: writes are
// resourceVersion-checked, deletes respect finalizers, status is only writable through
// patch_status, and spec changes bump metadata.generation.
pub struct FakeCluster {
    state: Mutex<State>,
    unreachable: AtomicBool,
    deletion_time: Mutex<DateTime<Utc>>,
}

impl Default for FakeCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeCluster {
    pub fn new() -> FakeCluster {
        FakeCluster {
            state: Mutex::new(State::default()),
            unreachable: AtomicBool::new(false),
            deletion_time: Mutex::new(Utc::now()),
        }
    }

    // Every call fails with a connectivity error while this is set
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    // The timestamp stamped onto objects with finalizers when they are deleted
    pub fn set_deletion_time(&self, ts: DateTime<Utc>) {
        *self.deletion_time.lock().unwrap() = ts;
    }

    // Store an object as-is (except for server-populated metadata), bypassing all checks
    pub fn insert<K: KubeObject>(&self, obj: &K) -> K {
        let mut dynobj = to_dynamic(obj).unwrap();
        let key = ObjectKey::for_obj(&dynobj).unwrap();
        let mut state = self.state.lock().unwrap();
        let rv = state.bump();
        dynobj.metadata.resource_version = Some(rv.clone());
        dynobj.metadata.uid.get_or_insert_with(|| format!("uid-{rv}"));
        dynobj.metadata.generation.get_or_insert(1);
        state.objects.insert(key, dynobj.clone());
        from_dynamic(dynobj).unwrap()
    }

    pub fn fetch<K: KubeObject>(&self, namespace: Option<&str>, name: &str) -> Option<K> {
        let key = ObjectKey::new(&GVK::of::<K>(), namespace, name);
        self.state.lock().unwrap().objects.get(&key).cloned().map(|o| from_dynamic(o).unwrap())
    }

    pub fn fetch_dynamic(&self, key: &ObjectKey) -> Option<DynamicObject> {
        self.state.lock().unwrap().objects.get(key).cloned()
    }

    pub fn all_of<K: KubeObject>(&self) -> Vec<K> {
        self.all_dynamic(&GVK::of::<K>()).into_iter().map(|o| from_dynamic(o).unwrap()).collect()
    }

    pub fn all_dynamic(&self, gvk: &GVK) -> Vec<DynamicObject> {
        let state = self.state.lock().unwrap();
        let mut objs: Vec<_> = state.objects.iter().filter(|(k, _)| &k.gvk == gvk).map(|(_, o)| o.clone()).collect();
        objs.sort_by_key(|o| (o.metadata.namespace.clone(), o.metadata.name.clone()));
        objs
    }

    // Overwrite the status of a stored object, as the owning controller would
    pub fn set_status(&self, key: &ObjectKey, status: json::Value) {
        let mut state = self.state.lock().unwrap();
        let rv = state.bump();
        let obj = state.objects.get_mut(key).unwrap();
        obj.data["status"] = status;
        obj.metadata.resource_version = Some(rv);
    }

    fn check_reachable(&self) -> EmptyResult {
        if self.unreachable.load(Ordering::SeqCst) {
            bail!(ClientError::unreachable("fake cluster is offline"));
        }
        Ok(())
    }

    // Writes to the main resource can't touch status; then bump generation on spec changes and
    // garbage-collect objects that are being deleted and have run out of finalizers.
    fn store(&self, state: &mut State, key: ObjectKey, old: Option<&DynamicObject>, mut new: DynamicObject) -> Option<DynamicObject> {
        let rv = state.bump();
        new.metadata.resource_version = Some(rv.clone());
        match old {
            Some(old) => {
                new.metadata.uid.clone_from(&old.metadata.uid);
                new.metadata.deletion_timestamp.clone_from(&old.metadata.deletion_timestamp);
                new.metadata.creation_timestamp.clone_from(&old.metadata.creation_timestamp);
                let generation = old.metadata.generation.unwrap_or(1);
                new.metadata.generation =
                    Some(if old.data.get("spec") != new.data.get("spec") { generation + 1 } else { generation });
                match old.data.get("status") {
                    Some(s) => new.data["status"] = s.clone(),
                    None => {
                        if let Some(d) = new.data.as_object_mut() {
                            d.remove("status");
                        }
                    },
                }
            },
            None => {
                new.metadata.uid = Some(format!("uid-{rv}"));
                new.metadata.generation = Some(1);
                new.metadata.deletion_timestamp = None;
                if let Some(d) = new.data.as_object_mut() {
                    d.remove("status");
                }
            },
        }

        let no_finalizers = new.metadata.finalizers.as_ref().is_none_or(|f| f.is_empty());
        if new.metadata.deletion_timestamp.is_some() && no_finalizers {
            state.objects.remove(&key);
            return None;
        }
        state.objects.insert(key, new.clone());
        Some(new)
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn get(&self, key: &ObjectKey) -> anyhow::Result<Option<DynamicObject>> {
        self.check_reachable()?;
        Ok(self.fetch_dynamic(key))
    }

    async fn list(
        &self,
        gvk: &GVK,
        namespace: Option<String>,
        label_selector: Option<String>,
    ) -> anyhow::Result<Vec<DynamicObject>> {
        self.check_reachable()?;
        Ok(self
            .all_dynamic(gvk)
            .into_iter()
            .filter(|o| namespace.is_none() || o.metadata.namespace == namespace)
            .filter(|o| match &label_selector {
                Some(sel) => matches_label_selector(&o.metadata.labels.clone().unwrap_or_default(), sel),
                None => true,
            })
            .collect())
    }

    async fn create(&self, obj: &DynamicObject) -> anyhow::Result<DynamicObject> {
        self.check_reachable()?;
        let key = ObjectKey::for_obj(obj)?;
        let mut state = self.state.lock().unwrap();
        if state.objects.contains_key(&key) {
            bail!(ClientError::already_exists(&key.to_string()));
        }
        let mut new = obj.clone();
        new.metadata.resource_version = None;
        self.store(&mut state, key.clone(), None, new)
            .ok_or_else(|| anyhow!("object {key} vanished on create"))
    }

    async fn update(&self, obj: &DynamicObject) -> anyhow::Result<DynamicObject> {
        self.check_reachable()?;
        let key = ObjectKey::for_obj(obj)?;
        let mut state = self.state.lock().unwrap();
        let Some(old) = state.objects.get(&key).cloned() else {
            bail!(ClientError::not_found(&key.to_string()));
        };
        if obj.metadata.resource_version.is_some() && obj.metadata.resource_version != old.metadata.resource_version {
            bail!(ClientError::conflict(&key.to_string()));
        }
        Ok(self.store(&mut state, key, Some(&old), obj.clone()).unwrap_or_else(|| obj.clone()))
    }

    async fn apply(&self, obj: &DynamicObject, _field_manager: &str) -> anyhow::Result<DynamicObject> {
        self.check_reachable()?;
        let key = ObjectKey::for_obj(obj)?;
        let mut state = self.state.lock().unwrap();
        let old = state.objects.get(&key).cloned();
        let new = match &old {
            Some(existing) => {
                if obj.metadata.resource_version.is_some()
                    && obj.metadata.resource_version != existing.metadata.resource_version
                {
                    bail!(ClientError::conflict(&key.to_string()));
                }
                let mut merged = json::to_value(existing)?;
                let mut patch = json::to_value(obj)?;
                // apply never removes finalizers or labels it doesn't mention, same as merge
                if let Some(m) = patch.get_mut("metadata").and_then(|m| m.as_object_mut()) {
                    m.remove("resourceVersion");
                }
                json_patch::merge(&mut merged, &patch);
                json::from_value(merged)?
            },
            None => obj.clone(),
        };
        Ok(self.store(&mut state, key, old.as_ref(), new).unwrap_or_else(|| obj.clone()))
    }

    async fn patch_merge(&self, key: &ObjectKey, patch: &json::Value) -> anyhow::Result<DynamicObject> {
        self.check_reachable()?;
        let mut state = self.state.lock().unwrap();
        let Some(old) = state.objects.get(key).cloned() else {
            bail!(ClientError::not_found(&key.to_string()));
        };
        let mut merged = json::to_value(&old)?;
        json_patch::merge(&mut merged, patch);
        let new: DynamicObject = json::from_value(merged)?;
        Ok(self.store(&mut state, key.clone(), Some(&old), new.clone()).unwrap_or(new))
    }

    async fn patch_status(&self, key: &ObjectKey, status: &json::Value, _field_manager: &str) -> EmptyResult {
        self.check_reachable()?;
        let mut state = self.state.lock().unwrap();
        let rv = state.bump();
        let Some(obj) = state.objects.get_mut(key) else {
            bail!(ClientError::not_found(&key.to_string()));
        };
        let mut current = obj.data.get("status").cloned().unwrap_or(json!({}));
        json_patch::merge(&mut current, status);
        obj.data["status"] = current;
        obj.metadata.resource_version = Some(rv);
        Ok(())
    }

    async fn delete(&self, key: &ObjectKey) -> anyhow::Result<bool> {
        self.check_reachable()?;
        let deletion_time = *self.deletion_time.lock().unwrap();
        let mut state = self.state.lock().unwrap();
        let Some(obj) = state.objects.get(key).cloned() else {
            return Ok(false);
        };

        if obj.metadata.finalizers.as_ref().is_none_or(|f| f.is_empty()) {
            state.objects.remove(key);
        } else if obj.metadata.deletion_timestamp.is_none() {
            let rv = state.bump();
            let stored = state.objects.get_mut(key).ok_or_else(|| anyhow!("object {key} vanished on delete"))?;
            stored.metadata.deletion_timestamp = Some(metav1::Time(deletion_time));
            stored.metadata.resource_version = Some(rv);
        }
        Ok(true)
    }
}
