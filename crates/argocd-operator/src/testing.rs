//! In-memory object store for lifecycle tests

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use argocd_common::{Error, Result};
use argocd_workload::{Workload, WorkloadRef};

use crate::store::ObjectStore;

/// A store mutation, recorded in call order
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreCall {
    Create(WorkloadRef),
    Update(WorkloadRef),
    Delete(WorkloadRef),
}

/// Map-backed [`ObjectStore`] that records every mutation
///
/// Updates follow server-side apply with the operator as the only apply
/// manager: label and annotation keys written by others survive, while the
/// spec and owner references are replaced by what was applied. Field-level
/// ownership inside the spec is not tracked.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<WorkloadRef, Workload>>,
    calls: Mutex<Vec<StoreCall>>,
}

impl MemoryStore {
    pub fn with_objects(objects: impl IntoIterator<Item = Workload>) -> Self {
        let store = Self::default();
        for obj in objects {
            store.insert(obj);
        }
        store
    }

    /// Put an object without recording a mutation (out-of-band edit)
    pub fn insert(&self, workload: Workload) {
        self.objects
            .lock()
            .expect("store lock poisoned")
            .insert(workload.object_ref(), workload);
    }

    pub fn get_sync(&self, target: &WorkloadRef) -> Option<Workload> {
        self.objects
            .lock()
            .expect("store lock poisoned")
            .get(target)
            .cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().expect("store lock poisoned").is_empty()
    }

    pub fn mutations(&self) -> Vec<StoreCall> {
        self.calls.lock().expect("store lock poisoned").clone()
    }

    fn record(&self, call: StoreCall) {
        self.calls.lock().expect("store lock poisoned").push(call);
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, target: &WorkloadRef) -> Result<Option<Workload>> {
        Ok(self.get_sync(target))
    }

    async fn create(&self, workload: &Workload) -> Result<()> {
        let target = workload.object_ref();
        let mut objects = self.objects.lock().expect("store lock poisoned");
        if objects.contains_key(&target) {
            return Err(Error::internal_with_context(
                format!("{} already exists", target),
                "memory-store",
            ));
        }
        objects.insert(target.clone(), workload.clone());
        drop(objects);
        self.record(StoreCall::Create(target));
        Ok(())
    }

    async fn update(&self, workload: &Workload) -> Result<()> {
        let target = workload.object_ref();
        let mut objects = self.objects.lock().expect("store lock poisoned");
        let Some(stored) = objects.get(&target) else {
            return Err(Error::not_found(
                target.kind.as_str(),
                &target.name,
                &target.namespace,
            ));
        };
        let mut applied = workload.clone();
        for (key, value) in &stored.metadata.labels {
            applied.metadata.labels.entry(key.clone()).or_insert_with(|| value.clone());
        }
        for (key, value) in &stored.metadata.annotations {
            applied
                .metadata
                .annotations
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        objects.insert(target.clone(), applied);
        drop(objects);
        self.record(StoreCall::Update(target));
        Ok(())
    }

    async fn delete(&self, target: &WorkloadRef) -> Result<()> {
        let removed = self
            .objects
            .lock()
            .expect("store lock poisoned")
            .remove(target);
        match removed {
            Some(_) => {
                self.record(StoreCall::Delete(target.clone()));
                Ok(())
            }
            None => Err(Error::not_found(
                target.kind.as_str(),
                &target.name,
                &target.namespace,
            )),
        }
    }
}
