//! Object store access for managed workloads
//!
//! [`ObjectStore`] is the only path through which the lifecycle coordinator
//! touches the cluster. The kube-backed implementation reads with `get_opt`
//! and writes every object through one forced server-side apply, so create
//! and update share a single field manager. Fields dropped from a later apply
//! are then removed by the API server instead of lingering under a second
//! manager.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use kube::api::{Api, DeleteParams, DynamicObject, Patch, PatchParams};
use kube::discovery::ApiResource;
use kube::Client;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use argocd_common::{Error, Result};
use argocd_workload::{Workload, WorkloadKind, WorkloadRef};

/// Strongly-consistent get/create/update/delete by name
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch a workload; `Ok(None)` when it does not exist
    async fn get(&self, target: &WorkloadRef) -> Result<Option<Workload>>;

    /// Create a workload that does not exist yet
    async fn create(&self, workload: &Workload) -> Result<()>;

    /// Replace the mutable state of an existing workload
    ///
    /// `workload` is the complete set of fields the operator owns; anything it
    /// set before and no longer carries is removed.
    async fn update(&self, workload: &Workload) -> Result<()>;

    /// Delete a workload
    ///
    /// Returns [`Error::NotFound`] when the object is already gone.
    async fn delete(&self, target: &WorkloadRef) -> Result<()>;
}

/// [`ObjectStore`] backed by the Kubernetes API
pub struct KubeObjectStore {
    client: Client,
    field_manager: String,
}

impl KubeObjectStore {
    /// Create a store that writes as `field_manager`
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    fn api(&self, kind: WorkloadKind, namespace: &str) -> (Api<DynamicObject>, ApiResource) {
        let ar = api_resource(kind);
        (
            Api::namespaced_with(self.client.clone(), namespace, &ar),
            ar,
        )
    }

    /// Server-side apply `workload` under the operator's field manager
    async fn apply(&self, workload: &Workload) -> Result<WorkloadRef> {
        let target = workload.object_ref();
        let (api, _) = self.api(target.kind, &target.namespace);
        api.patch(
            &target.name,
            &apply_params(&self.field_manager),
            &Patch::Apply(to_dynamic(workload)?),
        )
        .await?;
        Ok(target)
    }
}

/// Patch parameters shared by every write
fn apply_params(field_manager: &str) -> PatchParams {
    PatchParams::apply(field_manager).force()
}

fn api_resource(kind: WorkloadKind) -> ApiResource {
    match kind {
        WorkloadKind::StatefulSet => ApiResource::erase::<StatefulSet>(&()),
        WorkloadKind::Deployment => ApiResource::erase::<Deployment>(&()),
    }
}

/// Convert a dynamic object into a workload descriptor
///
/// Type metadata is filled in from the API resource when the server omits it.
fn to_workload(obj: DynamicObject, ar: &ApiResource) -> Result<Workload> {
    let mut value = serde_json::to_value(obj)?;
    if let Some(map) = value.as_object_mut() {
        map.entry("apiVersion")
            .or_insert_with(|| serde_json::Value::String(ar.api_version.clone()));
        map.entry("kind")
            .or_insert_with(|| serde_json::Value::String(ar.kind.clone()));
    }
    serde_json::from_value(value).map_err(|e| Error::serialization_for(&ar.kind, e.to_string()))
}

fn to_dynamic(workload: &Workload) -> Result<DynamicObject> {
    let value = serde_json::to_value(workload)?;
    serde_json::from_value(value)
        .map_err(|e| Error::serialization_for(workload.kind.clone(), e.to_string()))
}

#[async_trait]
impl ObjectStore for KubeObjectStore {
    async fn get(&self, target: &WorkloadRef) -> Result<Option<Workload>> {
        let (api, ar) = self.api(target.kind, &target.namespace);
        match api.get_opt(&target.name).await? {
            Some(obj) => to_workload(obj, &ar).map(Some),
            None => Ok(None),
        }
    }

    async fn create(&self, workload: &Workload) -> Result<()> {
        let target = self.apply(workload).await?;
        debug!(workload = %target, "created");
        Ok(())
    }

    async fn update(&self, workload: &Workload) -> Result<()> {
        let target = self.apply(workload).await?;
        debug!(workload = %target, "applied");
        Ok(())
    }

    async fn delete(&self, target: &WorkloadRef) -> Result<()> {
        let (api, _) = self.api(target.kind, &target.namespace);
        match api.delete(&target.name, &DeleteParams::background()).await {
            Ok(_) => {
                debug!(workload = %target, "deleted");
                Ok(())
            }
            Err(kube::Error::Api(ae)) if ae.code == 404 => Err(Error::not_found(
                target.kind.as_str(),
                &target.name,
                &target.namespace,
            )),
            Err(e) => Err(e.into()),
        }
    }
}
