//! Read-only cluster facts consulted before building desired state

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Pod, Secret};
use kube::api::{Api, ListParams};
use kube::Client;

#[cfg(test)]
use mockall::automock;

use argocd_common::crd::ArgoCDExport;
use argocd_common::{Result, ANNOTATION_ARGOCD_NAME, SECRET_TYPE_TLS};

/// Waiting reasons that mean the controller image cannot be pulled
pub const IMAGE_PULL_FAILURES: [&str; 2] = ["ImagePullBackOff", "ErrImagePull"];

/// Lookups the reconciler needs besides the managed workloads themselves
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterView: Send + Sync {
    /// Fetch an ArgoCDExport by name
    async fn get_export(&self, name: &str, namespace: &str) -> Result<Option<ArgoCDExport>>;

    /// Fetch a Secret by name
    async fn get_secret(&self, name: &str, namespace: &str) -> Result<Option<Secret>>;

    /// First pod matching a label selector
    async fn first_pod(&self, namespace: &str, selector: &str) -> Result<Option<Pod>>;
}

/// [`ClusterView`] backed by the Kubernetes API
pub struct KubeClusterView {
    client: Client,
}

impl KubeClusterView {
    /// Wrap a client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterView for KubeClusterView {
    async fn get_export(&self, name: &str, namespace: &str) -> Result<Option<ArgoCDExport>> {
        let api: Api<ArgoCDExport> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_secret(&self, name: &str, namespace: &str) -> Result<Option<Secret>> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn first_pod(&self, namespace: &str, selector: &str) -> Result<Option<Pod>> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let pods = api.list(&ListParams::default().labels(selector)).await?;
        Ok(pods.items.into_iter().next())
    }
}

/// Whether a redis TLS secret belongs to the given instance and holds a key pair
pub fn redis_tls_enabled(secret: Option<&Secret>, instance: &str) -> bool {
    let Some(secret) = secret else {
        return false;
    };
    let is_tls = secret.type_.as_deref() == Some(SECRET_TYPE_TLS);
    let owned = secret
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(ANNOTATION_ARGOCD_NAME))
        .is_some_and(|owner| owner == instance);
    is_tls && owned
}

/// Whether the pod's first container is stuck pulling its image
pub fn image_pull_failed(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.container_statuses.as_ref())
        .and_then(|statuses| statuses.first())
        .and_then(|status| status.state.as_ref())
        .and_then(|state| state.waiting.as_ref())
        .and_then(|waiting| waiting.reason.as_deref())
        .is_some_and(|reason| IMAGE_PULL_FAILURES.contains(&reason))
}
