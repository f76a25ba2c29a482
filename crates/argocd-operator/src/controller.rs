//! ArgoCD controller
//!
//! Gathers cluster facts, then converges the application controller and the
//! redis HA StatefulSet through the lifecycle coordinator. Watching, retries
//! and per-key serialization are left to `kube::runtime::Controller`.

use std::sync::Arc;
use std::time::Duration;

use kube::runtime::controller::Action;
use kube::{Client, Resource, ResourceExt};
use tracing::{error, info, instrument};

use argocd_common::crd::ArgoCD;
use argocd_common::kube_utils::OwnerReference;
use argocd_common::{Error, Result, REDIS_TLS_SECRET};

use crate::cluster::{self, ClusterView, KubeClusterView};
use crate::config::OperatorConfig;
use crate::instance::{ClusterFacts, Instance};
use crate::lifecycle::LifecycleCoordinator;
use crate::store::{KubeObjectStore, ObjectStore};

// =============================================================================
// Controller context
// =============================================================================

/// Shared state for every reconciliation
pub struct Context {
    /// Managed workload store
    pub store: Arc<dyn ObjectStore>,
    /// Read-only cluster lookups
    pub cluster: Arc<dyn ClusterView>,
    /// Periodic requeue interval
    pub requeue: Duration,
    /// Requeue interval after a retryable failure
    pub error_requeue: Duration,
}

impl Context {
    /// Create a context from explicit collaborators
    pub fn new(
        store: Arc<dyn ObjectStore>,
        cluster: Arc<dyn ClusterView>,
        requeue: Duration,
        error_requeue: Duration,
    ) -> Self {
        Self {
            store,
            cluster,
            requeue,
            error_requeue,
        }
    }

    /// Create a kube-backed context
    pub fn from_client(client: Client, config: &OperatorConfig) -> Self {
        Self::new(
            Arc::new(KubeObjectStore::new(client.clone(), &config.field_manager)),
            Arc::new(KubeClusterView::new(client)),
            config.requeue(),
            config.error_requeue(),
        )
    }

    /// Create a context for testing with mock collaborators
    #[cfg(test)]
    pub fn for_testing(store: Arc<dyn ObjectStore>, cluster: Arc<dyn ClusterView>) -> Self {
        Self::new(
            store,
            cluster,
            Duration::from_secs(300),
            Duration::from_secs(30),
        )
    }
}

// =============================================================================
// Reconciliation
// =============================================================================

/// Reconcile an ArgoCD resource
#[instrument(skip(argocd, ctx), fields(argocd = %argocd.name_any()))]
pub async fn reconcile(argocd: Arc<ArgoCD>, ctx: Arc<Context>) -> Result<Action> {
    let name = argocd.name_any();
    let namespace = argocd.namespace().ok_or_else(|| {
        Error::internal_with_context("ArgoCD resource has no namespace", "reconciler")
    })?;

    let instance = Instance {
        name: &name,
        namespace: &namespace,
        spec: &argocd.spec,
        owner: argocd
            .controller_owner_ref(&())
            .map(OwnerReference::from),
    };

    let facts = gather_facts(&instance, ctx.cluster.as_ref()).await?;
    let coordinator = LifecycleCoordinator::new(ctx.store.clone());

    let controller = coordinator
        .reconcile(&instance.application_controller(&facts))
        .await?;
    let redis_ha = coordinator.reconcile(&instance.redis_ha()).await?;

    info!(
        application_controller = %controller,
        redis_ha = %redis_ha,
        redis_tls = facts.redis_tls,
        "reconciled"
    );
    Ok(Action::requeue(ctx.requeue))
}

/// TLS detection, export lookup and image pull check, in that order
async fn gather_facts(instance: &Instance<'_>, cluster: &dyn ClusterView) -> Result<ClusterFacts> {
    let secret = cluster
        .get_secret(REDIS_TLS_SECRET, instance.namespace)
        .await?;
    let redis_tls = cluster::redis_tls_enabled(secret.as_ref(), instance.name);

    let import = match &instance.spec.import {
        Some(import) => {
            let namespace = import.namespace.as_deref().unwrap_or(instance.namespace);
            cluster.get_export(&import.name, namespace).await?
        }
        None => None,
    };

    let image_pull_failed = cluster
        .first_pod(instance.namespace, &instance.controller_pod_selector())
        .await?
        .as_ref()
        .is_some_and(cluster::image_pull_failed);

    Ok(ClusterFacts {
        redis_tls,
        import,
        image_pull_failed,
    })
}

/// Error policy for the ArgoCD controller
///
/// Retryable errors requeue after the configured delay; anything else waits
/// for the resource to change.
pub fn error_policy(argocd: Arc<ArgoCD>, error: &Error, ctx: Arc<Context>) -> Action {
    error!(
        ?error,
        argocd = %argocd.name_any(),
        retryable = error.is_retryable(),
        "reconciliation failed"
    );

    if error.is_retryable() {
        Action::requeue(ctx.error_requeue)
    } else {
        Action::await_change()
    }
}
