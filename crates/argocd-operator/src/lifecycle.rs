//! Lifecycle coordination for a single managed workload
//!
//! Each managed object is a two-state machine (absent or present) driven by
//! an enable flag. [`Transition::decide`] is the transition table; the
//! coordinator executes the chosen transition against the store.
//!
//! No retries happen here. Store errors other than not-found on delete are
//! returned unchanged so the controller's error policy decides what to do.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use argocd_common::{Result, LABEL_IMAGE_UPGRADED};
use argocd_workload::{detect, FieldGroup, Workload, WorkloadRef};

use crate::store::ObjectStore;

/// Format of the `image.upgraded` pod label
pub const IMAGE_UPGRADED_FORMAT: &str = "%m%d%Y-%H%M%S-UTC";

/// Action chosen for an (exists, enabled) pair
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Absent and disabled
    Noop,
    /// Absent and enabled
    Create,
    /// Present and enabled: compare, update if changed
    Converge,
    /// Present and disabled
    Delete,
}

impl Transition {
    /// Transition table keyed by (exists, enabled)
    pub fn decide(exists: bool, enabled: bool) -> Self {
        match (exists, enabled) {
            (false, false) => Self::Noop,
            (false, true) => Self::Create,
            (true, true) => Self::Converge,
            (true, false) => Self::Delete,
        }
    }
}

/// What a reconcile call did to the store
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// No store mutation
    Unchanged,
    /// Created the workload
    Created,
    /// Deleted a legacy object, then created the workload
    Migrated,
    /// Updated the listed field groups
    Updated(Vec<FieldGroup>),
    /// Deleted the workload because it was disabled
    Deleted,
    /// Deleted the workload so the next reconcile creates it fresh
    Recreating,
}

impl Outcome {
    /// Whether the store was written
    pub fn mutated(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unchanged => f.write_str("unchanged"),
            Self::Created => f.write_str("created"),
            Self::Migrated => f.write_str("migrated"),
            Self::Updated(fields) => {
                let names: Vec<String> = fields.iter().map(ToString::to_string).collect();
                write!(f, "updated [{}]", names.join(", "))
            }
            Self::Deleted => f.write_str("deleted"),
            Self::Recreating => f.write_str("recreating"),
        }
    }
}

/// One managed object and everything needed to converge it
#[derive(Clone, Debug)]
pub struct ManagedWorkload {
    /// Desired state, compiled from the spec
    pub desired: Workload,
    /// Enable flag for this object
    pub enabled: bool,
    /// Previous-generation object with the same logical name
    pub legacy: Option<WorkloadRef>,
    /// Delete the present object instead of converging it
    pub recreate: bool,
}

impl ManagedWorkload {
    /// A workload with no legacy predecessor
    pub fn new(desired: Workload, enabled: bool) -> Self {
        Self {
            desired,
            enabled,
            legacy: None,
            recreate: false,
        }
    }

    /// Delete `legacy` before the first create
    pub fn with_legacy(mut self, legacy: WorkloadRef) -> Self {
        self.legacy = Some(legacy);
        self
    }

    /// Force a delete of the present object
    pub fn with_recreate(mut self, recreate: bool) -> Self {
        self.recreate = recreate;
        self
    }

    /// Store key of the managed object
    pub fn target(&self) -> WorkloadRef {
        self.desired.object_ref()
    }
}

/// Drives managed workloads toward their desired state
pub struct LifecycleCoordinator {
    store: Arc<dyn ObjectStore>,
}

impl LifecycleCoordinator {
    /// Create a coordinator over the given store
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Converge one managed workload
    pub async fn reconcile(&self, managed: &ManagedWorkload) -> Result<Outcome> {
        let target = managed.target();
        let actual = self.store.get(&target).await?;
        let transition = Transition::decide(actual.is_some(), managed.enabled);
        debug!(workload = %target, ?transition, "lifecycle transition");

        match (transition, actual) {
            (Transition::Noop, _) => Ok(Outcome::Unchanged),
            (Transition::Create, _) => self.create(managed, &target).await,
            (Transition::Delete, _) => {
                self.delete_ignoring_absent(&target).await?;
                info!(workload = %target, "deleted disabled workload");
                Ok(Outcome::Deleted)
            }
            (Transition::Converge, Some(_)) if managed.recreate => {
                self.delete_ignoring_absent(&target).await?;
                info!(workload = %target, "deleted workload to recover from image pull failure");
                Ok(Outcome::Recreating)
            }
            (Transition::Converge, Some(actual)) => self.converge(managed, &actual).await,
            // decide() only yields Converge when the object exists
            (Transition::Converge, None) => Ok(Outcome::Unchanged),
        }
    }

    async fn create(&self, managed: &ManagedWorkload, target: &WorkloadRef) -> Result<Outcome> {
        let mut migrated = false;
        if let Some(legacy) = &managed.legacy {
            if self.store.get(legacy).await?.is_some() {
                self.delete_ignoring_absent(legacy).await?;
                info!(workload = %target, legacy = %legacy, "deleted legacy workload");
                migrated = true;
            }
        }

        self.store.create(&managed.desired).await?;
        info!(workload = %target, "created workload");
        Ok(if migrated {
            Outcome::Migrated
        } else {
            Outcome::Created
        })
    }

    async fn converge(&self, managed: &ManagedWorkload, actual: &Workload) -> Result<Outcome> {
        let target = managed.target();
        let mut changes = detect(&managed.desired, actual);
        if !changes.changed {
            debug!(workload = %target, "workload up to date");
            return Ok(Outcome::Unchanged);
        }

        if changes.touched(FieldGroup::Image) {
            changes.merged.spec.template.metadata.labels.insert(
                LABEL_IMAGE_UPGRADED.to_string(),
                Utc::now().format(IMAGE_UPGRADED_FORMAT).to_string(),
            );
        }

        self.store.update(&changes.merged).await?;
        info!(
            workload = %target,
            fields = ?changes.changed_fields,
            "updated workload"
        );
        Ok(Outcome::Updated(changes.changed_fields))
    }

    async fn delete_ignoring_absent(&self, target: &WorkloadRef) -> Result<()> {
        match self.store.delete(target).await {
            Err(e) if e.is_not_found() => {
                debug!(workload = %target, "already deleted");
                Ok(())
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MockObjectStore;
    use crate::testing::{MemoryStore, StoreCall};
    use argocd_common::crd::{ArgoCDSpec, ShardSpec};
    use argocd_common::kube_utils::ObjectMeta;
    use argocd_common::Error;
    use argocd_workload::{
        legacy_controller_ref, ApplicationControllerBuilder, WorkloadKind, CONTROLLER_REPLICAS_ENV,
    };

    fn controller(spec: &ArgoCDSpec) -> ManagedWorkload {
        let desired = ApplicationControllerBuilder::new("argocd", "argocd", spec).build();
        ManagedWorkload::new(desired, spec.controller_enabled())
            .with_legacy(legacy_controller_ref("argocd", "argocd"))
    }

    fn legacy_deployment() -> Workload {
        Workload::new(
            WorkloadKind::Deployment,
            ObjectMeta::new("argocd-application-controller", "argocd"),
        )
    }

    fn conflict() -> Error {
        Error::Kube {
            source: kube::Error::Api(kube::error::ErrorResponse {
                status: "Failure".to_string(),
                message: "conflict".to_string(),
                reason: "Conflict".to_string(),
                code: 409,
            }),
        }
    }

    #[test]
    fn transition_table() {
        assert_eq!(Transition::decide(false, false), Transition::Noop);
        assert_eq!(Transition::decide(false, true), Transition::Create);
        assert_eq!(Transition::decide(true, true), Transition::Converge);
        assert_eq!(Transition::decide(true, false), Transition::Delete);
    }

    // =========================================================================
    // Stories
    // =========================================================================

    #[tokio::test]
    async fn story_disabled_and_absent_is_a_noop() {
        let store = Arc::new(MemoryStore::default());
        let coordinator = LifecycleCoordinator::new(store.clone());
        let mut spec = ArgoCDSpec::default();
        spec.controller.enabled = Some(false);

        let outcome = coordinator
            .reconcile(&controller(&spec))
            .await
            .expect("reconcile should succeed");

        assert_eq!(outcome, Outcome::Unchanged);
        assert!(store.is_empty());
        assert!(store.mutations().is_empty());
    }

    #[tokio::test]
    async fn story_create_then_idempotent_noop() {
        let store = Arc::new(MemoryStore::default());
        let coordinator = LifecycleCoordinator::new(store.clone());
        let managed = controller(&ArgoCDSpec::default());

        let first = coordinator.reconcile(&managed).await.expect("create");
        assert_eq!(first, Outcome::Created);
        assert_eq!(store.get_sync(&managed.target()), Some(managed.desired.clone()));

        let second = coordinator.reconcile(&managed).await.expect("noop");
        assert_eq!(second, Outcome::Unchanged);
        assert_eq!(store.mutations(), vec![StoreCall::Create(managed.target())]);
    }

    #[tokio::test]
    async fn story_toggle_reproduces_same_object() {
        let store = Arc::new(MemoryStore::default());
        let coordinator = LifecycleCoordinator::new(store.clone());
        let mut spec = ArgoCDSpec::default();
        let target = controller(&spec).target();

        coordinator.reconcile(&controller(&spec)).await.expect("create");
        let first = store.get_sync(&target);

        spec.controller.enabled = Some(false);
        let outcome = coordinator.reconcile(&controller(&spec)).await.expect("delete");
        assert_eq!(outcome, Outcome::Deleted);
        assert!(store.get_sync(&target).is_none());

        spec.controller.enabled = Some(true);
        coordinator.reconcile(&controller(&spec)).await.expect("recreate");
        assert_eq!(store.get_sync(&target), first);
    }

    #[tokio::test]
    async fn story_legacy_deployment_is_migrated() {
        let store = Arc::new(MemoryStore::with_objects([legacy_deployment()]));
        let coordinator = LifecycleCoordinator::new(store.clone());
        let managed = controller(&ArgoCDSpec::default());

        let outcome = coordinator.reconcile(&managed).await.expect("migrate");

        assert_eq!(outcome, Outcome::Migrated);
        assert!(store
            .get_sync(&legacy_controller_ref("argocd", "argocd"))
            .is_none());
        assert_eq!(store.get_sync(&managed.target()), Some(managed.desired.clone()));
        assert_eq!(
            store.mutations(),
            vec![
                StoreCall::Delete(legacy_controller_ref("argocd", "argocd")),
                StoreCall::Create(managed.target()),
            ]
        );
    }

    #[tokio::test]
    async fn story_spec_change_updates_in_place() {
        let store = Arc::new(MemoryStore::default());
        let coordinator = LifecycleCoordinator::new(store.clone());
        let mut spec = ArgoCDSpec::default();
        coordinator.reconcile(&controller(&spec)).await.expect("create");

        spec.controller.sharding = ShardSpec {
            enabled: true,
            replicas: 3,
        };
        let managed = controller(&spec);
        let outcome = coordinator.reconcile(&managed).await.expect("update");

        assert_eq!(
            outcome,
            Outcome::Updated(vec![FieldGroup::Replicas, FieldGroup::Env])
        );
        let stored = store.get_sync(&managed.target()).expect("object present");
        assert_eq!(stored.spec.replicas, Some(3));
        assert!(!stored
            .spec
            .template
            .metadata
            .labels
            .contains_key(LABEL_IMAGE_UPGRADED));

        // converged: nothing more to do
        let again = coordinator.reconcile(&managed).await.expect("noop");
        assert_eq!(again, Outcome::Unchanged);
    }

    #[tokio::test]
    async fn story_sharding_disabled_drops_replica_env() {
        let store = Arc::new(MemoryStore::default());
        let coordinator = LifecycleCoordinator::new(store.clone());
        let mut spec = ArgoCDSpec::default();
        spec.controller.sharding = ShardSpec {
            enabled: true,
            replicas: 2,
        };
        coordinator.reconcile(&controller(&spec)).await.expect("create");

        spec.controller.sharding = ShardSpec::default();
        let managed = controller(&spec);
        let outcome = coordinator.reconcile(&managed).await.expect("update");
        assert_eq!(
            outcome,
            Outcome::Updated(vec![FieldGroup::Replicas, FieldGroup::Env])
        );

        let stored = store.get_sync(&managed.target()).expect("object present");
        let container = stored.primary_container().expect("controller container");
        assert!(container
            .env
            .iter()
            .all(|var| var.name != CONTROLLER_REPLICAS_ENV));

        let again = coordinator.reconcile(&managed).await.expect("noop");
        assert_eq!(again, Outcome::Unchanged);
        assert_eq!(
            store.mutations(),
            vec![
                StoreCall::Create(managed.target()),
                StoreCall::Update(managed.target()),
            ]
        );
    }

    #[tokio::test]
    async fn story_labels_from_other_writers_survive_update() {
        let store = Arc::new(MemoryStore::default());
        let coordinator = LifecycleCoordinator::new(store.clone());
        let mut spec = ArgoCDSpec::default();
        let managed = controller(&spec);
        coordinator.reconcile(&managed).await.expect("create");

        let mut labelled = managed.desired.clone();
        labelled
            .metadata
            .labels
            .insert("team".to_string(), "platform".to_string());
        store.insert(labelled);

        spec.controller.log_level = Some("debug".to_string());
        let managed = controller(&spec);
        let outcome = coordinator.reconcile(&managed).await.expect("update");
        assert_eq!(outcome, Outcome::Updated(vec![FieldGroup::Command]));

        let stored = store.get_sync(&managed.target()).expect("object present");
        assert_eq!(
            stored.metadata.labels.get("team").map(String::as_str),
            Some("platform")
        );
    }

    #[tokio::test]
    async fn story_image_change_stamps_upgrade_label() {
        let store = Arc::new(MemoryStore::default());
        let coordinator = LifecycleCoordinator::new(store.clone());
        let mut spec = ArgoCDSpec::default();
        coordinator.reconcile(&controller(&spec)).await.expect("create");

        spec.version = Some("v2.11.0".to_string());
        let managed = controller(&spec);
        let outcome = coordinator.reconcile(&managed).await.expect("update");
        assert_eq!(outcome, Outcome::Updated(vec![FieldGroup::Image]));

        let stored = store.get_sync(&managed.target()).expect("object present");
        let stamp = stored
            .spec
            .template
            .metadata
            .labels
            .get(LABEL_IMAGE_UPGRADED)
            .expect("stamp should be set");
        assert!(chrono::NaiveDateTime::parse_from_str(stamp, IMAGE_UPGRADED_FORMAT).is_ok());

        // the stamp alone must not trigger another write
        let again = coordinator.reconcile(&managed).await.expect("noop");
        assert_eq!(again, Outcome::Unchanged);
    }

    #[tokio::test]
    async fn story_out_of_band_edit_is_reverted() {
        let store = Arc::new(MemoryStore::default());
        let coordinator = LifecycleCoordinator::new(store.clone());
        let managed = controller(&ArgoCDSpec::default());
        coordinator.reconcile(&managed).await.expect("create");

        let mut edited = managed.desired.clone();
        edited.spec.template.spec.containers[0].command = Some(vec!["sh".to_string()]);
        store.insert(edited);

        let outcome = coordinator.reconcile(&managed).await.expect("update");
        assert_eq!(outcome, Outcome::Updated(vec![FieldGroup::Command]));
        assert_eq!(store.get_sync(&managed.target()), Some(managed.desired.clone()));
    }

    #[tokio::test]
    async fn story_recreate_issues_single_delete() {
        let store = Arc::new(MemoryStore::default());
        let coordinator = LifecycleCoordinator::new(store.clone());
        let managed = controller(&ArgoCDSpec::default());
        coordinator.reconcile(&managed).await.expect("create");

        let outcome = coordinator
            .reconcile(&managed.clone().with_recreate(true))
            .await
            .expect("recreate");
        assert_eq!(outcome, Outcome::Recreating);
        assert!(store.get_sync(&managed.target()).is_none());
        assert_eq!(
            store.mutations(),
            vec![
                StoreCall::Create(managed.target()),
                StoreCall::Delete(managed.target()),
            ]
        );
    }

    #[tokio::test]
    async fn story_recreate_on_absent_object_creates() {
        let store = Arc::new(MemoryStore::default());
        let coordinator = LifecycleCoordinator::new(store.clone());
        let managed = controller(&ArgoCDSpec::default()).with_recreate(true);

        let outcome = coordinator.reconcile(&managed).await.expect("create");
        assert_eq!(outcome, Outcome::Created);
    }

    // =========================================================================
    // Error propagation
    // =========================================================================

    #[tokio::test]
    async fn delete_not_found_is_swallowed() {
        let mut mock = MockObjectStore::new();
        let actual = controller(&ArgoCDSpec::default()).desired;
        mock.expect_get()
            .returning(move |_| Ok(Some(actual.clone())));
        mock.expect_delete().times(1).returning(|target| {
            Err(Error::not_found(
                target.kind.as_str(),
                &target.name,
                &target.namespace,
            ))
        });

        let coordinator = LifecycleCoordinator::new(Arc::new(mock));
        let mut spec = ArgoCDSpec::default();
        spec.controller.enabled = Some(false);

        let outcome = coordinator
            .reconcile(&controller(&spec))
            .await
            .expect("not found on delete is not an error");
        assert_eq!(outcome, Outcome::Deleted);
    }

    #[tokio::test]
    async fn update_conflict_is_propagated_without_retry() {
        let mut mock = MockObjectStore::new();
        let mut actual = controller(&ArgoCDSpec::default()).desired;
        actual.spec.replicas = Some(5);
        mock.expect_get()
            .returning(move |_| Ok(Some(actual.clone())));
        mock.expect_update().times(1).returning(|_| Err(conflict()));
        mock.expect_create().never();
        mock.expect_delete().never();

        let coordinator = LifecycleCoordinator::new(Arc::new(mock));
        let err = coordinator
            .reconcile(&controller(&ArgoCDSpec::default()))
            .await
            .expect_err("conflict should propagate");
        assert!(matches!(
            err,
            Error::Kube { source: kube::Error::Api(ref ae) } if ae.code == 409
        ));
    }

    #[tokio::test]
    async fn get_failure_stops_before_any_mutation() {
        let mut mock = MockObjectStore::new();
        mock.expect_get()
            .returning(|_| Err(Error::internal_with_context("connection reset", "store")));
        mock.expect_create().never();
        mock.expect_update().never();
        mock.expect_delete().never();

        let coordinator = LifecycleCoordinator::new(Arc::new(mock));
        let err = coordinator
            .reconcile(&controller(&ArgoCDSpec::default()))
            .await
            .expect_err("get failure should propagate");
        assert!(err.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn legacy_delete_failure_blocks_create() {
        let mut mock = MockObjectStore::new();
        mock.expect_get().returning(|target| {
            if target.kind == WorkloadKind::Deployment {
                Ok(Some(legacy_deployment()))
            } else {
                Ok(None)
            }
        });
        mock.expect_delete().times(1).returning(|_| Err(conflict()));
        mock.expect_create().never();

        let coordinator = LifecycleCoordinator::new(Arc::new(mock));
        let result = coordinator
            .reconcile(&controller(&ArgoCDSpec::default()))
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn outcome_display_lists_fields() {
        let outcome = Outcome::Updated(vec![FieldGroup::Replicas, FieldGroup::Env]);
        assert_eq!(outcome.to_string(), "updated [replicas, env]");
        assert!(outcome.mutated());
        assert!(!Outcome::Unchanged.mutated());
    }
}
