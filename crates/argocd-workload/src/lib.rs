//! Workload compilation and comparison for the Argo CD operator
//!
//! Everything in this crate is pure: builders turn an `ArgoCD` spec into
//! [`Workload`] descriptors, and [`diff::detect`] decides whether a stored
//! descriptor needs rewriting. Store access lives in the operator crate.

pub mod builder;
pub mod diff;
pub mod k8s;
pub mod merge;
pub mod redis_ha;
pub mod sharding;
pub mod workload;

pub use builder::{
    application_controller_command, legacy_controller_ref, ApplicationControllerBuilder,
    ImportSource,
};
pub use diff::{detect, ChangeSet, FieldGroup};
pub use merge::Merged;
pub use redis_ha::{build_redis_ha, redis_ha_ref};
pub use sharding::{ShardPlan, CONTROLLER_REPLICAS_ENV};
pub use workload::{Workload, WorkloadKind, WorkloadRef};
