//! Argo CD operator: keeps application controller StatefulSets converged
//!
//! - [`store`]: object store trait and its kube-backed implementation
//! - [`cluster`]: read-only lookups (TLS secret, export, controller pods)
//! - [`lifecycle`]: create / update / delete / migrate arbitration
//! - [`controller`]: reconcile entry point and error policy

pub mod cluster;
pub mod config;
pub mod controller;
pub mod instance;
pub mod lifecycle;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use config::OperatorConfig;
pub use controller::{error_policy, reconcile, Context};
pub use lifecycle::{LifecycleCoordinator, ManagedWorkload, Outcome, Transition};
pub use store::{KubeObjectStore, ObjectStore};
