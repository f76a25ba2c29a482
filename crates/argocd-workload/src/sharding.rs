//! Application controller sharding
//!
//! Replica count and the shard-count environment variable always move
//! together: the variable exists iff sharding is enabled and carries the
//! replica count the StatefulSet is created with.

use argocd_common::crd::ShardSpec;

use crate::k8s::EnvVar;

/// Environment variable telling each controller replica how many shards exist
pub const CONTROLLER_REPLICAS_ENV: &str = "ARGOCD_CONTROLLER_REPLICAS";

/// Replica count and environment derived from a sharding policy
#[derive(Clone, Debug, PartialEq)]
pub struct ShardPlan {
    /// StatefulSet replica count
    pub replicas: i32,
    /// Environment variables to inject into the controller container
    pub env: Vec<EnvVar>,
}

/// Plan replicas and shard environment for the application controller
///
/// The configured replica count is used as-is; validating it against cluster
/// capacity is left to admission.
pub fn plan(policy: &ShardSpec) -> ShardPlan {
    if !policy.enabled {
        return ShardPlan {
            replicas: 1,
            env: Vec::new(),
        };
    }

    ShardPlan {
        replicas: policy.replicas,
        env: vec![EnvVar::literal(
            CONTROLLER_REPLICAS_ENV,
            policy.replicas.to_string(),
        )],
    }
}
