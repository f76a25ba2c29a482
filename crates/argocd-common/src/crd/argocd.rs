//! ArgoCD CRD types
//!
//! `ArgoCD` is the declarative input of every reconciliation. Accessors on the
//! spec resolve optional fields to their documented defaults so workload
//! builders never invent values of their own.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{combine_image_tag, NodePlacementSpec, ResourceRequirements};

/// Default Argo CD container image
pub const DEFAULT_ARGOCD_IMAGE: &str = "quay.io/argoproj/argocd";

/// Default Argo CD image tag
pub const DEFAULT_ARGOCD_VERSION: &str = "v2.10.3";

/// Default redis image
pub const DEFAULT_REDIS_IMAGE: &str = "redis";

/// Default redis tag for the HA StatefulSet
pub const DEFAULT_REDIS_HA_VERSION: &str = "6.2.4-alpine";

/// Default `--operation-processors`
pub const DEFAULT_OPERATION_PROCESSORS: i32 = 10;

/// Default `--status-processors`
pub const DEFAULT_STATUS_PROCESSORS: i32 = 20;

/// Default `--kubectl-parallelism-limit`
pub const DEFAULT_KUBECTL_PARALLELISM_LIMIT: i32 = 10;

/// Default `--loglevel`
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default `--logformat`
pub const DEFAULT_LOG_FORMAT: &str = "text";

/// Specification of an Argo CD instance
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "argoproj.io",
    version = "v1alpha1",
    kind = "ArgoCD",
    plural = "argocds",
    shortname = "argocd",
    namespaced,
    printcolumn = r#"{"name":"HA","type":"boolean","jsonPath":".spec.ha.enabled"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDSpec {
    /// Container image for Argo CD components
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Tag or digest for Argo CD components
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// High availability settings
    #[serde(default)]
    pub ha: HaSpec,

    /// Redis settings
    #[serde(default)]
    pub redis: RedisSpec,

    /// Repo server settings
    #[serde(default)]
    pub repo: RepoSpec,

    /// Application controller settings
    #[serde(default)]
    pub controller: ApplicationControllerSpec,

    /// Restore state from an ArgoCDExport on first start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import: Option<ImportSpec>,

    /// Node selector and tolerations applied to every component
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_placement: Option<NodePlacementSpec>,
}

/// High availability settings
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HaSpec {
    /// Run redis as a replicated StatefulSet behind HAProxy
    #[serde(default)]
    pub enabled: bool,

    /// Resources for the redis HA containers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
}

/// Redis settings
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RedisSpec {
    /// Redis container image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Redis tag or digest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Address of an externally managed redis (`host:port`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
}

/// Repo server settings
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RepoSpec {
    /// Address of an externally managed repo server (`host:port`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
}

/// Application controller settings
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationControllerSpec {
    /// Whether the application controller StatefulSet exists (default true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Reconciliation worker counts
    #[serde(default)]
    pub processors: ProcessorsSpec,

    /// Maximum concurrent kubectl invocations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallelism_limit: Option<i32>,

    /// Controller log level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Controller log format (text or json)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_format: Option<String>,

    /// Resources for the controller container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    /// Sharding policy
    #[serde(default)]
    pub sharding: ShardSpec,
}

/// Reconciliation worker counts
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorsSpec {
    /// Operation processors (`--operation-processors`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<i32>,

    /// Status processors (`--status-processors`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<i32>,
}

/// Sharding policy for the application controller
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShardSpec {
    /// Split clusters across controller replicas
    #[serde(default)]
    pub enabled: bool,

    /// Number of shards; only honored while sharding is enabled
    #[serde(default)]
    pub replicas: i32,
}

/// Reference to the export to import from
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImportSpec {
    /// Name of the ArgoCDExport
    pub name: String,

    /// Namespace of the ArgoCDExport (defaults to the instance namespace)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ArgoCDSpec {
    /// Full Argo CD image reference
    pub fn argocd_image(&self) -> String {
        combine_image_tag(
            self.image.as_deref().unwrap_or(DEFAULT_ARGOCD_IMAGE),
            self.version.as_deref().unwrap_or(DEFAULT_ARGOCD_VERSION),
        )
    }

    /// Full redis HA image reference
    pub fn redis_ha_image(&self) -> String {
        combine_image_tag(
            self.redis.image.as_deref().unwrap_or(DEFAULT_REDIS_IMAGE),
            self.redis
                .version
                .as_deref()
                .unwrap_or(DEFAULT_REDIS_HA_VERSION),
        )
    }

    /// Whether the application controller StatefulSet should exist
    pub fn controller_enabled(&self) -> bool {
        self.controller.enabled.unwrap_or(true)
    }
}

impl ApplicationControllerSpec {
    /// `--operation-processors` value
    pub fn operation_processors(&self) -> i32 {
        self.processors
            .operation
            .unwrap_or(DEFAULT_OPERATION_PROCESSORS)
    }

    /// `--status-processors` value
    pub fn status_processors(&self) -> i32 {
        self.processors.status.unwrap_or(DEFAULT_STATUS_PROCESSORS)
    }

    /// `--kubectl-parallelism-limit` value
    pub fn parallelism_limit(&self) -> i32 {
        self.parallelism_limit
            .unwrap_or(DEFAULT_KUBECTL_PARALLELISM_LIMIT)
    }

    /// `--loglevel` value
    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    /// `--logformat` value
    pub fn log_format(&self) -> &str {
        self.log_format.as_deref().unwrap_or(DEFAULT_LOG_FORMAT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::CustomResourceExt;

    #[test]
    fn empty_spec_resolves_to_defaults() {
        let spec: ArgoCDSpec = serde_json::from_value(serde_json::json!({}))
            .expect("empty spec should deserialize");
        assert!(!spec.ha.enabled);
        assert!(spec.controller_enabled());
        assert_eq!(spec.controller.operation_processors(), 10);
        assert_eq!(spec.controller.status_processors(), 20);
        assert_eq!(spec.controller.parallelism_limit(), 10);
        assert_eq!(spec.controller.log_level(), "info");
        assert_eq!(spec.controller.log_format(), "text");
        assert_eq!(spec.argocd_image(), "quay.io/argoproj/argocd:v2.10.3");
        assert_eq!(spec.redis_ha_image(), "redis:6.2.4-alpine");
    }

    #[test]
    fn camel_case_fields_deserialize() {
        let spec: ArgoCDSpec = serde_json::from_value(serde_json::json!({
            "controller": {
                "processors": { "operation": 5, "status": 30 },
                "parallelismLimit": 4,
                "logLevel": "debug",
                "sharding": { "enabled": true, "replicas": 3 }
            },
            "nodePlacement": {
                "nodeSelector": { "disk": "ssd" },
                "tolerations": [{ "key": "k", "effect": "NoSchedule" }]
            }
        }))
        .expect("spec should deserialize");

        assert_eq!(spec.controller.operation_processors(), 5);
        assert_eq!(spec.controller.status_processors(), 30);
        assert_eq!(spec.controller.parallelism_limit(), 4);
        assert_eq!(spec.controller.log_level(), "debug");
        assert!(spec.controller.sharding.enabled);
        assert_eq!(spec.controller.sharding.replicas, 3);
        let placement = spec.node_placement.expect("node placement should be set");
        assert_eq!(placement.node_selector.get("disk").map(String::as_str), Some("ssd"));
        assert_eq!(placement.tolerations.len(), 1);
    }

    #[test]
    fn redis_overrides_apply_to_ha_image() {
        let spec = ArgoCDSpec {
            redis: RedisSpec {
                image: Some("redis".to_string()),
                version: Some("test".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(spec.redis_ha_image(), "redis:test");
    }

    #[test]
    fn crd_has_expected_identity() {
        let crd = ArgoCD::crd();
        assert_eq!(crd.spec.group, "argoproj.io");
        assert_eq!(crd.spec.names.kind, "ArgoCD");
        assert_eq!(crd.spec.scope, "Namespaced");
        let yaml = serde_yaml::to_string(&crd).expect("crd should serialize");
        assert!(yaml.contains("argocds.argoproj.io"));
    }
}
