//! Kubernetes pod-level types used by the workload descriptors
//!
//! A deliberately small subset of `core/v1`: exactly the fields the builders
//! write and the change detector compares. Unknown fields on objects read
//! back from the API server are ignored.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// =============================================================================
// Container
// =============================================================================

/// Container spec
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    /// Container name
    pub name: String,
    /// Image
    pub image: String,
    /// Pull policy; not compared during change detection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,
    /// Command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    /// Args
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    /// Environment variables
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
    /// Ports
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ContainerPort>,
    /// Resource requirements
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    /// Volume mounts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_mounts: Vec<VolumeMount>,
}

/// Container environment variable
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub struct EnvVar {
    /// Variable name
    pub name: String,
    /// Value; absent and empty are treated alike
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Indirect source, preserved when read back from the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_from: Option<EnvVarSource>,
}

impl EnvVar {
    /// Env var with a plain value
    pub fn literal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            value_from: None,
        }
    }
}

/// Indirect env value source
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub struct EnvVarSource {
    /// Secret key reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key_ref: Option<SecretKeySelector>,
}

/// Key of a Secret
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeySelector {
    /// Secret name
    pub name: String,
    /// Key
    pub key: String,
}

/// Container port
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPort {
    /// Port name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Port number
    pub container_port: u16,
}

impl ContainerPort {
    /// Create a named TCP port
    pub fn named(name: impl Into<String>, port: u16) -> Self {
        Self {
            name: Some(name.into()),
            container_port: port,
        }
    }
}

// =============================================================================
// Resource requirements
// =============================================================================

/// Resource requirements
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequirements {
    /// Requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests: Option<ResourceQuantity>,
    /// Limits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<ResourceQuantity>,
}

/// Resource quantity
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ResourceQuantity {
    /// CPU quantity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    /// Memory quantity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
}

impl From<&argocd_common::crd::ResourceQuantity> for ResourceQuantity {
    fn from(rq: &argocd_common::crd::ResourceQuantity) -> Self {
        Self {
            cpu: rq.cpu.clone(),
            memory: rq.memory.clone(),
        }
    }
}

impl From<&argocd_common::crd::ResourceRequirements> for ResourceRequirements {
    fn from(rr: &argocd_common::crd::ResourceRequirements) -> Self {
        Self {
            requests: rr.requests.as_ref().map(ResourceQuantity::from),
            limits: rr.limits.as_ref().map(ResourceQuantity::from),
        }
    }
}

// =============================================================================
// Volumes
// =============================================================================

/// Volume
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    /// Volume name
    pub name: String,
    /// Secret source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<SecretVolumeSource>,
    /// EmptyDir source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty_dir: Option<EmptyDirVolumeSource>,
    /// PVC source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_volume_claim: Option<PvcVolumeSource>,
}

impl Volume {
    /// Create a Volume backed by a Secret that may be absent
    pub fn from_optional_secret(name: impl Into<String>, secret_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            secret: Some(SecretVolumeSource {
                secret_name: secret_name.into(),
                optional: Some(true),
            }),
            empty_dir: None,
            persistent_volume_claim: None,
        }
    }

    /// Create a Volume backed by a Secret that must exist
    pub fn from_secret(name: impl Into<String>, secret_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            secret: Some(SecretVolumeSource {
                secret_name: secret_name.into(),
                optional: None,
            }),
            empty_dir: None,
            persistent_volume_claim: None,
        }
    }

    /// Create a Volume backed by an emptyDir
    pub fn from_empty_dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            secret: None,
            empty_dir: Some(EmptyDirVolumeSource::default()),
            persistent_volume_claim: None,
        }
    }

    /// Create a Volume backed by a PVC
    pub fn from_pvc(name: impl Into<String>, claim_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            secret: None,
            empty_dir: None,
            persistent_volume_claim: Some(PvcVolumeSource {
                claim_name: claim_name.into(),
            }),
        }
    }
}

/// Secret volume source
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecretVolumeSource {
    /// Secret name
    pub secret_name: String,
    /// Let the pod start when the secret does not exist
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,
}

/// Scratch volume source
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmptyDirVolumeSource {
    /// Medium; unset means node disk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medium: Option<String>,
}

/// PVC volume source
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PvcVolumeSource {
    /// PVC claim name
    pub claim_name: String,
}

/// Volume mount
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMount {
    /// Volume name
    pub name: String,
    /// Mount path
    pub mount_path: String,
    /// Read only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
}

impl VolumeMount {
    /// Mount a volume at a path
    pub fn new(name: impl Into<String>, mount_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mount_path: mount_path.into(),
            read_only: None,
        }
    }
}

// =============================================================================
// Scheduling
// =============================================================================

/// Label selector
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    /// Match labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,
}

/// Kubernetes toleration
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Toleration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toleration_seconds: Option<i64>,
}

impl From<&argocd_common::crd::Toleration> for Toleration {
    fn from(t: &argocd_common::crd::Toleration) -> Self {
        Self {
            key: t.key.clone(),
            operator: t.operator.clone(),
            value: t.value.clone(),
            effect: t.effect.clone(),
            toleration_seconds: t.toleration_seconds,
        }
    }
}
