//! Workload descriptors: the StatefulSet (and legacy Deployment) objects the
//! operator creates, compares and deletes.
//!
//! The same type describes both sides of a reconciliation. The desired side is
//! compiled fresh from the `ArgoCD` spec every time; the actual side is
//! deserialized from whatever the store returns.

use std::collections::BTreeMap;
use std::fmt;

use argocd_common::kube_utils::ObjectMeta;
use serde::{Deserialize, Serialize};

use crate::k8s::{Container, LabelSelector, Toleration, Volume};

/// Object kinds the engine manages
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WorkloadKind {
    /// `apps/v1` StatefulSet, the current architecture
    StatefulSet,
    /// `apps/v1` Deployment, the legacy kind replaced by a StatefulSet
    Deployment,
}

impl WorkloadKind {
    /// apiVersion for this kind
    pub fn api_version(&self) -> &'static str {
        "apps/v1"
    }

    /// Kind string as it appears in manifests
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StatefulSet => "StatefulSet",
            Self::Deployment => "Deployment",
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Store key of a workload: kind plus namespaced name
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkloadRef {
    /// Object kind
    pub kind: WorkloadKind,
    /// Object name
    pub name: String,
    /// Object namespace
    pub namespace: String,
}

impl WorkloadRef {
    /// Create a reference
    pub fn new(kind: WorkloadKind, name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

impl fmt::Display for WorkloadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

// =============================================================================
// Workload
// =============================================================================

/// A StatefulSet or Deployment
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Workload {
    /// API version
    pub api_version: String,
    /// Kind
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    pub spec: WorkloadSpec,
}

impl Workload {
    /// Create an empty workload of the given kind
    pub fn new(kind: WorkloadKind, metadata: ObjectMeta) -> Self {
        Self {
            api_version: kind.api_version().to_string(),
            kind: kind.as_str().to_string(),
            metadata,
            spec: WorkloadSpec::default(),
        }
    }

    /// Parsed kind, if it is one the engine manages
    pub fn workload_kind(&self) -> Option<WorkloadKind> {
        match self.kind.as_str() {
            "StatefulSet" => Some(WorkloadKind::StatefulSet),
            "Deployment" => Some(WorkloadKind::Deployment),
            _ => None,
        }
    }

    /// Store key of this workload
    ///
    /// Objects with an unrecognised kind are keyed as StatefulSets; the store
    /// only ever hands back kinds it was asked for.
    pub fn object_ref(&self) -> WorkloadRef {
        WorkloadRef::new(
            self.workload_kind().unwrap_or(WorkloadKind::StatefulSet),
            self.metadata.name.clone(),
            self.metadata.namespace.clone(),
        )
    }

    /// First regular container, if any
    pub fn primary_container(&self) -> Option<&Container> {
        self.spec.template.spec.containers.first()
    }
}

/// Workload spec (union of the StatefulSet and Deployment fields we manage)
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadSpec {
    /// Number of replicas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    /// Label selector (immutable after creation)
    #[serde(default)]
    pub selector: LabelSelector,
    /// Governing headless service (StatefulSet only, immutable)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    /// Pod template
    #[serde(default)]
    pub template: PodTemplateSpec,
}

/// Pod template spec
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodTemplateSpec {
    /// Pod metadata
    #[serde(default)]
    pub metadata: PodMeta,
    /// Pod spec
    #[serde(default)]
    pub spec: PodSpec,
}

/// Pod metadata (subset of ObjectMeta)
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodMeta {
    /// Labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

/// Pod spec
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    /// Service account name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,
    /// Containers
    #[serde(default)]
    pub containers: Vec<Container>,
    /// Init containers (run before main containers)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub init_containers: Vec<Container>,
    /// Volumes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,
    /// Node selector
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,
    /// Tolerations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,
}
