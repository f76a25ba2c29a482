//! Value types shared by the operator CRDs

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// CPU and memory quantities, kept as the Kubernetes quantity strings the user wrote
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct ResourceQuantity {
    /// CPU quantity (e.g. "500m")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    /// Memory quantity (e.g. "1Gi")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
}

/// Compute resource requests and limits for a component
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct ResourceRequirements {
    /// Minimum resources the scheduler reserves
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests: Option<ResourceQuantity>,
    /// Maximum resources the container may use
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<ResourceQuantity>,
}

/// A pod toleration, matching the Kubernetes field layout
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Toleration {
    /// Taint key the toleration applies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Equal or Exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    /// Taint value to match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// NoSchedule, PreferNoSchedule or NoExecute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,
    /// How long a NoExecute taint is tolerated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toleration_seconds: Option<i64>,
}

/// Where the instance's pods may be scheduled
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NodePlacementSpec {
    /// Node labels a pod must match
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,
    /// Taints the pods tolerate
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,
}

/// Join an image name and a tag or digest into a pullable reference
///
/// A tag containing `:` is a digest (`sha256:...`) and is joined with `@`.
pub fn combine_image_tag(image: &str, tag: &str) -> String {
    if tag.contains(':') {
        format!("{}@{}", image, tag)
    } else if !tag.is_empty() {
        format!("{}:{}", image, tag)
    } else {
        image.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_is_joined_with_colon() {
        assert_eq!(combine_image_tag("redis", "test"), "redis:test");
    }

    #[test]
    fn digest_is_joined_with_at() {
        assert_eq!(
            combine_image_tag("quay.io/argoproj/argocd", "sha256:abc"),
            "quay.io/argoproj/argocd@sha256:abc"
        );
    }

    #[test]
    fn empty_tag_keeps_image() {
        assert_eq!(combine_image_tag("redis", ""), "redis");
    }
}
