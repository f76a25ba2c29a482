//! Object metadata shared by every compiled resource

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Standard Kubernetes ObjectMeta for compiled resources.
///
/// Only the fields the operator owns are modelled. Server-populated fields
/// (uid, resourceVersion, managedFields) are dropped on read and never sent.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Resource name
    pub name: String,
    /// Resource namespace
    #[serde(default)]
    pub namespace: String,
    /// Labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Annotations
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// Owner references (garbage collection parent)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,
}

impl ObjectMeta {
    /// Create new metadata carrying the operator's management label
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        let mut labels = BTreeMap::new();
        labels.insert(
            crate::LABEL_MANAGED_BY.to_string(),
            crate::LABEL_MANAGED_BY_OPERATOR.to_string(),
        );
        Self {
            name: name.into(),
            namespace: namespace.into(),
            labels,
            annotations: BTreeMap::new(),
            owner_references: Vec::new(),
        }
    }

    /// Add an owner reference
    pub fn with_owner(mut self, owner: OwnerReference) -> Self {
        self.owner_references.push(owner);
        self
    }
}

/// Reference from a dependent object to its controlling owner
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    /// API version of the owner
    pub api_version: String,
    /// Kind of the owner
    pub kind: String,
    /// Name of the owner
    pub name: String,
    /// UID of the owner
    pub uid: String,
    /// Whether the owner is the managing controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<bool>,
    /// Whether deletion of the owner waits for this object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_owner_deletion: Option<bool>,
}

impl From<k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference> for OwnerReference {
    fn from(r: k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference) -> Self {
        Self {
            api_version: r.api_version,
            kind: r.kind,
            name: r.name,
            uid: r.uid,
            controller: r.controller,
            block_owner_deletion: r.block_owner_deletion,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_metadata_is_marked_as_managed() {
        let meta = ObjectMeta::new("argocd-application-controller", "argocd");
        assert_eq!(
            meta.labels.get(crate::LABEL_MANAGED_BY).map(String::as_str),
            Some(crate::LABEL_MANAGED_BY_OPERATOR)
        );
        assert!(meta.owner_references.is_empty());
    }

    #[test]
    fn server_fields_are_ignored_on_read() {
        let json = serde_json::json!({
            "name": "x",
            "namespace": "y",
            "uid": "1234",
            "resourceVersion": "99",
        });
        let meta: ObjectMeta = serde_json::from_value(json).expect("metadata should parse");
        assert_eq!(meta.name, "x");
        assert_eq!(meta.namespace, "y");
        assert!(meta.labels.is_empty());
    }
}
