//! ArgoCDExport CRD types
//!
//! Only the fields the import init container needs are modelled; the export
//! job itself is run by a different controller.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::combine_image_tag;

/// Default image of the export/import utility
pub const DEFAULT_EXPORT_IMAGE: &str = "quay.io/argoprojlabs/argocd-operator-util";

/// Default tag of the export/import utility
pub const DEFAULT_EXPORT_VERSION: &str = "latest";

/// Storage backend used when none is configured
pub const DEFAULT_EXPORT_BACKEND: &str = "local";

/// Specification of an Argo CD export
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "argoproj.io",
    version = "v1alpha1",
    kind = "ArgoCDExport",
    plural = "argocdexports",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDExportSpec {
    /// Utility image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Utility tag or digest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Where the export archive is stored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<ExportStorageSpec>,
}

/// Export storage settings
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportStorageSpec {
    /// local, aws, azure or gcp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,

    /// Secret with backend credentials and the archive password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
}

impl ArgoCDExportSpec {
    /// Full utility image reference
    pub fn util_image(&self) -> String {
        combine_image_tag(
            self.image.as_deref().unwrap_or(DEFAULT_EXPORT_IMAGE),
            self.version.as_deref().unwrap_or(DEFAULT_EXPORT_VERSION),
        )
    }

    /// Storage backend name
    pub fn backend(&self) -> &str {
        self.storage
            .as_ref()
            .and_then(|s| s.backend.as_deref())
            .unwrap_or(DEFAULT_EXPORT_BACKEND)
    }

    /// Name of the secret holding backend credentials for the given export
    pub fn secret_name(&self, export_name: &str) -> String {
        self.storage
            .as_ref()
            .and_then(|s| s.secret_name.clone())
            .unwrap_or_else(|| format!("{}-export", export_name))
    }
}
