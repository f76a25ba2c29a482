//! Custom Resource Definitions consumed by the operator
//!
//! - [`ArgoCD`] describes one Argo CD instance and drives every managed workload
//! - [`ArgoCDExport`] is looked up when an instance imports a previous backup

mod argocd;
mod export;
mod types;

pub use argocd::{
    ApplicationControllerSpec, ArgoCD, ArgoCDSpec, HaSpec, ImportSpec, ProcessorsSpec, RedisSpec,
    RepoSpec, ShardSpec, DEFAULT_ARGOCD_IMAGE, DEFAULT_ARGOCD_VERSION,
    DEFAULT_KUBECTL_PARALLELISM_LIMIT, DEFAULT_LOG_FORMAT, DEFAULT_LOG_LEVEL,
    DEFAULT_OPERATION_PROCESSORS, DEFAULT_REDIS_HA_VERSION, DEFAULT_REDIS_IMAGE,
    DEFAULT_STATUS_PROCESSORS,
};
pub use export::{
    ArgoCDExport, ArgoCDExportSpec, ExportStorageSpec, DEFAULT_EXPORT_BACKEND,
    DEFAULT_EXPORT_IMAGE, DEFAULT_EXPORT_VERSION,
};
pub use types::{
    combine_image_tag, NodePlacementSpec, ResourceQuantity, ResourceRequirements, Toleration,
};
