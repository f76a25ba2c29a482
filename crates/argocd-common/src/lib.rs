//! Common types for the Argo CD operator: CRDs, errors, metadata and tracing setup

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod kube_utils;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Well-known labels
// =============================================================================

/// Label carrying the component instance name; used as the pod selector
pub const LABEL_NAME: &str = "app.kubernetes.io/name";

/// Label naming the application a component belongs to
pub const LABEL_PART_OF: &str = "app.kubernetes.io/part-of";

/// Label naming the component role (application-controller, redis, ...)
pub const LABEL_COMPONENT: &str = "app.kubernetes.io/component";

/// Label identifying the tool managing a resource
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Value of [`LABEL_PART_OF`] on every managed resource
pub const LABEL_PART_OF_ARGOCD: &str = "argocd";

/// Value of [`LABEL_MANAGED_BY`] on every managed resource
pub const LABEL_MANAGED_BY_OPERATOR: &str = "argocd-operator";

/// Pod template label stamped with the time of the last image change
pub const LABEL_IMAGE_UPGRADED: &str = "image.upgraded";

/// Annotation tying a shared secret to the ArgoCD instance that owns it
pub const ANNOTATION_ARGOCD_NAME: &str = "argocds.argoproj.io/name";

// =============================================================================
// Well-known object names
// =============================================================================

/// Secret holding the repo-server TLS material
pub const REPO_SERVER_TLS_SECRET: &str = "argocd-repo-server-tls";

/// Secret holding the redis TLS material
pub const REDIS_TLS_SECRET: &str = "argocd-operator-redis-tls";

/// Secret type Kubernetes assigns to TLS key pairs
pub const SECRET_TYPE_TLS: &str = "kubernetes.io/tls";
