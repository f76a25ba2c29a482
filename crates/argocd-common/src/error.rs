//! Error types for the Argo CD operator
//!
//! Errors are structured with fields so a failed reconciliation can be traced
//! back to the object and store call that caused it.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for operator operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// The addressed object does not exist in the store
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        /// Object kind (StatefulSet, Deployment, ...)
        kind: String,
        /// Object name
        name: String,
        /// Object namespace
        namespace: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized (if known)
        kind: Option<String>,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "reconciler", "store")
        context: String,
    },
}

impl Error {
    /// Create a not-found error for the given object
    pub fn not_found(
        kind: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error for a specific resource kind
    pub fn serialization_for(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(msg: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Whether this error means the addressed object is absent
    ///
    /// Covers both the store-level [`Error::NotFound`] and a raw 404 from the
    /// API server that was not yet translated.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound { .. } => true,
            Error::Kube {
                source: kube::Error::Api(ae),
            } => ae.code == 404,
            _ => false,
        }
    }

    /// Check if this error is retryable
    ///
    /// Transient kube errors (connection, timeout, 5xx) are retryable, as are
    /// 409 conflicts from a stale read and 429 throttling. Other 4xx API errors
    /// and serialization errors need a spec or cluster change.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => match source {
                kube::Error::Api(ae) => {
                    matches!(ae.code, 409 | 429) || !(400..500).contains(&ae.code)
                }
                _ => true,
            },
            Error::NotFound { .. } => true,
            Error::Serialization { .. } => false,
            Error::Internal { .. } => true,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::serialization(e.to_string())
    }
}
