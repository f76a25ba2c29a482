//! Operator command line and environment configuration

use std::time::Duration;

use argocd_common::telemetry::LogFormat;
use clap::Parser;

/// Default field manager for server-side apply
pub const DEFAULT_FIELD_MANAGER: &str = "argocd-operator";

/// Argo CD operator - reconciles application controller StatefulSets
#[derive(Parser, Debug, Clone)]
#[command(name = "argocd-operator", version, about, long_about = None)]
pub struct OperatorConfig {
    /// Print CRD manifests and exit
    #[arg(long)]
    pub crd: bool,

    /// Only watch ArgoCD resources in this namespace
    #[arg(long, env = "WATCH_NAMESPACE")]
    pub namespace: Option<String>,

    /// Field manager used for server-side apply
    #[arg(long, env = "ARGOCD_FIELD_MANAGER", default_value = DEFAULT_FIELD_MANAGER)]
    pub field_manager: String,

    /// Seconds between periodic reconciliations
    #[arg(long, env = "ARGOCD_REQUEUE_SECS", default_value_t = 300)]
    pub requeue_secs: u64,

    /// Seconds before retrying a failed reconciliation
    #[arg(long, env = "ARGOCD_ERROR_REQUEUE_SECS", default_value_t = 30)]
    pub error_requeue_secs: u64,

    /// Log output format
    #[arg(long, env = "ARGOCD_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl OperatorConfig {
    /// Periodic requeue interval
    pub fn requeue(&self) -> Duration {
        Duration::from_secs(self.requeue_secs)
    }

    /// Requeue interval after a retryable failure
    pub fn error_requeue(&self) -> Duration {
        Duration::from_secs(self.error_requeue_secs)
    }
}
