//! Tracing initialization
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` and either a
//! human readable or a JSON formatter.

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "info,argocd=debug,kube=info,tower=warn,hyper=warn";

/// Errors that can occur during tracing initialization
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Failed to install the global subscriber
    #[error("failed to initialize tracing subscriber: {0}")]
    SubscriberInit(String),
}

/// Output format for operator logs
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human readable single-line output
    #[default]
    Text,
    /// JSON structured output with the current span
    Json,
}

/// Initialize the global tracing subscriber
///
/// Reads the filter from `RUST_LOG`, falling back to [`DEFAULT_LOG_FILTER`].
pub fn init_tracing(format: LogFormat) -> Result<(), TelemetryError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_target(true),
            )
            .try_init(),
    };

    result.map_err(|e: tracing_subscriber::util::TryInitError| {
        TelemetryError::SubscriberInit(e.to_string())
    })
}
