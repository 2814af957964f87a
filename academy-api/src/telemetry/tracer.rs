//! Tracing subscriber initialization.
//!
//! JSON output filtered by `RUST_LOG`, falling back to the configured
//! default filter.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ApiError, ApiResult};

const DEFAULT_LOG_FILTER: &str = "academy_api=debug,tower_http=info,info";

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup log line
    pub service_name: String,
    /// Service version
    pub service_version: String,
    /// Filter used when `RUST_LOG` is unset
    pub log_filter: String,
    /// Emit JSON lines instead of human-readable output
    pub json_logs: bool,
    /// Expose `/metrics`
    pub metrics_enabled: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: std::env::var("ACADEMY_SERVICE_NAME")
                .unwrap_or_else(|_| "academy-api".to_string()),
            service_version: std::env::var("ACADEMY_SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_filter: std::env::var("ACADEMY_LOG_FILTER")
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string()),
            json_logs: std::env::var("ACADEMY_LOG_JSON")
                .map(|s| s != "false" && s != "0")
                .unwrap_or(true),
            metrics_enabled: std::env::var("ACADEMY_METRICS_ENABLED")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(true),
        }
    }
}

/// Install the global tracing subscriber.
///
/// Call once at startup, before anything logs.
pub fn init_tracing(config: &TelemetryConfig) -> ApiResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if config.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    result.map_err(|e| ApiError::internal_error(format!("Failed to init subscriber: {}", e)))?;

    tracing::info!(
        service_name = config.service_name,
        service_version = config.service_version,
        metrics_enabled = config.metrics_enabled,
        "Telemetry initialized"
    );

    Ok(())
}
