//! Prometheus Metrics Definitions
//!
//! Exposes a /metrics endpoint for Prometheus scraping.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Warm-up run duration buckets (seconds)
const WARMUP_LATENCY_BUCKETS: &[f64] = &[0.010, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 15.0, 30.0];

/// Global metrics instance - initialized once at startup
pub static METRICS: Lazy<ApiResult<AcademyMetrics>> = Lazy::new(AcademyMetrics::new);

/// Container for all academy metrics.
#[derive(Clone)]
pub struct AcademyMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Overview cache reads - labels: family, result (shared, fallback, miss, degraded_miss)
    pub overview_cache_reads_total: CounterVec,

    /// Writes that only reached the local fallback map - labels: family
    pub overview_cache_write_fallbacks_total: CounterVec,

    /// Warm-up triggers - labels: outcome (started, queued, throttled)
    pub warmup_triggers_total: CounterVec,

    /// Warm-up runs - labels: outcome (completed, failed, skipped_recent, skipped_locked)
    pub warmup_runs_total: CounterVec,

    /// Warm-up run duration - labels: reason
    pub warmup_duration_seconds: HistogramVec,
}

fn registration_error(name: &str, e: prometheus::Error) -> ApiError {
    ApiError::internal_error(format!("Failed to register {}: {}", name, e))
}

impl AcademyMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "academy_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| registration_error("http_requests_total", e))?,

            http_request_duration_seconds: register_histogram_vec!(
                "academy_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("http_request_duration_seconds", e))?,

            overview_cache_reads_total: register_counter_vec!(
                "academy_overview_cache_reads_total",
                "Overview cache reads by metric family and result",
                &["family", "result"]
            )
            .map_err(|e| registration_error("overview_cache_reads_total", e))?,

            overview_cache_write_fallbacks_total: register_counter_vec!(
                "academy_overview_cache_write_fallbacks_total",
                "Overview cache writes that only reached the local fallback map",
                &["family"]
            )
            .map_err(|e| registration_error("overview_cache_write_fallbacks_total", e))?,

            warmup_triggers_total: register_counter_vec!(
                "academy_warmup_triggers_total",
                "Warm-up trigger decisions",
                &["outcome"]
            )
            .map_err(|e| registration_error("warmup_triggers_total", e))?,

            warmup_runs_total: register_counter_vec!(
                "academy_warmup_runs_total",
                "Warm-up runs by outcome",
                &["outcome"]
            )
            .map_err(|e| registration_error("warmup_runs_total", e))?,

            warmup_duration_seconds: register_histogram_vec!(
                "academy_warmup_duration_seconds",
                "Warm-up run duration in seconds",
                &["reason"],
                WARMUP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("warmup_duration_seconds", e))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    pub fn record_cache_read(&self, family: &str, result: &str) {
        self.overview_cache_reads_total
            .with_label_values(&[family, result])
            .inc();
    }

    pub fn record_cache_write_fallback(&self, family: &str) {
        self.overview_cache_write_fallbacks_total
            .with_label_values(&[family])
            .inc();
    }

    pub fn record_warmup_trigger(&self, outcome: &str) {
        self.warmup_triggers_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_warmup_run(&self, reason: &str, outcome: &str, duration_secs: f64) {
        self.warmup_runs_total.with_label_values(&[outcome]).inc();
        self.warmup_duration_seconds
            .with_label_values(&[reason])
            .observe(duration_secs);
    }
}

/// Run `f` against the global metrics, if they registered.
pub fn with_metrics(f: impl FnOnce(&AcademyMetrics)) {
    if let Ok(metrics) = METRICS.as_ref() {
        f(metrics);
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}
