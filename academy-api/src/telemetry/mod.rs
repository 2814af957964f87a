//! Academy Telemetry - Observability Infrastructure
//!
//! Structured logging through `tracing` and Prometheus metrics for the HTTP
//! layer, the overview cache and the warm-up coordinator.

pub mod metrics;
pub mod middleware;
pub mod tracer;

pub use metrics::{metrics_handler, with_metrics, AcademyMetrics, METRICS};
pub use middleware::observability_middleware;
pub use tracer::{init_tracing, TelemetryConfig};
