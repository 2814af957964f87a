//! Axum middleware for HTTP request tracing and metrics.

use axum::{extract::Request, middleware::Next, response::Response};
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Instant;
use tracing::{info_span, Instrument};

use super::metrics::with_metrics;
use crate::home::HomeSection;

static UUID_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .ok()
});

static NUMERIC_ID_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"/\d+(/|$)").ok());

/// Normalize path for metrics/spans.
///
/// Replaces ids and unknown section names with placeholders so label
/// cardinality stays bounded.
fn normalize_path(path: &str) -> String {
    let mut result = path.to_string();
    if let Some(pattern) = UUID_PATTERN.as_ref() {
        result = pattern.replace_all(&result, "{id}").to_string();
    }
    if let Some(pattern) = NUMERIC_ID_PATTERN.as_ref() {
        result = pattern.replace_all(&result, "/{id}$1").to_string();
    }
    if let Some(section) = result.strip_prefix("/fragments/home/") {
        if section.parse::<HomeSection>().is_err() {
            result = "/fragments/home/{section}".to_string();
        }
    }
    result
}

/// Observability middleware for Axum.
///
/// Wraps every request in an `http_request` span, records Prometheus
/// metrics and logs completion.
pub async fn observability_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let normalized_path = normalize_path(&path);

    let span = info_span!(
        "http_request",
        http.method = %method,
        http.target = %path,
        http.route = %normalized_path,
    );

    let response = next.run(request).instrument(span).await;

    let duration = start.elapsed();
    let status = response.status();

    with_metrics(|m| {
        m.record_http_request(
            method.as_str(),
            &normalized_path,
            status.as_u16(),
            duration.as_secs_f64(),
        )
    });

    tracing::info!(
        method = %method,
        path = %path,
        status = status.as_u16(),
        duration_ms = duration.as_millis(),
        "Request completed"
    );

    response
}
