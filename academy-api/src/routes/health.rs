//! Health Check Endpoints
//!
//! Provides Kubernetes-compatible health check endpoints:
//! - /health/ping - Simple liveness check
//! - /health/live - Process alive check
//! - /health/ready - Shared cache store round trip
//!
//! No authentication required for health endpoints.

use std::sync::Arc;
use std::time::{Duration, Instant};

use academy_storage::CacheStore;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::jobs::WarmupSnapshot;
use crate::state::AppState;

const PROBE_KEY: &str = "admin_overview:health:probe";

// ============================================================================
// TYPES
// ============================================================================

/// Health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Degraded,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthDetails {
    pub cache_store: ComponentHealth,
    pub warmup: WarmupSnapshot,
    pub warmup_running: bool,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health/ping - Simple pong response
pub async fn ping() -> impl IntoResponse {
    (StatusCode::OK, "pong")
}

/// GET /health/live - Process liveness check
pub async fn liveness() -> impl IntoResponse {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        message: Some("Process is alive".to_string()),
        details: None,
    };
    (StatusCode::OK, Json(response))
}

/// GET /health/ready - Readiness check
///
/// A store outage reports `degraded` rather than `unhealthy`: the overview
/// keeps serving from its fallback map.
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let cache_store = match check_store(state.store.as_ref()).await {
        Ok(latency) => ComponentHealth {
            status: HealthStatus::Healthy,
            latency_ms: Some(latency),
            error: None,
        },
        Err(e) => ComponentHealth {
            status: HealthStatus::Degraded,
            latency_ms: None,
            error: Some(e),
        },
    };

    let response = HealthResponse {
        status: cache_store.status,
        message: None,
        details: Some(HealthDetails {
            cache_store,
            warmup: state.warmup.metrics(),
            warmup_running: state.warmup.is_running(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: state.start_time.elapsed().as_secs(),
        }),
    };

    (StatusCode::OK, Json(response))
}

async fn check_store(store: &dyn CacheStore) -> Result<u64, String> {
    let start = Instant::now();
    let probe = json!(start.elapsed().as_nanos() as u64);

    store
        .set(PROBE_KEY, &probe, Duration::from_secs(5))
        .await
        .map_err(|e| format!("Cache store write failed: {}", e))?;
    store
        .get(PROBE_KEY)
        .await
        .map_err(|e| format!("Cache store read failed: {}", e))?
        .ok_or_else(|| "Cache store lost the probe entry".to_string())?;

    Ok(start.elapsed().as_millis() as u64)
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create health check router (no auth required)
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/ping", get(ping))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
}

/// Probe helper shared with the startup log.
pub async fn store_reachable(store: &Arc<dyn CacheStore>) -> bool {
    check_store(store.as_ref()).await.is_ok()
}
