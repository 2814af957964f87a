//! HTTP Routes Module
//!
//! - `home`: landing page and per-section fragments (public)
//! - `session`: login / logout
//! - `overview`: admin dashboard shell, fragments and refresh (staff only)
//! - `health`: Kubernetes-compatible health checks (public)
//!
//! `/metrics` exposes the Prometheus registry.

pub mod health;
pub mod home;
pub mod overview;
pub mod session;

use std::time::Duration;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::middleware::{require_staff, session_middleware, SessionMiddlewareState};
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

pub use health::create_router as health_router;
pub use home::create_router as home_router;
pub use overview::create_router as overview_router;
pub use session::create_router as session_router;

// ============================================================================
// PRODUCTION VALIDATION
// ============================================================================

/// Validate API configuration for production use.
fn validate_api_config_for_production(config: &ApiConfig) -> ApiResult<()> {
    if config.cors_origins.is_empty() {
        return Err(ApiError::invalid_input(
            "CORS origins not configured for production. Set ACADEMY_CORS_ORIGINS.",
        ));
    }
    Ok(())
}

// ============================================================================
// ROUTER BUILDER
// ============================================================================

/// Assembles the full application router.
///
/// # Middleware Order (outer to inner)
/// 1. CORS - handles preflight requests
/// 2. Trace + observability - spans and metrics
/// 3. Session - resolves the cookie into a viewer
/// 4. Staff guard (only on /admin/overview/*)
pub struct AppRouterBuilder {
    state: AppState,
    api_config: ApiConfig,
    metrics_endpoint: bool,
}

impl AppRouterBuilder {
    /// In production, refuses insecure session secrets and open CORS.
    pub fn new(state: AppState, api_config: ApiConfig) -> ApiResult<Self> {
        let production = api_config.is_production();
        state.session.validate_for_production(production)?;
        if production {
            validate_api_config_for_production(&api_config)?;
        }
        Ok(Self {
            state,
            api_config,
            metrics_endpoint: true,
        })
    }

    /// Serve `/metrics` (default: on).
    pub fn metrics_endpoint(mut self, enabled: bool) -> Self {
        self.metrics_endpoint = enabled;
        self
    }

    pub fn build(self) -> Router {
        let session_state = SessionMiddlewareState::new(self.state.session.clone());

        let admin_routes = overview::create_router().layer(from_fn(require_staff));

        let mut router = Router::new()
            .merge(home::create_router())
            .merge(session::create_router())
            .nest("/admin/overview", admin_routes)
            .nest("/health", health::create_router());
        if self.metrics_endpoint {
            router = router.route("/metrics", get(metrics_handler));
        }

        router
            .with_state(self.state)
            .layer(from_fn_with_state(session_state, session_middleware))
            .layer(from_fn(observability_middleware))
            .layer(TraceLayer::new_for_http())
            .layer(build_cors_layer(&self.api_config))
    }
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Build the CORS layer from ApiConfig.
///
/// In development mode (empty origins), allows all origins.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static("hx-request"),
        ])
        .expose_headers([header::RETRY_AFTER])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any)
    } else {
        tracing::info!(origins = ?config.cors_origins, "CORS: restricting origins");
        let config = config.clone();
        let predicate = move |origin: &HeaderValue, _: &axum::http::request::Parts| {
            origin
                .to_str()
                .is_ok_and(|origin| config.is_origin_allowed(origin))
        };
        cors.allow_origin(AllowOrigin::predicate(predicate))
            .allow_credentials(true)
    }
}

/// Create the complete application router.
pub fn create_app_router(state: AppState, api_config: &ApiConfig) -> ApiResult<Router> {
    AppRouterBuilder::new(state, api_config.clone()).map(AppRouterBuilder::build)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_requires_cors_origins() {
        let mut config = ApiConfig {
            environment: "production".to_string(),
            ..ApiConfig::default()
        };
        assert!(validate_api_config_for_production(&config).is_err());

        config.cors_origins = vec!["https://globalenglish.vn".to_string()];
        assert!(validate_api_config_for_production(&config).is_ok());
    }
}
