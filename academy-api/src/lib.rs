//! Academy API - HTTP layer for the Global English site
//!
//! Serves the public landing page (JSON view-models with per-section
//! fragments), the session login flow, and the staff-only admin overview.
//!
//! The admin overview never computes on the request path: fragments are
//! read from a [`academy_storage::FallbackCache`] and a throttled,
//! single-flight [`jobs::WarmupCoordinator`] refills them in the background.

mod macros;

pub mod auth;
pub mod config;
pub mod constants;
pub mod error;
pub mod home;
pub mod jobs;
pub mod middleware;
pub mod overview;
pub mod routes;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use auth::{
    issue_session_token, validate_session_token, CredentialStore, SessionConfig, SessionSecret,
    StaticCredentialStore, Viewer,
};
pub use config::{ApiConfig, CacheBackendConfig, OverviewConfig, SiteConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use home::{ContentSource, HomePageContext, HomeSection, InMemoryContentSource};
pub use jobs::{OverviewWarmer, TriggerOutcome, WarmupConfig, WarmupCoordinator, WarmupRunner};
pub use middleware::{session_middleware, MaybeViewer, SessionMiddlewareState, ViewerExtractor};
pub use overview::{InMemoryOverviewSource, OverviewService, OverviewSource, Readiness};
pub use routes::create_app_router;
pub use state::AppState;
