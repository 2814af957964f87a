//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use academy_storage::{CacheStore, Clock};

use crate::auth::{CredentialStore, SessionConfig};
use crate::config::SiteConfig;
use crate::home::ContentSource;
use crate::jobs::WarmupCoordinator;
use crate::overview::OverviewService;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub overview: Arc<OverviewService>,
    pub warmup: Arc<WarmupCoordinator>,
    /// Landing page content tables.
    pub content: Arc<dyn ContentSource>,
    pub credentials: Arc<dyn CredentialStore>,
    pub session: Arc<SessionConfig>,
    /// Admin footer metadata.
    pub site: Arc<SiteConfig>,
    /// The shared store behind the overview cache, probed by `/health/ready`.
    pub store: Arc<dyn CacheStore>,
    pub clock: Arc<dyn Clock>,
    pub start_time: Instant,
}

crate::impl_from_ref!(Arc<OverviewService>, overview);
crate::impl_from_ref!(Arc<WarmupCoordinator>, warmup);
crate::impl_from_ref!(Arc<dyn ContentSource>, content);
crate::impl_from_ref!(Arc<SessionConfig>, session);
crate::impl_from_ref!(Arc<dyn CacheStore>, store);
