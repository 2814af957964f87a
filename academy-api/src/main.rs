//! Academy API Server Entry Point
//!
//! Bootstraps configuration, opens the shared cache store, schedules the
//! startup warm-up and starts the Axum HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use academy_api::auth::{SessionConfig, StaticCredentialStore};
use academy_api::config::{ApiConfig, CacheBackendConfig, OverviewConfig, SiteConfig};
use academy_api::home::InMemoryContentSource;
use academy_api::jobs::{OverviewWarmer, WarmupConfig, WarmupCoordinator};
use academy_api::overview::{InMemoryOverviewSource, OverviewService};
use academy_api::routes::{health::store_reachable, AppRouterBuilder};
use academy_api::telemetry::{init_tracing, TelemetryConfig};
use academy_api::{ApiError, ApiResult, AppState};
use academy_storage::{CacheStore, Clock, FallbackCache, InMemoryCacheStore, LmdbCacheStore, SystemClock};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    let api_config = ApiConfig::from_env();
    let overview_config = OverviewConfig::from_env();
    let warmup_config = WarmupConfig::from_env();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let store = open_store(&CacheBackendConfig::from_env(), clock.clone())?;
    if !store_reachable(&store).await {
        tracing::warn!("Shared cache store unreachable at startup; serving from the fallback map");
    }

    let activity_limit = overview_config.activity_limit;
    let overview = Arc::new(OverviewService::new(
        FallbackCache::with_clock(store.clone(), clock.clone()),
        Arc::new(InMemoryOverviewSource::new()),
        overview_config,
        clock.clone(),
    ));
    let warmup = Arc::new(WarmupCoordinator::new(
        Arc::new(OverviewWarmer::new(overview.clone())),
        store.clone(),
        clock.clone(),
        warmup_config,
        activity_limit,
    ));

    let state = AppState {
        overview,
        warmup: warmup.clone(),
        content: Arc::new(InMemoryContentSource::new()),
        credentials: Arc::new(StaticCredentialStore::from_env()),
        session: Arc::new(SessionConfig::from_env()),
        site: Arc::new(SiteConfig::from_env()),
        store,
        clock,
        start_time: Instant::now(),
    };

    let app = AppRouterBuilder::new(state, api_config.clone())?
        .metrics_endpoint(telemetry_config.metrics_enabled)
        .build();

    if warmup.config().startup_warmup {
        let outcome = warmup.trigger_startup();
        tracing::info!(outcome = outcome.as_str(), "Startup warm-up scheduled");
    }

    let addr = resolve_bind_addr(&api_config)?;
    tracing::info!(%addr, environment = %api_config.environment, "Starting academy API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}

fn open_store(config: &CacheBackendConfig, clock: Arc<dyn Clock>) -> ApiResult<Arc<dyn CacheStore>> {
    match config {
        CacheBackendConfig::InMemory => {
            tracing::info!("Using the in-memory cache store");
            Ok(Arc::new(InMemoryCacheStore::with_clock(clock)))
        }
        CacheBackendConfig::Lmdb { path, map_size_mb } => {
            tracing::info!(path = %path.display(), map_size_mb, "Opening LMDB cache store");
            let store = LmdbCacheStore::with_clock(path, *map_size_mb, clock).map_err(|e| {
                ApiError::cache_unavailable(format!("Failed to open LMDB store: {}", e))
            })?;
            Ok(Arc::new(store))
        }
    }
}

fn resolve_bind_addr(config: &ApiConfig) -> ApiResult<SocketAddr> {
    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(config.bind_port);

    let addr = format!("{}:{}", config.bind_host, port);
    addr.parse::<SocketAddr>()
        .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
}
