//! Admin Overview Routes
//!
//! The dashboard shell and its three fragments only ever read the cache.
//! A cold fragment answers `202 Accepted` with a `Retry-After` hint and asks
//! the warm-up coordinator to fill it; handlers never wait on a recompute.
//!
//! All routes here sit behind [`crate::middleware::require_staff`].

use std::sync::Arc;

use academy_core::format::format_timestamp;
use academy_core::{ChartRange, DataChange, ServiceStatus};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::SiteConfig;
use crate::constants::{
    ACTIVITY_REFRESH_INTERVAL_SECS, CHART_REFRESH_INTERVAL_SECS, KPI_REFRESH_INTERVAL_SECS,
    MAX_ACTIVITY_LIMIT, STORAGE_USAGE_PLACEHOLDER,
};
use crate::error::{ApiError, ApiResult};
use crate::jobs::{TriggerOutcome, WarmupCoordinator, WarmupRequest};
use crate::middleware::ViewerExtractor;
use crate::overview::{ActivityFeed, ChartPayload, KpiPayload, OverviewService, Readiness};
use crate::state::AppState;

// ============================================================================
// QUERY PARAMETERS
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OverviewQuery {
    pub range: Option<String>,
    pub limit: Option<String>,
}

impl OverviewQuery {
    /// Requested chart range; absent or blank means the default range.
    pub fn range(&self) -> ApiResult<ChartRange> {
        match self.range.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
            Some(value) => Ok(value.parse::<ChartRange>()?),
            None => Ok(ChartRange::default()),
        }
    }

    /// Requested activity limit, clamped to `1..=MAX_ACTIVITY_LIMIT`.
    pub fn limit(&self, default: usize) -> ApiResult<usize> {
        match self.limit.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
            Some(value) => value
                .parse::<usize>()
                .map(|limit| limit.clamp(1, MAX_ACTIVITY_LIMIT))
                .map_err(|_| ApiError::invalid_format("limit", "a positive integer")),
            None => Ok(default),
        }
    }
}

// ============================================================================
// VIEW TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct RangeOption {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RefreshIntervals {
    pub kpis: u64,
    pub charts: u64,
    pub activity: u64,
}

impl Default for RefreshIntervals {
    fn default() -> Self {
        Self {
            kpis: KPI_REFRESH_INTERVAL_SECS,
            charts: CHART_REFRESH_INTERVAL_SECS,
            activity: ACTIVITY_REFRESH_INTERVAL_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatuses {
    pub worker: ServiceStatus,
    pub cache: ServiceStatus,
    pub mail: ServiceStatus,
}

/// Admin footer metadata.
#[derive(Debug, Clone, Serialize)]
pub struct FooterContext {
    pub brand_name: String,
    pub app_version: String,
    pub app_environment: String,
    pub build_commit: String,
    pub build_timestamp: String,
    pub services: ServiceStatuses,
    pub storage_db_usage: String,
    pub storage_media_usage: String,
}

impl FooterContext {
    pub fn new(site: &SiteConfig, offset: chrono::FixedOffset) -> Self {
        let usage = |value: &Option<String>| {
            value
                .clone()
                .unwrap_or_else(|| STORAGE_USAGE_PLACEHOLDER.to_string())
        };
        Self {
            brand_name: site.brand_name.clone(),
            app_version: site.app_version.clone(),
            app_environment: site.app_environment.clone(),
            build_commit: site.build_commit.clone(),
            build_timestamp: format_timestamp(site.build_timestamp, offset),
            services: ServiceStatuses {
                worker: site.worker_status,
                cache: site.cache_status,
                mail: site.mail_status,
            },
            storage_db_usage: usage(&site.storage_db_usage),
            storage_media_usage: usage(&site.storage_media_usage),
        }
    }
}

/// The dashboard shell: every fragment as currently cached.
#[derive(Debug, Clone, Serialize)]
pub struct OverviewShell {
    pub viewer: String,
    pub finance_masked: bool,
    pub kpis: Readiness<KpiPayload>,
    pub charts: Readiness<ChartPayload>,
    pub activity: Readiness<ActivityFeed>,
    pub range: ChartRange,
    pub range_options: Vec<RangeOption>,
    pub activity_limit: usize,
    pub support_unread: usize,
    pub notification_unread: usize,
    pub refresh_intervals: RefreshIntervals,
    pub retry_after_secs: u64,
    pub footer: FooterContext,
}

// ============================================================================
// RESPONSES
// ============================================================================

/// 200 with the payload when cached; otherwise 202 with `Retry-After`.
fn fragment_response<T: Serialize>(readiness: Readiness<T>, retry_after_secs: u64) -> Response {
    match readiness {
        ready @ Readiness::Ready(_) => (StatusCode::OK, Json(ready)).into_response(),
        Readiness::Loading => (
            StatusCode::ACCEPTED,
            [(header::RETRY_AFTER, retry_after_secs.to_string())],
            Json(json!({ "state": "loading", "retry_after_secs": retry_after_secs })),
        )
            .into_response(),
    }
}

fn request_warmup(
    warmup: &WarmupCoordinator,
    range: Option<ChartRange>,
    limit: Option<usize>,
) -> TriggerOutcome {
    let outcome = warmup.trigger_cache_miss(range, limit);
    tracing::debug!(?range, ?limit, outcome = outcome.as_str(), "Cold overview fragment");
    outcome
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /admin/overview - Dashboard shell
pub async fn overview_shell(
    State(state): State<AppState>,
    ViewerExtractor(viewer): ViewerExtractor,
    Query(query): Query<OverviewQuery>,
) -> ApiResult<Json<OverviewShell>> {
    let config = state.overview.config();
    let range = query.range()?;
    let limit = query.limit(config.activity_limit)?;

    let view = state.overview.view(viewer.tier());
    let (kpis, charts, activity) = tokio::join!(
        view.peek_kpis(),
        view.peek_charts(range),
        view.peek_activity(limit),
    );

    if !(kpis.is_ready() && charts.is_ready() && activity.is_ready()) {
        request_warmup(&state.warmup, Some(range), Some(limit));
    }

    let unread = match &activity {
        Readiness::Ready(feed) => feed.len(),
        Readiness::Loading => 0,
    };

    Ok(Json(OverviewShell {
        viewer: viewer.username.clone(),
        finance_masked: view.tier().is_masked(),
        kpis,
        charts,
        activity,
        range,
        range_options: ChartRange::ALL
            .into_iter()
            .map(|option| RangeOption {
                value: option.param(),
                label: option.label(),
                selected: option == range,
            })
            .collect(),
        activity_limit: limit,
        support_unread: unread,
        notification_unread: unread,
        refresh_intervals: RefreshIntervals::default(),
        retry_after_secs: config.retry_after.as_secs(),
        footer: FooterContext::new(&state.site, config.utc_offset()),
    }))
}

/// GET /admin/overview/kpis - KPI cards fragment
pub async fn kpis_fragment(
    State(overview): State<Arc<OverviewService>>,
    State(warmup): State<Arc<WarmupCoordinator>>,
    ViewerExtractor(viewer): ViewerExtractor,
) -> Response {
    let readiness = overview.view(viewer.tier()).peek_kpis().await;
    if !readiness.is_ready() {
        request_warmup(&warmup, None, None);
    }
    fragment_response(readiness, overview.config().retry_after.as_secs())
}

/// GET /admin/overview/trends?range=6m - Chart fragment
pub async fn trends_fragment(
    State(overview): State<Arc<OverviewService>>,
    State(warmup): State<Arc<WarmupCoordinator>>,
    ViewerExtractor(viewer): ViewerExtractor,
    Query(query): Query<OverviewQuery>,
) -> ApiResult<Response> {
    let range = query.range()?;
    let readiness = overview.view(viewer.tier()).peek_charts(range).await;
    if !readiness.is_ready() {
        request_warmup(&warmup, Some(range), None);
    }
    Ok(fragment_response(readiness, overview.config().retry_after.as_secs()))
}

/// GET /admin/overview/activity?limit=3 - Activity feed fragment
pub async fn activity_fragment(
    State(overview): State<Arc<OverviewService>>,
    State(warmup): State<Arc<WarmupCoordinator>>,
    ViewerExtractor(viewer): ViewerExtractor,
    Query(query): Query<OverviewQuery>,
) -> ApiResult<Response> {
    let limit = query.limit(overview.config().activity_limit)?;
    let readiness = overview.view(viewer.tier()).peek_activity(limit).await;
    if !readiness.is_ready() {
        request_warmup(&warmup, None, Some(limit));
    }
    Ok(fragment_response(readiness, overview.config().retry_after.as_secs()))
}

/// POST /admin/overview/refresh - Record a data change
///
/// With a body (`{"entity":"payment","status":"confirmed"}`) only changes
/// that move the dashboard schedule a warm-up; without one the full scope
/// is always requested.
pub async fn refresh(
    State(warmup): State<Arc<WarmupCoordinator>>,
    ViewerExtractor(viewer): ViewerExtractor,
    change: Option<Json<DataChange>>,
) -> Response {
    let outcome = match change {
        Some(Json(change)) => warmup.notify_change(change),
        None => Some(warmup.trigger(WarmupRequest::data_changed(warmup.full_scope()))),
    };

    tracing::info!(
        username = %viewer.username,
        outcome = outcome.map_or("ignored", |o| o.as_str()),
        "Overview refresh requested"
    );

    let body = json!({ "outcome": outcome.map_or("ignored", |o| o.as_str()) });
    (StatusCode::ACCEPTED, Json(body)).into_response()
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(overview_shell))
        .route("/kpis", get(kpis_fragment))
        .route("/trends", get(trends_fragment))
        .route("/activity", get(activity_fragment))
        .route("/refresh", post(refresh))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    fn query(range: Option<&str>, limit: Option<&str>) -> OverviewQuery {
        OverviewQuery {
            range: range.map(str::to_string),
            limit: limit.map(str::to_string),
        }
    }

    #[test]
    fn test_query_range_parsing() {
        assert_eq!(query(None, None).range().ok(), Some(ChartRange::Months6));
        assert_eq!(query(Some(" "), None).range().ok(), Some(ChartRange::Months6));
        assert_eq!(query(Some("4W"), None).range().ok(), Some(ChartRange::Weeks4));

        let err = query(Some("3m"), None).range().err();
        assert_eq!(err.map(|e| e.status_code()), Some(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_query_limit_is_clamped() {
        assert_eq!(query(None, None).limit(3).ok(), Some(3));
        assert_eq!(query(None, Some("0")).limit(3).ok(), Some(1));
        assert_eq!(query(None, Some("10000")).limit(3).ok(), Some(MAX_ACTIVITY_LIMIT));
        assert!(query(None, Some("many")).limit(3).is_err());
    }

    #[test]
    fn test_footer_placeholders() {
        let site = SiteConfig {
            storage_db_usage: Some("1.2 GB".to_string()),
            ..SiteConfig::default()
        };
        let footer = FooterContext::new(&site, chrono::FixedOffset::east_opt(7 * 3600).expect("offset"));
        assert_eq!(footer.storage_db_usage, "1.2 GB");
        assert_eq!(footer.storage_media_usage, STORAGE_USAGE_PLACEHOLDER);
        assert_eq!(footer.services.worker, ServiceStatus::Unknown);
        assert_eq!(footer.build_commit, "abc1234");
    }

    #[tokio::test]
    async fn test_loading_fragment_response() -> Result<(), axum::Error> {
        let response = fragment_response(Readiness::<KpiPayload>::Loading, 3);
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).and_then(|v| v.to_str().ok()),
            Some("3")
        );

        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or_default();
        assert_eq!(json, json!({ "state": "loading", "retry_after_secs": 3 }));
        Ok(())
    }
}
