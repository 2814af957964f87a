//! Overview metric service.
//!
//! Each family (KPIs, charts per range, activity per limit) is cached per
//! visibility tier through the [`FallbackCache`]. Three access modes:
//! - `peek_*` reads the cache and never computes;
//! - `get_*` computes and stores on a miss;
//! - `refresh_*` always computes and stores.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use academy_core::{
    AggregationError, CacheKey, ChartRange, MetricSlug, VisibilityTier,
};
use academy_storage::{CacheRead, Clock, FallbackCache, ReadSource, WriteOutcome};
use chrono::{DateTime, FixedOffset, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::activity::{compute_activity, ActivityFeed};
use super::charts::{compute_charts, ChartPayload};
use super::kpi::{compute_kpis, KpiPayload};
use super::source::OverviewSource;
use crate::config::OverviewConfig;
use crate::telemetry::with_metrics;

/// Result of a cache-only read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "data", rename_all = "lowercase")]
pub enum Readiness<T> {
    Ready(T),
    Loading,
}

impl<T> Readiness<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Ready(value) => Some(value),
            Self::Loading => None,
        }
    }

    pub fn as_ref(&self) -> Readiness<&T> {
        match self {
            Self::Ready(value) => Readiness::Ready(value),
            Self::Loading => Readiness::Loading,
        }
    }
}

/// Computes and caches the dashboard payloads.
pub struct OverviewService {
    cache: FallbackCache,
    source: Arc<dyn OverviewSource>,
    config: OverviewConfig,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for OverviewService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverviewService")
            .field("cache", &self.cache)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl OverviewService {
    pub fn new(
        cache: FallbackCache,
        source: Arc<dyn OverviewSource>,
        config: OverviewConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cache,
            source,
            config,
            clock,
        }
    }

    /// Payload accessors scoped to one visibility tier.
    pub fn view(&self, tier: VisibilityTier) -> OverviewView<'_> {
        OverviewView { service: self, tier }
    }

    pub fn config(&self) -> &OverviewConfig {
        &self.config
    }

    pub fn cache(&self) -> &FallbackCache {
        &self.cache
    }

    fn offset(&self) -> FixedOffset {
        self.config.utc_offset()
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now_utc()
    }

    fn ttl_for(&self, slug: MetricSlug) -> Duration {
        match slug {
            MetricSlug::Kpis => self.config.kpi_ttl,
            MetricSlug::Charts(_) => self.config.chart_ttl,
            MetricSlug::Activity(_) => self.config.activity_ttl,
        }
    }

    /// Cached payload for `key`, `None` on a miss or an unreadable entry.
    async fn read_cached<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let family = key.slug().family();
        let read = self.cache.get(key).await;

        let result = match &read {
            CacheRead::Hit {
                source: ReadSource::Shared,
                ..
            } => "hit_shared",
            CacheRead::Hit {
                source: ReadSource::Fallback,
                ..
            } => "hit_fallback",
            CacheRead::Miss { degraded: true } => "miss_degraded",
            CacheRead::Miss { degraded: false } => "miss",
        };
        with_metrics(|m| m.record_cache_read(family, result));

        let value = read.into_value()?;
        match serde_json::from_value(value) {
            Ok(payload) => Some(payload),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Discarding unreadable overview cache entry");
                None
            }
        }
    }

    async fn store<T: Serialize>(&self, key: &CacheKey, payload: &T) -> Result<(), AggregationError> {
        let family = key.slug().family();
        let value = serde_json::to_value(payload).map_err(|e| AggregationError::Encoding {
            family: family.to_string(),
            reason: e.to_string(),
        })?;

        if let WriteOutcome::FallbackOnly { .. } = self.cache.set(key, value, self.ttl_for(key.slug())).await {
            with_metrics(|m| m.record_cache_write_fallback(family));
        }
        Ok(())
    }

    async fn compute_and_store<T, F, Fut>(&self, key: &CacheKey, compute: F) -> Result<T, AggregationError>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AggregationError>>,
    {
        let payload = compute().await?;
        self.store(key, &payload).await?;
        tracing::debug!(key = %key, "Overview payload recomputed");
        Ok(payload)
    }

    async fn get_or_compute<T, F, Fut>(&self, key: &CacheKey, compute: F) -> Result<T, AggregationError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AggregationError>>,
    {
        if let Some(payload) = self.read_cached(key).await {
            return Ok(payload);
        }
        self.compute_and_store(key, compute).await
    }
}

/// The overview service seen by viewers of one tier.
#[derive(Debug, Clone, Copy)]
pub struct OverviewView<'a> {
    service: &'a OverviewService,
    tier: VisibilityTier,
}

impl<'a> OverviewView<'a> {
    pub fn tier(&self) -> VisibilityTier {
        self.tier
    }

    fn key(&self, slug: MetricSlug) -> CacheKey {
        CacheKey::new(slug, self.tier)
    }

    async fn peek<T: DeserializeOwned>(&self, slug: MetricSlug) -> Readiness<T> {
        match self.service.read_cached(&self.key(slug)).await {
            Some(payload) => Readiness::Ready(payload),
            None => Readiness::Loading,
        }
    }

    fn kpis_task(&self) -> impl Future<Output = Result<KpiPayload, AggregationError>> + 'a {
        let (service, tier) = (self.service, self.tier);
        async move { compute_kpis(service.source.as_ref(), tier, service.now(), service.offset()).await }
    }

    fn charts_task(&self, range: ChartRange) -> impl Future<Output = Result<ChartPayload, AggregationError>> + 'a {
        let (service, tier) = (self.service, self.tier);
        async move {
            compute_charts(service.source.as_ref(), tier, range, service.now(), service.offset()).await
        }
    }

    fn activity_task(&self, limit: usize) -> impl Future<Output = Result<ActivityFeed, AggregationError>> + 'a {
        let service = self.service;
        async move { compute_activity(service.source.as_ref(), limit, service.now(), service.offset()).await }
    }

    // ------------------------------------------------------------------
    // KPIs
    // ------------------------------------------------------------------

    pub async fn peek_kpis(&self) -> Readiness<KpiPayload> {
        self.peek(MetricSlug::kpis()).await
    }

    pub async fn get_kpis(&self) -> Result<KpiPayload, AggregationError> {
        let task = self.kpis_task();
        self.service
            .get_or_compute(&self.key(MetricSlug::kpis()), || task)
            .await
    }

    pub async fn refresh_kpis(&self) -> Result<KpiPayload, AggregationError> {
        let task = self.kpis_task();
        self.service
            .compute_and_store(&self.key(MetricSlug::kpis()), || task)
            .await
    }

    // ------------------------------------------------------------------
    // Charts
    // ------------------------------------------------------------------

    pub async fn peek_charts(&self, range: ChartRange) -> Readiness<ChartPayload> {
        self.peek(MetricSlug::charts(range)).await
    }

    pub async fn get_charts(&self, range: ChartRange) -> Result<ChartPayload, AggregationError> {
        let task = self.charts_task(range);
        self.service
            .get_or_compute(&self.key(MetricSlug::charts(range)), || task)
            .await
    }

    pub async fn refresh_charts(&self, range: ChartRange) -> Result<ChartPayload, AggregationError> {
        let task = self.charts_task(range);
        self.service
            .compute_and_store(&self.key(MetricSlug::charts(range)), || task)
            .await
    }

    // ------------------------------------------------------------------
    // Activity
    // ------------------------------------------------------------------

    pub async fn peek_activity(&self, limit: usize) -> Readiness<ActivityFeed> {
        self.peek(MetricSlug::activity(limit)).await
    }

    pub async fn get_activity(&self, limit: usize) -> Result<ActivityFeed, AggregationError> {
        let slug = MetricSlug::activity(limit);
        let task = self.activity_task(limit.max(1));
        self.service.get_or_compute(&self.key(slug), || task).await
    }

    pub async fn refresh_activity(&self, limit: usize) -> Result<ActivityFeed, AggregationError> {
        let slug = MetricSlug::activity(limit);
        let task = self.activity_task(limit.max(1));
        self.service.compute_and_store(&self.key(slug), || task).await
    }
}
