//! Overview Warm-up Coordinator
//!
//! Recomputes the admin overview caches in the background so viewers only
//! ever read. A warm-up is requested:
//!
//! - at process start (forced),
//! - when a viewer hits a cold fragment,
//! - when a learner, teacher or confirmed payment changes.
//!
//! # Throttling
//!
//! Requests are keyed by their [`WarmupScope::scope_key`]:
//!
//! - A non-forced request for a key accepted less than `cooldown` ago is
//!   throttled locally.
//! - At most one warm-up task runs per process. Requests arriving while it
//!   runs are queued, de-duplicated by key, and drained by the same task.
//! - Before running a non-forced request the task checks the shared
//!   "recently warmed" marker and takes the advisory lock, so sibling
//!   processes do not repeat the work. An unreachable store does not block
//!   the run.
//!
//! Forced requests skip the cooldown, the marker and the lock but still
//! respect the single running task.
//!
//! A data change that lands inside the cooldown is deferred rather than
//! dropped: one forced re-run per scope is scheduled for when the cooldown
//! ends.
//!
//! # Configuration
//!
//! ```rust
//! use academy_api::jobs::WarmupConfig;
//! use std::time::Duration;
//!
//! let config = WarmupConfig {
//!     cooldown: Duration::from_secs(60),
//!     lock_ttl: Duration::from_secs(15),
//!     startup_warmup: true,
//! };
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use academy_core::{AggregationError, ChartRange, DataChange, VisibilityTier, WarmupScope};
use academy_storage::{AdvisoryLock, CacheStore, Clock};
use async_trait::async_trait;
use futures_util::future::try_join_all;
use serde::Serialize;
use serde_json::json;
use tokio::sync::Notify;

use crate::constants::{
    DEFAULT_WARMUP_COOLDOWN_SECS, DEFAULT_WARMUP_LOCK_TTL_SECS, WARMUP_LOCK_PREFIX,
    WARMUP_RECENT_PREFIX,
};
use crate::overview::{OverviewService, OverviewView};
use crate::telemetry::with_metrics;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the warm-up coordinator.
#[derive(Debug, Clone)]
pub struct WarmupConfig {
    /// Minimum gap between two accepted non-forced warm-ups of one scope
    /// (default: 60 seconds)
    pub cooldown: Duration,

    /// TTL of the cross-process advisory lock (default: 15 seconds)
    pub lock_ttl: Duration,

    /// Whether to run a forced warm-up when the server starts (default: true)
    pub startup_warmup: bool,
}

impl Default for WarmupConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(DEFAULT_WARMUP_COOLDOWN_SECS),
            lock_ttl: Duration::from_secs(DEFAULT_WARMUP_LOCK_TTL_SECS),
            startup_warmup: true,
        }
    }
}

impl WarmupConfig {
    /// Create WarmupConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `ACADEMY_WARMUP_COOLDOWN_SECS`: cooldown per scope (default: 60)
    /// - `ACADEMY_WARMUP_LOCK_TTL_SECS`: advisory lock TTL (default: 15)
    /// - `ACADEMY_WARMUP_ON_STARTUP`: run a forced warm-up at start (default: true)
    pub fn from_env() -> Self {
        let cooldown = Duration::from_secs(
            std::env::var("ACADEMY_WARMUP_COOLDOWN_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_WARMUP_COOLDOWN_SECS),
        );

        let lock_ttl = Duration::from_secs(
            std::env::var("ACADEMY_WARMUP_LOCK_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs: &u64| *secs > 0)
                .unwrap_or(DEFAULT_WARMUP_LOCK_TTL_SECS),
        );

        let startup_warmup = std::env::var("ACADEMY_WARMUP_ON_STARTUP")
            .ok()
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(true);

        Self {
            cooldown,
            lock_ttl,
            startup_warmup,
        }
    }
}

// ============================================================================
// REQUESTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmupReason {
    Startup,
    CacheMiss,
    DataChanged,
}

impl WarmupReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::CacheMiss => "cache_miss",
            Self::DataChanged => "data_changed",
        }
    }

    /// Cache misses only fill what is missing; the other reasons recompute.
    pub fn recomputes(&self) -> bool {
        !matches!(self, Self::CacheMiss)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmupRequest {
    pub scope: WarmupScope,
    pub force: bool,
    pub reason: WarmupReason,
}

impl WarmupRequest {
    pub fn startup(scope: WarmupScope) -> Self {
        Self {
            scope,
            force: true,
            reason: WarmupReason::Startup,
        }
    }

    pub fn cache_miss(scope: WarmupScope) -> Self {
        Self {
            scope,
            force: false,
            reason: WarmupReason::CacheMiss,
        }
    }

    pub fn data_changed(scope: WarmupScope) -> Self {
        Self {
            scope,
            force: false,
            reason: WarmupReason::DataChanged,
        }
    }

    pub fn scope_key(&self) -> String {
        self.scope.scope_key()
    }
}

/// What [`WarmupCoordinator::trigger`] did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A warm-up task was spawned.
    Started,
    /// A task is already running; the request will run after it.
    Queued,
    /// The scope was warmed too recently.
    Throttled,
    /// The scope was warmed too recently; it re-runs when the cooldown ends.
    Deferred,
    /// There is no tokio runtime to run on.
    Unavailable,
}

impl TriggerOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Queued => "queued",
            Self::Throttled => "throttled",
            Self::Deferred => "deferred",
            Self::Unavailable => "unavailable",
        }
    }
}

// ============================================================================
// RUNNER
// ============================================================================

/// Does the actual recomputation for one request.
#[async_trait]
pub trait WarmupRunner: Send + Sync {
    async fn run(&self, request: &WarmupRequest) -> Result<(), AggregationError>;
}

/// Warms every slug of a scope for both visibility tiers.
#[derive(Debug, Clone)]
pub struct OverviewWarmer {
    service: Arc<OverviewService>,
}

impl OverviewWarmer {
    pub fn new(service: Arc<OverviewService>) -> Self {
        Self { service }
    }
}

async fn warm_tier(
    view: OverviewView<'_>,
    scope: &WarmupScope,
    recompute: bool,
) -> Result<(), AggregationError> {
    let ranges: Vec<ChartRange> = scope.ranges().collect();
    let limits: Vec<usize> = scope.activity_limits().collect();

    if recompute {
        tokio::try_join!(
            view.refresh_kpis(),
            try_join_all(ranges.iter().map(|range| view.refresh_charts(*range))),
            try_join_all(limits.iter().map(|limit| view.refresh_activity(*limit))),
        )?;
    } else {
        tokio::try_join!(
            view.get_kpis(),
            try_join_all(ranges.iter().map(|range| view.get_charts(*range))),
            try_join_all(limits.iter().map(|limit| view.get_activity(*limit))),
        )?;
    }
    Ok(())
}

#[async_trait]
impl WarmupRunner for OverviewWarmer {
    async fn run(&self, request: &WarmupRequest) -> Result<(), AggregationError> {
        let recompute = request.reason.recomputes();
        try_join_all(
            VisibilityTier::ALL
                .into_iter()
                .map(|tier| warm_tier(self.service.view(tier), &request.scope, recompute)),
        )
        .await?;
        Ok(())
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters for coordinator activity since startup.
#[derive(Debug, Default)]
pub struct WarmupMetrics {
    pub triggers_started: AtomicU64,
    pub triggers_queued: AtomicU64,
    pub triggers_throttled: AtomicU64,
    pub triggers_deferred: AtomicU64,
    pub runs_completed: AtomicU64,
    pub runs_failed: AtomicU64,
    /// Runs skipped because another process warmed or is warming the scope
    pub runs_skipped: AtomicU64,
}

impl WarmupMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> WarmupSnapshot {
        WarmupSnapshot {
            triggers_started: self.triggers_started.load(Ordering::Relaxed),
            triggers_queued: self.triggers_queued.load(Ordering::Relaxed),
            triggers_throttled: self.triggers_throttled.load(Ordering::Relaxed),
            triggers_deferred: self.triggers_deferred.load(Ordering::Relaxed),
            runs_completed: self.runs_completed.load(Ordering::Relaxed),
            runs_failed: self.runs_failed.load(Ordering::Relaxed),
            runs_skipped: self.runs_skipped.load(Ordering::Relaxed),
        }
    }

    fn record_trigger(&self, outcome: TriggerOutcome) {
        let counter = match outcome {
            TriggerOutcome::Started => &self.triggers_started,
            TriggerOutcome::Queued => &self.triggers_queued,
            TriggerOutcome::Throttled | TriggerOutcome::Unavailable => &self.triggers_throttled,
            TriggerOutcome::Deferred => &self.triggers_deferred,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        with_metrics(|m| m.record_warmup_trigger(outcome.as_str()));
    }
}

/// Snapshot of warm-up metrics at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WarmupSnapshot {
    pub triggers_started: u64,
    pub triggers_queued: u64,
    pub triggers_throttled: u64,
    pub triggers_deferred: u64,
    pub runs_completed: u64,
    pub runs_failed: u64,
    pub runs_skipped: u64,
}

// ============================================================================
// COORDINATOR
// ============================================================================

#[derive(Debug, Default)]
struct WarmupState {
    running: bool,
    /// Bumped for every spawned task so a stale guard cannot reset a newer run.
    generation: u64,
    last_accepted: HashMap<String, Instant>,
    queue: VecDeque<WarmupRequest>,
    /// Scopes with a data-change re-run waiting for the cooldown to end.
    deferred: HashSet<String>,
}

struct CoordinatorInner {
    runner: Arc<dyn WarmupRunner>,
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    config: WarmupConfig,
    default_scope: WarmupScope,
    default_activity_limit: usize,
    state: Mutex<WarmupState>,
    idle: Notify,
    metrics: WarmupMetrics,
}

/// Throttled single-flight scheduler for overview warm-ups.
#[derive(Clone)]
pub struct WarmupCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl std::fmt::Debug for WarmupCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarmupCoordinator")
            .field("config", &self.inner.config)
            .field("default_scope", &self.inner.default_scope.scope_key())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl WarmupCoordinator {
    /// `activity_limit` is the dashboard's default feed length; it shapes
    /// the full scope used for startup and data-change warm-ups.
    pub fn new(
        runner: Arc<dyn WarmupRunner>,
        store: Arc<dyn CacheStore>,
        clock: Arc<dyn Clock>,
        config: WarmupConfig,
        activity_limit: usize,
    ) -> Self {
        let activity_limit = activity_limit.max(1);
        Self {
            inner: Arc::new(CoordinatorInner {
                runner,
                store,
                clock,
                config,
                default_scope: WarmupScope::full(activity_limit),
                default_activity_limit: activity_limit,
                state: Mutex::new(WarmupState::default()),
                idle: Notify::new(),
                metrics: WarmupMetrics::new(),
            }),
        }
    }

    pub fn config(&self) -> &WarmupConfig {
        &self.inner.config
    }

    /// Every chart range plus the default activity limit.
    pub fn full_scope(&self) -> WarmupScope {
        self.inner.default_scope.clone()
    }

    pub fn metrics(&self) -> WarmupSnapshot {
        self.inner.metrics.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.inner.state().running
    }

    /// Requests waiting behind the running task.
    pub fn pending(&self) -> usize {
        self.inner.state().queue.len()
    }

    /// Schedule a warm-up without waiting for it.
    pub fn trigger(&self, request: WarmupRequest) -> TriggerOutcome {
        let outcome = self.inner.clone().accept(request);
        self.inner.metrics.record_trigger(outcome);
        outcome
    }

    /// Forced warm-up of the full scope.
    pub fn trigger_startup(&self) -> TriggerOutcome {
        self.trigger(WarmupRequest::startup(self.full_scope()))
    }

    /// Warm-up for a viewer who found a fragment cold.
    pub fn trigger_cache_miss(&self, range: Option<ChartRange>, limit: Option<usize>) -> TriggerOutcome {
        let scope = WarmupScope::new(
            [range.unwrap_or_default()],
            [limit.unwrap_or(self.inner.default_activity_limit)],
        );
        self.trigger(WarmupRequest::cache_miss(scope))
    }

    /// Full-scope warm-up after a data change. `None` when the change does
    /// not affect the dashboard.
    pub fn notify_change(&self, change: DataChange) -> Option<TriggerOutcome> {
        if !change.affects_overview() {
            tracing::debug!(?change, "Ignoring change that does not affect the overview");
            return None;
        }
        Some(self.trigger(WarmupRequest::data_changed(self.full_scope())))
    }

    /// Resolve once no warm-up task is running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if !self.is_running() {
                return;
            }
            notified.await;
        }
    }
}

impl CoordinatorInner {
    fn state(&self) -> MutexGuard<'_, WarmupState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn accept(self: Arc<Self>, request: WarmupRequest) -> TriggerOutcome {
        let key = request.scope_key();
        let now = self.clock.now();
        let mut state = self.state();

        if !request.force {
            if let Some(last) = state.last_accepted.get(&key) {
                let elapsed = now.saturating_duration_since(*last);
                if elapsed < self.config.cooldown {
                    if request.reason == WarmupReason::DataChanged {
                        let wait = self.config.cooldown - elapsed;
                        return self.defer(&mut state, request, wait);
                    }
                    tracing::debug!(scope = %key, "Overview warm-up throttled");
                    return TriggerOutcome::Throttled;
                }
            }
        }

        if state.running {
            match state.queue.iter_mut().find(|queued| queued.scope_key() == key) {
                Some(queued) => queued.force |= request.force,
                None => state.queue.push_back(request),
            }
            state.last_accepted.insert(key, now);
            return TriggerOutcome::Queued;
        }

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(scope = %key, error = %e, "No runtime available for overview warm-up");
                return TriggerOutcome::Unavailable;
            }
        };

        state.running = true;
        state.generation += 1;
        let generation = state.generation;
        state.last_accepted.insert(key.clone(), now);
        drop(state);

        tracing::info!(scope = %key, reason = request.reason.as_str(), force = request.force, "Overview warm-up started");
        handle.spawn(self.drive(request, generation));
        TriggerOutcome::Started
    }

    /// Schedule one forced re-run of `request` after `wait`. Later changes
    /// for the same scope fold into it.
    fn defer(
        self: &Arc<Self>,
        state: &mut WarmupState,
        request: WarmupRequest,
        wait: Duration,
    ) -> TriggerOutcome {
        let key = request.scope_key();
        if state.deferred.contains(&key) {
            return TriggerOutcome::Deferred;
        }
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => return TriggerOutcome::Throttled,
        };
        state.deferred.insert(key.clone());

        tracing::debug!(scope = %key, wait_secs = wait.as_secs_f64(), "Overview warm-up deferred");
        let inner = Arc::clone(self);
        handle.spawn(async move {
            tokio::time::sleep(wait).await;
            inner.state().deferred.remove(&key);
            let rerun = WarmupRequest {
                force: true,
                ..request
            };
            let outcome = Arc::clone(&inner).accept(rerun);
            inner.metrics.record_trigger(outcome);
        });
        TriggerOutcome::Deferred
    }

    async fn drive(self: Arc<Self>, first: WarmupRequest, generation: u64) {
        let mut guard = RunningGuard {
            inner: self.as_ref(),
            generation,
            current: None,
            armed: true,
        };

        let mut next = Some(first);
        while let Some(request) = next {
            guard.current = Some(request.scope_key());
            self.run_one(&request).await;

            let mut state = self.state();
            next = state.queue.pop_front();
            if next.is_none() {
                state.running = false;
            }
        }

        guard.armed = false;
        self.idle.notify_waiters();
    }

    async fn run_one(&self, request: &WarmupRequest) {
        let key = request.scope_key();
        let lock_key = format!("{}:{}", WARMUP_LOCK_PREFIX, key);
        let marker_key = format!("{}:{}", WARMUP_RECENT_PREFIX, key);
        let reason = request.reason.as_str();
        let started = self.clock.now();
        let mut acquired = false;

        if !request.force {
            match self.store.get(&marker_key).await {
                Ok(Some(_)) => {
                    tracing::debug!(scope = %key, "Scope warmed recently by another worker; skipping");
                    self.record_skip(reason, "skipped_recent");
                    return;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(scope = %key, error = %e, "Warm-up marker check failed; proceeding");
                }
            }

            match self.store.try_acquire(&lock_key, self.config.lock_ttl).await {
                Ok(true) => acquired = true,
                Ok(false) => {
                    tracing::debug!(scope = %key, "Warm-up lock held elsewhere; skipping");
                    self.record_skip(reason, "skipped_locked");
                    return;
                }
                Err(e) => {
                    tracing::warn!(scope = %key, error = %e, "Warm-up lock unavailable; proceeding");
                }
            }
        }

        let result = self.runner.run(request).await;

        if acquired {
            if let Err(e) = self.store.release(&lock_key).await {
                tracing::warn!(scope = %key, error = %e, "Failed to release warm-up lock");
            }
        }

        let elapsed = self.clock.now().saturating_duration_since(started).as_secs_f64();
        match result {
            Ok(()) => {
                if let Err(e) = self.store.set(&marker_key, &json!(true), self.config.cooldown).await {
                    tracing::warn!(scope = %key, error = %e, "Failed to write warm-up marker");
                }
                self.state().last_accepted.insert(key.clone(), self.clock.now());
                self.metrics.runs_completed.fetch_add(1, Ordering::Relaxed);
                with_metrics(|m| m.record_warmup_run(reason, "completed", elapsed));
                tracing::info!(scope = %key, reason, elapsed_secs = elapsed, "Overview warm-up completed");
            }
            Err(e) => {
                self.state().last_accepted.remove(&key);
                self.metrics.runs_failed.fetch_add(1, Ordering::Relaxed);
                with_metrics(|m| m.record_warmup_run(reason, "failed", elapsed));
                tracing::error!(scope = %key, reason, error = %e, "Overview warm-up failed");
            }
        }
    }

    fn record_skip(&self, reason: &str, outcome: &str) {
        self.metrics.runs_skipped.fetch_add(1, Ordering::Relaxed);
        with_metrics(|m| m.record_warmup_run(reason, outcome, 0.0));
    }
}

/// Clears the running flag if the task unwinds before finishing. Scopes
/// that never ran lose their cooldown stamp.
struct RunningGuard<'a> {
    inner: &'a CoordinatorInner,
    generation: u64,
    current: Option<String>,
    armed: bool,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        {
            let mut state = self.inner.state();
            if state.generation == self.generation {
                tracing::error!(generation = self.generation, "Overview warm-up task aborted");
                state.running = false;
                let dropped: Vec<String> = state
                    .queue
                    .drain(..)
                    .map(|request| request.scope_key())
                    .chain(self.current.take())
                    .collect();
                for key in dropped {
                    state.last_accepted.remove(&key);
                }
            }
        }
        self.inner.idle.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use academy_storage::{InMemoryCacheStore, ManualClock};
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Semaphore;

    /// Runner that blocks until released and counts runs.
    struct GatedRunner {
        gate: Semaphore,
        runs: AtomicUsize,
        keys: Mutex<Vec<String>>,
        fail: bool,
    }

    impl GatedRunner {
        fn new(open: bool, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                gate: Semaphore::new(if open { Semaphore::MAX_PERMITS } else { 0 }),
                runs: AtomicUsize::new(0),
                keys: Mutex::new(Vec::new()),
                fail,
            })
        }
    }

    #[async_trait]
    impl WarmupRunner for GatedRunner {
        async fn run(&self, request: &WarmupRequest) -> Result<(), AggregationError> {
            let permit = self.gate.acquire().await;
            drop(permit);
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.keys.lock().expect("keys").push(request.scope_key());
            if self.fail {
                return Err(AggregationError::SourceFailed {
                    family: "kpis".to_string(),
                    reason: "boom".to_string(),
                });
            }
            Ok(())
        }
    }

    fn coordinator(runner: Arc<GatedRunner>) -> (WarmupCoordinator, Arc<ManualClock>, Arc<InMemoryCacheStore>) {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(InMemoryCacheStore::with_clock(clock.clone()));
        let coordinator = WarmupCoordinator::new(runner, store.clone(), clock.clone(), WarmupConfig::default(), 3);
        (coordinator, clock, store)
    }

    #[tokio::test]
    async fn test_cooldown_throttles_repeat_trigger() {
        let runner = GatedRunner::new(true, false);
        let (coordinator, clock, _store) = coordinator(runner.clone());

        assert_eq!(coordinator.trigger_cache_miss(None, None), TriggerOutcome::Started);
        coordinator.wait_idle().await;
        assert_eq!(coordinator.trigger_cache_miss(None, None), TriggerOutcome::Throttled);

        clock.advance(Duration::from_secs(61));
        assert_eq!(coordinator.trigger_cache_miss(None, None), TriggerOutcome::Started);
        coordinator.wait_idle().await;
        assert_eq!(runner.runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_forced_trigger_bypasses_cooldown() {
        let runner = GatedRunner::new(true, false);
        let (coordinator, _clock, _store) = coordinator(runner.clone());

        assert_eq!(coordinator.trigger_startup(), TriggerOutcome::Started);
        coordinator.wait_idle().await;
        assert_eq!(coordinator.trigger_startup(), TriggerOutcome::Started);
        coordinator.wait_idle().await;
        assert_eq!(runner.runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_single_task_queues_and_dedupes() {
        let runner = GatedRunner::new(false, false);
        let (coordinator, _clock, _store) = coordinator(runner.clone());

        assert_eq!(coordinator.trigger_startup(), TriggerOutcome::Started);
        assert!(coordinator.is_running());

        let six = WarmupScope::new([ChartRange::Months6], [3]);
        let four = WarmupScope::new([ChartRange::Weeks4], [3]);
        assert_eq!(coordinator.trigger(WarmupRequest::cache_miss(six.clone())), TriggerOutcome::Queued);
        assert_eq!(coordinator.trigger(WarmupRequest::cache_miss(four)), TriggerOutcome::Queued);
        assert_eq!(coordinator.trigger(WarmupRequest::startup(six)), TriggerOutcome::Queued);
        assert_eq!(coordinator.pending(), 2);

        runner.gate.add_permits(Semaphore::MAX_PERMITS / 2);
        coordinator.wait_idle().await;

        assert!(!coordinator.is_running());
        assert_eq!(coordinator.pending(), 0);
        let keys = runner.keys.lock().expect("keys").clone();
        assert_eq!(
            keys,
            vec![
                "kpis+charts:4w,1m,6m,12m+activity:3".to_string(),
                "kpis+charts:6m+activity:3".to_string(),
                "kpis+charts:4w+activity:3".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_marker_from_other_worker_skips_run() {
        let runner = GatedRunner::new(true, false);
        let (coordinator, _clock, store) = coordinator(runner.clone());
        let scope = WarmupScope::new([ChartRange::Months6], [3]);
        store
            .set(
                &format!("{}:{}", WARMUP_RECENT_PREFIX, scope.scope_key()),
                &json!(true),
                Duration::from_secs(60),
            )
            .await
            .expect("set marker");

        coordinator.trigger(WarmupRequest::cache_miss(scope));
        coordinator.wait_idle().await;

        assert_eq!(runner.runs.load(Ordering::SeqCst), 0);
        assert_eq!(coordinator.metrics().runs_skipped, 1);
    }

    #[tokio::test]
    async fn test_held_lock_skips_run() {
        let runner = GatedRunner::new(true, false);
        let (coordinator, _clock, store) = coordinator(runner.clone());
        let scope = WarmupScope::new([ChartRange::Months12], [3]);
        let lock_key = format!("{}:{}", WARMUP_LOCK_PREFIX, scope.scope_key());
        assert!(store.try_acquire(&lock_key, Duration::from_secs(15)).await.expect("lock"));

        coordinator.trigger(WarmupRequest::cache_miss(scope));
        coordinator.wait_idle().await;

        assert_eq!(runner.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_success_writes_marker_and_releases_lock() {
        let runner = GatedRunner::new(true, false);
        let (coordinator, _clock, store) = coordinator(runner.clone());
        let scope = WarmupScope::new([ChartRange::Month1], [5]);
        let key = scope.scope_key();

        coordinator.trigger(WarmupRequest::data_changed(scope));
        coordinator.wait_idle().await;

        let marker = store.get(&format!("{}:{}", WARMUP_RECENT_PREFIX, key)).await.expect("get");
        assert!(marker.is_some());
        let lock_free = store
            .try_acquire(&format!("{}:{}", WARMUP_LOCK_PREFIX, key), Duration::from_secs(15))
            .await
            .expect("lock");
        assert!(lock_free);
    }

    #[tokio::test]
    async fn test_failure_is_contained_and_clears_cooldown() {
        let runner = GatedRunner::new(true, true);
        let (coordinator, _clock, _store) = coordinator(runner.clone());

        assert_eq!(coordinator.trigger_cache_miss(None, None), TriggerOutcome::Started);
        coordinator.wait_idle().await;

        assert!(!coordinator.is_running());
        assert_eq!(coordinator.metrics().runs_failed, 1);
        assert_eq!(coordinator.trigger_cache_miss(None, None), TriggerOutcome::Started);
        coordinator.wait_idle().await;
    }

    #[tokio::test]
    async fn test_irrelevant_change_is_ignored() {
        let runner = GatedRunner::new(true, false);
        let (coordinator, _clock, _store) = coordinator(runner);

        let pending = DataChange::Payment {
            status: academy_core::PaymentStatus::Pending,
        };
        assert_eq!(coordinator.notify_change(pending), None);
        assert_eq!(coordinator.notify_change(DataChange::Teacher), Some(TriggerOutcome::Started));
        coordinator.wait_idle().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_inside_cooldown_reruns_when_it_ends() {
        let runner = GatedRunner::new(true, false);
        let (coordinator, _clock, _store) = coordinator(runner.clone());

        assert_eq!(coordinator.trigger_startup(), TriggerOutcome::Started);
        coordinator.wait_idle().await;

        // Both changes fold into one re-run.
        assert_eq!(coordinator.notify_change(DataChange::Teacher), Some(TriggerOutcome::Deferred));
        assert_eq!(coordinator.notify_change(DataChange::Learner), Some(TriggerOutcome::Deferred));
        assert_eq!(runner.runs.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(61)).await;
        coordinator.wait_idle().await;

        assert_eq!(runner.runs.load(Ordering::SeqCst), 2);
        let metrics = coordinator.metrics();
        assert_eq!(metrics.triggers_deferred, 2);
        assert_eq!(metrics.triggers_started, 2);
        assert_eq!(metrics.runs_completed, 2);
    }

    #[tokio::test]
    async fn test_cache_miss_inside_cooldown_is_not_deferred() {
        let runner = GatedRunner::new(true, false);
        let (coordinator, _clock, _store) = coordinator(runner);

        assert_eq!(coordinator.trigger_cache_miss(None, None), TriggerOutcome::Started);
        coordinator.wait_idle().await;
        assert_eq!(coordinator.trigger_cache_miss(None, None), TriggerOutcome::Throttled);
        assert_eq!(coordinator.metrics().triggers_deferred, 0);
    }

    /// Runner that panics for one scope once released.
    struct PanickingRunner {
        gate: Semaphore,
        panic_on: String,
        runs: AtomicUsize,
    }

    #[async_trait]
    impl WarmupRunner for PanickingRunner {
        async fn run(&self, request: &WarmupRequest) -> Result<(), AggregationError> {
            let permit = self.gate.acquire().await;
            drop(permit);
            if request.scope_key() == self.panic_on {
                panic!("aggregation blew up");
            }
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_aborted_task_clears_stamps_of_unrun_scopes() {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(InMemoryCacheStore::with_clock(clock.clone()));
        let runner = Arc::new(PanickingRunner {
            gate: Semaphore::new(0),
            panic_on: WarmupScope::full(3).scope_key(),
            runs: AtomicUsize::new(0),
        });
        let coordinator =
            WarmupCoordinator::new(runner.clone(), store, clock, WarmupConfig::default(), 3);

        assert_eq!(coordinator.trigger_startup(), TriggerOutcome::Started);
        let six = WarmupScope::new([ChartRange::Months6], [3]);
        assert_eq!(coordinator.trigger(WarmupRequest::cache_miss(six.clone())), TriggerOutcome::Queued);
        assert_eq!(coordinator.trigger(WarmupRequest::cache_miss(six.clone())), TriggerOutcome::Throttled);

        runner.gate.add_permits(Semaphore::MAX_PERMITS / 2);
        coordinator.wait_idle().await;

        assert!(!coordinator.is_running());
        assert_eq!(coordinator.pending(), 0);
        assert_eq!(runner.runs.load(Ordering::SeqCst), 0);

        // The queued scope never ran, so it is not held back by the cooldown.
        assert_eq!(coordinator.trigger(WarmupRequest::cache_miss(six)), TriggerOutcome::Started);
        coordinator.wait_idle().await;
        assert_eq!(runner.runs.load(Ordering::SeqCst), 1);

        let full = WarmupRequest::data_changed(coordinator.full_scope());
        assert_eq!(coordinator.trigger(full), TriggerOutcome::Started);
    }

    #[test]
    fn test_trigger_without_runtime() {
        let runner = GatedRunner::new(true, false);
        let (coordinator, _clock, _store) = coordinator(runner);

        assert_eq!(coordinator.trigger_startup(), TriggerOutcome::Unavailable);
        assert!(!coordinator.is_running());
    }
}
