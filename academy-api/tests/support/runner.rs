//! Warm-up runner double that counts runs and can be held or made to fail.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use academy_api::jobs::{WarmupConfig, WarmupCoordinator, WarmupRequest, WarmupRunner};
use academy_core::AggregationError;
use academy_storage::CacheStore;
use academy_test_utils::ManualClock;
use async_trait::async_trait;
use tokio::sync::Semaphore;

pub struct CountingWarmupRunner {
    gate: Semaphore,
    runs: AtomicUsize,
    scopes: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl CountingWarmupRunner {
    /// Runner that completes immediately.
    pub fn open() -> Arc<Self> {
        Arc::new(Self::with_permits(Semaphore::MAX_PERMITS))
    }

    /// Runner that blocks every run until [`release`](Self::release).
    pub fn held() -> Arc<Self> {
        Arc::new(Self::with_permits(0))
    }

    fn with_permits(permits: usize) -> Self {
        Self {
            gate: Semaphore::new(permits),
            runs: AtomicUsize::new(0),
            scopes: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    pub fn release(&self) {
        self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }

    pub fn fail_runs(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    /// Scope keys in the order they ran.
    pub fn scopes(&self) -> Vec<String> {
        self.scopes.lock().expect("scopes").clone()
    }
}

#[async_trait]
impl WarmupRunner for CountingWarmupRunner {
    async fn run(&self, request: &WarmupRequest) -> Result<(), AggregationError> {
        drop(self.gate.acquire().await);
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.scopes.lock().expect("scopes").push(request.scope_key());

        if self.fail.load(Ordering::SeqCst) {
            return Err(AggregationError::SourceFailed {
                family: "kpis".to_string(),
                reason: "source offline".to_string(),
            });
        }
        Ok(())
    }
}

pub fn coordinator_with(
    runner: Arc<CountingWarmupRunner>,
    store: Arc<dyn CacheStore>,
    clock: Arc<ManualClock>,
) -> WarmupCoordinator {
    WarmupCoordinator::new(
        runner,
        store,
        clock,
        WarmupConfig {
            cooldown: Duration::from_secs(60),
            lock_ttl: Duration::from_secs(15),
            startup_warmup: false,
        },
        3,
    )
}
