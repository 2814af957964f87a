//! Read-through wrapper with a process-local fallback map.
//!
//! Every write goes to the shared store *and* the local map. Reads consult
//! the shared store first; the local map is only used while the store is
//! failing, so a reachable store stays authoritative (a miss there is a
//! real miss, even if this process still holds an older copy).
//!
//! No store error escapes this wrapper. Callers learn about degradation
//! through [`CacheRead`] and [`WriteOutcome`] instead.

use std::sync::Arc;
use std::time::{Duration, Instant};

use academy_core::{CacheError, CacheKey};
use dashmap::DashMap;
use serde_json::Value;

use super::traits::CacheStore;
use crate::clock::{Clock, SystemClock};

/// Where a cached value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSource {
    Shared,
    Fallback,
}

impl ReadSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shared => "shared",
            Self::Fallback => "fallback",
        }
    }
}

/// Result of a cache read.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheRead {
    Hit { value: Value, source: ReadSource },
    /// `degraded` is set when the shared store could not be queried.
    Miss { degraded: bool },
}

impl CacheRead {
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit { .. })
    }

    pub fn used_fallback(&self) -> bool {
        matches!(
            self,
            Self::Hit {
                source: ReadSource::Fallback,
                ..
            } | Self::Miss { degraded: true }
        )
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Hit { value, .. } => Some(value),
            Self::Miss { .. } => None,
        }
    }
}

/// Result of a cache write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    Stored,
    /// The shared store rejected the write; only this process will see it.
    FallbackOnly { error: CacheError },
}

impl WriteOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, Self::Stored)
    }
}

#[derive(Debug, Clone)]
struct LocalEntry {
    value: Value,
    expires_at: Instant,
}

/// Shared-store cache with a process-local safety net.
#[derive(Clone)]
pub struct FallbackCache {
    store: Arc<dyn CacheStore>,
    local: Arc<DashMap<String, LocalEntry>>,
    clock: Arc<dyn Clock>,
}

impl FallbackCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn CacheStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            local: Arc::new(DashMap::new()),
            clock,
        }
    }

    /// The underlying shared store.
    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub async fn get(&self, key: &CacheKey) -> CacheRead {
        let encoded = key.encode();
        match self.store.get(&encoded).await {
            Ok(Some(value)) => CacheRead::Hit {
                value,
                source: ReadSource::Shared,
            },
            Ok(None) => CacheRead::Miss { degraded: false },
            Err(error) => {
                tracing::warn!(key = %encoded, error = %error, "overview cache get failed");
                match self.local_get(&encoded) {
                    Some(value) => CacheRead::Hit {
                        value,
                        source: ReadSource::Fallback,
                    },
                    None => CacheRead::Miss { degraded: true },
                }
            }
        }
    }

    pub async fn set(&self, key: &CacheKey, value: Value, ttl: Duration) -> WriteOutcome {
        let encoded = key.encode();
        let outcome = match self.store.set(&encoded, &value, ttl).await {
            Ok(()) => WriteOutcome::Stored,
            Err(error) => {
                tracing::warn!(key = %encoded, error = %error, "overview cache set failed");
                WriteOutcome::FallbackOnly { error }
            }
        };

        self.local.insert(
            encoded,
            LocalEntry {
                value,
                expires_at: self.clock.now() + ttl,
            },
        );
        outcome
    }

    /// Number of entries held in the local map.
    pub fn local_len(&self) -> usize {
        self.local.len()
    }

    fn local_get(&self, encoded: &str) -> Option<Value> {
        let now = self.clock.now();
        let entry = self.local.get(encoded)?;
        if entry.expires_at > now {
            Some(entry.value.clone())
        } else {
            None
        }
    }
}

impl std::fmt::Debug for FallbackCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackCache")
            .field("local_entries", &self.local.len())
            .finish_non_exhaustive()
    }
}
