//! Cache store trait.
//!
//! This module defines the contract every shared cache store must satisfy.
//! Payloads are opaque JSON values; each entry carries its own TTL.

use std::time::Duration;

use academy_core::CacheError;
use async_trait::async_trait;
use serde_json::Value;

/// Shared key-value store used by the overview cache and the warm-up lock.
///
/// Implementations must be thread-safe. `add` must be atomic with respect
/// to concurrent callers of the same store: at most one caller may observe
/// `true` for an absent (or expired) key.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get a live value, or `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    /// Store a value, replacing any existing entry.
    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), CacheError>;

    /// Store a value only if the key is absent. Returns whether it was stored.
    async fn add(&self, key: &str, value: &Value, ttl: Duration) -> Result<bool, CacheError>;

    /// Remove a value. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Get store statistics.
    async fn stats(&self) -> Result<CacheStats, CacheError>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Number of entries dropped after their TTL elapsed.
    pub expirations: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
