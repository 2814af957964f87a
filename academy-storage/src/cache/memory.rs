//! In-process cache store.
//!
//! Used when no shared store is configured and as the default in tests.
//! Expiry is measured on the injected [`Clock`], so TTLs can be exercised
//! deterministically with a `ManualClock`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use academy_core::CacheError;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;

use super::traits::{CacheStats, CacheStore};
use crate::clock::{Clock, SystemClock};

#[derive(Debug, Clone)]
struct StoredEntry {
    value: Value,
    expires_at: Instant,
}

/// DashMap-backed [`CacheStore`] with per-entry TTL.
#[derive(Debug)]
pub struct InMemoryCacheStore {
    entries: DashMap<String, StoredEntry>,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    fn entry_for(&self, value: &Value, ttl: Duration) -> StoredEntry {
        StoredEntry {
            value: value.clone(),
            expires_at: self.clock.now() + ttl,
        }
    }
}

impl Default for InMemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let now = self.clock.now();
        let live = match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => None,
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return Ok(None);
            }
        };

        match live {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(value))
            }
            None => {
                if self
                    .entries
                    .remove_if(key, |_, entry| entry.expires_at <= now)
                    .is_some()
                {
                    self.expirations.fetch_add(1, Ordering::Relaxed);
                }
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), CacheError> {
        let entry = self.entry_for(value, ttl);
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn add(&self, key: &str, value: &Value, ttl: Duration) -> Result<bool, CacheError> {
        let now = self.clock.now();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().expires_at > now {
                    return Ok(false);
                }
                occupied.insert(self.entry_for(value, ttl));
                self.expirations.fetch_add(1, Ordering::Relaxed);
                Ok(true)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(self.entry_for(value, ttl));
                Ok(true)
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats, CacheError> {
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.entries.len() as u64,
            expirations: self.expirations.load(Ordering::Relaxed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use serde_json::json;

    fn store_with_clock() -> (InMemoryCacheStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        (InMemoryCacheStore::with_clock(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_set_and_get() -> Result<(), CacheError> {
        let (store, _clock) = store_with_clock();
        store.set("k", &json!({"a": 1}), Duration::from_secs(10)).await?;
        assert_eq!(store.get("k").await?, Some(json!({"a": 1})));
        assert_eq!(store.get("missing").await?, None);

        let stats = store.stats().await?;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_entries_expire() -> Result<(), CacheError> {
        let (store, clock) = store_with_clock();
        store.set("k", &json!(1), Duration::from_secs(10)).await?;

        clock.advance(Duration::from_secs(10));

        assert_eq!(store.get("k").await?, None);
        let stats = store.stats().await?;
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.entry_count, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_add_only_when_absent() -> Result<(), CacheError> {
        let (store, clock) = store_with_clock();
        assert!(store.add("lock", &json!(1), Duration::from_secs(15)).await?);
        assert!(!store.add("lock", &json!(2), Duration::from_secs(15)).await?);
        assert_eq!(store.get("lock").await?, Some(json!(1)));

        clock.advance(Duration::from_secs(16));
        assert!(store.add("lock", &json!(3), Duration::from_secs(15)).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_absent_is_ok() -> Result<(), CacheError> {
        let store = InMemoryCacheStore::new();
        store.delete("nothing").await?;
        store.set("k", &json!(true), Duration::from_secs(5)).await?;
        store.delete("k").await?;
        assert_eq!(store.get("k").await?, None);
        Ok(())
    }
}
