//! Best-effort advisory locks on top of a cache store's add-if-absent.
//!
//! These are throttles, not mutual exclusion guarantees: the TTL bounds
//! how long a crashed holder can block others, and a store outage is
//! reported as an error so the caller can decide to proceed anyway.

use std::time::Duration;

use academy_core::CacheError;
use async_trait::async_trait;
use serde_json::json;

use super::traits::CacheStore;

#[async_trait]
pub trait AdvisoryLock: Send + Sync {
    /// Try to take `key` for `ttl`. `Ok(false)` means someone else holds it.
    async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError>;

    async fn release(&self, key: &str) -> Result<(), CacheError>;
}

#[async_trait]
impl<S> AdvisoryLock for S
where
    S: CacheStore + ?Sized,
{
    async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        self.add(key, &json!(1), ttl).await
    }

    async fn release(&self, key: &str) -> Result<(), CacheError> {
        self.delete(key).await
    }
}
