//! Cache layer for the admin overview.
//!
//! * [`CacheStore`] is the shared key-value contract (get / set /
//!   add-if-absent / delete) with in-memory and LMDB implementations.
//! * [`FallbackCache`] wraps a store with a process-local map so overview
//!   readers never see a store failure.
//! * [`AdvisoryLock`] turns any store's add-if-absent into a best-effort,
//!   TTL-bounded lock.
//!
//! # Example
//!
//! ```ignore
//! let cache = FallbackCache::new(Arc::new(InMemoryCacheStore::new()));
//! let key = CacheKey::new(MetricSlug::kpis(), VisibilityTier::Masked);
//!
//! cache.set(&key, payload, Duration::from_secs(1800)).await;
//! match cache.get(&key).await {
//!     CacheRead::Hit { value, source } => { /* ... */ }
//!     CacheRead::Miss { degraded } => { /* schedule a warm-up */ }
//! }
//! ```

pub mod fallback;
pub mod lmdb_backend;
pub mod lock;
pub mod memory;
pub mod traits;

pub use fallback::{CacheRead, FallbackCache, ReadSource, WriteOutcome};
pub use lmdb_backend::{LmdbCacheError, LmdbCacheStore};
pub use lock::AdvisoryLock;
pub use memory::InMemoryCacheStore;
pub use traits::{CacheStats, CacheStore};
