//! Academy Storage - cache stores and time sources for the admin overview.

pub mod cache;
pub mod clock;

pub use cache::{
    AdvisoryLock, CacheRead, CacheStats, CacheStore, FallbackCache, InMemoryCacheStore,
    LmdbCacheError, LmdbCacheStore, ReadSource, WriteOutcome,
};
pub use clock::{Clock, ManualClock, SystemClock};
