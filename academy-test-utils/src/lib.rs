//! Academy Test Utilities
//!
//! Shared test infrastructure for the academy workspace:
//! - [`FlakyCacheStore`], a cache store whose outages tests switch on and off
//! - Proptest generators for metric identities and records
//! - Fixtures for the records the overview aggregates

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

pub use academy_core::{
    CacheError, CacheKey, ChartRange, CourseRecord, GraduationRecord, LearnerRecord, MetricSlug,
    PaymentRecord, PaymentStatus, TeacherRecord, VisibilityTier, WarmupScope,
};
pub use academy_storage::{CacheStats, CacheStore, Clock, InMemoryCacheStore, ManualClock};

// ============================================================================
// FLAKY CACHE STORE
// ============================================================================

/// In-memory store that fails every call while marked unavailable.
///
/// Data written before an outage survives it, like a shared store that
/// comes back after a network partition.
#[derive(Debug)]
pub struct FlakyCacheStore {
    inner: InMemoryCacheStore,
    available: AtomicBool,
    failed_calls: AtomicU64,
    add_calls: AtomicU64,
}

impl FlakyCacheStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: InMemoryCacheStore::with_clock(clock),
            available: AtomicBool::new(true),
            failed_calls: AtomicU64::new(0),
            add_calls: AtomicU64::new(0),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Calls rejected while unavailable.
    pub fn failed_calls(&self) -> u64 {
        self.failed_calls.load(Ordering::SeqCst)
    }

    /// `add` calls made, including rejected ones. Counts lock attempts.
    pub fn add_calls(&self) -> u64 {
        self.add_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), CacheError> {
        if self.is_available() {
            Ok(())
        } else {
            self.failed_calls.fetch_add(1, Ordering::SeqCst);
            Err(CacheError::unavailable("connection refused"))
        }
    }
}

#[async_trait]
impl CacheStore for FlakyCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), CacheError> {
        self.check()?;
        self.inner.set(key, value, ttl).await
    }

    async fn add(&self, key: &str, value: &Value, ttl: Duration) -> Result<bool, CacheError> {
        self.add_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.add(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.check()?;
        self.inner.delete(key).await
    }

    async fn stats(&self) -> Result<CacheStats, CacheError> {
        self.check()?;
        self.inner.stats().await
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for overview identities and records.

    use super::*;
    use chrono::{DateTime, Utc};
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    pub fn arb_uuid() -> impl Strategy<Value = Uuid> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    /// Timestamps between 2020 and 2030.
    pub fn arb_timestamp() -> impl Strategy<Value = DateTime<Utc>> {
        (1577836800i64..1893456000i64)
            .prop_map(|secs| DateTime::from_timestamp(secs, 0).unwrap_or_default())
    }

    pub fn arb_tier() -> impl Strategy<Value = VisibilityTier> {
        prop_oneof![Just(VisibilityTier::Full), Just(VisibilityTier::Masked)]
    }

    pub fn arb_chart_range() -> impl Strategy<Value = ChartRange> {
        prop::sample::select(ChartRange::ALL.to_vec())
    }

    pub fn arb_activity_limit() -> impl Strategy<Value = usize> {
        1usize..=50
    }

    pub fn arb_metric_slug() -> impl Strategy<Value = MetricSlug> {
        prop_oneof![
            Just(MetricSlug::kpis()),
            arb_chart_range().prop_map(MetricSlug::charts),
            arb_activity_limit().prop_map(MetricSlug::activity),
        ]
    }

    pub fn arb_cache_key() -> impl Strategy<Value = CacheKey> {
        (arb_metric_slug(), arb_tier()).prop_map(|(slug, tier)| CacheKey::new(slug, tier))
    }

    pub fn arb_scope() -> impl Strategy<Value = WarmupScope> {
        (
            prop::collection::vec(arb_chart_range(), 0..6),
            prop::collection::vec(arb_activity_limit(), 0..4),
        )
            .prop_map(|(ranges, limits)| WarmupScope::new(ranges, limits))
    }

    /// VND amounts up to one billion, whole dong.
    pub fn arb_amount() -> impl Strategy<Value = Decimal> {
        (0i64..1_000_000_000).prop_map(Decimal::from)
    }

    pub fn arb_payment_status() -> impl Strategy<Value = PaymentStatus> {
        prop_oneof![
            Just(PaymentStatus::Pending),
            Just(PaymentStatus::Confirmed),
            Just(PaymentStatus::Refunded),
        ]
    }

    pub fn arb_payment() -> impl Strategy<Value = PaymentRecord> {
        (arb_uuid(), arb_amount(), arb_payment_status(), arb_timestamp()).prop_map(
            |(id, amount, status, paid_at)| PaymentRecord {
                id,
                amount,
                status,
                paid_at,
            },
        )
    }

    pub fn arb_learner() -> impl Strategy<Value = LearnerRecord> {
        (
            arb_uuid(),
            prop::option::of("[A-Z][a-z]{1,8} [A-Z][a-z]{1,8}"),
            any::<bool>(),
            prop::option::of(arb_timestamp()),
        )
            .prop_map(|(id, full_name, is_active, enrolled_at)| LearnerRecord {
                id,
                full_name,
                course_name: None,
                is_active,
                enrolled_at,
            })
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built records for common overview scenarios.

    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    /// 2024-06-15 10:00 in UTC+7.
    pub fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 3, 0, 0)
            .single()
            .unwrap_or_default()
    }

    /// A manual clock starting at [`fixed_now`].
    pub fn manual_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(fixed_now()))
    }

    pub fn learner(name: &str, enrolled_at: DateTime<Utc>) -> LearnerRecord {
        LearnerRecord {
            id: Uuid::now_v7(),
            full_name: Some(name.to_string()),
            course_name: Some("IELTS Foundation".to_string()),
            is_active: true,
            enrolled_at: Some(enrolled_at),
        }
    }

    pub fn teacher(name: &str, joined_at: DateTime<Utc>) -> TeacherRecord {
        TeacherRecord {
            id: Uuid::now_v7(),
            full_name: Some(name.to_string()),
            specialization: Some("IELTS".to_string()),
            is_active: true,
            joined_at: Some(joined_at),
        }
    }

    pub fn graduation(name: &str, completed_at: Option<DateTime<Utc>>) -> GraduationRecord {
        GraduationRecord {
            id: Uuid::now_v7(),
            student_name: Some(name.to_string()),
            course_name: Some("IELTS Foundation".to_string()),
            testimonial: None,
            completed_at,
            updated_at: None,
        }
    }

    /// An inactive course, shown in the feed as upcoming.
    pub fn upcoming_course(title: &str, created_at: DateTime<Utc>) -> CourseRecord {
        CourseRecord {
            id: Uuid::now_v7(),
            title: title.to_string(),
            level: Some("Beginner".to_string()),
            is_active: false,
            created_at: Some(created_at),
        }
    }

    pub fn payment(amount: i64, status: PaymentStatus, paid_at: DateTime<Utc>) -> PaymentRecord {
        PaymentRecord {
            id: Uuid::now_v7(),
            amount: Decimal::from(amount),
            status,
            paid_at,
        }
    }

    pub fn confirmed_payment(amount: i64, paid_at: DateTime<Utc>) -> PaymentRecord {
        payment(amount, PaymentStatus::Confirmed, paid_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_flaky_store_outage_keeps_data() -> Result<(), CacheError> {
        let store = FlakyCacheStore::new(fixtures::manual_clock());
        let ttl = Duration::from_secs(60);

        store.set("k", &json!(1), ttl).await?;
        store.set_available(false);
        assert!(store.get("k").await.is_err());
        assert!(store.add("lock", &json!(1), ttl).await.is_err());

        store.set_available(true);
        assert_eq!(store.get("k").await?, Some(json!(1)));
        assert_eq!(store.failed_calls(), 2);
        assert_eq!(store.add_calls(), 1);
        Ok(())
    }
}
