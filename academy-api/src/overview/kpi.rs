//! KPI cards.

use academy_core::format::{format_currency, format_int};
use academy_core::{AggregationError, VisibilityTier, MASKED_PLACEHOLDER};
use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::charts::month_start;
use super::source::OverviewSource;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KpiCard {
    pub id: String,
    pub title: String,
    pub value: String,
    pub meta: String,
    pub icon: String,
    pub accent: String,
}

impl KpiCard {
    fn new(id: &str, title: &str, value: String, meta: String, icon: &str, accent: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            value,
            meta,
            icon: icon.to_string(),
            accent: accent.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KpiPayload {
    pub cards: Vec<KpiCard>,
    pub generated_at: DateTime<Utc>,
    pub finance_masked: bool,
}

impl KpiPayload {
    pub fn card(&self, id: &str) -> Option<&KpiCard> {
        self.cards.iter().find(|card| card.id == id)
    }
}

/// Build the three KPI cards.
///
/// Revenue is the month-to-date sum of confirmed payments, where the month
/// starts at local midnight on the 1st.
pub async fn compute_kpis(
    source: &dyn OverviewSource,
    tier: VisibilityTier,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<KpiPayload, AggregationError> {
    let start = month_start(now, offset, 0);

    let (learners, teachers, payments, testimonials) = tokio::try_join!(
        source.learner_summary(start),
        source.teacher_summary(),
        source.confirmed_payments_since(start),
        source.testimonial_count(),
    )?;

    let revenue: Decimal = payments.iter().map(|p| p.amount).sum();
    let revenue_value = if tier.is_masked() {
        MASKED_PLACEHOLDER.to_string()
    } else {
        format_currency(revenue)
    };

    let cards = vec![
        KpiCard::new(
            "students",
            "Học viên",
            format_int(learners.active as i64),
            format!("+{} trong tháng", format_int(learners.new_this_month as i64)),
            "fa-user-graduate",
            "emerald",
        ),
        KpiCard::new(
            "teachers",
            "Giảng viên",
            format_int(teachers.active as i64),
            format!("Tổng: {}", format_int(teachers.total as i64)),
            "fa-person-chalkboard",
            "sky",
        ),
        KpiCard::new(
            "revenue",
            "Doanh thu tháng",
            revenue_value,
            format!("{} lời chứng thực mới", format_int(testimonials as i64)),
            "fa-coins",
            "violet",
        ),
    ];

    Ok(KpiPayload {
        cards,
        generated_at: now,
        finance_masked: tier.is_masked(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overview::source::InMemoryOverviewSource;
    use academy_core::{PaymentRecord, PaymentStatus};
    use chrono::TimeZone;
    use uuid::Uuid;

    fn offset() -> FixedOffset {
        FixedOffset::east_opt(7 * 3600).expect("valid offset")
    }

    fn payment(amount: i64, status: PaymentStatus, paid_at: DateTime<Utc>) -> PaymentRecord {
        PaymentRecord {
            id: Uuid::now_v7(),
            amount: Decimal::from(amount),
            status,
            paid_at,
        }
    }

    #[tokio::test]
    async fn test_zero_data_is_formatted() -> Result<(), AggregationError> {
        let source = InMemoryOverviewSource::new();
        let payload = compute_kpis(&source, VisibilityTier::Full, Utc::now(), offset()).await?;

        assert_eq!(payload.cards.len(), 3);
        assert_eq!(payload.card("students").map(|c| c.value.as_str()), Some("0"));
        assert_eq!(payload.card("students").map(|c| c.meta.as_str()), Some("+0 trong tháng"));
        assert_eq!(payload.card("teachers").map(|c| c.meta.as_str()), Some("Tổng: 0"));
        assert_eq!(payload.card("revenue").map(|c| c.value.as_str()), Some("0 VND"));
        Ok(())
    }

    #[tokio::test]
    async fn test_revenue_is_month_to_date_confirmed() -> Result<(), AggregationError> {
        // 2024-03-15 10:00 local
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 3, 0, 0).single().expect("date");
        let source = InMemoryOverviewSource::new();
        source.record_payment(payment(1_200_000, PaymentStatus::Confirmed, now))?;
        // 2024-03-01 00:30 local, still March
        let early = Utc.with_ymd_and_hms(2024, 2, 29, 17, 30, 0).single().expect("date");
        source.record_payment(payment(34_567, PaymentStatus::Confirmed, early))?;
        // 2024-02-29 23:00 local, February
        let february = Utc.with_ymd_and_hms(2024, 2, 29, 16, 0, 0).single().expect("date");
        source.record_payment(payment(999_999, PaymentStatus::Confirmed, february))?;
        source.record_payment(payment(500_000, PaymentStatus::Pending, now))?;

        let payload = compute_kpis(&source, VisibilityTier::Full, now, offset()).await?;
        assert_eq!(
            payload.card("revenue").map(|c| c.value.as_str()),
            Some("1.234.567 VND")
        );
        assert!(!payload.finance_masked);
        Ok(())
    }

    #[tokio::test]
    async fn test_masked_tier_hides_revenue() -> Result<(), AggregationError> {
        let now = Utc::now();
        let source = InMemoryOverviewSource::new();
        source.record_payment(payment(1_000, PaymentStatus::Confirmed, now))?;

        let payload = compute_kpis(&source, VisibilityTier::Masked, now, offset()).await?;
        assert_eq!(payload.card("revenue").map(|c| c.value.as_str()), Some("****"));
        assert!(payload.finance_masked);
        Ok(())
    }
}
