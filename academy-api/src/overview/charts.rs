//! Trend charts.
//!
//! Two bucketing paths:
//! - calendar months in local time, `months_back + 1` buckets labelled
//!   `%m/%Y`, oldest first (`1m`, `6m`, `12m`);
//! - four rolling 7-day spans ending now, labelled `dd/mm` (`4w`).
//!
//! Every bucket is present in every dataset, zero-filled when no event
//! falls into it.

use academy_core::{AggregationError, ChartRange, VisibilityTier, MASKED_PLACEHOLDER};
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::source::OverviewSource;

const WEEK_BUCKETS: i64 = 4;
const GRID_COLOR: &str = "rgba(148, 163, 184, 0.2)";

/// Start of the local calendar month `delta` months away from `now`'s.
fn shifted_month_start(now: DateTime<Utc>, offset: FixedOffset, delta: i32) -> DateTime<Utc> {
    let local = now.with_timezone(&offset);
    let index = local.year() * 12 + local.month0() as i32 + delta;
    let (year, month0) = (index.div_euclid(12), index.rem_euclid(12));

    NaiveDate::from_ymd_opt(year, month0 as u32 + 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .and_then(|naive| offset.from_local_datetime(&naive).single())
        .map(|start| start.with_timezone(&Utc))
        .unwrap_or(now)
}

/// Local midnight on the 1st, `months_back` months before `now`'s month.
pub fn month_start(now: DateTime<Utc>, offset: FixedOffset, months_back: u32) -> DateTime<Utc> {
    shifted_month_start(now, offset, -(months_back as i32))
}

/// One labelled time span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartBucket {
    pub label: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    inclusive_end: bool,
}

impl ChartBucket {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && (at < self.end || (self.inclusive_end && at == self.end))
    }
}

pub fn month_buckets(now: DateTime<Utc>, offset: FixedOffset, months_back: u32) -> Vec<ChartBucket> {
    (0..=months_back as i32)
        .rev()
        .map(|back| {
            let start = shifted_month_start(now, offset, -back);
            ChartBucket {
                label: start.with_timezone(&offset).format("%m/%Y").to_string(),
                start,
                end: shifted_month_start(now, offset, 1 - back),
                inclusive_end: false,
            }
        })
        .collect()
}

pub fn week_buckets(now: DateTime<Utc>, offset: FixedOffset) -> Vec<ChartBucket> {
    (0..WEEK_BUCKETS)
        .rev()
        .map(|weeks_ago| {
            let end = now - Duration::days(7 * weeks_ago);
            let start = end - Duration::days(7);
            ChartBucket {
                label: start.with_timezone(&offset).format("%d/%m").to_string(),
                start,
                end,
                inclusive_end: weeks_ago == 0,
            }
        })
        .collect()
}

pub fn buckets_for(range: ChartRange, now: DateTime<Utc>, offset: FixedOffset) -> Vec<ChartBucket> {
    if range.uses_week_buckets() {
        week_buckets(now, offset)
    } else {
        month_buckets(now, offset, range.months_back())
    }
}

fn bucket_index(buckets: &[ChartBucket], at: DateTime<Utc>) -> Option<usize> {
    buckets.iter().position(|bucket| bucket.contains(at))
}

fn count_into(buckets: &[ChartBucket], events: &[DateTime<Utc>]) -> Vec<u64> {
    let mut counts = vec![0u64; buckets.len()];
    for at in events {
        if let Some(i) = bucket_index(buckets, *at) {
            counts[i] += 1;
        }
    }
    counts
}

/// Revenue for one bucket, or the placeholder shown to viewers without
/// finance access.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RevenueFigure {
    Amount(f64),
    Masked(String),
}

impl RevenueFigure {
    pub fn masked() -> Self {
        Self::Masked(MASKED_PLACEHOLDER.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPayload {
    pub range: ChartRange,
    pub range_label: String,
    pub labels: Vec<String>,
    /// One entry per label in both tiers; masked entries hold the placeholder.
    pub revenue: Vec<RevenueFigure>,
    pub registrations: Vec<u64>,
    pub completions: Vec<u64>,
    /// Chart.js config for the revenue bar chart. Not built for masked
    /// viewers.
    pub revenue_chart: Option<Value>,
    /// Chart.js config for the registrations/completions line chart.
    pub enrollment_chart: Value,
    pub finance_masked: bool,
    pub generated_at: DateTime<Utc>,
}

fn revenue_chart_config(labels: &[String], revenue: &[f64]) -> Value {
    json!({
        "type": "bar",
        "data": {
            "labels": labels,
            "datasets": [{
                "label": "Doanh thu (VND)",
                "data": revenue,
                "backgroundColor": "rgba(79, 70, 229, 0.85)",
                "borderRadius": 10,
            }],
        },
        "options": {
            "responsive": true,
            "maintainAspectRatio": false,
            "scales": {
                "y": { "beginAtZero": true, "grid": { "color": GRID_COLOR } },
                "x": { "grid": { "display": false } },
            },
            "plugins": { "legend": { "display": false } },
        },
    })
}

fn enrollment_chart_config(labels: &[String], registrations: &[u64], completions: &[u64]) -> Value {
    json!({
        "type": "line",
        "data": {
            "labels": labels,
            "datasets": [
                {
                    "label": "Đăng ký",
                    "data": registrations,
                    "borderColor": "#38bdf8",
                    "backgroundColor": "rgba(56, 189, 248, 0.25)",
                    "tension": 0.35,
                    "fill": true,
                },
                {
                    "label": "Hoàn thành",
                    "data": completions,
                    "borderColor": "#22c55e",
                    "backgroundColor": "rgba(34, 197, 94, 0.2)",
                    "tension": 0.35,
                    "fill": true,
                },
            ],
        },
        "options": {
            "responsive": true,
            "maintainAspectRatio": false,
            "plugins": { "legend": { "position": "bottom" } },
            "scales": {
                "y": { "beginAtZero": true, "grid": { "color": GRID_COLOR } },
                "x": { "grid": { "display": false } },
            },
        },
    })
}

pub async fn compute_charts(
    source: &dyn OverviewSource,
    tier: VisibilityTier,
    range: ChartRange,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<ChartPayload, AggregationError> {
    let buckets = buckets_for(range, now, offset);
    let since = buckets.first().map(|bucket| bucket.start).unwrap_or(now);

    let (payments, enrollments, completions) = tokio::try_join!(
        source.confirmed_payments_since(since),
        source.enrollments_since(since),
        source.completions_since(since),
    )?;

    let labels: Vec<String> = buckets.iter().map(|bucket| bucket.label.clone()).collect();
    let registrations = count_into(&buckets, &enrollments);
    let completions = count_into(&buckets, &completions);

    let amounts = if tier.is_masked() {
        None
    } else {
        let mut totals = vec![Decimal::ZERO; buckets.len()];
        for payment in &payments {
            if let Some(i) = bucket_index(&buckets, payment.paid_at) {
                totals[i] += payment.amount;
            }
        }
        Some(
            totals
                .into_iter()
                .map(|total| total.round_dp(2).to_f64().unwrap_or(0.0).max(0.0))
                .collect::<Vec<f64>>(),
        )
    };

    let revenue_chart = amounts
        .as_deref()
        .map(|amounts| revenue_chart_config(&labels, amounts));
    let revenue = match amounts {
        Some(amounts) => amounts.into_iter().map(RevenueFigure::Amount).collect(),
        None => vec![RevenueFigure::masked(); labels.len()],
    };

    Ok(ChartPayload {
        range,
        range_label: range.label().to_string(),
        revenue_chart,
        enrollment_chart: enrollment_chart_config(&labels, &registrations, &completions),
        labels,
        revenue,
        registrations,
        completions,
        finance_masked: tier.is_masked(),
        generated_at: now,
    })
}
