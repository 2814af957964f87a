//! Overview metric identities: slugs, visibility tiers, cache keys and
//! warm-up scopes.
//!
//! A [`CacheKey`] can only be built from a [`MetricSlug`] *and* a
//! [`VisibilityTier`], so a masked payload can never be written or read
//! under the full-tier key (and vice versa).

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AggregationError;

/// Prefix shared by every overview cache entry.
pub const KEY_PREFIX: &str = "admin_overview";

/// Whether a viewer may see financial figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisibilityTier {
    Full,
    Masked,
}

impl VisibilityTier {
    pub const ALL: [VisibilityTier; 2] = [VisibilityTier::Full, VisibilityTier::Masked];

    /// Tier for a viewer, given the finance capability check.
    pub fn for_viewer(can_view_finance: bool) -> Self {
        if can_view_finance {
            Self::Full
        } else {
            Self::Masked
        }
    }

    pub fn is_masked(&self) -> bool {
        matches!(self, Self::Masked)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Masked => "masked",
        }
    }
}

impl fmt::Display for VisibilityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selectable trend chart ranges.
///
/// `Weeks4` is the "zero months back" range and is bucketed by rolling
/// 7-day spans; every other range is bucketed by calendar month.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum ChartRange {
    #[serde(rename = "4w")]
    Weeks4,
    #[serde(rename = "1m")]
    Month1,
    #[default]
    #[serde(rename = "6m")]
    Months6,
    #[serde(rename = "12m")]
    Months12,
}

impl ChartRange {
    pub const ALL: [ChartRange; 4] = [
        ChartRange::Weeks4,
        ChartRange::Month1,
        ChartRange::Months6,
        ChartRange::Months12,
    ];

    /// Number of whole months before the current one covered by the range.
    pub fn months_back(&self) -> u32 {
        match self {
            Self::Weeks4 => 0,
            Self::Month1 => 1,
            Self::Months6 => 6,
            Self::Months12 => 12,
        }
    }

    pub fn uses_week_buckets(&self) -> bool {
        self.months_back() == 0
    }

    /// Query-string form (`?range=6m`).
    pub fn param(&self) -> &'static str {
        match self {
            Self::Weeks4 => "4w",
            Self::Month1 => "1m",
            Self::Months6 => "6m",
            Self::Months12 => "12m",
        }
    }

    /// Label shown in the range selector.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Weeks4 => "4 tuần gần nhất",
            Self::Month1 => "1 tháng",
            Self::Months6 => "6 tháng",
            Self::Months12 => "12 tháng",
        }
    }
}

impl fmt::Display for ChartRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.param())
    }
}

impl FromStr for ChartRange {
    type Err = AggregationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|range| range.param() == normalized)
            .ok_or(AggregationError::InvalidRange {
                value: s.to_string(),
            })
    }
}

/// Identifies one cacheable overview computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricSlug {
    Kpis,
    Charts(ChartRange),
    Activity(usize),
}

impl MetricSlug {
    pub fn kpis() -> Self {
        Self::Kpis
    }

    pub fn charts(range: ChartRange) -> Self {
        Self::Charts(range)
    }

    /// Activity feed slug; the limit is clamped to at least one item.
    pub fn activity(limit: usize) -> Self {
        Self::Activity(limit.max(1))
    }

    /// Family name used in logs and metric labels.
    pub fn family(&self) -> &'static str {
        match self {
            Self::Kpis => "kpis",
            Self::Charts(_) => "charts",
            Self::Activity(_) => "activity",
        }
    }
}

impl fmt::Display for MetricSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kpis => f.write_str("kpis"),
            Self::Charts(range) => write!(f, "charts:{}", range),
            Self::Activity(limit) => write!(f, "activity:{}", limit),
        }
    }
}

/// Cache key for one metric slug at one visibility tier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    inner: CacheKeyInner,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct CacheKeyInner {
    slug: MetricSlug,
    tier: VisibilityTier,
}

impl CacheKey {
    pub fn new(slug: MetricSlug, tier: VisibilityTier) -> Self {
        Self {
            inner: CacheKeyInner { slug, tier },
        }
    }

    pub fn slug(&self) -> MetricSlug {
        self.inner.slug
    }

    pub fn tier(&self) -> VisibilityTier {
        self.inner.tier
    }

    /// Store key: `admin_overview:<slug>:<tier>`.
    pub fn encode(&self) -> String {
        format!("{}:{}:{}", KEY_PREFIX, self.inner.slug, self.inner.tier)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// The set of metrics a warm-up run recomputes.
///
/// KPIs are always part of a scope. Chart ranges and activity limits are
/// kept in ordered sets so equal scopes always produce the same
/// [`scope_key`](WarmupScope::scope_key).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WarmupScope {
    ranges: BTreeSet<ChartRange>,
    activity_limits: BTreeSet<usize>,
}

impl WarmupScope {
    pub fn new(
        ranges: impl IntoIterator<Item = ChartRange>,
        activity_limits: impl IntoIterator<Item = usize>,
    ) -> Self {
        Self {
            ranges: ranges.into_iter().collect(),
            activity_limits: activity_limits.into_iter().map(|l| l.max(1)).collect(),
        }
    }

    /// Every chart range plus the given activity limit.
    pub fn full(activity_limit: usize) -> Self {
        Self::new(ChartRange::ALL, [activity_limit])
    }

    pub fn ranges(&self) -> impl Iterator<Item = ChartRange> + '_ {
        self.ranges.iter().copied()
    }

    pub fn activity_limits(&self) -> impl Iterator<Item = usize> + '_ {
        self.activity_limits.iter().copied()
    }

    /// Every slug this scope covers, KPIs first.
    pub fn slugs(&self) -> Vec<MetricSlug> {
        let mut slugs = vec![MetricSlug::Kpis];
        slugs.extend(self.ranges().map(MetricSlug::Charts));
        slugs.extend(self.activity_limits().map(MetricSlug::Activity));
        slugs
    }

    /// Canonical key, e.g. `kpis+charts:1m,6m+activity:3`.
    pub fn scope_key(&self) -> String {
        let mut key = String::from("kpis");
        if !self.ranges.is_empty() {
            let ranges: Vec<&str> = self.ranges.iter().map(|r| r.param()).collect();
            key.push_str("+charts:");
            key.push_str(&ranges.join(","));
        }
        if !self.activity_limits.is_empty() {
            let limits: Vec<String> = self.activity_limits.iter().map(|l| l.to_string()).collect();
            key.push_str("+activity:");
            key.push_str(&limits.join(","));
        }
        key
    }
}
