//! Display formatting shared by the dashboard and landing page.
//!
//! Numbers use the Vietnamese convention: `.` groups thousands and `,`
//! separates decimals.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Replaces financial figures for viewers without finance access.
pub const MASKED_PLACEHOLDER: &str = "****";

/// Shown when an event has no timestamp.
pub const UNKNOWN_TIME_LABEL: &str = "Chưa xác định";

pub const CURRENCY_SUFFIX: &str = "VND";

pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M";

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    out
}

/// `1234567` → `"1.234.567"`.
pub fn format_int(value: i64) -> String {
    let grouped = group_thousands(&value.unsigned_abs().to_string());
    if value < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// `1234.5` → `"1.234,50 VND"`, `1000` → `"1.000 VND"`.
///
/// Amounts are rounded to two decimals (half to even) and a zero fraction
/// is dropped.
pub fn format_currency(amount: Decimal) -> String {
    let rounded = amount.round_dp(2);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let abs = rounded.abs();
    let whole = abs.trunc();
    let cents = ((abs - whole) * Decimal::ONE_HUNDRED)
        .round()
        .to_u32()
        .unwrap_or(0);

    let whole = whole.to_u128().unwrap_or(0);

    let mut formatted = group_thousands(&whole.to_string());
    if cents != 0 {
        formatted.push_str(&format!(",{:02}", cents));
    }
    if negative {
        formatted.insert(0, '-');
    }
    format!("{} {}", formatted, CURRENCY_SUFFIX)
}

/// Local `dd/mm/YYYY HH:MM`, or [`UNKNOWN_TIME_LABEL`] when absent.
pub fn format_timestamp(moment: Option<DateTime<Utc>>, offset: FixedOffset) -> String {
    match moment {
        Some(moment) => moment
            .with_timezone(&offset)
            .format(TIMESTAMP_FORMAT)
            .to_string(),
        None => UNKNOWN_TIME_LABEL.to_string(),
    }
}

/// Full years elapsed since `start`, never negative.
pub fn experience_years(start: Option<NaiveDate>, today: NaiveDate) -> Option<u32> {
    let start = start?;
    let mut years = today.year() - start.year();
    if (today.month(), today.day()) < (start.month(), start.day()) {
        years -= 1;
    }
    Some(years.max(0) as u32)
}

fn normalize_number(value: f64) -> Option<String> {
    if !value.is_finite() || value == 0.0 {
        return None;
    }
    if value.fract() == 0.0 {
        Some(format!("{}", value as i64))
    } else {
        Some(format!("{}", (value * 10.0).round() / 10.0))
    }
}

/// `"12 lessons • 36 hours"`, one of the halves, or `"Flexible"`.
pub fn course_duration(duration_hours: Option<f64>, lesson_count: Option<u32>) -> String {
    let hours = duration_hours.and_then(normalize_number);
    let lessons = lesson_count.filter(|n| *n > 0).map(|n| n.to_string());
    match (lessons, hours) {
        (Some(lessons), Some(hours)) => format!("{} lessons • {} hours", lessons, hours),
        (None, Some(hours)) => format!("{} hours", hours),
        (Some(lessons), None) => format!("{} lessons", lessons),
        (None, None) => "Flexible".to_string(),
    }
}

/// Up to two upper-cased initials, `"HV"` when the name is blank.
pub fn initials(name: &str) -> String {
    let initials: String = name
        .split_whitespace()
        .filter_map(|part| part.chars().next())
        .flat_map(char::to_uppercase)
        .take(2)
        .collect();
    if initials.is_empty() {
        "HV".to_string()
    } else {
        initials
    }
}

/// First `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Normalised health of an auxiliary service shown in the admin footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Up,
    Down,
    Unknown,
}

impl ServiceStatus {
    pub fn normalize(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return Self::Unknown;
        };
        match value.trim().to_ascii_lowercase().as_str() {
            "up" | "ok" | "running" | "ready" | "healthy" | "online" => Self::Up,
            "down" | "error" | "failed" | "offline" | "unhealthy" => Self::Down,
            _ => Self::Unknown,
        }
    }
}
