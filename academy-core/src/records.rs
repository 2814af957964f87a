//! Records the overview aggregates read from the persistent store.
//!
//! Only the fields the dashboard aggregates are modelled here.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerRecord {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub course_name: Option<String>,
    pub is_active: bool,
    pub enrolled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraduationRecord {
    pub id: Uuid,
    pub student_name: Option<String>,
    pub course_name: Option<String>,
    pub testimonial: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl GraduationRecord {
    /// When the completion happened, falling back to the last update.
    pub fn event_time(&self) -> Option<DateTime<Utc>> {
        self.completed_at.or(self.updated_at)
    }

    pub fn has_testimonial(&self) -> bool {
        self.testimonial
            .as_deref()
            .is_some_and(|text| !text.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeacherRecord {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub specialization: Option<String>,
    pub is_active: bool,
    pub joined_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseRecord {
    pub id: Uuid,
    pub title: String,
    pub level: Option<String>,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Confirmed,
    Refunded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub paid_at: DateTime<Utc>,
}

impl PaymentRecord {
    pub fn is_confirmed(&self) -> bool {
        self.status == PaymentStatus::Confirmed
    }
}

/// Learner counts for the KPI card.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnerSummary {
    pub active: u64,
    pub new_this_month: u64,
}

/// Teacher counts for the KPI card.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeacherSummary {
    pub active: u64,
    pub total: u64,
}

/// Kind of record whose change should refresh the overview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "entity")]
pub enum DataChange {
    Learner,
    Teacher,
    Payment { status: PaymentStatus },
}

impl DataChange {
    /// Only confirmed payments move the revenue figures.
    pub fn affects_overview(&self) -> bool {
        match self {
            Self::Learner | Self::Teacher => true,
            Self::Payment { status } => *status == PaymentStatus::Confirmed,
        }
    }
}
