//! Landing page content models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Optional publish/unpublish bounds on a content item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishWindow {
    pub publish_at: Option<DateTime<Utc>>,
    pub unpublish_at: Option<DateTime<Utc>>,
}

impl PublishWindow {
    pub fn always() -> Self {
        Self::default()
    }

    /// Live when published at or before `now` and not yet unpublished.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        let started = self.publish_at.map_or(true, |at| at <= now);
        let ended = self.unpublish_at.is_some_and(|at| at <= now);
        started && !ended
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavLocation {
    Header,
    FooterProgram,
    FooterAbout,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationLink {
    pub label: String,
    pub href: Option<String>,
    pub location: NavLocation,
    pub order: u32,
    pub is_active: bool,
}

/// Hero copy; blank fields fall back to the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeroSetting {
    pub eyebrow: String,
    pub typed_text: String,
    pub subtitle: String,
    pub primary_cta_label: String,
    pub primary_cta_href: String,
    pub secondary_cta_label: String,
    pub secondary_cta_href: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeroHighlight {
    pub icon: String,
    pub title: String,
    pub description: String,
}

/// A "why choose us" card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reason {
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub order: u32,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CourseLevel {
    Beginner,
    Intermediate,
    Advanced,
    AllLevels,
}

impl CourseLevel {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Beginner => "Beginner",
            Self::Intermediate => "Intermediate",
            Self::Advanced => "Advanced",
            Self::AllLevels => "Mọi trình độ",
        }
    }

    pub fn default_icon(&self) -> &'static str {
        match self {
            Self::Beginner => "fas fa-seedling",
            Self::Intermediate => "fas fa-chart-line",
            Self::Advanced => "fas fa-rocket",
            Self::AllLevels => "fas fa-layer-group",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeacherProfile {
    pub id: Uuid,
    pub full_name: String,
    pub specialization: Option<String>,
    pub bio: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub avatar_url: Option<String>,
    pub is_active: bool,
    pub is_featured: bool,
    pub order: u32,
    pub window: PublishWindow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseListing {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub level: CourseLevel,
    pub icon: Option<String>,
    pub duration: Option<String>,
    pub duration_hours: Option<f64>,
    pub lesson_count: Option<u32>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutstandingGraduate {
    pub id: Uuid,
    pub student_name: String,
    pub course_name: Option<String>,
    pub score_display: Option<String>,
    pub testimonial: Option<String>,
    pub photo_url: Option<String>,
    pub is_active: bool,
    pub order: u32,
    pub window: PublishWindow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessStory {
    pub id: Uuid,
    pub student_name: Option<String>,
    pub course_name: Option<String>,
    pub story: Option<String>,
    pub is_approved: bool,
    pub order: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementKind {
    Award,
    Milestone,
    Press,
    Certificate,
    Partnership,
    Other,
}

impl AchievementKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Award => "Giải thưởng",
            Self::Milestone => "Cột mốc",
            Self::Press => "Báo chí/Truyền thông",
            Self::Certificate => "Chứng nhận",
            Self::Partnership => "Hợp tác",
            Self::Other => "Khác",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: Uuid,
    pub title: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub kind: AchievementKind,
    pub year: Option<u16>,
    pub metric_value: Option<u64>,
    pub metric_suffix: Option<String>,
    pub image_url: Option<String>,
    pub image_alt: Option<String>,
    pub external_url: Option<String>,
    pub is_active: bool,
    pub order: u32,
    pub window: PublishWindow,
}

impl Achievement {
    pub fn has_metric(&self) -> bool {
        self.metric_value.is_some()
    }

    /// `1000` + `"+"` → `"1000+"`, empty without a metric.
    pub fn metric_display(&self) -> String {
        match self.metric_value {
            Some(value) => format!("{}{}", value, self.metric_suffix.as_deref().unwrap_or("")),
            None => String::new(),
        }
    }
}
