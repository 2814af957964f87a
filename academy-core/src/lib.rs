//! Academy Core - domain types shared by the storage and API crates.
//!
//! Covers the admin overview metric identities (slugs, visibility tiers,
//! cache keys, warm-up scopes), the records the overview aggregates, the
//! landing page content models and the display formatting helpers.

pub mod content;
pub mod error;
pub mod format;
pub mod metric;
pub mod records;

pub use content::{
    Achievement, AchievementKind, CourseLevel, CourseListing, HeroHighlight, HeroSetting,
    NavLocation, NavigationLink, OutstandingGraduate, PublishWindow, Reason, SuccessStory,
    TeacherProfile,
};
pub use error::{AcademyError, AcademyResult, AggregationError, CacheError, ConfigError};
pub use format::{ServiceStatus, MASKED_PLACEHOLDER, UNKNOWN_TIME_LABEL};
pub use metric::{CacheKey, ChartRange, MetricSlug, VisibilityTier, WarmupScope};
pub use records::{
    CourseRecord, DataChange, GraduationRecord, LearnerRecord, LearnerSummary, PaymentRecord,
    PaymentStatus, TeacherRecord, TeacherSummary,
};
