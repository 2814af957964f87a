//! Activity feed: the most recent learner, graduation, course and teacher
//! events, newest first.

use academy_core::format::format_timestamp;
use academy_core::{
    AggregationError, CourseRecord, GraduationRecord, LearnerRecord, TeacherRecord,
};
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use super::source::OverviewSource;

/// An event before it is ordered and formatted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEvent {
    pub id: String,
    pub icon: &'static str,
    pub badge: &'static str,
    pub title: String,
    pub subtitle: String,
    pub at: Option<DateTime<Utc>>,
}

fn or_default(value: Option<&str>, default: &str) -> String {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_string()
}

impl From<LearnerRecord> for ActivityEvent {
    fn from(learner: LearnerRecord) -> Self {
        Self {
            id: format!("student-{}", learner.id),
            icon: "fa-user-plus",
            badge: "Học viên",
            title: format!("Học viên mới: {}", or_default(learner.full_name.as_deref(), "Chưa rõ")),
            subtitle: or_default(learner.course_name.as_deref(), "Đăng ký mới"),
            at: learner.enrolled_at,
        }
    }
}

impl From<GraduationRecord> for ActivityEvent {
    fn from(graduation: GraduationRecord) -> Self {
        Self {
            id: format!("completed-{}", graduation.id),
            icon: "fa-graduation-cap",
            badge: "Hoàn thành",
            title: format!(
                "Tốt nghiệp: {}",
                or_default(graduation.student_name.as_deref(), "Học viên")
            ),
            subtitle: or_default(graduation.course_name.as_deref(), "Hoàn thành khóa học"),
            at: graduation.event_time(),
        }
    }
}

impl From<CourseRecord> for ActivityEvent {
    fn from(course: CourseRecord) -> Self {
        Self {
            id: format!("course-{}", course.id),
            icon: "fa-calendar-days",
            badge: "Khóa học",
            title: format!("Lớp sắp khai giảng: {}", course.title),
            subtitle: or_default(course.level.as_deref(), "Đang xếp lịch"),
            at: course.created_at,
        }
    }
}

impl From<TeacherRecord> for ActivityEvent {
    fn from(teacher: TeacherRecord) -> Self {
        Self {
            id: format!("teacher-{}", teacher.id),
            icon: "fa-person-chalkboard",
            badge: "Giảng viên",
            title: format!("Giảng viên mới: {}", or_default(teacher.full_name.as_deref(), "Chưa rõ")),
            subtitle: or_default(teacher.specialization.as_deref(), "Bổ sung vào đội ngũ"),
            at: teacher.joined_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityItem {
    pub icon: String,
    pub badge: String,
    pub title: String,
    pub subtitle: String,
    pub time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityFeed {
    pub items: Vec<ActivityItem>,
    pub limit: usize,
    pub generated_at: DateTime<Utc>,
}

impl ActivityFeed {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Teachers get half the feed budget, at least one row.
pub fn teacher_limit(limit: usize) -> usize {
    (limit / 2).max(1)
}

/// Order events newest first and keep at most `limit` (minimum 1).
///
/// The sort is stable; an event without a timestamp sorts as if it
/// happened at `now`.
pub fn merge_events(mut events: Vec<ActivityEvent>, limit: usize, now: DateTime<Utc>) -> Vec<ActivityEvent> {
    events.sort_by(|a, b| b.at.unwrap_or(now).cmp(&a.at.unwrap_or(now)));
    events.truncate(limit.max(1));
    events
}

pub async fn compute_activity(
    source: &dyn OverviewSource,
    limit: usize,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<ActivityFeed, AggregationError> {
    let limit = limit.max(1);

    let (learners, graduations, courses, teachers) = tokio::try_join!(
        source.recent_learners(limit),
        source.recent_graduations(limit),
        source.upcoming_courses(limit),
        source.recent_teachers(teacher_limit(limit)),
    )?;

    let events: Vec<ActivityEvent> = learners
        .into_iter()
        .map(ActivityEvent::from)
        .chain(graduations.into_iter().map(ActivityEvent::from))
        .chain(courses.into_iter().map(ActivityEvent::from))
        .chain(teachers.into_iter().map(ActivityEvent::from))
        .collect();

    let items = merge_events(events, limit, now)
        .into_iter()
        .map(|event| ActivityItem {
            icon: event.icon.to_string(),
            badge: event.badge.to_string(),
            title: event.title,
            subtitle: event.subtitle,
            time: format_timestamp(event.at, offset),
        })
        .collect();

    Ok(ActivityFeed {
        items,
        limit,
        generated_at: now,
    })
}
