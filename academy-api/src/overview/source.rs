//! Data source for the admin overview aggregates.
//!
//! The persistent store is an external collaborator; [`OverviewSource`] is
//! the seam it plugs into. [`InMemoryOverviewSource`] backs development
//! servers and tests.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use academy_core::{
    AggregationError, CourseRecord, DataChange, GraduationRecord, LearnerRecord, LearnerSummary,
    PaymentRecord, TeacherRecord, TeacherSummary,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub type SourceResult<T> = Result<T, AggregationError>;

/// Read-only queries the overview aggregates are built from.
#[async_trait]
pub trait OverviewSource: Send + Sync {
    /// Active learners, and learners enrolled since `month_start`.
    async fn learner_summary(&self, month_start: DateTime<Utc>) -> SourceResult<LearnerSummary>;

    async fn teacher_summary(&self) -> SourceResult<TeacherSummary>;

    /// Graduations that carry a non-blank testimonial.
    async fn testimonial_count(&self) -> SourceResult<u64>;

    /// Confirmed payments made at or after `since`.
    async fn confirmed_payments_since(&self, since: DateTime<Utc>) -> SourceResult<Vec<PaymentRecord>>;

    /// Enrollment times at or after `since`.
    async fn enrollments_since(&self, since: DateTime<Utc>) -> SourceResult<Vec<DateTime<Utc>>>;

    /// Completion times at or after `since`.
    async fn completions_since(&self, since: DateTime<Utc>) -> SourceResult<Vec<DateTime<Utc>>>;

    /// Most recently enrolled learners first.
    async fn recent_learners(&self, limit: usize) -> SourceResult<Vec<LearnerRecord>>;

    /// Most recently completed graduations first; incomplete ones excluded.
    async fn recent_graduations(&self, limit: usize) -> SourceResult<Vec<GraduationRecord>>;

    /// Inactive courses, oldest first.
    async fn upcoming_courses(&self, limit: usize) -> SourceResult<Vec<CourseRecord>>;

    /// Most recently joined teachers first.
    async fn recent_teachers(&self, limit: usize) -> SourceResult<Vec<TeacherRecord>>;
}

#[derive(Debug, Default)]
struct Tables {
    learners: Vec<LearnerRecord>,
    graduations: Vec<GraduationRecord>,
    teachers: Vec<TeacherRecord>,
    courses: Vec<CourseRecord>,
    payments: Vec<PaymentRecord>,
}

/// Vec-backed source.
///
/// Mutators hand back the [`DataChange`] a caller should forward to the
/// warm-up coordinator, when the write is one the dashboard reacts to.
#[derive(Debug, Default)]
pub struct InMemoryOverviewSource {
    tables: RwLock<Tables>,
}

fn poisoned(family: &str) -> AggregationError {
    AggregationError::SourceFailed {
        family: family.to_string(),
        reason: "in-memory source lock poisoned".to_string(),
    }
}

fn newest_first<T, K: Ord>(rows: &mut [T], key: impl Fn(&T) -> K) {
    rows.sort_by(|a, b| key(b).cmp(&key(a)));
}

impl InMemoryOverviewSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self, family: &str) -> SourceResult<RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(|_| poisoned(family))
    }

    fn write(&self, family: &str) -> SourceResult<RwLockWriteGuard<'_, Tables>> {
        self.tables.write().map_err(|_| poisoned(family))
    }

    pub fn add_learner(&self, learner: LearnerRecord) -> SourceResult<DataChange> {
        self.write("learners")?.learners.push(learner);
        Ok(DataChange::Learner)
    }

    /// Graduations belong to a learner, so they surface as learner changes.
    pub fn add_graduation(&self, graduation: GraduationRecord) -> SourceResult<DataChange> {
        self.write("graduations")?.graduations.push(graduation);
        Ok(DataChange::Learner)
    }

    pub fn add_teacher(&self, teacher: TeacherRecord) -> SourceResult<DataChange> {
        self.write("teachers")?.teachers.push(teacher);
        Ok(DataChange::Teacher)
    }

    pub fn add_course(&self, course: CourseRecord) -> SourceResult<()> {
        self.write("courses")?.courses.push(course);
        Ok(())
    }

    /// Record a payment. Only confirmed payments produce a change.
    pub fn record_payment(&self, payment: PaymentRecord) -> SourceResult<Option<DataChange>> {
        let change = DataChange::Payment {
            status: payment.status,
        };
        self.write("payments")?.payments.push(payment);
        Ok(change.affects_overview().then_some(change))
    }
}

#[async_trait]
impl OverviewSource for InMemoryOverviewSource {
    async fn learner_summary(&self, month_start: DateTime<Utc>) -> SourceResult<LearnerSummary> {
        let tables = self.read("kpis")?;
        Ok(LearnerSummary {
            active: tables.learners.iter().filter(|l| l.is_active).count() as u64,
            new_this_month: tables
                .learners
                .iter()
                .filter(|l| l.enrolled_at.is_some_and(|at| at >= month_start))
                .count() as u64,
        })
    }

    async fn teacher_summary(&self) -> SourceResult<TeacherSummary> {
        let tables = self.read("kpis")?;
        Ok(TeacherSummary {
            active: tables.teachers.iter().filter(|t| t.is_active).count() as u64,
            total: tables.teachers.len() as u64,
        })
    }

    async fn testimonial_count(&self) -> SourceResult<u64> {
        let tables = self.read("kpis")?;
        Ok(tables.graduations.iter().filter(|g| g.has_testimonial()).count() as u64)
    }

    async fn confirmed_payments_since(&self, since: DateTime<Utc>) -> SourceResult<Vec<PaymentRecord>> {
        let tables = self.read("payments")?;
        Ok(tables
            .payments
            .iter()
            .filter(|p| p.is_confirmed() && p.paid_at >= since)
            .cloned()
            .collect())
    }

    async fn enrollments_since(&self, since: DateTime<Utc>) -> SourceResult<Vec<DateTime<Utc>>> {
        let tables = self.read("charts")?;
        Ok(tables
            .learners
            .iter()
            .filter_map(|l| l.enrolled_at)
            .filter(|at| *at >= since)
            .collect())
    }

    async fn completions_since(&self, since: DateTime<Utc>) -> SourceResult<Vec<DateTime<Utc>>> {
        let tables = self.read("charts")?;
        Ok(tables
            .graduations
            .iter()
            .filter_map(|g| g.completed_at)
            .filter(|at| *at >= since)
            .collect())
    }

    async fn recent_learners(&self, limit: usize) -> SourceResult<Vec<LearnerRecord>> {
        let mut rows = self.read("activity")?.learners.clone();
        newest_first(&mut rows, |l| l.enrolled_at);
        rows.truncate(limit);
        Ok(rows)
    }

    async fn recent_graduations(&self, limit: usize) -> SourceResult<Vec<GraduationRecord>> {
        let mut rows: Vec<GraduationRecord> = self
            .read("activity")?
            .graduations
            .iter()
            .filter(|g| g.completed_at.is_some())
            .cloned()
            .collect();
        newest_first(&mut rows, |g| g.completed_at);
        rows.truncate(limit);
        Ok(rows)
    }

    async fn upcoming_courses(&self, limit: usize) -> SourceResult<Vec<CourseRecord>> {
        let mut rows: Vec<CourseRecord> = self
            .read("activity")?
            .courses
            .iter()
            .filter(|c| !c.is_active)
            .cloned()
            .collect();
        rows.sort_by_key(|c| c.created_at);
        rows.truncate(limit);
        Ok(rows)
    }

    async fn recent_teachers(&self, limit: usize) -> SourceResult<Vec<TeacherRecord>> {
        let mut rows = self.read("activity")?.teachers.clone();
        newest_first(&mut rows, |t| t.joined_at);
        rows.truncate(limit);
        Ok(rows)
    }
}
