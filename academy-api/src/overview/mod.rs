//! Admin overview: KPI cards, trend charts and the activity feed.

pub mod activity;
pub mod charts;
pub mod kpi;
pub mod service;
pub mod source;

pub use activity::{ActivityFeed, ActivityItem};
pub use charts::{ChartPayload, RevenueFigure};
pub use kpi::{KpiCard, KpiPayload};
pub use service::{OverviewService, OverviewView, Readiness};
pub use source::{InMemoryOverviewSource, OverviewSource};
