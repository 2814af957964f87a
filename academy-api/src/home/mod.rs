//! Public landing page.
//!
//! - `source`: the content tables behind the page
//! - `builder`: filters, orders and formats them into [`HomePageContext`]
//! - `defaults`: baseline copy used while a table is empty

pub mod builder;
pub mod defaults;
pub mod source;

pub use builder::{
    AchievementCard, CourseCard, GraduateCard, HomePageContext, HomePageContextBuilder,
    HomeSection, NavLinkView, TeacherCard, TestimonialCard,
};
pub use source::{ContentResult, ContentSource, InMemoryContentSource};
