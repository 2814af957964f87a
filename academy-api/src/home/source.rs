//! Landing page content source.

use std::sync::RwLock;

use academy_core::{
    Achievement, AggregationError, CourseListing, HeroHighlight, HeroSetting, NavigationLink,
    OutstandingGraduate, Reason, SuccessStory, TeacherProfile,
};
use async_trait::async_trait;

pub type ContentResult<T> = Result<T, AggregationError>;

/// Raw content rows. Filtering and ordering is the page builder's job,
/// except for the hero records which are returned already selected.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn navigation_links(&self) -> ContentResult<Vec<NavigationLink>>;

    /// The active hero setting with the lowest order, if any.
    async fn hero_setting(&self) -> ContentResult<Option<HeroSetting>>;

    /// Active hero highlight cards, in display order.
    async fn hero_highlights(&self) -> ContentResult<Vec<HeroHighlight>>;

    async fn reasons(&self) -> ContentResult<Vec<Reason>>;

    async fn teachers(&self) -> ContentResult<Vec<TeacherProfile>>;

    async fn courses(&self) -> ContentResult<Vec<CourseListing>>;

    async fn graduates(&self) -> ContentResult<Vec<OutstandingGraduate>>;

    async fn success_stories(&self) -> ContentResult<Vec<SuccessStory>>;

    async fn achievements(&self) -> ContentResult<Vec<Achievement>>;
}

#[derive(Debug, Default, Clone)]
struct ContentTables {
    navigation: Vec<NavigationLink>,
    hero: Option<HeroSetting>,
    highlights: Vec<HeroHighlight>,
    reasons: Vec<Reason>,
    teachers: Vec<TeacherProfile>,
    courses: Vec<CourseListing>,
    graduates: Vec<OutstandingGraduate>,
    stories: Vec<SuccessStory>,
    achievements: Vec<Achievement>,
}

/// Content held in memory; empty by default so every section falls back
/// to its defaults.
#[derive(Debug, Default)]
pub struct InMemoryContentSource {
    tables: RwLock<ContentTables>,
}

macro_rules! content_accessors {
    ($($add:ident / $getter:ident: $field:ident => $ty:ty;)*) => {
        impl InMemoryContentSource {
            $(
                pub fn $add(&self, row: $ty) -> ContentResult<()> {
                    self.tables
                        .write()
                        .map_err(|_| poisoned(stringify!($field)))?
                        .$field
                        .push(row);
                    Ok(())
                }
            )*
        }

        impl InMemoryContentSource {
            $(
                fn $getter(&self) -> ContentResult<Vec<$ty>> {
                    Ok(self
                        .tables
                        .read()
                        .map_err(|_| poisoned(stringify!($field)))?
                        .$field
                        .clone())
                }
            )*
        }
    };
}

fn poisoned(table: &str) -> AggregationError {
    AggregationError::SourceFailed {
        family: format!("content:{}", table),
        reason: "in-memory content lock poisoned".to_string(),
    }
}

content_accessors! {
    add_navigation_link / all_navigation: navigation => NavigationLink;
    add_hero_highlight / all_highlights: highlights => HeroHighlight;
    add_reason / all_reasons: reasons => Reason;
    add_teacher / all_teachers: teachers => TeacherProfile;
    add_course / all_courses: courses => CourseListing;
    add_graduate / all_graduates: graduates => OutstandingGraduate;
    add_success_story / all_stories: stories => SuccessStory;
    add_achievement / all_achievements: achievements => Achievement;
}

impl InMemoryContentSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_hero_setting(&self, hero: Option<HeroSetting>) -> ContentResult<()> {
        self.tables.write().map_err(|_| poisoned("hero"))?.hero = hero;
        Ok(())
    }
}

#[async_trait]
impl ContentSource for InMemoryContentSource {
    async fn navigation_links(&self) -> ContentResult<Vec<NavigationLink>> {
        self.all_navigation()
    }

    async fn hero_setting(&self) -> ContentResult<Option<HeroSetting>> {
        Ok(self.tables.read().map_err(|_| poisoned("hero"))?.hero.clone())
    }

    async fn hero_highlights(&self) -> ContentResult<Vec<HeroHighlight>> {
        self.all_highlights()
    }

    async fn reasons(&self) -> ContentResult<Vec<Reason>> {
        self.all_reasons()
    }

    async fn teachers(&self) -> ContentResult<Vec<TeacherProfile>> {
        self.all_teachers()
    }

    async fn courses(&self) -> ContentResult<Vec<CourseListing>> {
        self.all_courses()
    }

    async fn graduates(&self) -> ContentResult<Vec<OutstandingGraduate>> {
        self.all_graduates()
    }

    async fn success_stories(&self) -> ContentResult<Vec<SuccessStory>> {
        self.all_stories()
    }

    async fn achievements(&self) -> ContentResult<Vec<Achievement>> {
        self.all_achievements()
    }
}
