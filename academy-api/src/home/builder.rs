//! Landing page view-model.
//!
//! [`HomePageContextBuilder`] reads every content table once, keeps only
//! the rows that are active and inside their publish window, orders them,
//! and falls back to the baseline content from [`super::defaults`] where a
//! table is empty.

use std::fmt;
use std::str::FromStr;

use academy_core::format::{course_duration, experience_years, initials, truncate_chars};
use academy_core::{
    Achievement, AggregationError, CourseListing, HeroHighlight, HeroSetting, NavLocation,
    NavigationLink, OutstandingGraduate, Reason, SuccessStory, TeacherProfile,
};
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::defaults;
use super::source::ContentSource;

// ============================================================================
// VIEW TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavLinkView {
    pub label: String,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeacherCard {
    pub name: String,
    pub role: Option<String>,
    pub bio: Option<String>,
    pub experience_years: Option<u32>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseCard {
    pub title: String,
    pub description: String,
    pub level: String,
    pub icon: String,
    pub duration: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraduateCard {
    pub name: String,
    pub course: Option<String>,
    pub score: Option<String>,
    pub testimonial: Option<String>,
    pub photo_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestimonialCard {
    pub quote: String,
    pub initials: String,
    pub name: Option<String>,
    pub program: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementCard {
    pub title: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub kind: String,
    pub year: Option<u16>,
    pub has_metric: bool,
    pub metric_display: String,
    pub image_url: Option<String>,
    pub image_alt: Option<String>,
    pub external_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomePageContext {
    pub nav_links: Vec<NavLinkView>,
    pub hero_setting: HeroSetting,
    pub hero_highlights: Vec<HeroHighlight>,
    pub reasons: Vec<Reason>,
    pub force_visible: bool,
    pub teachers: Vec<TeacherCard>,
    pub achievements: Vec<AchievementCard>,
    /// Same cards as `achievements`; the stats strip renders them differently.
    pub stats: Vec<AchievementCard>,
    pub courses: Vec<CourseCard>,
    pub graduates: Vec<GraduateCard>,
    pub testimonials: Vec<TestimonialCard>,
    pub footer_programs: Vec<NavLinkView>,
    pub footer_about: Vec<NavLinkView>,
}

// ============================================================================
// SECTIONS
// ============================================================================

/// A landing page section that can be fetched on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HomeSection {
    Features,
    Courses,
    Teachers,
    Graduates,
    Testimonials,
    Achievements,
}

impl HomeSection {
    pub const ALL: [HomeSection; 6] = [
        HomeSection::Features,
        HomeSection::Courses,
        HomeSection::Teachers,
        HomeSection::Graduates,
        HomeSection::Testimonials,
        HomeSection::Achievements,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Features => "features",
            Self::Courses => "courses",
            Self::Teachers => "teachers",
            Self::Graduates => "graduates",
            Self::Testimonials => "testimonials",
            Self::Achievements => "achievements",
        }
    }

    /// Context keys the section renders.
    pub fn keys(&self) -> &'static [&'static str] {
        match self {
            Self::Features => &["reasons"],
            Self::Courses => &["courses"],
            Self::Teachers => &["teachers"],
            Self::Graduates => &["graduates"],
            Self::Testimonials => &["testimonials"],
            Self::Achievements => &["achievements"],
        }
    }
}

impl fmt::Display for HomeSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HomeSection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|section| section.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

impl HomePageContext {
    /// The slice of the context one section needs, tagged with the section
    /// name and the `force_visible` flag.
    pub fn section_payload(&self, section: HomeSection, force_visible: bool) -> Result<Value, AggregationError> {
        let encoded = serde_json::to_value(self).map_err(|e| AggregationError::Encoding {
            family: format!("home:{}", section),
            reason: e.to_string(),
        })?;

        let mut payload = Map::new();
        for key in section.keys() {
            payload.insert((*key).to_string(), encoded.get(*key).cloned().unwrap_or(Value::Null));
        }
        payload.insert("section".to_string(), Value::from(section.as_str()));
        payload.insert("force_visible".to_string(), Value::from(force_visible));
        Ok(Value::Object(payload))
    }
}

// ============================================================================
// BUILDER
// ============================================================================

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub struct HomePageContextBuilder<'a> {
    source: &'a dyn ContentSource,
    now: DateTime<Utc>,
    offset: FixedOffset,
}

impl<'a> HomePageContextBuilder<'a> {
    /// `now` is fixed for the whole build so every publish window is judged
    /// against the same instant.
    pub fn new(source: &'a dyn ContentSource, now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self {
            source,
            now,
            offset,
        }
    }

    pub async fn build(&self) -> Result<HomePageContext, AggregationError> {
        let (links, hero, highlights, reasons, teachers, courses, graduates, stories, achievements) = tokio::try_join!(
            self.source.navigation_links(),
            self.source.hero_setting(),
            self.source.hero_highlights(),
            self.source.reasons(),
            self.source.teachers(),
            self.source.courses(),
            self.source.graduates(),
            self.source.success_stories(),
            self.source.achievements(),
        )?;

        let achievements = self.achievement_cards(achievements);

        Ok(HomePageContext {
            nav_links: nav_links(&links, NavLocation::Header, defaults::header_links),
            hero_setting: merge_hero(hero),
            hero_highlights: if highlights.is_empty() {
                defaults::hero_highlights()
            } else {
                highlights
            },
            reasons: active_reasons(reasons),
            force_visible: false,
            teachers: self.teacher_cards(teachers),
            stats: achievements.clone(),
            achievements,
            courses: course_cards(courses),
            graduates: self.graduate_cards(graduates),
            testimonials: testimonial_cards(stories),
            footer_programs: nav_links(&links, NavLocation::FooterProgram, defaults::footer_programs),
            footer_about: nav_links(&links, NavLocation::FooterAbout, defaults::footer_about),
        })
    }

    fn teacher_cards(&self, mut teachers: Vec<TeacherProfile>) -> Vec<TeacherCard> {
        let today = self.now.with_timezone(&self.offset).date_naive();
        teachers.retain(|t| t.is_active && t.is_featured && t.window.is_live(self.now));
        teachers.sort_by_key(|t| (t.order, t.id));
        teachers
            .into_iter()
            .map(|t| TeacherCard {
                experience_years: experience_years(t.start_date, today),
                name: t.full_name,
                role: t.specialization,
                bio: t.bio,
                avatar_url: t.avatar_url,
            })
            .collect()
    }

    fn graduate_cards(&self, mut graduates: Vec<OutstandingGraduate>) -> Vec<GraduateCard> {
        graduates.retain(|g| g.is_active && g.window.is_live(self.now));
        graduates.sort_by_key(|g| (g.order, g.id));
        graduates
            .into_iter()
            .map(|g| GraduateCard {
                photo_url: non_blank(g.photo_url.as_deref())
                    .unwrap_or(defaults::GRADUATE_PLACEHOLDER_PHOTO)
                    .to_string(),
                name: g.student_name,
                course: g.course_name,
                score: g.score_display,
                testimonial: g.testimonial,
            })
            .collect()
    }

    fn achievement_cards(&self, mut achievements: Vec<Achievement>) -> Vec<AchievementCard> {
        achievements.retain(|a| a.is_active && a.window.is_live(self.now));
        achievements.sort_by_key(|a| (a.order, a.id));
        achievements
            .into_iter()
            .map(|a| AchievementCard {
                has_metric: a.has_metric(),
                metric_display: a.metric_display(),
                kind: a.kind.label().to_string(),
                title: a.title,
                subtitle: a.subtitle,
                description: a.description,
                year: a.year,
                image_url: a.image_url,
                image_alt: a.image_alt,
                external_url: a.external_url,
            })
            .collect()
    }
}

fn nav_links(
    links: &[NavigationLink],
    location: NavLocation,
    default: fn() -> Vec<NavLinkView>,
) -> Vec<NavLinkView> {
    let mut selected: Vec<&NavigationLink> = links
        .iter()
        .filter(|link| link.is_active && link.location == location)
        .collect();
    selected.sort_by_key(|link| link.order);

    if selected.is_empty() {
        return default();
    }
    selected
        .into_iter()
        .map(|link| NavLinkView {
            label: link.label.clone(),
            href: non_blank(link.href.as_deref()).unwrap_or("#").to_string(),
        })
        .collect()
}

/// Stored hero fields override the defaults when non-blank. A stored hero
/// without a secondary CTA label hides that button.
fn merge_hero(stored: Option<HeroSetting>) -> HeroSetting {
    let mut hero = defaults::hero_setting();
    let Some(stored) = stored else {
        return hero;
    };

    let pairs = [
        (&mut hero.eyebrow, stored.eyebrow),
        (&mut hero.typed_text, stored.typed_text),
        (&mut hero.subtitle, stored.subtitle),
        (&mut hero.primary_cta_label, stored.primary_cta_label),
        (&mut hero.primary_cta_href, stored.primary_cta_href),
        (&mut hero.secondary_cta_href, stored.secondary_cta_href),
    ];
    for (slot, value) in pairs {
        if !value.trim().is_empty() {
            *slot = value;
        }
    }

    if stored.secondary_cta_label.trim().is_empty() {
        hero.secondary_cta_label = String::new();
        hero.secondary_cta_href = "#".to_string();
    } else {
        hero.secondary_cta_label = stored.secondary_cta_label;
    }
    hero
}

fn active_reasons(mut reasons: Vec<Reason>) -> Vec<Reason> {
    reasons.retain(|r| r.is_active);
    reasons.sort_by_key(|r| r.order);
    reasons
}

fn course_cards(mut courses: Vec<CourseListing>) -> Vec<CourseCard> {
    courses.retain(|c| c.is_active);
    courses.sort_by_key(|c| c.id);
    courses
        .into_iter()
        .map(|c| CourseCard {
            level: c.level.label().to_string(),
            icon: non_blank(c.icon.as_deref())
                .unwrap_or(c.level.default_icon())
                .to_string(),
            duration: non_blank(c.duration.as_deref())
                .map(str::to_string)
                .unwrap_or_else(|| course_duration(c.duration_hours, c.lesson_count)),
            title: c.title,
            description: c.description,
        })
        .collect()
}

fn testimonial_cards(mut stories: Vec<SuccessStory>) -> Vec<TestimonialCard> {
    stories.retain(|s| s.is_approved);
    stories.sort_by(|a, b| a.order.cmp(&b.order).then(b.created_at.cmp(&a.created_at)));
    stories
        .into_iter()
        .map(|s| TestimonialCard {
            quote: truncate_chars(s.story.as_deref().unwrap_or(""), defaults::TESTIMONIAL_QUOTE_CHARS),
            initials: initials(s.student_name.as_deref().unwrap_or("")),
            name: s.student_name,
            program: s.course_name,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::home::source::InMemoryContentSource;
    use academy_core::{AchievementKind, CourseLevel, PublishWindow};
    use chrono::{Duration, NaiveDate, TimeZone};
    use uuid::Uuid;

    fn vn() -> FixedOffset {
        FixedOffset::east_opt(7 * 3600).expect("valid offset")
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 3, 0, 0).single().expect("date")
    }

    fn teacher(name: &str, featured: bool, order: u32, window: PublishWindow) -> TeacherProfile {
        TeacherProfile {
            id: Uuid::now_v7(),
            full_name: name.to_string(),
            specialization: Some("IELTS".to_string()),
            bio: None,
            start_date: NaiveDate::from_ymd_opt(2019, 9, 1),
            avatar_url: None,
            is_active: true,
            is_featured: featured,
            order,
            window,
        }
    }

    #[tokio::test]
    async fn test_empty_source_uses_defaults() -> Result<(), AggregationError> {
        let source = InMemoryContentSource::new();
        let context = HomePageContextBuilder::new(&source, now(), vn()).build().await?;

        assert_eq!(context.nav_links, defaults::header_links());
        assert_eq!(context.footer_programs.len(), 4);
        assert_eq!(context.footer_about[1].label, "Our teachers");
        assert_eq!(context.hero_setting, defaults::hero_setting());
        assert_eq!(context.hero_highlights.len(), 3);
        assert!(context.teachers.is_empty());
        assert!(!context.force_visible);
        Ok(())
    }

    #[tokio::test]
    async fn test_nav_links_filter_and_blank_href() -> Result<(), AggregationError> {
        let source = InMemoryContentSource::new();
        for (label, href, order, active) in [("Khóa học", Some("/courses"), 2, true), ("Liên hệ", None, 1, true), ("Ẩn", Some("/x"), 0, false)] {
            source.add_navigation_link(NavigationLink {
                label: label.to_string(),
                href: href.map(str::to_string),
                location: NavLocation::Header,
                order,
                is_active: active,
            })?;
        }

        let context = HomePageContextBuilder::new(&source, now(), vn()).build().await?;
        assert_eq!(
            context.nav_links,
            vec![
                NavLinkView { label: "Liên hệ".to_string(), href: "#".to_string() },
                NavLinkView { label: "Khóa học".to_string(), href: "/courses".to_string() },
            ]
        );
        assert_eq!(context.footer_programs, defaults::footer_programs());
        Ok(())
    }

    #[test]
    fn test_hero_merge() {
        let hero = merge_hero(Some(HeroSetting {
            eyebrow: "Trung tâm Anh ngữ".to_string(),
            subtitle: "   ".to_string(),
            ..HeroSetting::default()
        }));
        assert_eq!(hero.eyebrow, "Trung tâm Anh ngữ");
        assert_eq!(hero.subtitle, defaults::hero_setting().subtitle);
        assert_eq!(hero.secondary_cta_label, "");
        assert_eq!(hero.secondary_cta_href, "#");

        let hero = merge_hero(Some(HeroSetting {
            secondary_cta_label: "Xem video".to_string(),
            ..HeroSetting::default()
        }));
        assert_eq!(hero.secondary_cta_label, "Xem video");
        assert_eq!(hero.secondary_cta_href, "#intro-video");
    }

    #[tokio::test]
    async fn test_featured_teachers_in_window() -> Result<(), AggregationError> {
        let source = InMemoryContentSource::new();
        let later = PublishWindow {
            publish_at: Some(now() + Duration::days(1)),
            unpublish_at: None,
        };
        source.add_teacher(teacher("Cô Lan", true, 2, PublishWindow::always()))?;
        source.add_teacher(teacher("Thầy Minh", true, 1, PublishWindow::always()))?;
        source.add_teacher(teacher("Chưa nổi bật", false, 0, PublishWindow::always()))?;
        source.add_teacher(teacher("Sắp lên", true, 0, later))?;

        let context = HomePageContextBuilder::new(&source, now(), vn()).build().await?;
        let names: Vec<&str> = context.teachers.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Thầy Minh", "Cô Lan"]);
        assert_eq!(context.teachers[0].experience_years, Some(4));
        Ok(())
    }

    #[tokio::test]
    async fn test_course_and_testimonial_cards() -> Result<(), AggregationError> {
        let source = InMemoryContentSource::new();
        source.add_course(CourseListing {
            id: Uuid::now_v7(),
            title: "IELTS Foundation".to_string(),
            description: "Nền tảng".to_string(),
            level: CourseLevel::Beginner,
            icon: None,
            duration: None,
            duration_hours: Some(36.0),
            lesson_count: Some(12),
            is_active: true,
        })?;
        source.add_success_story(SuccessStory {
            id: Uuid::now_v7(),
            student_name: Some("trần thị hoa".to_string()),
            course_name: Some("IELTS".to_string()),
            story: Some("x".repeat(200)),
            is_approved: true,
            order: 0,
            created_at: now(),
        })?;
        source.add_success_story(SuccessStory {
            id: Uuid::now_v7(),
            student_name: None,
            course_name: None,
            story: None,
            is_approved: true,
            order: 0,
            created_at: now() + Duration::hours(1),
        })?;

        let context = HomePageContextBuilder::new(&source, now(), vn()).build().await?;
        assert_eq!(context.courses[0].icon, "fas fa-seedling");
        assert_eq!(context.courses[0].duration, "12 lessons • 36 hours");
        assert_eq!(context.courses[0].level, "Beginner");

        assert_eq!(context.testimonials.len(), 2);
        assert_eq!(context.testimonials[0].initials, "HV");
        assert_eq!(context.testimonials[1].initials, "TT");
        assert_eq!(context.testimonials[1].quote.chars().count(), 160);
        Ok(())
    }

    #[tokio::test]
    async fn test_section_payload_and_stats_mirror() -> Result<(), AggregationError> {
        let source = InMemoryContentSource::new();
        source.add_achievement(Achievement {
            id: Uuid::now_v7(),
            title: "Học viên đạt 7.0+".to_string(),
            subtitle: None,
            description: None,
            kind: AchievementKind::Milestone,
            year: Some(2024),
            metric_value: Some(1000),
            metric_suffix: Some("+".to_string()),
            image_url: None,
            image_alt: None,
            external_url: None,
            is_active: true,
            order: 0,
            window: PublishWindow::always(),
        })?;

        let context = HomePageContextBuilder::new(&source, now(), vn()).build().await?;
        assert_eq!(context.stats, context.achievements);
        assert_eq!(context.achievements[0].metric_display, "1000+");
        assert_eq!(context.achievements[0].kind, "Cột mốc");

        let payload = context.section_payload(HomeSection::Features, true)?;
        assert_eq!(payload["section"], "features");
        assert_eq!(payload["force_visible"], true);
        assert!(payload["reasons"].is_array());
        assert!(payload.get("courses").is_none());
        Ok(())
    }

    #[test]
    fn test_section_parse() {
        assert_eq!("graduates".parse::<HomeSection>(), Ok(HomeSection::Graduates));
        assert!("pricing".parse::<HomeSection>().is_err());
        assert_eq!(HomeSection::Features.keys(), &["reasons"]);
    }
}
