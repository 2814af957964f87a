//! Baseline landing page content used while the content tables are empty.

use academy_core::{HeroHighlight, HeroSetting};

use super::builder::NavLinkView;

pub const GRADUATE_PLACEHOLDER_PHOTO: &str = "/static/public/images/graduate/placeholder.svg";

pub const TESTIMONIAL_QUOTE_CHARS: usize = 160;

fn links(pairs: &[(&str, &str)]) -> Vec<NavLinkView> {
    pairs
        .iter()
        .map(|(label, href)| NavLinkView {
            label: (*label).to_string(),
            href: (*href).to_string(),
        })
        .collect()
}

pub fn hero_setting() -> HeroSetting {
    HeroSetting {
        eyebrow: "Global English".to_string(),
        typed_text: "Unlock the world with English".to_string(),
        subtitle: "Personal coaching, interactive classes, and progress tracking \
                   to help you feel confident in every conversation."
            .to_string(),
        primary_cta_label: "Talk to us".to_string(),
        primary_cta_href: "#advisory".to_string(),
        secondary_cta_label: "Watch intro video".to_string(),
        secondary_cta_href: "#intro-video".to_string(),
    }
}

pub fn hero_highlights() -> Vec<HeroHighlight> {
    [
        (
            "fas fa-graduation-cap",
            "Expert instructors",
            "Work with native-level teachers and industry mentors.",
        ),
        (
            "fas fa-chalkboard-teacher",
            "Interactive classes",
            "Blended learning with live workshops and practice labs.",
        ),
        (
            "fas fa-certificate",
            "Global certificates",
            "Stay on track with international standards and tracking tools.",
        ),
    ]
    .into_iter()
    .map(|(icon, title, description)| HeroHighlight {
        icon: icon.to_string(),
        title: title.to_string(),
        description: description.to_string(),
    })
    .collect()
}

pub fn header_links() -> Vec<NavLinkView> {
    links(&[
        ("About", "#features"),
        ("Courses", "#courses"),
        ("Teachers", "#teachers"),
        ("Graduates", "#graduates"),
        ("Testimonials", "#testimonials"),
        ("Achievements", "#achievements"),
    ])
}

pub fn footer_programs() -> Vec<NavLinkView> {
    links(&[
        ("Communication English", "#courses"),
        ("Business English", "#courses"),
        ("IELTS coaching", "#courses"),
        ("Young learners", "#courses"),
    ])
}

pub fn footer_about() -> Vec<NavLinkView> {
    links(&[
        ("About", "#features"),
        ("Our teachers", "#teachers"),
        ("Teaching method", "#features"),
        ("Facilities", "#features"),
    ])
}
