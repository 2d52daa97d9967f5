//! Platform provider: a short, route-relevant slice of the product catalogue.

use super::{priority, ContextProvider};
use crate::error::ProviderError;
use crate::types::{ContextBuildOptions, ContextFragment, ContextType, FragmentKind};
use async_trait::async_trait;
use std::fmt::Write;

pub const PLATFORM_NAME: &str = "SOFIA";

const MIN_MODULES: usize = 2;
const MAX_MODULES: usize = 4;

struct PlatformModule {
    name: &'static str,
    description: &'static str,
    keywords: &'static [&'static str],
}

const MODULES: &[PlatformModule] = &[
    PlatformModule {
        name: "Courses",
        description: "Course catalogue, lesson player with video, transcripts and activities",
        keywords: &["courses", "course", "learn", "lesson"],
    },
    PlatformModule {
        name: "Business panel",
        description: "Organization administration: users, teams, course assignment and progress reports",
        keywords: &["business-panel"],
    },
    PlatformModule {
        name: "Business user area",
        description: "Member dashboard with assigned courses, deadlines and progress",
        keywords: &["business-user"],
    },
    PlatformModule {
        name: "Study planner",
        description: "AI-assisted study plans synced with the user's calendar",
        keywords: &["study-planner", "planner"],
    },
    PlatformModule {
        name: "Communities",
        description: "Discussion spaces with posts, comments and reactions",
        keywords: &["communities", "community"],
    },
    PlatformModule {
        name: "News",
        description: "Editorial articles about AI and the platform",
        keywords: &["news"],
    },
    PlatformModule {
        name: "Certificates",
        description: "Certificates earned on course completion, downloadable as PDF",
        keywords: &["certificates", "certificate"],
    },
    PlatformModule {
        name: "Instructor tools",
        description: "Course authoring and student analytics for instructors",
        keywords: &["instructor"],
    },
    PlatformModule {
        name: "Administration",
        description: "Platform-wide management of users, content and problem reports",
        keywords: &["admin"],
    },
    PlatformModule {
        name: "Profile and account",
        description: "Profile, sign-in and account settings",
        keywords: &["profile", "auth", "settings"],
    },
];

/// Shown when the route matches nothing.
const DEFAULT_MODULES: &[&str] = &["Courses", "Study planner", "Communities"];

const USER_ROLES: &[(&str, &str)] = &[
    ("Learner", "takes courses, plans study time and joins communities"),
    ("Business user", "member of an organization, works through assigned courses"),
    ("Business administrator", "manages the organization's users, teams and course assignments"),
    ("Instructor", "creates and maintains courses"),
    ("Administrator", "manages the whole platform"),
];

/// Modules relevant to `route`: keyword matches first, padded from the defaults up to
/// two entries and capped at four. Without any match the default set is used.
fn relevant_modules(route: Option<&str>) -> Vec<&'static PlatformModule> {
    let segments: Vec<String> = route
        .map(|r| {
            r.split(['/', '?', '#', '-'])
                .chain(r.split(['/', '?', '#']))
                .filter(|s| !s.is_empty())
                .map(str::to_lowercase)
                .collect()
        })
        .unwrap_or_default();

    let mut selected: Vec<&'static PlatformModule> = MODULES
        .iter()
        .filter(|module| {
            module
                .keywords
                .iter()
                .any(|keyword| segments.iter().any(|segment| segment == keyword))
        })
        .take(MAX_MODULES)
        .collect();

    let target = if selected.is_empty() {
        DEFAULT_MODULES.len()
    } else {
        MIN_MODULES
    };
    for name in DEFAULT_MODULES {
        if selected.len() >= target {
            break;
        }
        if let Some(module) = MODULES.iter().find(|m| m.name == *name) {
            if !selected.iter().any(|s| s.name == module.name) {
                selected.push(module);
            }
        }
    }
    selected
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PlatformProvider;

impl PlatformProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ContextProvider for PlatformProvider {
    fn name(&self) -> &str {
        "platform"
    }

    fn priority(&self) -> i32 {
        priority::PLATFORM
    }

    fn should_include(&self, context_type: &ContextType) -> bool {
        *context_type != ContextType::BugReport
    }

    async fn get_context(
        &self,
        options: &ContextBuildOptions,
    ) -> Result<Option<ContextFragment>, ProviderError> {
        let mut out = String::new();
        let _ = writeln!(out, "## PLATFORM: {}", PLATFORM_NAME);
        let _ = writeln!(
            out,
            "{} is an e-learning and corporate training platform with an embedded AI assistant.",
            PLATFORM_NAME
        );

        out.push_str("\n### Main modules\n");
        for module in relevant_modules(options.page()) {
            let _ = writeln!(out, "- **{}**: {}", module.name, module.description);
        }

        if options.context_type == ContextType::Help {
            out.push_str("\n### User roles\n");
            for (role, description) in USER_ROLES {
                let _ = writeln!(out, "- **{}**: {}", role, description);
            }
        }

        Ok(Some(ContextFragment::new(
            FragmentKind::Platform,
            out.trim_end(),
            self.priority(),
        )))
    }
}
