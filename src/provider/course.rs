//! Course provider: the course and lesson the user is working through.

use super::{priority, ContextProvider};
use crate::config::CourseConfig;
use crate::error::ProviderError;
use crate::lookup::normalize_route;
use crate::types::{truncate_chars, ContextBuildOptions, ContextFragment, ContextType, FragmentKind};
use async_trait::async_trait;
use std::fmt::Write;

/// Where in the learning experience a route sits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LearningArea {
    Lesson { course: String, lesson: Option<String> },
    Course { course: String },
    Dashboard,
}

impl LearningArea {
    fn label(&self) -> &'static str {
        match self {
            LearningArea::Lesson { .. } => "lesson player",
            LearningArea::Course { .. } => "course page",
            LearningArea::Dashboard => "learning dashboard",
        }
    }
}

/// Classify a route as a course, lesson or dashboard page.
///
/// Recognized shapes: `/courses/{slug}`, `/courses/{slug}/learn`,
/// `/courses/{slug}/lessons/{id}` and any route whose last segment is `dashboard`.
pub fn classify_route(route: &str) -> Option<LearningArea> {
    let normalized = normalize_route(route);
    let segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();

    if let Some(pos) = segments.iter().position(|s| *s == "courses") {
        if let Some(course) = segments.get(pos + 1) {
            let course = course.to_string();
            return Some(match segments.get(pos + 2).copied() {
                Some("learn") | Some("lessons") | Some("lesson") => LearningArea::Lesson {
                    course,
                    lesson: segments.get(pos + 3).map(|s| s.to_string()),
                },
                _ => LearningArea::Course { course },
            });
        }
    }

    (segments.last() == Some(&"dashboard")).then_some(LearningArea::Dashboard)
}

pub struct CourseProvider {
    transcript_max_chars: usize,
}

impl CourseProvider {
    pub fn new(config: &CourseConfig) -> Self {
        Self {
            transcript_max_chars: config.transcript_max_chars,
        }
    }
}

impl Default for CourseProvider {
    fn default() -> Self {
        Self::new(&CourseConfig::default())
    }
}

#[async_trait]
impl ContextProvider for CourseProvider {
    fn name(&self) -> &str {
        "course"
    }

    fn priority(&self) -> i32 {
        priority::COURSE
    }

    fn should_include(&self, _context_type: &ContextType) -> bool {
        true
    }

    async fn get_context(
        &self,
        options: &ContextBuildOptions,
    ) -> Result<Option<ContextFragment>, ProviderError> {
        let metadata = options.metadata();
        let route = options
            .page()
            .or_else(|| metadata.and_then(|m| m.current_page.as_deref()));
        let Some(area) = route.and_then(classify_route) else {
            return Ok(None);
        };

        let (route_course, route_lesson) = match &area {
            LearningArea::Lesson { course, lesson } => (Some(course.as_str()), lesson.as_deref()),
            LearningArea::Course { course } => (Some(course.as_str()), None),
            LearningArea::Dashboard => (None, None),
        };
        let course_slug = metadata
            .and_then(|m| m.course_slug.as_deref())
            .or(route_course);
        let lesson_id = metadata.and_then(|m| m.lesson_id.as_deref()).or(route_lesson);

        let mut out = String::from("## COURSE CONTEXT\n");
        let _ = writeln!(out, "- Area: {}", area.label());
        match (metadata.and_then(|m| m.course_title.as_deref()), course_slug) {
            (Some(title), Some(slug)) => {
                let _ = writeln!(out, "- Course: {} ({})", title, slug);
            }
            (Some(title), None) => {
                let _ = writeln!(out, "- Course: {}", title);
            }
            (None, Some(slug)) => {
                let _ = writeln!(out, "- Course: {}", slug);
            }
            (None, None) => {}
        }
        match (metadata.and_then(|m| m.lesson_title.as_deref()), lesson_id) {
            (Some(title), Some(id)) => {
                let _ = writeln!(out, "- Lesson: {} ({})", title, id);
            }
            (Some(title), None) => {
                let _ = writeln!(out, "- Lesson: {}", title);
            }
            (None, Some(id)) => {
                let _ = writeln!(out, "- Lesson: {}", id);
            }
            (None, None) => {}
        }

        if let Some(transcript) = metadata
            .and_then(|m| m.transcript.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            out.push_str("\n### Lesson transcript\n");
            out.push_str(&self.transcript_excerpt(transcript));
        }

        Ok(Some(ContextFragment::new(
            FragmentKind::Course,
            out.trim_end(),
            self.priority(),
        )))
    }
}

impl CourseProvider {
    /// Transcript cut to the configured ceiling, with a notice when anything was cut.
    fn transcript_excerpt(&self, transcript: &str) -> String {
        let excerpt = truncate_chars(transcript, self.transcript_max_chars);
        if excerpt.len() == transcript.len() {
            return excerpt.to_string();
        }
        format!(
            "{}\n[Transcript truncated: showing {} of {} characters]",
            excerpt,
            self.transcript_max_chars,
            transcript.chars().count()
        )
    }
}
