//! Core data model: context requests, fragments and the client-captured metadata that
//! rides along with a chat request.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Characters per estimated token.
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimate the token cost of `text`.
///
/// This is an approximation (one token per four characters, rounded up), never an exact
/// tokenizer count. It is monotonic in the character length of its input.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Kind of context the caller is asking for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ContextType {
    General,
    BugReport,
    Course,
    Help,
    Other(String),
}

impl ContextType {
    pub fn as_str(&self) -> &str {
        match self {
            ContextType::General => "general",
            ContextType::BugReport => "bug-report",
            ContextType::Course => "course",
            ContextType::Help => "help",
            ContextType::Other(tag) => tag.as_str(),
        }
    }
}

impl FromStr for ContextType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "general" | "" => ContextType::General,
            "bug-report" | "bug_report" | "bugreport" => ContextType::BugReport,
            "course" => ContextType::Course,
            "help" => ContextType::Help,
            other => ContextType::Other(other.to_string()),
        })
    }
}

impl From<String> for ContextType {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(parsed) => parsed,
            Err(never) => match never {},
        }
    }
}

impl From<ContextType> for String {
    fn from(value: ContextType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ContextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for ContextType {
    fn default() -> Self {
        ContextType::General
    }
}

/// Tag identifying which provider variant produced a fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FragmentKind {
    Page,
    BugReport,
    Course,
    User,
    Platform,
    Custom(String),
}

impl FragmentKind {
    pub fn as_str(&self) -> &str {
        match self {
            FragmentKind::Page => "page",
            FragmentKind::BugReport => "bug-report",
            FragmentKind::Course => "course",
            FragmentKind::User => "user",
            FragmentKind::Platform => "platform",
            FragmentKind::Custom(tag) => tag.as_str(),
        }
    }
}

/// One provider's piece of context. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextFragment {
    kind: FragmentKind,
    content: String,
    priority: i32,
    tokens: usize,
    cached: bool,
}

impl ContextFragment {
    pub fn new(kind: FragmentKind, content: impl Into<String>, priority: i32) -> Self {
        let content = content.into();
        let tokens = estimate_tokens(&content);
        Self {
            kind,
            content,
            priority,
            tokens,
            cached: false,
        }
    }

    /// Mark the fragment as served (at least partly) from the cache.
    pub fn from_cache(mut self, cached: bool) -> Self {
        self.cached = cached;
        self
    }

    pub fn kind(&self) -> &FragmentKind {
        &self.kind
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn tokens(&self) -> usize {
        self.tokens
    }

    pub fn is_cached(&self) -> bool {
        self.cached
    }

    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }

    pub fn into_content(self) -> String {
        self.content
    }
}

/// A single request to build context. Read-only for providers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextBuildOptions {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub current_page: Option<String>,
    #[serde(default)]
    pub context_type: ContextType,
    #[serde(default)]
    pub enriched_metadata: Option<EnrichedMetadata>,
    #[serde(default)]
    pub is_bug_report: bool,
}

impl ContextBuildOptions {
    pub fn new(context_type: ContextType) -> Self {
        Self {
            context_type,
            ..Default::default()
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_page(mut self, page: impl Into<String>) -> Self {
        self.current_page = Some(page.into());
        self
    }

    pub fn with_metadata(mut self, metadata: EnrichedMetadata) -> Self {
        self.enriched_metadata = Some(metadata);
        self
    }

    pub fn bug_report(mut self, is_bug_report: bool) -> Self {
        self.is_bug_report = is_bug_report;
        self
    }

    /// Whether the verbose bug-report rendition should be produced.
    pub fn wants_bug_report(&self) -> bool {
        self.is_bug_report || self.context_type == ContextType::BugReport
    }

    /// Non-empty current page, if any.
    pub fn page(&self) -> Option<&str> {
        self.current_page
            .as_deref()
            .map(str::trim)
            .filter(|page| !page.is_empty())
    }

    pub fn user(&self) -> Option<&str> {
        self.user_id
            .as_deref()
            .map(str::trim)
            .filter(|user| !user.is_empty())
    }

    pub fn metadata(&self) -> Option<&EnrichedMetadata> {
        self.enriched_metadata.as_ref()
    }
}

/// Client-captured metadata sent alongside a chat message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnrichedMetadata {
    pub platform: Option<PlatformInfo>,
    pub errors: Vec<ConsoleError>,
    pub error_summary: Option<String>,
    pub active_components: Vec<ActiveComponent>,
    pub api_calls: Vec<ApiCall>,
    pub viewport: Option<Viewport>,
    /// Session duration in milliseconds.
    pub session_duration: Option<u64>,
    pub context_markers: Vec<String>,
    pub current_page: Option<String>,
    pub timezone: Option<String>,
    pub language: Option<String>,
    pub course_slug: Option<String>,
    pub course_title: Option<String>,
    pub lesson_id: Option<String>,
    pub lesson_title: Option<String>,
    pub transcript: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EnrichedMetadata {
    /// Timezone from the top level, falling back to the platform block.
    pub fn timezone(&self) -> Option<&str> {
        self.timezone
            .as_deref()
            .or_else(|| self.platform.as_ref().and_then(|p| p.timezone.as_deref()))
    }

    pub fn language(&self) -> Option<&str> {
        self.language
            .as_deref()
            .or_else(|| self.platform.as_ref().and_then(|p| p.language.as_deref()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlatformInfo {
    pub browser: Option<String>,
    pub version: Option<String>,
    pub os: Option<String>,
    pub screen_resolution: Option<String>,
    pub language: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConsoleError {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub message: String,
    pub stack: Option<String>,
    pub url: Option<String>,
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActiveComponent {
    pub name: String,
    pub selector: Option<String>,
    pub props: Option<Map<String, Value>>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiCall {
    pub endpoint: String,
    pub method: String,
    pub status: Option<u16>,
    pub is_error: bool,
    pub duration: Option<u64>,
    pub timestamp: Option<String>,
}

/// Cut `text` to at most `max_chars` characters on a char boundary.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn test_estimate_tokens_counts_chars_not_bytes() {
        assert_eq!(estimate_tokens("ññññ"), 1);
    }

    #[test]
    fn test_context_type_parsing() {
        assert_eq!("bug-report".parse::<ContextType>().unwrap(), ContextType::BugReport);
        assert_eq!("General".parse::<ContextType>().unwrap(), ContextType::General);
        assert_eq!(
            "onboarding".parse::<ContextType>().unwrap(),
            ContextType::Other("onboarding".to_string())
        );
        assert_eq!(ContextType::BugReport.to_string(), "bug-report");
    }

    #[test]
    fn test_options_deserialize_from_chat_payload() {
        let payload = serde_json::json!({
            "userId": "user-1",
            "currentPage": "/courses/rust/learn",
            "contextType": "course",
            "enrichedMetadata": {
                "viewport": { "width": 1920, "height": 1080 },
                "platform": { "browser": "Chrome", "os": "Windows" },
                "errors": [{ "type": "TypeError", "message": "x is undefined" }],
                "sessionDuration": 300000,
                "customField": 42
            }
        });
        let options: ContextBuildOptions = serde_json::from_value(payload).unwrap();
        assert_eq!(options.context_type, ContextType::Course);
        assert!(!options.is_bug_report);
        let metadata = options.metadata().unwrap();
        assert_eq!(metadata.errors[0].kind.as_deref(), Some("TypeError"));
        assert_eq!(metadata.session_duration, Some(300_000));
        assert_eq!(metadata.extra.get("customField"), Some(&serde_json::json!(42)));
    }

    #[test]
    fn test_blank_page_is_treated_as_absent() {
        let options = ContextBuildOptions::new(ContextType::General).with_page("   ");
        assert!(options.page().is_none());
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }
}
