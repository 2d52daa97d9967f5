//! Error/similarity lookup: incident queries by route, user and symptom, and the
//! error-context block embedded in bug-report context.

use super::incidents::{IncidentReport, IncidentStore};
use super::page::normalize_route;
use crate::cache::{keys, CachedValue, ContextCache, TtlCategory, TtlPolicy};
use crate::config::IncidentStoreConfig;
use crate::error::LookupError;
use crate::types::{truncate_chars, ConsoleError};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt::Write;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

const ID_PLACEHOLDER: &str = "{id}";
const MIN_NUMERIC_ID_LEN: usize = 5;
const MAX_CONSOLE_ERRORS: usize = 5;
const MAX_STACK_LINES: usize = 3;
const DESCRIPTION_PREVIEW_CHARS: usize = 150;
const ADMIN_NOTE_PREVIEW_CHARS: usize = 100;
const MIN_KEYWORD_LEN: usize = 4;

/// Generic error vocabulary that says nothing about the failing feature.
const KEYWORD_STOPLIST: &[&str] = &[
    "error", "errors", "typeerror", "referenceerror", "syntaxerror", "rangeerror",
    "uncaught", "unhandled", "exception", "undefined", "null", "cannot", "could",
    "read", "reading", "properties", "property", "failed", "fail", "fetch", "object",
    "function", "type", "value", "values", "promise", "rejection", "network", "request",
    "response", "status", "code", "with", "from", "this", "that", "when", "while",
    "anonymous", "async", "module", "eval", "native", "http", "https", "localhost",
    "webpack", "chunk", "chunks", "node_modules", "next", "react", "index",
];

/// Replace UUID segments and long numeric segments with `{id}`, after stripping query
/// string, fragment and trailing slash. Idempotent.
pub fn normalize_incident_route(route: &str) -> String {
    normalize_route(route)
        .split('/')
        .map(|segment| {
            if is_uuid(segment) || is_numeric_id(segment) {
                ID_PLACEHOLDER
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn is_uuid(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() == 36
        && bytes.iter().enumerate().all(|(i, b)| match i {
            8 | 13 | 18 | 23 => *b == b'-',
            _ => b.is_ascii_hexdigit(),
        })
}

fn is_numeric_id(segment: &str) -> bool {
    segment.len() >= MIN_NUMERIC_ID_LEN && segment.bytes().all(|b| b.is_ascii_digit())
}

/// Search keywords for console errors: capitalized identifiers from stack frames first,
/// then significant message tokens. Stoplisted vocabulary is dropped and duplicates are
/// removed case-insensitively.
pub fn extract_keywords(errors: &[ConsoleError], limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut keywords = Vec::new();
    let mut push = |candidate: &str| {
        let lowered = candidate.to_lowercase();
        if keywords.len() < limit
            && !KEYWORD_STOPLIST.contains(&lowered.as_str())
            && seen.insert(lowered)
        {
            keywords.push(candidate.to_string());
        }
    };

    for error in errors {
        if let Some(stack) = &error.stack {
            for frame in stack.lines().filter_map(stack_frame_identifier) {
                push(frame);
            }
        }
    }
    for error in errors {
        for token in error
            .message
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|t| t.chars().count() >= MIN_KEYWORD_LEN)
            .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
        {
            push(token);
        }
    }
    keywords
}

/// `at BusinessCoursesPage.render (...)` → `BusinessCoursesPage`.
fn stack_frame_identifier(line: &str) -> Option<&str> {
    let frame = line.trim().strip_prefix("at ")?.trim_start();
    let end = frame
        .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
        .unwrap_or(frame.len());
    let ident = &frame[..end];
    let first = ident.chars().next()?;
    (first.is_uppercase() && ident.chars().count() > 1).then_some(ident)
}

/// Incident counts for one route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouteStats {
    pub total: usize,
    pub open: usize,
    pub resolved: usize,
    pub by_category: BTreeMap<String, usize>,
}

impl RouteStats {
    fn from_reports(reports: &[IncidentReport]) -> Self {
        let mut stats = RouteStats {
            total: reports.len(),
            ..Default::default()
        };
        for report in reports {
            if report.is_open() {
                stats.open += 1;
            } else {
                stats.resolved += 1;
            }
            *stats.by_category.entry(report.category.clone()).or_default() += 1;
        }
        stats
    }
}

#[derive(Debug, Clone, Copy)]
struct Limits {
    similar: usize,
    open: usize,
    user: usize,
    keywords: usize,
}

/// Incident queries with caching and failure folding. Lookup failures are logged and
/// read as "no reports"; they never reach the caller.
#[derive(Clone)]
pub struct ErrorContextService {
    store: Arc<dyn IncidentStore>,
    cache: Arc<ContextCache>,
    ttl: TtlPolicy,
    limits: Limits,
}

impl ErrorContextService {
    pub fn new(
        store: Arc<dyn IncidentStore>,
        cache: Arc<ContextCache>,
        ttl: TtlPolicy,
        config: &IncidentStoreConfig,
    ) -> Self {
        Self {
            store,
            cache,
            ttl,
            limits: Limits {
                similar: config.similar_limit,
                open: config.open_limit,
                user: config.user_limit,
                keywords: config.keyword_limit,
            },
        }
    }

    pub fn keyword_limit(&self) -> usize {
        self.limits.keywords
    }

    async fn cached<F, Fut>(
        &self,
        key: String,
        category: TtlCategory,
        query: F,
    ) -> Arc<Vec<IncidentReport>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<IncidentReport>, LookupError>>,
    {
        if !self.store.is_configured() {
            return Arc::new(Vec::new());
        }
        if let Some(CachedValue::Incidents(reports)) = self.cache.get(&key) {
            return reports;
        }
        match query().await {
            Ok(reports) => {
                let reports = Arc::new(reports);
                self.cache.set(
                    key,
                    CachedValue::Incidents(Arc::clone(&reports)),
                    self.ttl.ttl(category),
                );
                reports
            }
            Err(err) => {
                warn!(key = %key, error = %err, "incident lookup failed");
                Arc::new(Vec::new())
            }
        }
    }

    pub async fn similar_reports(&self, route: &str) -> Arc<Vec<IncidentReport>> {
        let route = normalize_incident_route(route);
        let limit = self.limits.similar;
        self.cached(
            keys::incidents(&route, "similar"),
            TtlCategory::BugReport,
            || self.store.similar_by_route(&route, limit),
        )
        .await
    }

    pub async fn open_reports(&self, route: &str) -> Arc<Vec<IncidentReport>> {
        let route = normalize_incident_route(route);
        let limit = self.limits.open;
        self.cached(
            keys::incidents(&route, "open"),
            TtlCategory::BugReport,
            || self.store.open_by_route(&route, limit),
        )
        .await
    }

    pub async fn user_reports(&self, user_id: &str) -> Arc<Vec<IncidentReport>> {
        let limit = self.limits.user;
        self.cached(keys::user(user_id, "reports"), TtlCategory::User, || {
            self.store.recent_by_user(user_id, limit)
        })
        .await
    }

    /// Reports matching the symptoms of the given console errors.
    pub async fn reports_by_symptom(&self, errors: &[ConsoleError]) -> Arc<Vec<IncidentReport>> {
        let keywords = extract_keywords(errors, self.limits.keywords);
        if keywords.is_empty() {
            return Arc::new(Vec::new());
        }
        debug!(?keywords, "searching incidents by symptom");
        let limit = self.limits.similar;
        self.cached(
            keys::incident_search(&keywords),
            TtlCategory::BugReport,
            || self.store.search_by_keywords(&keywords, limit),
        )
        .await
    }

    /// Incident counts for a route. Not cached; meant for operator use.
    pub async fn route_stats(&self, route: &str) -> RouteStats {
        let route = normalize_incident_route(route);
        match self.store.reports_for_route(&route).await {
            Ok(reports) => RouteStats::from_reports(&reports),
            Err(err) => {
                warn!(route = %route, error = %err, "incident statistics unavailable");
                RouteStats::default()
            }
        }
    }

    /// Markdown block with recent console errors, reports on the route, open reports on
    /// the route and the user's own recent reports. Empty when nothing applies.
    pub async fn build_error_context(
        &self,
        user_id: Option<&str>,
        route: Option<&str>,
        recent_errors: &[ConsoleError],
    ) -> String {
        let route_queries = async {
            match route {
                Some(route) => {
                    futures::join!(self.similar_reports(route), self.open_reports(route))
                }
                None => (Arc::new(Vec::new()), Arc::new(Vec::new())),
            }
        };
        let user_query = async {
            match user_id {
                Some(user) => self.user_reports(user).await,
                None => Arc::new(Vec::new()),
            }
        };
        let ((similar, open), own) = futures::join!(route_queries, user_query);

        let mut sections = String::new();

        if !recent_errors.is_empty() {
            sections.push_str("### Recent console errors:\n");
            for (index, error) in recent_errors.iter().take(MAX_CONSOLE_ERRORS).enumerate() {
                let _ = writeln!(
                    sections,
                    "{}. **{}:** {}",
                    index + 1,
                    error.kind.as_deref().unwrap_or("Error"),
                    error.message
                );
                if let Some(url) = error.url.as_deref().filter(|u| !u.is_empty()) {
                    let _ = writeln!(sections, "   - Page: {}", url);
                }
                if let Some(stack) = error.stack.as_deref().filter(|s| !s.is_empty()) {
                    let head: Vec<&str> = stack.lines().take(MAX_STACK_LINES).collect();
                    let _ = writeln!(sections, "   - Stack: {}", head.join("\n"));
                }
            }
            sections.push('\n');
        }

        if !similar.is_empty() {
            sections.push_str("### Reports filed on this page:\n");
            for (index, report) in similar.iter().enumerate() {
                let _ = writeln!(
                    sections,
                    "{}. **{}** [{}]",
                    index + 1,
                    report.title,
                    report.status_label()
                );
                let _ = writeln!(sections, "   - Category: {}", report.category);
                if let Some(priority) = report.priority.as_deref().filter(|p| !p.is_empty()) {
                    let _ = writeln!(sections, "   - Priority: {}", priority);
                }
                let preview = truncate_chars(&report.description, DESCRIPTION_PREVIEW_CHARS);
                let ellipsis = if preview.len() < report.description.len() {
                    "..."
                } else {
                    ""
                };
                let _ = writeln!(sections, "   - {}{}", preview, ellipsis);
            }
            sections.push('\n');
        }

        if !open.is_empty() {
            sections.push_str("### Open reports on this page (unresolved):\n");
            for (index, report) in open.iter().enumerate() {
                let _ = writeln!(sections, "{}. **{}** - {}", index + 1, report.title, report.category);
                if let Some(note) = report.admin_notes.as_deref().filter(|n| !n.is_empty()) {
                    let _ = writeln!(
                        sections,
                        "   - Admin note: {}",
                        truncate_chars(note, ADMIN_NOTE_PREVIEW_CHARS)
                    );
                }
            }
            sections.push('\n');
        }

        if !own.is_empty() {
            sections.push_str("### Recent reports from this user:\n");
            for (index, report) in own.iter().enumerate() {
                let _ = writeln!(
                    sections,
                    "{}. **{}** [{}] - {}",
                    index + 1,
                    report.title,
                    report.status_label(),
                    report.category
                );
            }
        }

        if sections.is_empty() {
            return String::new();
        }
        format!("## ERROR AND INCIDENT CONTEXT\n\n{}", sections.trim_end())
    }
}
