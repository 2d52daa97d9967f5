//! Page/route lookup against the static registry, plus the two text renditions the
//! Page and BugReport providers embed.

use crate::cache::{keys, CachedValue, ContextCache, TtlCategory, TtlPolicy};
use crate::registry::{MatchKind, PageMetadata, PageRegistry};
use std::fmt::Write;
use std::sync::Arc;
use tracing::{debug, trace};

/// Known errors shown per component in the compact rendition.
const COMPACT_ERRORS_PER_COMPONENT: usize = 2;

/// Strip query string, fragment and trailing slash. The root route stays `/`.
pub fn normalize_route(route: &str) -> String {
    let route = route.trim();
    let end = route.find(['?', '#']).unwrap_or(route.len());
    let path = route[..end].trim_end_matches('/');
    if path.is_empty() && route.starts_with('/') {
        "/".to_string()
    } else {
        path.to_string()
    }
}

/// A resolved route.
#[derive(Debug, Clone)]
pub struct PageMatch {
    pub metadata: Arc<PageMetadata>,
    /// The normalized concrete route that was looked up.
    pub route: String,
    pub cached: bool,
}

/// Outcome of a page lookup. `NotFound` is an ordinary answer, not a failure.
#[derive(Debug, Clone)]
pub enum PageLookup {
    Found(PageMatch),
    NotFound,
}

impl PageLookup {
    pub fn found(self) -> Option<PageMatch> {
        match self {
            PageLookup::Found(found) => Some(found),
            PageLookup::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, PageLookup::Found(_))
    }
}

/// Registry lookups memoized in the shared cache.
///
/// Exact registry hits are cached with the static (infinite) TTL. Template hits are cached
/// per concrete route with the page TTL, so an unbounded set of concrete routes cannot pin
/// entries in the cache forever.
#[derive(Clone)]
pub struct PageLookupService {
    registry: Arc<PageRegistry>,
    cache: Arc<ContextCache>,
    ttl: TtlPolicy,
}

impl PageLookupService {
    pub fn new(registry: Arc<PageRegistry>, cache: Arc<ContextCache>, ttl: TtlPolicy) -> Self {
        Self {
            registry,
            cache,
            ttl,
        }
    }

    pub fn registry(&self) -> &PageRegistry {
        &self.registry
    }

    pub fn lookup(&self, route: &str) -> PageLookup {
        let route = normalize_route(route);
        if route.is_empty() {
            return PageLookup::NotFound;
        }

        let key = keys::page_metadata(&route);
        if let Some(CachedValue::Page(metadata)) = self.cache.get(&key) {
            trace!(route = %route, "page metadata served from cache");
            return PageLookup::Found(PageMatch {
                metadata,
                route,
                cached: true,
            });
        }

        match self.registry.resolve(&route) {
            Some((metadata, kind)) => {
                let category = match kind {
                    MatchKind::Exact => TtlCategory::Static,
                    MatchKind::Pattern => TtlCategory::Page,
                };
                self.cache.set(
                    key,
                    CachedValue::Page(Arc::clone(&metadata)),
                    self.ttl.ttl(category),
                );
                debug!(route = %route, template = %metadata.route, ?kind, "page metadata resolved");
                PageLookup::Found(PageMatch {
                    metadata,
                    route,
                    cached: false,
                })
            }
            None => {
                debug!(route = %route, "no page metadata for route");
                PageLookup::NotFound
            }
        }
    }
}

/// Short rendition: component names with their first known errors, API list, issue titles.
pub fn render_compact(page: &PageMetadata) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "## CURRENT PAGE: {}", page.page_type);
    let _ = writeln!(out, "Route: {}", page.route);

    if !page.components.is_empty() {
        out.push_str("\n### Main components\n");
        for component in &page.components {
            let _ = writeln!(out, "- **{}**: {}", component.name, component.description);
            let known: Vec<&str> = component
                .common_errors
                .iter()
                .take(COMPACT_ERRORS_PER_COMPONENT)
                .map(String::as_str)
                .collect();
            if !known.is_empty() {
                let _ = writeln!(out, "  - Known errors: {}", known.join("; "));
            }
        }
    }

    if !page.apis.is_empty() {
        out.push_str("\n### APIs\n");
        for api in &page.apis {
            let _ = writeln!(out, "- {} {}: {}", api.method, api.endpoint, api.description);
        }
    }

    if !page.common_issues.is_empty() {
        out.push_str("\n### Common issues\n");
        for issue in &page.common_issues {
            let _ = writeln!(out, "- {}", issue.description);
        }
    }

    out.trim_end().to_string()
}

/// Full technical rendition used for bug reports: file paths, props, every known error,
/// user flows with their break points, causes and solutions.
pub fn render_verbose(page: &PageMetadata, current_route: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "## TECHNICAL PAGE CONTEXT: {}", page.page_type);
    let _ = writeln!(out, "Route template: {}", page.route);
    let _ = writeln!(out, "Current route: {}", current_route);

    if !page.components.is_empty() {
        out.push_str("\n### Components\n");
        for component in &page.components {
            let _ = writeln!(out, "- **{}** (`{}`)", component.name, component.path);
            let _ = writeln!(out, "  {}", component.description);
            if !component.props.is_empty() {
                let _ = writeln!(out, "  Props: {}", component.props.join(", "));
            }
            if !component.common_errors.is_empty() {
                out.push_str("  Known errors:\n");
                for error in &component.common_errors {
                    let _ = writeln!(out, "    - {}", error);
                }
            }
        }
    }

    if !page.apis.is_empty() {
        out.push_str("\n### APIs\n");
        for api in &page.apis {
            let _ = writeln!(
                out,
                "- **{} {}**: {}",
                api.method, api.endpoint, api.description
            );
            if !api.common_errors.is_empty() {
                out.push_str("  Known errors:\n");
                for error in &api.common_errors {
                    let _ = writeln!(out, "    - {}", error);
                }
            }
        }
    }

    if !page.user_flows.is_empty() {
        out.push_str("\n### User flows\n");
        for flow in &page.user_flows {
            let _ = writeln!(out, "**{}**", flow.name);
            for step in &flow.steps {
                let _ = writeln!(out, "  {}", step);
            }
            if !flow.common_breakpoints.is_empty() {
                out.push_str("  Break points:\n");
                for breakpoint in &flow.common_breakpoints {
                    let _ = writeln!(out, "    - {}", breakpoint);
                }
            }
        }
    }

    if !page.common_issues.is_empty() {
        out.push_str("\n### Common issues\n");
        for issue in &page.common_issues {
            let _ = writeln!(out, "- **{}**", issue.description);
            if !issue.possible_causes.is_empty() {
                let _ = writeln!(out, "  Possible causes: {}", issue.possible_causes.join("; "));
            }
            if !issue.solutions.is_empty() {
                let _ = writeln!(out, "  Solutions: {}", issue.solutions.join("; "));
            }
        }
    }

    out.trim_end().to_string()
}
