//! Static page registry
//!
//! Read-only table of route templates and the technical metadata attached to each page:
//! the components it renders, the APIs it calls, the user flows through it and the
//! issues support keeps seeing there. The built-in table ships as embedded JSON, so
//! adding or removing a route is a data change only.

use crate::error::RegistryError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const BUILTIN_PAGES: &str = include_str!("registry/pages.json");

/// Technical metadata for one page template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    /// Registry key, e.g. `/[orgSlug]/business-panel/courses`.
    pub route: String,
    /// Template matched against concrete routes, e.g. `/{orgSlug}/business-panel/courses`.
    pub route_pattern: String,
    pub page_type: String,
    #[serde(default)]
    pub components: Vec<ComponentInfo>,
    #[serde(default)]
    pub apis: Vec<ApiInfo>,
    #[serde(default)]
    pub user_flows: Vec<UserFlow>,
    #[serde(default)]
    pub common_issues: Vec<CommonIssue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentInfo {
    pub name: String,
    pub path: String,
    pub description: String,
    #[serde(default)]
    pub props: Vec<String>,
    #[serde(default)]
    pub common_errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiInfo {
    pub endpoint: String,
    pub method: String,
    pub description: String,
    #[serde(default)]
    pub common_errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFlow {
    pub name: String,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub common_breakpoints: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonIssue {
    pub description: String,
    #[serde(default)]
    pub possible_causes: Vec<String>,
    #[serde(default)]
    pub solutions: Vec<String>,
}

struct RegistryEntry {
    metadata: Arc<PageMetadata>,
    matcher: Regex,
}

/// How a route resolved against the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// The route is a registry key.
    Exact,
    /// The route matched an entry's template.
    Pattern,
}

/// The page table, with every route template compiled up front.
pub struct PageRegistry {
    entries: Vec<RegistryEntry>,
}

impl PageRegistry {
    /// Build a registry from entries, compiling each `route_pattern`.
    pub fn new(pages: Vec<PageMetadata>) -> Result<Self, RegistryError> {
        let entries = pages
            .into_iter()
            .map(|page| {
                let matcher = compile_pattern(&page.route_pattern)?;
                Ok(RegistryEntry {
                    metadata: Arc::new(page),
                    matcher,
                })
            })
            .collect::<Result<Vec<_>, RegistryError>>()?;
        Ok(Self { entries })
    }

    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let pages: Vec<PageMetadata> = serde_json::from_str(json)?;
        Self::new(pages)
    }

    /// The table compiled into the crate.
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::from_json(BUILTIN_PAGES)
    }

    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Resolve an already normalized route: exact key first, then templates in table order.
    pub fn resolve(&self, route: &str) -> Option<(Arc<PageMetadata>, MatchKind)> {
        if let Some(entry) = self.entries.iter().find(|e| e.metadata.route == route) {
            return Some((Arc::clone(&entry.metadata), MatchKind::Exact));
        }
        self.entries
            .iter()
            .find(|e| e.matcher.is_match(route))
            .map(|e| (Arc::clone(&e.metadata), MatchKind::Pattern))
    }

    /// Whether `route` is a registry key (no template matching).
    pub fn has_page_metadata(&self, route: &str) -> bool {
        self.entries.iter().any(|e| e.metadata.route == route)
    }

    pub fn registered_routes(&self) -> Vec<&str> {
        self.entries
            .iter()
            .map(|e| e.metadata.route.as_str())
            .collect()
    }

    pub fn pages(&self) -> impl Iterator<Item = &PageMetadata> {
        self.entries.iter().map(|e| e.metadata.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Compile a `{placeholder}` template into an anchored regex. Each placeholder matches
/// one path segment; everything else matches literally.
fn compile_pattern(pattern: &str) -> Result<Regex, RegistryError> {
    let invalid = |reason: &str| RegistryError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };

    let mut source = String::from("^");
    let mut rest = pattern;
    while let Some(open) = rest.find('{') {
        source.push_str(&regex::escape(&rest[..open]));
        let close = rest[open..]
            .find('}')
            .map(|offset| open + offset)
            .ok_or_else(|| invalid("unclosed placeholder"))?;
        if close == open + 1 {
            return Err(invalid("empty placeholder"));
        }
        source.push_str("[^/]+");
        rest = &rest[close + 1..];
    }
    if rest.contains('}') {
        return Err(invalid("unmatched closing brace"));
    }
    source.push_str(&regex::escape(rest));
    source.push('$');

    Regex::new(&source).map_err(|e| invalid(&e.to_string()))
}
