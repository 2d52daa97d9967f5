//! Cache key layout. Prefixes are what the invalidation helpers match on.

/// Resolved page metadata for a normalized route.
pub fn page_metadata(route: &str) -> String {
    format!("page-meta:{}::", route)
}

/// Compiled page context for a normalized route.
pub fn page_context(route: &str, verbose: bool) -> String {
    let variant = if verbose { "verbose" } else { "compact" };
    format!("page:{}::{}", route, variant)
}

/// Prefixes covering everything cached for a route.
pub fn page_prefixes(route: &str) -> [String; 2] {
    [format!("page-meta:{}::", route), format!("page:{}::", route)]
}

/// Per-user data.
pub fn user(user_id: &str, facet: &str) -> String {
    format!("user:{}::{}", user_id, facet)
}

pub fn user_prefix(user_id: &str) -> String {
    format!("user:{}::", user_id)
}

/// Incident lookups for a normalized route.
pub fn incidents(route: &str, facet: &str) -> String {
    format!("bug:{}::{}", route, facet)
}

/// Keyword search over incidents, independent of route.
pub fn incident_search(keywords: &[String]) -> String {
    format!("bug-search:{}", keywords.join("|").to_lowercase())
}
