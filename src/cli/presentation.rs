//! CLI presentation: text and json formatters per command.

use crate::builder::BuildReport;
use crate::lookup::{render_compact, render_verbose, PageLookup};
use crate::registry::PageRegistry;
use comfy_table::presets::{UTF8_BORDERS_ONLY, UTF8_FULL};
use comfy_table::Table;
use serde_json::json;

pub fn format_build_text(report: &BuildReport) -> String {
    let mut out = String::new();
    out.push_str("Build report\n\n");

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Provider", "Priority", "Tokens", "Cached"]);
    for (name, fragment) in report.providers_used.iter().zip(&report.fragments) {
        table.add_row(vec![
            name.clone(),
            fragment.priority().to_string(),
            fragment.tokens().to_string(),
            if fragment.is_cached() { "yes" } else { "no" }.to_string(),
        ]);
    }
    out.push_str(&format!("{}\n\n", table));

    out.push_str(&format!("  Total tokens: {}\n", report.total_tokens));
    out.push_str(&format!("  Truncated: {}\n", if report.truncated { "yes" } else { "no" }));
    out.push_str(&format!("  Dropped fragments: {}\n", report.dropped));
    if !report.failed.is_empty() {
        out.push_str(&format!("  Failed providers: {}\n", report.failed.join(", ")));
    }
    out.push_str(&format!("  Build time: {} ms", report.build_time_ms));
    out
}

pub fn format_build_json(report: &BuildReport) -> String {
    let fragments: Vec<_> = report
        .providers_used
        .iter()
        .zip(&report.fragments)
        .map(|(name, fragment)| {
            json!({
                "provider": name,
                "kind": fragment.kind().as_str(),
                "priority": fragment.priority(),
                "tokens": fragment.tokens(),
                "cached": fragment.is_cached(),
            })
        })
        .collect();
    let value = json!({
        "context": report.context,
        "fragments": fragments,
        "failed": report.failed,
        "total_tokens": report.total_tokens,
        "truncated": report.truncated,
        "dropped": report.dropped,
        "build_time_ms": report.build_time_ms,
        "cached": report.cached,
    });
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
}

/// Registry entries as a table: route, type and how much metadata each carries.
pub fn format_routes_table(registry: &PageRegistry) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Route", "Page type", "Components", "APIs", "Known issues"]);
    for page in registry.pages() {
        table.add_row(vec![
            page.route.clone(),
            page.page_type.clone(),
            page.components.len().to_string(),
            page.apis.len().to_string(),
            page.common_issues.len().to_string(),
        ]);
    }
    format!("{}\n{} routes", table, registry.len())
}

pub fn format_lookup_text(route: &str, lookup: &PageLookup, verbose: bool) -> String {
    match lookup {
        PageLookup::NotFound => format!("No page metadata for {}", route),
        PageLookup::Found(found) => {
            let body = if verbose {
                render_verbose(&found.metadata, &found.route)
            } else {
                render_compact(&found.metadata)
            };
            format!(
                "Matched {} ({})\n\n{}",
                found.metadata.route, found.metadata.page_type, body
            )
        }
    }
}

pub fn format_lookup_json(route: &str, lookup: &PageLookup) -> String {
    let value = match lookup {
        PageLookup::NotFound => json!({ "route": route, "found": false }),
        PageLookup::Found(found) => json!({
            "route": found.route,
            "found": true,
            "page": &*found.metadata,
        }),
    };
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::PageMatch;
    use std::sync::Arc;

    #[test]
    fn test_routes_table_lists_every_route() {
        let registry = PageRegistry::builtin().unwrap();
        let text = format_routes_table(&registry);
        assert!(text.contains("/[orgSlug]/business-panel/courses"));
        assert!(text.ends_with(&format!("{} routes", registry.len())));
    }

    #[test]
    fn test_lookup_formats() {
        let registry = PageRegistry::builtin().unwrap();
        let (metadata, _) = registry.resolve("/acme/business-panel/courses").unwrap();
        let lookup = PageLookup::Found(PageMatch {
            metadata: Arc::clone(&metadata),
            route: "/acme/business-panel/courses".to_string(),
            cached: false,
        });

        let text = format_lookup_text("/acme/business-panel/courses", &lookup, false);
        assert!(text.starts_with("Matched /[orgSlug]/business-panel/courses"));

        let json: serde_json::Value =
            serde_json::from_str(&format_lookup_json("/acme/business-panel/courses", &lookup))
                .unwrap();
        assert_eq!(json["found"], true);
        assert_eq!(json["page"]["route"], "/[orgSlug]/business-panel/courses");

        let missing = format_lookup_text("/nowhere", &PageLookup::NotFound, true);
        assert_eq!(missing, "No page metadata for /nowhere");
    }
}
