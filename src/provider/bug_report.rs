//! Bug-report provider: everything support needs to diagnose a reported problem.

use super::{priority, ContextProvider, PageProvider};
use crate::error::ProviderError;
use crate::lookup::{ErrorContextService, IncidentReport};
use crate::types::{
    ActiveComponent, ContextBuildOptions, ContextFragment, ContextType, EnrichedMetadata,
    FragmentKind,
};
use async_trait::async_trait;
use std::fmt::Write;

const MAX_ACTIVE_COMPONENTS: usize = 10;
const MAX_FAILED_API_CALLS: usize = 5;

pub struct BugReportProvider {
    page: PageProvider,
    errors: ErrorContextService,
}

impl BugReportProvider {
    pub fn new(page: PageProvider, errors: ErrorContextService) -> Self {
        Self { page, errors }
    }
}

#[async_trait]
impl ContextProvider for BugReportProvider {
    fn name(&self) -> &str {
        "bug-report"
    }

    fn priority(&self) -> i32 {
        priority::BUG_REPORT
    }

    fn should_include(&self, context_type: &ContextType) -> bool {
        *context_type == ContextType::BugReport
    }

    async fn get_context(
        &self,
        options: &ContextBuildOptions,
    ) -> Result<Option<ContextFragment>, ProviderError> {
        let metadata = options.metadata();
        let route = options
            .page()
            .or_else(|| metadata.and_then(|m| m.current_page.as_deref()))
            .map(str::trim)
            .filter(|r| !r.is_empty());
        let console_errors = metadata.map(|m| m.errors.as_slice()).unwrap_or_default();

        let (error_context, by_symptom) = futures::join!(
            self.errors
                .build_error_context(options.user(), route, console_errors),
            self.errors.reports_by_symptom(console_errors),
        );

        let mut sections: Vec<String> = Vec::new();
        let mut cached = false;

        if let Some(page) = route.and_then(|r| self.page.render(r, true)) {
            cached = page.cached;
            sections.push(page.content);
        }
        if let Some(components) = metadata.and_then(|m| active_components(&m.active_components)) {
            sections.push(components);
        }
        if !error_context.is_empty() {
            sections.push(error_context);
        }
        if let Some(symptoms) = symptom_matches(&by_symptom) {
            sections.push(symptoms);
        }
        if let Some(environment) = metadata.and_then(environment_summary) {
            sections.push(environment);
        }

        if sections.is_empty() {
            return Ok(None);
        }
        let content = format!("## BUG REPORT CONTEXT\n\n{}", sections.join("\n\n"));
        Ok(Some(
            ContextFragment::new(FragmentKind::BugReport, content, self.priority()).from_cache(cached),
        ))
    }
}

fn active_components(components: &[ActiveComponent]) -> Option<String> {
    if components.is_empty() {
        return None;
    }
    let mut out = String::from("### Active components on screen\n");
    for component in components.iter().take(MAX_ACTIVE_COMPONENTS) {
        let _ = write!(out, "- **{}**", component.name);
        if let Some(selector) = component.selector.as_deref().filter(|s| !s.is_empty()) {
            let _ = write!(out, " (`{}`)", selector);
        }
        if let Some(state) = component.state.as_deref().filter(|s| !s.is_empty()) {
            let _ = write!(out, " - state: {}", state);
        }
        out.push('\n');
    }
    Some(out.trim_end().to_string())
}

fn symptom_matches(reports: &[IncidentReport]) -> Option<String> {
    if reports.is_empty() {
        return None;
    }
    let mut out = String::from("### Reports with similar symptoms:\n");
    for (index, report) in reports.iter().enumerate() {
        let _ = write!(
            out,
            "{}. **{}** [{}] - {}",
            index + 1,
            report.title,
            report.status_label(),
            report.category
        );
        if let Some(path) = report.pathname.as_deref().or(report.page_url.as_deref()) {
            let _ = write!(out, " ({})", path);
        }
        out.push('\n');
    }
    Some(out.trim_end().to_string())
}

fn environment_summary(metadata: &EnrichedMetadata) -> Option<String> {
    let mut lines: Vec<String> = Vec::new();

    if let Some(platform) = &metadata.platform {
        if let Some(browser) = platform.browser.as_deref() {
            match platform.version.as_deref() {
                Some(version) => lines.push(format!("- Browser: {} {}", browser, version)),
                None => lines.push(format!("- Browser: {}", browser)),
            }
        }
        if let Some(os) = platform.os.as_deref() {
            lines.push(format!("- OS: {}", os));
        }
        if let Some(screen) = platform.screen_resolution.as_deref() {
            lines.push(format!("- Screen: {}", screen));
        }
    }
    if let Some(viewport) = metadata.viewport {
        lines.push(format!("- Viewport: {}x{}", viewport.width, viewport.height));
    }
    if let Some(language) = metadata.language() {
        lines.push(format!("- Language: {}", language));
    }
    if let Some(timezone) = metadata.timezone() {
        lines.push(format!("- Timezone: {}", timezone));
    }
    if let Some(ms) = metadata.session_duration {
        lines.push(format!("- Session duration: {} min", ms / 60_000));
    }

    let failed: Vec<String> = metadata
        .api_calls
        .iter()
        .filter(|call| call.is_error || call.status.is_some_and(|s| s >= 400))
        .take(MAX_FAILED_API_CALLS)
        .map(|call| match call.status {
            Some(status) => format!("  - {} {} → {}", call.method, call.endpoint, status),
            None => format!("  - {} {} → failed", call.method, call.endpoint),
        })
        .collect();
    if !failed.is_empty() {
        lines.push("- Failed API calls:".to_string());
        lines.extend(failed);
    }
    if let Some(summary) = metadata.error_summary.as_deref().filter(|s| !s.is_empty()) {
        lines.push(format!("- Error summary: {}", summary));
    }

    if lines.is_empty() {
        return None;
    }
    Some(format!("### Environment\n{}", lines.join("\n")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{TtlCache, TtlPolicy};
    use crate::config::IncidentStoreConfig;
    use crate::lookup::{InMemoryIncidentStore, NullIncidentStore, PageLookupService};
    use crate::registry::PageRegistry;
    use crate::types::{ApiCall, ConsoleError, PlatformInfo, Viewport};
    use std::sync::Arc;

    fn provider(store: Arc<dyn crate::lookup::IncidentStore>) -> BugReportProvider {
        let cache = Arc::new(TtlCache::new(100));
        let ttl = TtlPolicy::default();
        let lookup = PageLookupService::new(
            Arc::new(PageRegistry::builtin().unwrap()),
            Arc::clone(&cache),
            ttl,
        );
        let page = PageProvider::new(lookup, Arc::clone(&cache), ttl);
        let errors = ErrorContextService::new(store, cache, ttl, &IncidentStoreConfig::default());
        BugReportProvider::new(page, errors)
    }

    fn metadata() -> EnrichedMetadata {
        EnrichedMetadata {
            platform: Some(PlatformInfo {
                browser: Some("Firefox".to_string()),
                os: Some("Linux".to_string()),
                ..Default::default()
            }),
            viewport: Some(Viewport { width: 1280, height: 720 }),
            errors: vec![ConsoleError {
                kind: Some("TypeError".to_string()),
                message: "assignCourse is not a function".to_string(),
                stack: Some("at BusinessAssignCourseModal.submit (modal.tsx:1)".to_string()),
                ..Default::default()
            }],
            active_components: vec![ActiveComponent {
                name: "BusinessAssignCourseModal".to_string(),
                state: Some("open".to_string()),
                ..Default::default()
            }],
            api_calls: vec![ApiCall {
                endpoint: "/api/acme/business/courses".to_string(),
                method: "POST".to_string(),
                status: Some(500),
                is_error: true,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_aggregates_page_errors_and_environment() {
        let provider = provider(Arc::new(NullIncidentStore));
        let options = ContextBuildOptions::new(ContextType::BugReport)
            .with_page("/acme/business-panel/courses")
            .with_metadata(metadata());

        let fragment = provider.get_context(&options).await.unwrap().unwrap();
        let text = fragment.content();
        assert!(text.starts_with("## BUG REPORT CONTEXT"));
        assert!(text.contains("BusinessCoursesPage"));
        assert!(text.lines().any(|l| l.starts_with("- **GET /api/")));
        assert!(text.contains("- **BusinessAssignCourseModal** - state: open"));
        assert!(text.contains("1. **TypeError:** assignCourse is not a function"));
        assert!(text.contains("- Browser: Firefox"));
        assert!(text.contains("  - POST /api/acme/business/courses → 500"));
        assert_eq!(fragment.priority(), 100);
    }

    #[tokio::test]
    async fn test_symptom_matches_cross_routes() {
        let store = InMemoryIncidentStore::new(vec![IncidentReport {
            id: "7".to_string(),
            title: "BusinessAssignCourseModal crashes".to_string(),
            category: "bug".to_string(),
            pathname: Some("/other-org/business-panel/teams".to_string()),
            ..Default::default()
        }]);
        let provider = provider(Arc::new(store));
        let options = ContextBuildOptions::new(ContextType::BugReport)
            .with_page("/acme/business-panel/courses")
            .with_metadata(metadata());

        let fragment = provider.get_context(&options).await.unwrap().unwrap();
        assert!(fragment.content().contains("### Reports with similar symptoms:"));
        assert!(fragment
            .content()
            .contains("1. **BusinessAssignCourseModal crashes** [pending] - bug (/other-org/business-panel/teams)"));
    }

    #[tokio::test]
    async fn test_nothing_known_yields_none() {
        let provider = provider(Arc::new(NullIncidentStore));
        let options = ContextBuildOptions::new(ContextType::BugReport).with_page("/unknown");
        assert!(provider.get_context(&options).await.unwrap().is_none());
    }
}
