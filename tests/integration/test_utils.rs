//! Shared fixtures for integration tests

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use lia_context::error::ProviderError;
use lia_context::lookup::{IncidentReport, InMemoryIncidentStore};
use lia_context::provider::ContextProvider;
use lia_context::types::{ContextBuildOptions, ContextFragment, ContextType, FragmentKind};
use lia_context::{ContextEngine, LiaContextConfig};
use std::sync::Arc;

pub const BUSINESS_COURSES: &str = "/acme/business-panel/courses";

pub fn report(id: &str, route: &str, status: Option<&str>, day: u32) -> IncidentReport {
    IncidentReport {
        id: id.to_string(),
        title: format!("Report {}", id),
        description: format!("Something broke on {}", route),
        category: "bug".to_string(),
        status: status.map(str::to_string),
        pathname: Some(route.to_string()),
        created_at: Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).single(),
        ..Default::default()
    }
}

pub fn incident_store() -> Arc<InMemoryIncidentStore> {
    Arc::new(InMemoryIncidentStore::new(vec![
        report("r1", BUSINESS_COURSES, None, 1),
        report("r2", BUSINESS_COURSES, Some("resolved"), 2),
        report("r3", "/profile", Some("in_progress"), 3),
    ]))
}

pub fn engine_with_store() -> ContextEngine {
    ContextEngine::builder(LiaContextConfig::default())
        .incident_store(incident_store())
        .init()
        .unwrap()
}

/// Provider that always produces the same fragment.
pub struct StaticProvider {
    pub name: &'static str,
    pub priority: i32,
    pub content: String,
}

#[async_trait]
impl ContextProvider for StaticProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn should_include(&self, _context_type: &ContextType) -> bool {
        true
    }

    async fn get_context(
        &self,
        _options: &ContextBuildOptions,
    ) -> Result<Option<ContextFragment>, ProviderError> {
        Ok(Some(ContextFragment::new(
            FragmentKind::Custom(self.name.to_string()),
            self.content.clone(),
            self.priority,
        )))
    }
}

/// Provider that always fails.
pub struct FailingProvider {
    pub name: &'static str,
}

#[async_trait]
impl ContextProvider for FailingProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn priority(&self) -> i32 {
        70
    }

    fn should_include(&self, _context_type: &ContextType) -> bool {
        true
    }

    async fn get_context(
        &self,
        _options: &ContextBuildOptions,
    ) -> Result<Option<ContextFragment>, ProviderError> {
        Err(ProviderError::Failed("course catalogue unavailable".to_string()))
    }
}
