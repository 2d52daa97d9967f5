//! Incident report model and the store seam behind the error/similarity lookup.

use crate::error::LookupError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::errors::normalize_incident_route;

/// A user-submitted problem report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncidentReport {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub status: Option<String>,
    pub page_url: Option<String>,
    pub pathname: Option<String>,
    pub priority: Option<String>,
    pub steps_to_reproduce: Option<String>,
    pub expected_behavior: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub admin_notes: Option<String>,
    pub user_id: Option<String>,
}

impl IncidentReport {
    /// Status label; reports without one are still pending triage.
    pub fn status_label(&self) -> &str {
        self.status.as_deref().unwrap_or("pending")
    }

    pub fn is_open(&self) -> bool {
        !matches!(self.status.as_deref(), Some("resolved") | Some("closed"))
    }

    /// Whether this report was filed against `route` (an incident-normalized route).
    pub fn matches_route(&self, route: &str) -> bool {
        let needle = route.to_lowercase();
        [self.pathname.as_deref(), self.page_url.as_deref()]
            .into_iter()
            .flatten()
            .any(|location| normalize_incident_route(location).to_lowercase().contains(&needle))
    }

    fn mentions(&self, keyword: &str) -> bool {
        let keyword = keyword.to_lowercase();
        self.title.to_lowercase().contains(&keyword)
            || self.description.to_lowercase().contains(&keyword)
    }
}

/// Query interface over the external incident store.
///
/// Routes passed in are already normalized with [`normalize_incident_route`]. Results
/// are ordered newest first unless stated otherwise.
#[async_trait]
pub trait IncidentStore: Send + Sync {
    /// Reports filed against the route.
    async fn similar_by_route(
        &self,
        route: &str,
        limit: usize,
    ) -> Result<Vec<IncidentReport>, LookupError>;

    /// Unresolved reports for the route, ordered by priority.
    async fn open_by_route(
        &self,
        route: &str,
        limit: usize,
    ) -> Result<Vec<IncidentReport>, LookupError>;

    async fn recent_by_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<IncidentReport>, LookupError>;

    /// Reports whose title or description mentions any keyword.
    async fn search_by_keywords(
        &self,
        keywords: &[String],
        limit: usize,
    ) -> Result<Vec<IncidentReport>, LookupError>;

    /// Every report for the route, unordered. Used for statistics.
    async fn reports_for_route(&self, route: &str) -> Result<Vec<IncidentReport>, LookupError>;

    /// False for the placeholder store used when nothing is configured.
    fn is_configured(&self) -> bool {
        true
    }
}

/// Store used when no incident backend is configured. Every query is empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullIncidentStore;

#[async_trait]
impl IncidentStore for NullIncidentStore {
    async fn similar_by_route(&self, _: &str, _: usize) -> Result<Vec<IncidentReport>, LookupError> {
        Ok(Vec::new())
    }

    async fn open_by_route(&self, _: &str, _: usize) -> Result<Vec<IncidentReport>, LookupError> {
        Ok(Vec::new())
    }

    async fn recent_by_user(&self, _: &str, _: usize) -> Result<Vec<IncidentReport>, LookupError> {
        Ok(Vec::new())
    }

    async fn search_by_keywords(
        &self,
        _: &[String],
        _: usize,
    ) -> Result<Vec<IncidentReport>, LookupError> {
        Ok(Vec::new())
    }

    async fn reports_for_route(&self, _: &str) -> Result<Vec<IncidentReport>, LookupError> {
        Ok(Vec::new())
    }

    fn is_configured(&self) -> bool {
        false
    }
}

/// Process-local store for tests and offline runs.
#[derive(Debug, Default)]
pub struct InMemoryIncidentStore {
    reports: RwLock<Vec<IncidentReport>>,
}

impl InMemoryIncidentStore {
    pub fn new(reports: Vec<IncidentReport>) -> Self {
        Self {
            reports: RwLock::new(reports),
        }
    }

    pub fn insert(&self, report: IncidentReport) {
        self.reports.write().push(report);
    }

    pub fn len(&self) -> usize {
        self.reports.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn newest_first<F>(&self, limit: usize, filter: F) -> Vec<IncidentReport>
    where
        F: Fn(&IncidentReport) -> bool,
    {
        let mut found: Vec<IncidentReport> = self
            .reports
            .read()
            .iter()
            .filter(|report| filter(report))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        found.truncate(limit);
        found
    }
}

#[async_trait]
impl IncidentStore for InMemoryIncidentStore {
    async fn similar_by_route(
        &self,
        route: &str,
        limit: usize,
    ) -> Result<Vec<IncidentReport>, LookupError> {
        Ok(self.newest_first(limit, |r| r.matches_route(route)))
    }

    async fn open_by_route(
        &self,
        route: &str,
        limit: usize,
    ) -> Result<Vec<IncidentReport>, LookupError> {
        let mut open: Vec<IncidentReport> = self
            .reports
            .read()
            .iter()
            .filter(|r| r.is_open() && r.matches_route(route))
            .cloned()
            .collect();
        // Missing priorities sort last.
        open.sort_by(|a, b| match (&a.priority, &b.priority) {
            (Some(a), Some(b)) => a.cmp(b),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        open.truncate(limit);
        Ok(open)
    }

    async fn recent_by_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<IncidentReport>, LookupError> {
        Ok(self.newest_first(limit, |r| r.user_id.as_deref() == Some(user_id)))
    }

    async fn search_by_keywords(
        &self,
        keywords: &[String],
        limit: usize,
    ) -> Result<Vec<IncidentReport>, LookupError> {
        if keywords.is_empty() {
            return Ok(self.newest_first(limit, |_| true));
        }
        Ok(self.newest_first(limit, |r| keywords.iter().any(|k| r.mentions(k))))
    }

    async fn reports_for_route(&self, route: &str) -> Result<Vec<IncidentReport>, LookupError> {
        Ok(self
            .reports
            .read()
            .iter()
            .filter(|r| r.matches_route(route))
            .cloned()
            .collect())
    }
}
