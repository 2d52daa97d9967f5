//! PostgREST-style incident store over HTTP.

use super::incidents::{IncidentReport, IncidentStore};
use crate::config::IncidentStoreConfig;
use crate::error::LookupError;
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

const SELECT_COLUMNS: &str = "id,title,description,category,status,page_url,pathname,priority,steps_to_reproduce,expected_behavior,created_at,admin_notes,user_id";

/// Incident store backed by a PostgREST endpoint (`{base_url}/rest/v1/{table}`).
pub struct RestIncidentStore {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl RestIncidentStore {
    /// Build the client. Fails with [`LookupError::NotConfigured`] without a `base_url`.
    pub fn new(config: &IncidentStoreConfig) -> Result<Self, LookupError> {
        let base_url = config
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or(LookupError::NotConfigured)?;

        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/rest/v1/{}", base_url.trim_end_matches('/'), config.table),
            api_key: config.api_key.clone(),
        })
    }

    async fn fetch(&self, query: &[(&str, String)]) -> Result<Vec<IncidentReport>, LookupError> {
        let mut request = self
            .client
            .get(&self.endpoint)
            .query(&[("select", SELECT_COLUMNS)])
            .query(query);
        if let Some(key) = &self.api_key {
            request = request
                .header("apikey", key)
                .header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LookupError::Status { status, body });
        }

        let reports: Vec<IncidentReport> = response
            .json()
            .await
            .map_err(|e| LookupError::Decode(e.to_string()))?;
        debug!(count = reports.len(), "incident store query returned");
        Ok(reports)
    }
}

/// `ilike` pattern for a normalized route. `{id}` placeholders match any text.
fn route_pattern(route: &str) -> String {
    format!("*{}*", sanitize(&route.replace("{id}", "*")))
}

/// Characters that would break out of a PostgREST filter expression.
fn sanitize(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, ',' | '(' | ')' | '"'))
        .collect()
}

fn route_filter(route: &str) -> String {
    let pattern = route_pattern(route);
    format!("(pathname.ilike.{0},page_url.ilike.{0})", pattern)
}

/// Route filter `and`-ed with "not resolved or closed". A NULL status counts as open.
fn open_route_filter(route: &str) -> String {
    format!(
        "(or{},or(status.is.null,status.not.in.(resolved,closed)))",
        route_filter(route)
    )
}

#[async_trait]
impl IncidentStore for RestIncidentStore {
    async fn similar_by_route(
        &self,
        route: &str,
        limit: usize,
    ) -> Result<Vec<IncidentReport>, LookupError> {
        self.fetch(&[
            ("or", route_filter(route)),
            ("order", "created_at.desc".to_string()),
            ("limit", limit.to_string()),
        ])
        .await
    }

    async fn open_by_route(
        &self,
        route: &str,
        limit: usize,
    ) -> Result<Vec<IncidentReport>, LookupError> {
        self.fetch(&[
            ("and", open_route_filter(route)),
            ("order", "priority.asc.nullslast".to_string()),
            ("limit", limit.to_string()),
        ])
        .await
    }

    async fn recent_by_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<IncidentReport>, LookupError> {
        self.fetch(&[
            ("user_id", format!("eq.{}", sanitize(user_id))),
            ("order", "created_at.desc".to_string()),
            ("limit", limit.to_string()),
        ])
        .await
    }

    async fn search_by_keywords(
        &self,
        keywords: &[String],
        limit: usize,
    ) -> Result<Vec<IncidentReport>, LookupError> {
        let mut query = vec![
            ("order", "created_at.desc".to_string()),
            ("limit", limit.to_string()),
        ];
        let conditions: Vec<String> = keywords
            .iter()
            .map(|k| sanitize(k))
            .filter(|k| !k.is_empty())
            .map(|k| format!("title.ilike.*{0}*,description.ilike.*{0}*", k))
            .collect();
        if !conditions.is_empty() {
            query.push(("or", format!("({})", conditions.join(","))));
        }
        self.fetch(&query).await
    }

    async fn reports_for_route(&self, route: &str) -> Result<Vec<IncidentReport>, LookupError> {
        self.fetch(&[("or", route_filter(route))]).await
    }
}
