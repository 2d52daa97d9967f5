//! Configuration System
//!
//! Layered configuration for the context engine: compiled defaults, an optional user-level
//! file, optional project files and `LIA_CONTEXT__*` environment overrides. Every field has
//! a default so an empty configuration yields a working engine.

use crate::error::ContextError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiaContextConfig {
    #[serde(default)]
    pub builder: BuilderConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,

    #[serde(default)]
    pub course: CourseConfig,

    #[serde(default)]
    pub incidents: IncidentStoreConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Token budget and merge settings for the context builder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderConfig {
    /// Maximum combined estimated tokens of a built context
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Below this remaining budget an overflowing fragment is dropped instead of truncated
    #[serde(default = "default_min_truncation_tokens")]
    pub min_truncation_tokens: usize,

    /// Per-provider deadline; a provider that misses it contributes nothing
    #[serde(default = "default_provider_timeout_ms")]
    pub provider_timeout_ms: u64,

    #[serde(default = "default_separator")]
    pub separator: String,

    #[serde(default = "default_truncation_marker")]
    pub truncation_marker: String,
}

fn default_max_tokens() -> usize {
    4000
}

fn default_min_truncation_tokens() -> usize {
    100
}

fn default_provider_timeout_ms() -> u64 {
    3000
}

fn default_separator() -> String {
    "\n\n---\n\n".to_string()
}

fn default_truncation_marker() -> String {
    "\n\n[... context truncated ...]".to_string()
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            min_truncation_tokens: default_min_truncation_tokens(),
            provider_timeout_ms: default_provider_timeout_ms(),
            separator: default_separator(),
            truncation_marker: default_truncation_marker(),
        }
    }
}

impl BuilderConfig {
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }
}

/// Cache sizing, sweep cadence and TTL per category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    #[serde(default)]
    pub ttl: TtlConfig,
}

fn default_max_entries() -> usize {
    500
}

fn default_sweep_interval_secs() -> u64 {
    300
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            sweep_interval_secs: default_sweep_interval_secs(),
            ttl: TtlConfig::default(),
        }
    }
}

impl CacheConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// TTLs in seconds. Static entries never expire and are not configurable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtlConfig {
    #[serde(default = "default_user_ttl")]
    pub user_secs: u64,

    #[serde(default = "default_page_ttl")]
    pub page_secs: u64,

    #[serde(default = "default_bug_report_ttl")]
    pub bug_report_secs: u64,
}

fn default_user_ttl() -> u64 {
    5 * 60
}

fn default_page_ttl() -> u64 {
    60 * 60
}

fn default_bug_report_ttl() -> u64 {
    2 * 60
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            user_secs: default_user_ttl(),
            page_secs: default_page_ttl(),
            bug_report_secs: default_bug_report_ttl(),
        }
    }
}

/// Usage metrics buffer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Ring buffer capacity
    #[serde(default = "default_metrics_capacity")]
    pub capacity: usize,

    /// Default age cut-off used by `MetricsCollector::cleanup_default`
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
}

fn default_metrics_capacity() -> usize {
    1000
}

fn default_retention_secs() -> u64 {
    24 * 60 * 60
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            capacity: default_metrics_capacity(),
            retention_secs: default_retention_secs(),
        }
    }
}

impl MetricsConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseConfig {
    /// Character ceiling for embedded lesson transcripts
    #[serde(default = "default_transcript_max_chars")]
    pub transcript_max_chars: usize,
}

fn default_transcript_max_chars() -> usize {
    2000
}

impl Default for CourseConfig {
    fn default() -> Self {
        Self {
            transcript_max_chars: default_transcript_max_chars(),
        }
    }
}

/// Connection and query limits for the incident report store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentStoreConfig {
    /// Base URL of the REST endpoint (e.g. `https://db.example.com/rest/v1`).
    /// When unset, incident lookups are disabled.
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_incident_table")]
    pub table: String,

    #[serde(default = "default_incident_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_similar_limit")]
    pub similar_limit: usize,

    #[serde(default = "default_open_limit")]
    pub open_limit: usize,

    #[serde(default = "default_user_limit")]
    pub user_limit: usize,

    #[serde(default = "default_keyword_limit")]
    pub keyword_limit: usize,
}

fn default_incident_table() -> String {
    "incident_reports".to_string()
}

fn default_incident_timeout_ms() -> u64 {
    5000
}

fn default_similar_limit() -> usize {
    3
}

fn default_open_limit() -> usize {
    3
}

fn default_user_limit() -> usize {
    2
}

fn default_keyword_limit() -> usize {
    5
}

impl Default for IncidentStoreConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            table: default_incident_table(),
            timeout_ms: default_incident_timeout_ms(),
            similar_limit: default_similar_limit(),
            open_limit: default_open_limit(),
            user_limit: default_user_limit(),
            keyword_limit: default_keyword_limit(),
        }
    }
}

impl IncidentStoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Builder(String),
    Cache(String),
    Metrics(String),
    Incidents(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Builder(msg) => write!(f, "builder: {}", msg),
            ValidationError::Cache(msg) => write!(f, "cache: {}", msg),
            ValidationError::Metrics(msg) => write!(f, "metrics: {}", msg),
            ValidationError::Incidents(msg) => write!(f, "incidents: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl LiaContextConfig {
    /// Render as TOML for operators. The incident store API key is masked.
    pub fn to_toml_string(&self) -> Result<String, ContextError> {
        let mut shown = self.clone();
        if shown.incidents.api_key.is_some() {
            shown.incidents.api_key = Some("***".to_string());
        }
        toml::to_string_pretty(&shown).map_err(|e| ContextError::ConfigError(e.to_string()))
    }

    /// Validate the entire configuration, reporting every problem found
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.builder.max_tokens == 0 {
            errors.push(ValidationError::Builder(
                "max_tokens must be greater than zero".to_string(),
            ));
        }
        if self.builder.min_truncation_tokens > self.builder.max_tokens {
            errors.push(ValidationError::Builder(format!(
                "min_truncation_tokens ({}) exceeds max_tokens ({})",
                self.builder.min_truncation_tokens, self.builder.max_tokens
            )));
        }
        if self.builder.provider_timeout_ms == 0 {
            errors.push(ValidationError::Builder(
                "provider_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.cache.max_entries == 0 {
            errors.push(ValidationError::Cache(
                "max_entries must be greater than zero".to_string(),
            ));
        }
        if self.cache.sweep_interval_secs == 0 {
            errors.push(ValidationError::Cache(
                "sweep_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.metrics.capacity == 0 {
            errors.push(ValidationError::Metrics(
                "capacity must be greater than zero".to_string(),
            ));
        }
        if let Some(url) = &self.incidents.base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                errors.push(ValidationError::Incidents(format!(
                    "base_url must be an http(s) URL, got '{}'",
                    url
                )));
            }
        }
        if self.incidents.table.trim().is_empty() {
            errors.push(ValidationError::Incidents(
                "table must not be empty".to_string(),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
