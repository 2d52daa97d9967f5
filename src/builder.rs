//! Context Builder
//!
//! Orchestrates one build: select eligible providers, run them concurrently, order the
//! surviving fragments and merge them under the token budget.
//!
//! Fetching is concurrent and unbudgeted; only the merge is budget-gated. Merge order is
//! priority descending with ties broken by registration order, independent of the order in
//! which providers complete.

use crate::config::BuilderConfig;
use crate::error::{BuilderError, ProviderError};
use crate::metrics::{MetricsCollector, UsageMetric};
use crate::lookup::normalize_route;
use crate::provider::ContextProvider;
use crate::registry::PageRegistry;
use crate::types::{estimate_tokens, truncate_chars, ContextBuildOptions, ContextFragment};
use chrono::Utc;
use futures::future::join_all;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info_span, warn, Instrument};

/// Result of merging ordered fragments under a budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub content: String,
    /// Fragments as merged, the last one possibly truncated.
    pub included: Vec<ContextFragment>,
    pub total_tokens: usize,
    pub truncated: bool,
    /// Fragments left out because the budget ran out.
    pub dropped: usize,
}

/// Merge `fragments` (already in merge order) under `config.max_tokens`.
///
/// Fragments are taken greedily. The first one that does not fit is truncated to the
/// remaining budget when more than `min_truncation_tokens` remain, otherwise dropped;
/// either way nothing after it is considered.
pub fn merge_fragments(fragments: Vec<ContextFragment>, config: &BuilderConfig) -> MergeOutcome {
    let total = fragments.len();
    let mut included: Vec<ContextFragment> = Vec::with_capacity(total);
    let mut used = 0usize;
    let mut truncated = false;

    for fragment in fragments {
        if used + fragment.tokens() <= config.max_tokens {
            used += fragment.tokens();
            included.push(fragment);
            continue;
        }

        let remaining = config.max_tokens - used;
        if remaining > config.min_truncation_tokens {
            if let Some(cut) = truncate_fragment(&fragment, remaining, &config.truncation_marker) {
                debug!(
                    kind = fragment.kind().as_str(),
                    original_tokens = fragment.tokens(),
                    remaining,
                    "fragment truncated to fit budget"
                );
                used += cut.tokens();
                included.push(cut);
                truncated = true;
            }
        }
        break;
    }

    let dropped = total - included.len();
    let content = included
        .iter()
        .map(ContextFragment::content)
        .collect::<Vec<_>>()
        .join(&config.separator);

    MergeOutcome {
        content,
        included,
        total_tokens: used,
        truncated,
        dropped,
    }
}

/// Cut a fragment so its content, marker included, is at most `budget_tokens * 4` chars.
fn truncate_fragment(
    fragment: &ContextFragment,
    budget_tokens: usize,
    marker: &str,
) -> Option<ContextFragment> {
    let budget_chars = budget_tokens * crate::types::CHARS_PER_TOKEN;
    let keep = budget_chars.checked_sub(marker.chars().count())?;
    if keep == 0 {
        return None;
    }
    let content = format!("{}{}", truncate_chars(fragment.content(), keep), marker);
    debug_assert!(estimate_tokens(&content) <= budget_tokens);
    Some(
        ContextFragment::new(fragment.kind().clone(), content, fragment.priority())
            .from_cache(fragment.is_cached()),
    )
}

/// Everything observed during one build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub context: String,
    pub fragments: Vec<ContextFragment>,
    /// Names of providers whose fragment made it into the output, in merge order.
    pub providers_used: Vec<String>,
    /// Providers that returned an error, timed out or panicked.
    pub failed: Vec<String>,
    pub total_tokens: usize,
    pub truncated: bool,
    pub dropped: usize,
    pub build_time_ms: u64,
    pub cached: bool,
}

struct Produced {
    order: usize,
    provider: String,
    fragment: ContextFragment,
}

/// Registered providers plus the merge policy.
pub struct ContextBuilder {
    providers: Vec<Arc<dyn ContextProvider>>,
    config: BuilderConfig,
    metrics: Option<Arc<MetricsCollector>>,
    registry: Option<Arc<PageRegistry>>,
}

impl ContextBuilder {
    pub fn new(config: BuilderConfig) -> Self {
        Self {
            providers: Vec::new(),
            config,
            metrics: None,
            registry: None,
        }
    }

    /// Record one usage metric per build.
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Resolve page types for usage metrics. Reads the registry directly so recording
    /// never touches the cache.
    pub fn with_page_types(mut self, registry: Arc<PageRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Register a provider. Names must be non-empty and unique.
    pub fn register(&mut self, provider: Arc<dyn ContextProvider>) -> Result<(), BuilderError> {
        let name = provider.name();
        if name.trim().is_empty() {
            return Err(BuilderError::EmptyProviderName);
        }
        if self.providers.iter().any(|p| p.name() == name) {
            return Err(BuilderError::DuplicateProvider(name.to_string()));
        }
        debug!(provider = %name, priority = provider.priority(), "provider registered");
        self.providers.push(provider);
        Ok(())
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Build the context string. Never fails; an empty string means no context.
    pub async fn build_context(&self, options: &ContextBuildOptions) -> String {
        self.build(options).await.context
    }

    /// Build and report what happened.
    pub async fn build(&self, options: &ContextBuildOptions) -> BuildReport {
        let started = Instant::now();
        let span = info_span!(
            "build_context",
            context_type = %options.context_type,
            page = options.page().unwrap_or("")
        );

        let eligible: Vec<(usize, &Arc<dyn ContextProvider>)> = self
            .providers
            .iter()
            .enumerate()
            .filter(|(_, p)| p.should_include(&options.context_type))
            .collect();

        let results = join_all(
            eligible
                .iter()
                .map(|(order, provider)| self.invoke(*order, provider, options)),
        )
        .instrument(span)
        .await;

        let mut produced: Vec<Produced> = Vec::with_capacity(results.len());
        let mut failed = Vec::new();
        for (order, name, result) in results {
            match result {
                Ok(Some(fragment)) if !fragment.is_blank() => produced.push(Produced {
                    order,
                    provider: name,
                    fragment,
                }),
                Ok(_) => debug!(provider = %name, "provider contributed nothing"),
                Err(err) => {
                    warn!(provider = %name, error = %err, "provider failed; skipping");
                    failed.push(name);
                }
            }
        }

        produced.sort_by(|a, b| {
            b.fragment
                .priority()
                .cmp(&a.fragment.priority())
                .then(a.order.cmp(&b.order))
        });
        let names: Vec<String> = produced.iter().map(|p| p.provider.clone()).collect();
        let merged = merge_fragments(
            produced.into_iter().map(|p| p.fragment).collect(),
            &self.config,
        );
        let providers_used: Vec<String> = names.into_iter().take(merged.included.len()).collect();

        let report = BuildReport {
            cached: merged.included.iter().any(ContextFragment::is_cached),
            context: merged.content,
            fragments: merged.included,
            providers_used,
            failed,
            total_tokens: merged.total_tokens,
            truncated: merged.truncated,
            dropped: merged.dropped,
            build_time_ms: started.elapsed().as_millis() as u64,
        };
        debug!(
            tokens = report.total_tokens,
            fragments = report.fragments.len(),
            dropped = report.dropped,
            truncated = report.truncated,
            build_time_ms = report.build_time_ms,
            "context built"
        );

        self.record(options, &report);
        report
    }

    /// Run one provider with the per-provider deadline, folding panics into errors.
    async fn invoke(
        &self,
        order: usize,
        provider: &Arc<dyn ContextProvider>,
        options: &ContextBuildOptions,
    ) -> (usize, String, Result<Option<ContextFragment>, ProviderError>) {
        let name = provider.name().to_string();
        let call = AssertUnwindSafe(provider.get_context(options)).catch_unwind();
        let result = match tokio::time::timeout(self.config.provider_timeout(), call).await {
            Err(_) => Err(ProviderError::TimedOut(self.config.provider_timeout_ms)),
            Ok(Err(panic)) => Err(ProviderError::Panicked(panic_message(panic.as_ref()))),
            Ok(Ok(result)) => result,
        };
        (order, name, result)
    }

    fn record(&self, options: &ContextBuildOptions, report: &BuildReport) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        let page_type = match (&self.registry, options.page()) {
            (Some(registry), Some(route)) => registry
                .resolve(&normalize_route(route))
                .map(|(page, _)| page.page_type.clone()),
            _ => None,
        };
        metrics.record_usage(UsageMetric {
            timestamp: Utc::now(),
            context_type: options.context_type.to_string(),
            page_type,
            current_page: options.page().map(str::to_string),
            providers_used: report.providers_used.clone(),
            total_tokens: report.total_tokens,
            build_time_ms: report.build_time_ms,
            is_bug_report: options.wants_bug_report(),
            user_id: options.user().map(str::to_string),
            cached: report.cached,
            fragment_count: report.fragments.len(),
        });
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
