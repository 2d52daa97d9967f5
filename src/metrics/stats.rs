//! Aggregates computed over usage records.

use super::UsageMetric;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Aggregate view over a set of usage records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextStats {
    pub total_requests: usize,
    pub average_tokens: u64,
    pub average_build_time_ms: u64,
    /// Percentage of builds with at least one cached fragment.
    pub cache_hit_rate: f64,
    pub provider_usage_count: BTreeMap<String, usize>,
    pub context_type_count: BTreeMap<String, usize>,
    pub page_type_count: BTreeMap<String, usize>,
    pub bug_report_count: usize,
    pub last_updated: DateTime<Utc>,
}

impl ContextStats {
    pub fn empty() -> Self {
        Self {
            total_requests: 0,
            average_tokens: 0,
            average_build_time_ms: 0,
            cache_hit_rate: 0.0,
            provider_usage_count: BTreeMap::new(),
            context_type_count: BTreeMap::new(),
            page_type_count: BTreeMap::new(),
            bug_report_count: 0,
            last_updated: Utc::now(),
        }
    }

    pub(crate) fn from_metrics<'a, I>(metrics: I) -> Self
    where
        I: IntoIterator<Item = &'a UsageMetric>,
    {
        let mut stats = Self::empty();
        let mut total_tokens = 0u64;
        let mut total_build_time = 0u64;
        let mut cached = 0usize;

        for metric in metrics {
            stats.total_requests += 1;
            total_tokens += metric.total_tokens as u64;
            total_build_time += metric.build_time_ms;
            if metric.cached {
                cached += 1;
            }
            if metric.is_bug_report {
                stats.bug_report_count += 1;
            }
            for provider in &metric.providers_used {
                *stats
                    .provider_usage_count
                    .entry(provider.clone())
                    .or_default() += 1;
            }
            *stats
                .context_type_count
                .entry(metric.context_type.clone())
                .or_default() += 1;
            if let Some(page_type) = &metric.page_type {
                *stats.page_type_count.entry(page_type.clone()).or_default() += 1;
            }
        }

        if stats.total_requests > 0 {
            let n = stats.total_requests as f64;
            stats.average_tokens = (total_tokens as f64 / n).round() as u64;
            stats.average_build_time_ms = (total_build_time as f64 / n).round() as u64;
            stats.cache_hit_rate = cached as f64 / n * 100.0;
        }
        stats
    }
}

/// Session aggregate: [`ContextStats`] over the current session plus its age.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStats {
    pub session_id: String,
    #[serde(flatten)]
    pub stats: ContextStats,
    pub session_duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageCount {
    pub page: String,
    pub count: usize,
}

/// Pages by request count, most requested first; ties ordered by page.
pub(crate) fn top_pages<'a, I>(metrics: I, limit: usize) -> Vec<PageCount>
where
    I: IntoIterator<Item = &'a UsageMetric>,
{
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for metric in metrics {
        if let Some(page) = metric.current_page.as_deref() {
            *counts.entry(page).or_default() += 1;
        }
    }
    let mut pages: Vec<PageCount> = counts
        .into_iter()
        .map(|(page, count)| PageCount {
            page: page.to_string(),
            count,
        })
        .collect();
    pages.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.page.cmp(&b.page)));
    pages.truncate(limit);
    pages
}

/// Approximate per-provider cost.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderPerformance {
    /// Mean of each record's tokens split evenly across its providers.
    pub avg_tokens: u64,
    /// Share of records in which the provider contributed.
    pub usage_percent: f64,
}

pub(crate) fn provider_performance(metrics: &[&UsageMetric]) -> BTreeMap<String, ProviderPerformance> {
    let mut totals: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for metric in metrics {
        let share = metric.total_tokens as f64 / metric.providers_used.len().max(1) as f64;
        for provider in &metric.providers_used {
            let entry = totals.entry(provider.clone()).or_insert((0.0, 0));
            entry.0 += share;
            entry.1 += 1;
        }
    }

    let requests = metrics.len().max(1) as f64;
    totals
        .into_iter()
        .map(|(provider, (tokens, count))| {
            (
                provider,
                ProviderPerformance {
                    avg_tokens: (tokens / count as f64).round() as u64,
                    usage_percent: count as f64 / requests * 100.0,
                },
            )
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BugReportStats {
    pub total: usize,
    pub avg_tokens: u64,
    pub top_pages: Vec<PageCount>,
}

/// Everything the collector holds, for dashboards and offline analysis.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub exported_at: DateTime<Utc>,
    pub capacity: usize,
    pub metrics: Vec<UsageMetric>,
}
