//! Usage metrics for context builds.
//!
//! One [`UsageMetric`] is recorded per build into a bounded ring buffer. The collector
//! only observes: nothing here can change or fail a build.

use crate::config::MetricsConfig;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;
use tracing::debug;

pub mod stats;

pub use stats::{
    BugReportStats, ContextStats, MetricsSnapshot, PageCount, ProviderPerformance, SessionStats,
};

/// Pages listed in bug-report statistics.
const BUG_REPORT_TOP_PAGES: usize = 5;

/// One build, as observed by the collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetric {
    pub timestamp: DateTime<Utc>,
    pub context_type: String,
    pub page_type: Option<String>,
    pub current_page: Option<String>,
    pub providers_used: Vec<String>,
    pub total_tokens: usize,
    pub build_time_ms: u64,
    pub is_bug_report: bool,
    pub user_id: Option<String>,
    /// At least one merged fragment came from the cache.
    pub cached: bool,
    pub fragment_count: usize,
}

struct MetricsState {
    buffer: VecDeque<UsageMetric>,
    session: VecDeque<UsageMetric>,
    session_id: String,
    session_started: DateTime<Utc>,
    /// Sessions started by this collector, including the current one.
    session_seq: u64,
}

impl MetricsState {
    fn start_session(&mut self) {
        self.session.clear();
        self.session_seq += 1;
        self.session_started = Utc::now();
        self.session_id = format!(
            "ctx-{}-{}",
            self.session_started.format("%Y%m%dT%H%M%S%3f"),
            self.session_seq
        );
    }
}

/// Bounded, append-only usage log with derived statistics.
pub struct MetricsCollector {
    state: Mutex<MetricsState>,
    capacity: usize,
    retention: Duration,
}

impl MetricsCollector {
    pub fn new(capacity: usize) -> Self {
        Self::from_config(&MetricsConfig {
            capacity,
            ..Default::default()
        })
    }

    pub fn from_config(config: &MetricsConfig) -> Self {
        let capacity = config.capacity.max(1);
        let mut state = MetricsState {
            buffer: VecDeque::with_capacity(capacity),
            session: VecDeque::new(),
            session_id: String::new(),
            session_started: Utc::now(),
            session_seq: 0,
        };
        state.start_session();
        Self {
            state: Mutex::new(state),
            capacity,
            retention: config.retention(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.state.lock().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a record, dropping the oldest once the buffer is full.
    pub fn record_usage(&self, metric: UsageMetric) {
        debug!(
            context_type = %metric.context_type,
            providers = ?metric.providers_used,
            tokens = metric.total_tokens,
            build_time_ms = metric.build_time_ms,
            cached = metric.cached,
            "context usage recorded"
        );
        let mut state = self.state.lock();
        push_bounded(&mut state.buffer, metric.clone(), self.capacity);
        push_bounded(&mut state.session, metric, self.capacity);
    }

    pub fn get_stats(&self) -> ContextStats {
        ContextStats::from_metrics(self.state.lock().buffer.iter())
    }

    pub fn get_session_stats(&self) -> SessionStats {
        let state = self.state.lock();
        SessionStats {
            session_id: state.session_id.clone(),
            stats: ContextStats::from_metrics(state.session.iter()),
            session_duration_ms: (Utc::now() - state.session_started)
                .num_milliseconds()
                .max(0) as u64,
        }
    }

    pub fn get_top_pages(&self, limit: usize) -> Vec<PageCount> {
        stats::top_pages(self.state.lock().buffer.iter(), limit)
    }

    pub fn get_provider_performance(&self) -> BTreeMap<String, ProviderPerformance> {
        let state = self.state.lock();
        let metrics: Vec<&UsageMetric> = state.buffer.iter().collect();
        stats::provider_performance(&metrics)
    }

    pub fn get_bug_report_stats(&self) -> BugReportStats {
        let state = self.state.lock();
        let reports: Vec<&UsageMetric> = state.buffer.iter().filter(|m| m.is_bug_report).collect();
        if reports.is_empty() {
            return BugReportStats {
                total: 0,
                avg_tokens: 0,
                top_pages: Vec::new(),
            };
        }
        let tokens: u64 = reports.iter().map(|m| m.total_tokens as u64).sum();
        BugReportStats {
            total: reports.len(),
            avg_tokens: (tokens as f64 / reports.len() as f64).round() as u64,
            top_pages: stats::top_pages(reports.iter().copied(), BUG_REPORT_TOP_PAGES),
        }
    }

    /// Drop records older than `older_than`. Returns the number removed.
    pub fn cleanup(&self, older_than: Duration) -> usize {
        let cutoff = chrono::Duration::from_std(older_than)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age));
        let Some(cutoff) = cutoff else {
            return 0;
        };
        let mut state = self.state.lock();
        let before = state.buffer.len();
        state.buffer.retain(|m| m.timestamp > cutoff);
        let removed = before - state.buffer.len();
        if removed > 0 {
            debug!(removed, "expired usage metrics removed");
        }
        removed
    }

    /// [`cleanup`](Self::cleanup) with the configured retention.
    pub fn cleanup_expired(&self) -> usize {
        self.cleanup(self.retention)
    }

    /// Start a new session: clears session records and restarts its clock.
    pub fn reset_session(&self) {
        self.state.lock().start_session();
    }

    pub fn export_metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            exported_at: Utc::now(),
            capacity: self.capacity,
            metrics: self.state.lock().buffer.iter().cloned().collect(),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::from_config(&MetricsConfig::default())
    }
}

fn push_bounded(buffer: &mut VecDeque<UsageMetric>, metric: UsageMetric, capacity: usize) {
    while buffer.len() >= capacity {
        buffer.pop_front();
    }
    buffer.push_back(metric);
}
