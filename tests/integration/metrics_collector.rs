//! Usage metrics recorded by real builds

use super::test_utils::{engine_with_store, BUSINESS_COURSES};
use chrono::Utc;
use lia_context::metrics::{MetricsCollector, UsageMetric};
use lia_context::types::{ContextBuildOptions, ContextType};
use std::time::Duration;

fn usage(page: &str, tokens: usize, age: chrono::Duration) -> UsageMetric {
    UsageMetric {
        timestamp: Utc::now() - age,
        context_type: "general".to_string(),
        page_type: None,
        current_page: Some(page.to_string()),
        providers_used: vec!["page".to_string(), "platform".to_string()],
        total_tokens: tokens,
        build_time_ms: 3,
        is_bug_report: false,
        user_id: None,
        cached: false,
        fragment_count: 2,
    }
}

#[tokio::test]
async fn test_builds_are_recorded_with_page_type() {
    let engine = engine_with_store();
    engine
        .build_context(&ContextBuildOptions::new(ContextType::General).with_page(BUSINESS_COURSES))
        .await;
    engine
        .build_context(&ContextBuildOptions::new(ContextType::General).with_page(BUSINESS_COURSES))
        .await;
    engine
        .build_context(&ContextBuildOptions::new(ContextType::BugReport).with_page("/profile"))
        .await;

    let stats = engine.get_stats();
    assert_eq!(stats.total_requests, 3);
    assert_eq!(stats.bug_report_count, 1);
    assert_eq!(stats.page_type_count.get("business_panel_courses"), Some(&2));
    assert_eq!(stats.context_type_count.get("bug-report"), Some(&1));
    assert_eq!(stats.provider_usage_count.get("page"), Some(&2));
    assert!(stats.cache_hit_rate > 0.0);

    let top = engine.get_top_pages(1);
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].page, BUSINESS_COURSES);
    assert_eq!(top[0].count, 2);

    let bugs = engine.get_bug_report_stats();
    assert_eq!(bugs.total, 1);
    assert_eq!(bugs.top_pages[0].page, "/profile");

    let performance = engine.get_provider_performance();
    let platform = &performance["platform"];
    assert!((platform.usage_percent - 200.0 / 3.0).abs() < 1e-9);

    let session = engine.get_session_stats();
    assert_eq!(session.stats.total_requests, 3);
    assert!(session.session_id.starts_with("ctx-"));
}

#[tokio::test]
async fn test_recording_leaves_cache_counters_untouched() {
    let engine = engine_with_store();
    let report = engine
        .build_report(&ContextBuildOptions::new(ContextType::General).with_page(BUSINESS_COURSES))
        .await;
    assert!(!report.cached);

    let cache = engine.cache_stats();
    assert_eq!(cache.hits, 0);
    assert_eq!(cache.hit_rate, 0.0);

    let stats = engine.get_stats();
    assert_eq!(stats.cache_hit_rate, 0.0);
    assert_eq!(stats.page_type_count.get("business_panel_courses"), Some(&1));
}

#[test]
fn test_ring_buffer_keeps_newest() {
    let collector = MetricsCollector::new(3);
    for i in 0..5 {
        collector.record_usage(usage(&format!("/p{}", i), 10, chrono::Duration::zero()));
    }
    assert_eq!(collector.len(), 3);
    let snapshot = collector.export_metrics();
    assert_eq!(snapshot.capacity, 3);
    let pages: Vec<_> = snapshot
        .metrics
        .iter()
        .filter_map(|m| m.current_page.clone())
        .collect();
    assert_eq!(pages, vec!["/p2", "/p3", "/p4"]);
}

#[test]
fn test_cleanup_drops_old_records() {
    let collector = MetricsCollector::new(10);
    collector.record_usage(usage("/old", 10, chrono::Duration::hours(2)));
    collector.record_usage(usage("/new", 30, chrono::Duration::zero()));

    assert_eq!(collector.cleanup(Duration::from_secs(3600)), 1);
    let stats = collector.get_stats();
    assert_eq!(stats.total_requests, 1);
    assert_eq!(stats.average_tokens, 30);
}

#[test]
fn test_reset_session_keeps_global_stats() {
    let collector = MetricsCollector::default();
    collector.record_usage(usage("/dashboard", 10, chrono::Duration::zero()));
    let first_session = collector.get_session_stats().session_id;

    collector.reset_session();
    let session = collector.get_session_stats();
    assert_ne!(session.session_id, first_session);
    assert_eq!(session.stats.total_requests, 0);
    assert_eq!(collector.get_stats().total_requests, 1);
}

#[test]
fn test_snapshot_serializes_camel_case() {
    let collector = MetricsCollector::new(5);
    collector.record_usage(usage("/dashboard", 12, chrono::Duration::zero()));
    let json = serde_json::to_value(collector.export_metrics()).unwrap();
    assert_eq!(json["metrics"][0]["totalTokens"], 12);
    assert_eq!(json["metrics"][0]["currentPage"], "/dashboard");
}
