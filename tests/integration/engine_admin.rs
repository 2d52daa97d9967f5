//! Engine lifecycle, cache administration and incident statistics

use super::test_utils::{engine_with_store, StaticProvider, BUSINESS_COURSES};
use lia_context::types::{ContextBuildOptions, ContextType};
use lia_context::{BuilderError, ContextEngine, ContextError, LiaContextConfig};
use std::sync::Arc;

#[tokio::test]
async fn test_route_stats_counts_by_status_and_category() {
    let engine = engine_with_store();
    let stats = engine.route_stats("/other-org/business-panel/courses").await;
    assert_eq!(stats.total, 0);

    let stats = engine.route_stats(&format!("{}?tab=open", BUSINESS_COURSES)).await;
    assert_eq!(stats.total, 2);
    assert_eq!(stats.open, 1);
    assert_eq!(stats.resolved, 1);
    assert_eq!(stats.by_category.get("bug"), Some(&2));
}

#[tokio::test]
async fn test_invalidate_user_drops_only_that_user() {
    let engine = engine_with_store();
    for user in ["alice", "bob"] {
        let options = ContextBuildOptions::new(ContextType::BugReport)
            .with_page(BUSINESS_COURSES)
            .with_user(user);
        engine.build_context(&options).await;
    }

    let before = engine.cache_stats().entries;
    assert_eq!(engine.invalidate_user("alice"), 1);
    assert_eq!(engine.cache_stats().entries, before - 1);
    assert_eq!(engine.invalidate_user("alice"), 0);
}

#[tokio::test]
async fn test_invalidate_page_clears_incident_lookups() {
    let engine = engine_with_store();
    let options = ContextBuildOptions::new(ContextType::BugReport).with_page(BUSINESS_COURSES);
    engine.build_context(&options).await;
    assert!(engine.cache_stats().entries >= 3);

    engine.invalidate_page(BUSINESS_COURSES);
    assert_eq!(engine.cache_stats().entries, 0);
}

#[tokio::test]
async fn test_clear_resets_counters() {
    let engine = ContextEngine::init(LiaContextConfig::default()).unwrap();
    engine.lookup_page(BUSINESS_COURSES);
    engine.lookup_page(BUSINESS_COURSES);
    assert!(engine.cache_stats().hits >= 1);

    engine.clear();
    let stats = engine.cache_stats();
    assert_eq!(stats.entries, 0);
    assert_eq!(stats.hits, 0);
    assert_eq!(stats.misses, 0);
}

#[tokio::test]
async fn test_extra_provider_with_taken_name_is_rejected() {
    let result = ContextEngine::builder(LiaContextConfig::default())
        .provider(Arc::new(StaticProvider {
            name: "platform",
            priority: 5,
            content: "duplicate".to_string(),
        }))
        .init();
    match result {
        Err(ContextError::Builder(BuilderError::DuplicateProvider(name))) => {
            assert_eq!(name, "platform")
        }
        _ => panic!("expected duplicate provider error"),
    }
}

#[tokio::test]
async fn test_extra_provider_joins_builds() {
    let engine = ContextEngine::builder(LiaContextConfig::default())
        .provider(Arc::new(StaticProvider {
            name: "announcements",
            priority: 20,
            content: "## ANNOUNCEMENTS\n- Maintenance on Sunday".to_string(),
        }))
        .init()
        .unwrap();

    let report = engine
        .build_report(&ContextBuildOptions::new(ContextType::General))
        .await;
    assert_eq!(report.providers_used, vec!["announcements", "platform"]);
}

#[tokio::test]
async fn test_dispose_is_idempotent_and_builds_still_work() {
    let engine = ContextEngine::init(LiaContextConfig::default()).unwrap();
    assert!(engine.is_sweeping());
    engine.dispose();
    engine.dispose();
    assert!(!engine.is_sweeping());

    let context = engine
        .build_context(&ContextBuildOptions::new(ContextType::Help))
        .await;
    assert!(context.contains("### User roles"));
}

#[test]
fn test_invalid_config_lists_every_problem() {
    let mut config = LiaContextConfig::default();
    config.builder.max_tokens = 0;
    config.metrics.capacity = 0;
    match ContextEngine::init(config) {
        Err(ContextError::ConfigError(message)) => {
            assert!(message.contains("max_tokens"));
            assert!(message.contains("capacity"));
        }
        _ => panic!("expected configuration error"),
    }
}
