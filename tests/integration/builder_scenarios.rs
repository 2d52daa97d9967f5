//! End-to-end builds through the engine and the builder

use super::test_utils::{
    engine_with_store, FailingProvider, StaticProvider, BUSINESS_COURSES,
};
use lia_context::config::BuilderConfig;
use lia_context::types::{ConsoleError, ContextBuildOptions, ContextType, EnrichedMetadata};
use lia_context::{ContextBuilder, ContextEngine, LiaContextConfig};
use std::sync::Arc;

#[tokio::test]
async fn test_bug_report_on_business_courses() {
    let engine = engine_with_store();
    let options = ContextBuildOptions::new(ContextType::BugReport).with_page(BUSINESS_COURSES);

    let report = engine.build_report(&options).await;
    let context = &report.context;

    assert!(context.starts_with("## BUG REPORT CONTEXT"));
    assert!(context.contains("BusinessCoursesPage"));
    assert!(context.lines().any(|line| line.starts_with("- **GET /api/")));
    assert!(context.contains("### Reports filed on this page:"));
    assert!(context.contains("Report r1"));
    assert!(context.contains("### Open reports on this page (unresolved):"));
    assert!(!context.contains("## PLATFORM"));
    assert_eq!(report.providers_used, vec!["bug-report"]);
    assert!(report.failed.is_empty());
}

#[tokio::test]
async fn test_bug_report_flag_on_general_request_uses_verbose_page() {
    let engine = engine_with_store();
    let options = ContextBuildOptions::new(ContextType::General)
        .with_page(BUSINESS_COURSES)
        .bug_report(true);

    let context = engine.build_context(&options).await;
    assert!(context.contains("## TECHNICAL PAGE CONTEXT: business_panel_courses"));
}

#[tokio::test]
async fn test_empty_route_yields_platform_only() {
    let engine = ContextEngine::init(LiaContextConfig::default()).unwrap();
    let options = ContextBuildOptions::new(ContextType::General).with_page("");

    let report = engine.build_report(&options).await;
    assert_eq!(report.providers_used, vec!["platform"]);
    assert!(report.context.starts_with("## PLATFORM: SOFIA"));
    assert!(!report.context.contains("\n\n---\n\n"));
}

#[tokio::test]
async fn test_failing_course_provider_leaves_other_fragments() {
    let engine = ContextEngine::builder(LiaContextConfig::default())
        .replace_provider(Arc::new(FailingProvider { name: "course" }))
        .init()
        .unwrap();
    assert_eq!(
        engine.provider_names(),
        vec!["bug-report", "page", "course", "user", "platform"]
    );

    let options = ContextBuildOptions::new(ContextType::Course)
        .with_page("/courses/rust-101/learn")
        .with_user("3fa85f64-5717-4562-b3fc-2c963f66afa6");
    let report = engine.build_report(&options).await;

    assert_eq!(report.failed, vec!["course"]);
    assert_eq!(report.providers_used, vec!["page", "user", "platform"]);
    assert!(report.context.contains("## CURRENT PAGE: course_learn"));
    assert!(report.context.contains("## USER CONTEXT"));
    assert!(!report.context.contains("## COURSE CONTEXT"));
}

#[tokio::test]
async fn test_sections_follow_priority_order() {
    let engine = ContextEngine::init(LiaContextConfig::default()).unwrap();
    let options = ContextBuildOptions::new(ContextType::Course)
        .with_page("/courses/rust-101/learn")
        .with_user("user-1");

    let context = engine.build_context(&options).await;
    let page = context.find("## CURRENT PAGE").unwrap();
    let course = context.find("## COURSE CONTEXT").unwrap();
    let user = context.find("## USER CONTEXT").unwrap();
    let platform = context.find("## PLATFORM").unwrap();
    assert!(page < course && course < user && user < platform);
}

#[tokio::test]
async fn test_budget_truncates_then_stops() {
    let config = BuilderConfig {
        max_tokens: 250,
        min_truncation_tokens: 20,
        ..Default::default()
    };
    let mut builder = ContextBuilder::new(config.clone());
    builder
        .register(Arc::new(StaticProvider {
            name: "low",
            priority: 10,
            content: "c".repeat(40),
        }))
        .unwrap();
    builder
        .register(Arc::new(StaticProvider {
            name: "high",
            priority: 90,
            content: "a".repeat(400),
        }))
        .unwrap();
    builder
        .register(Arc::new(StaticProvider {
            name: "middle",
            priority: 50,
            content: "b".repeat(800),
        }))
        .unwrap();

    let report = builder.build(&ContextBuildOptions::default()).await;
    assert_eq!(report.providers_used, vec!["high", "middle"]);
    assert!(report.truncated);
    assert_eq!(report.dropped, 1);
    assert!(report.total_tokens <= config.max_tokens);
    assert!(report.context.ends_with(&config.truncation_marker));
    assert!(!report.context.contains("ccc"));
}

#[tokio::test]
async fn test_small_remainder_drops_instead_of_truncating() {
    let config = BuilderConfig {
        max_tokens: 120,
        min_truncation_tokens: 50,
        ..Default::default()
    };
    let mut builder = ContextBuilder::new(config);
    builder
        .register(Arc::new(StaticProvider {
            name: "first",
            priority: 90,
            content: "a".repeat(400),
        }))
        .unwrap();
    builder
        .register(Arc::new(StaticProvider {
            name: "second",
            priority: 50,
            content: "b".repeat(400),
        }))
        .unwrap();

    let report = builder.build(&ContextBuildOptions::default()).await;
    assert_eq!(report.providers_used, vec!["first"]);
    assert!(!report.truncated);
    assert_eq!(report.dropped, 1);
    assert_eq!(report.context, "a".repeat(400));
}

#[tokio::test]
async fn test_console_errors_find_reports_with_similar_symptoms() {
    let engine = engine_with_store();
    let options = ContextBuildOptions::new(ContextType::BugReport)
        .with_page("/profile")
        .with_metadata(EnrichedMetadata {
            errors: vec![ConsoleError {
                message: "Something broke while saving".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        });

    let context = engine.build_context(&options).await;
    assert!(context.contains("### Recent console errors:"));
    assert!(context.contains("Something broke while saving"));
    assert!(context.contains("### Reports with similar symptoms:"));
}
