//! TTL expiry, eviction and route normalization as seen through the public API

use lia_context::cache::{keys, Ttl, TtlCache};
use lia_context::lookup::{normalize_incident_route, normalize_route};
use lia_context::{ContextEngine, LiaContextConfig};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_entry_expires_after_ttl() {
    let cache: TtlCache<String> = TtlCache::new(10);
    cache.set("user:42::reports", "cached".to_string(), Ttl::For(Duration::from_millis(100)));

    tokio::time::advance(Duration::from_millis(50)).await;
    assert_eq!(cache.get("user:42::reports").as_deref(), Some("cached"));

    tokio::time::advance(Duration::from_millis(100)).await;
    assert_eq!(cache.get("user:42::reports"), None);
    assert!(cache.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cleanup_only_removes_expired() {
    let cache: TtlCache<u32> = TtlCache::new(10);
    cache.set("short", 1, Ttl::For(Duration::from_millis(100)));
    cache.set("long", 2, Ttl::For(Duration::from_secs(60)));
    cache.set("static", 3, Ttl::Infinite);

    tokio::time::advance(Duration::from_millis(150)).await;
    assert_eq!(cache.cleanup(), 1);
    assert!(!cache.contains("short"));
    assert!(cache.contains("long"));
    assert!(cache.contains("static"));
}

#[tokio::test(start_paused = true)]
async fn test_eviction_keeps_size_bounded() {
    let cache: TtlCache<usize> = TtlCache::new(3);
    for i in 0..5 {
        cache.set(format!("page:/p{}::compact", i), i, Ttl::For(Duration::from_secs(60)));
        tokio::time::advance(Duration::from_millis(10)).await;
    }
    assert_eq!(cache.len(), 3);
    assert!(!cache.contains("page:/p0::compact"));
    assert!(!cache.contains("page:/p1::compact"));
    assert!(cache.contains("page:/p4::compact"));
}

#[tokio::test(start_paused = true)]
async fn test_static_entries_survive_size_pressure() {
    let cache: TtlCache<usize> = TtlCache::new(2);
    cache.set("page-meta:/a::", 1, Ttl::Infinite);
    cache.set("page-meta:/b::", 2, Ttl::Infinite);
    cache.set("page-meta:/c::", 3, Ttl::Infinite);
    assert_eq!(cache.len(), 3);

    cache.set("page:/a::compact", 4, Ttl::For(Duration::from_secs(60)));
    tokio::time::advance(Duration::from_millis(10)).await;
    cache.set("page:/b::compact", 5, Ttl::For(Duration::from_secs(60)));
    assert!(!cache.contains("page:/a::compact"));
    assert!(cache.contains("page-meta:/a::"));
}

#[tokio::test(start_paused = true)]
async fn test_sweeper_removes_expired_entries() {
    let mut config = LiaContextConfig::default();
    config.cache.sweep_interval_secs = 1;
    config.cache.ttl.page_secs = 1;
    let engine = ContextEngine::init(config).unwrap();

    engine.lookup_page("/acme/business-panel/courses");
    assert_eq!(engine.cache_stats().entries, 1);

    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(engine.cache_stats().entries, 0);
}

#[tokio::test]
async fn test_repeat_lookup_is_served_from_cache() {
    let engine = ContextEngine::init(LiaContextConfig::default()).unwrap();
    let first = engine.lookup_page("/acme/business-panel/courses?tab=all").found().unwrap();
    let second = engine.lookup_page("/acme/business-panel/courses/").found().unwrap();
    assert!(!first.cached);
    assert!(second.cached);
    assert_eq!(first.route, second.route);
    assert_eq!(first.metadata.route, "/[orgSlug]/business-panel/courses");
}

#[test]
fn test_normalization_is_idempotent() {
    let routes = [
        "/",
        "",
        "/courses/rust-101/learn?lesson=3#t=20",
        "/acme/business-panel/courses/",
        "/admin/reports/3fa85f64-5717-4562-b3fc-2c963f66afa6",
        "/admin/users/1234567/edit/",
        "/communities/rust//",
    ];
    for route in routes {
        let once = normalize_route(route);
        assert_eq!(normalize_route(&once), once, "route: {route}");
        let incident = normalize_incident_route(route);
        assert_eq!(normalize_incident_route(&incident), incident, "route: {route}");
    }
    assert_eq!(
        normalize_incident_route("/admin/reports/3fa85f64-5717-4562-b3fc-2c963f66afa6?x=1"),
        "/admin/reports/{id}"
    );
    assert_eq!(normalize_route("/"), "/");
}

#[test]
fn test_key_layout_matches_invalidation_prefixes() {
    let route = normalize_route("/acme/business-panel/courses/");
    let prefixes = keys::page_prefixes(&route);
    assert!(keys::page_metadata(&route).starts_with(&prefixes[0]));
    assert!(keys::page_context(&route, true).starts_with(&prefixes[1]));
}
