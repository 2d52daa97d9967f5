//! TTL cache shared by providers and the page lookup.
//!
//! One key→entry map per engine. Entries expire lazily on `get`, in bulk on `cleanup`
//! (driven by a periodic sweep task), or by eviction when the map is full. Entries with
//! an infinite TTL are never evicted by size pressure.

use crate::config::TtlConfig;
use crate::lookup::incidents::IncidentReport;
use crate::registry::PageMetadata;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

pub mod keys;

/// Lifetime of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    Infinite,
    For(Duration),
}

/// Caller-side TTL categories. The cache itself only sees the resulting [`Ttl`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TtlCategory {
    /// Static page metadata.
    Static,
    /// Per-user data.
    User,
    /// Per-page compiled context.
    Page,
    /// Bug-report lookups.
    BugReport,
}

/// Maps TTL categories to concrete lifetimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    user: Duration,
    page: Duration,
    bug_report: Duration,
}

impl TtlPolicy {
    pub fn ttl(&self, category: TtlCategory) -> Ttl {
        match category {
            TtlCategory::Static => Ttl::Infinite,
            TtlCategory::User => Ttl::For(self.user),
            TtlCategory::Page => Ttl::For(self.page),
            TtlCategory::BugReport => Ttl::For(self.bug_report),
        }
    }
}

impl From<&TtlConfig> for TtlPolicy {
    fn from(config: &TtlConfig) -> Self {
        Self {
            user: Duration::from_secs(config.user_secs),
            page: Duration::from_secs(config.page_secs),
            bug_report: Duration::from_secs(config.bug_report_secs),
        }
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        TtlPolicy::from(&TtlConfig::default())
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    data: T,
    created_at: Instant,
    ttl: Ttl,
}

impl<T> CacheEntry<T> {
    fn is_expired(&self, now: Instant) -> bool {
        match self.ttl {
            Ttl::Infinite => false,
            Ttl::For(ttl) => now.duration_since(self.created_at) > ttl,
        }
    }
}

/// Snapshot of cache counters. `hit_rate` is a percentage of `get` calls that hit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub hit_rate: f64,
}

struct CacheState<T> {
    entries: HashMap<String, CacheEntry<T>>,
    hits: u64,
    misses: u64,
}

/// Key→value store with per-entry TTL and bounded size.
pub struct TtlCache<T> {
    state: Mutex<CacheState<T>>,
    max_entries: usize,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(max_entries: usize) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                hits: 0,
                misses: 0,
            }),
            max_entries: max_entries.max(1),
        }
    }

    /// Return the live value for `key`. An expired entry is removed and counted as a miss.
    pub fn get(&self, key: &str) -> Option<T> {
        let now = Instant::now();
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let expired = match state.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                state.hits += 1;
                return Some(entry.data.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            state.entries.remove(key);
            trace!(key, "cache entry expired");
        }
        state.misses += 1;
        None
    }

    /// Insert or replace `key`. When the map is full, the oldest entry with a finite TTL
    /// is evicted first; infinite-TTL entries are never evicted here.
    pub fn set(&self, key: impl Into<String>, value: T, ttl: Ttl) {
        let key = key.into();
        let mut state = self.state.lock();
        if !state.entries.contains_key(&key) && state.entries.len() >= self.max_entries {
            let oldest = state
                .entries
                .iter()
                .filter(|(_, entry)| entry.ttl != Ttl::Infinite)
                .min_by_key(|(_, entry)| entry.created_at)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(evicted) => {
                    state.entries.remove(&evicted);
                    debug!(key = %evicted, "evicted oldest cache entry");
                }
                None => debug!(
                    entries = state.entries.len(),
                    "cache full of static entries; growing past max_entries"
                ),
            }
        }
        state.entries.insert(
            key,
            CacheEntry {
                data: value,
                created_at: Instant::now(),
                ttl,
            },
        );
    }

    pub fn delete(&self, key: &str) -> bool {
        self.state.lock().entries.remove(key).is_some()
    }

    /// Remove every key starting with `prefix`. Returns the number removed.
    pub fn invalidate_by_pattern(&self, prefix: &str) -> usize {
        let mut state = self.state.lock();
        let before = state.entries.len();
        state.entries.retain(|key, _| !key.starts_with(prefix));
        before - state.entries.len()
    }

    /// Remove every logically expired entry. Returns the number removed.
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let mut state = self.state.lock();
        let before = state.entries.len();
        state.entries.retain(|_, entry| !entry.is_expired(now));
        before - state.entries.len()
    }

    /// Drop all entries and reset the hit/miss counters.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.hits = 0;
        state.misses = 0;
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        let lookups = state.hits + state.misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            state.hits as f64 / lookups as f64 * 100.0
        };
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            entries: state.entries.len(),
            hit_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().entries.contains_key(key)
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }
}

impl<T: Clone + Send + 'static> TtlCache<T> {
    /// Spawn the periodic expiry sweep on the current tokio runtime.
    ///
    /// The task holds only a weak reference and exits once the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = weak.upgrade() else {
                    break;
                };
                let removed = cache.cleanup();
                if removed > 0 {
                    debug!(removed, "cache sweep removed expired entries");
                }
            }
        })
    }
}

/// Values stored in the engine's shared cache.
#[derive(Debug, Clone)]
pub enum CachedValue {
    Text(String),
    Page(Arc<PageMetadata>),
    Incidents(Arc<Vec<IncidentReport>>),
}

pub type ContextCache = TtlCache<CachedValue>;

#[cfg(test)]
mod tests {
    use super::*;

    const SHORT: Ttl = Ttl::For(Duration::from_secs(60));

    #[test]
    fn test_get_counts_hits_and_misses() {
        let cache: TtlCache<u32> = TtlCache::new(10);
        cache.set("a", 1, SHORT);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("b"), None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert!((stats.hit_rate - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_expired_entry_is_removed_on_get() {
        let cache: TtlCache<u32> = TtlCache::new(10);
        cache.set("k", 7, Ttl::For(Duration::from_millis(100)));
        assert_eq!(cache.get("k"), Some(7));

        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_eviction_spares_static_entries() {
        let cache: TtlCache<usize> = TtlCache::new(3);
        cache.set("static", 0, Ttl::Infinite);
        for i in 0..20 {
            cache.set(format!("k{}", i), i, SHORT);
            assert!(cache.len() <= 3);
        }
        assert!(cache.contains("static"));
        assert!(cache.contains("k19"));
        assert!(!cache.contains("k0"));
    }

    #[test]
    fn test_replacing_a_key_does_not_evict() {
        let cache: TtlCache<u32> = TtlCache::new(2);
        cache.set("a", 1, SHORT);
        cache.set("b", 2, SHORT);
        cache.set("b", 3, SHORT);
        assert!(cache.contains("a"));
        assert_eq!(cache.get("b"), Some(3));
    }

    #[test]
    fn test_invalidate_by_pattern_and_delete() {
        let cache: TtlCache<u32> = TtlCache::new(10);
        cache.set("user:1:reports", 1, SHORT);
        cache.set("user:1:profile", 2, SHORT);
        cache.set("user:2:reports", 3, SHORT);

        assert_eq!(cache.invalidate_by_pattern("user:1:"), 2);
        assert!(cache.delete("user:2:reports"));
        assert!(!cache.delete("user:2:reports"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cleanup_removes_only_expired() {
        let cache: TtlCache<u32> = TtlCache::new(10);
        cache.set("short", 1, Ttl::For(Duration::from_millis(10)));
        cache.set("long", 2, SHORT);
        cache.set("static", 3, Ttl::Infinite);

        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.cleanup(), 1);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_clear_resets_counters() {
        let cache: TtlCache<u32> = TtlCache::new(10);
        cache.set("a", 1, SHORT);
        cache.get("a");
        cache.get("missing");
        cache.clear();

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.entries), (0, 0, 0));
    }

    #[test]
    fn test_ttl_policy_categories() {
        let policy = TtlPolicy::default();
        assert_eq!(policy.ttl(TtlCategory::Static), Ttl::Infinite);
        assert_eq!(
            policy.ttl(TtlCategory::BugReport),
            Ttl::For(Duration::from_secs(120))
        );
        assert_eq!(
            policy.ttl(TtlCategory::Page),
            Ttl::For(Duration::from_secs(3600))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_removes_expired_entries() {
        let cache: Arc<TtlCache<u32>> = Arc::new(TtlCache::new(10));
        cache.set("k", 1, Ttl::For(Duration::from_secs(1)));
        let handle = cache.spawn_sweeper(Duration::from_secs(5));

        tokio::time::sleep(Duration::from_secs(6)).await;
        tokio::task::yield_now().await;
        assert!(cache.is_empty());
        handle.abort();
    }
}
