//! Context Engine
//!
//! The per-process service the chat endpoint talks to. It owns the shared cache, the
//! metrics collector, the page registry and the provider set, and exposes the build entry
//! point together with the cache admin and metrics export surfaces.
//!
//! Lifecycle: [`ContextEngine::init`] wires everything and starts the periodic cache
//! sweep on the current tokio runtime; [`ContextEngine::dispose`] (or dropping the engine)
//! stops it.

use crate::builder::{BuildReport, ContextBuilder};
use crate::cache::{keys, CacheStats, ContextCache, TtlCache, TtlPolicy};
use crate::config::LiaContextConfig;
use crate::error::ContextError;
use crate::lookup::{
    normalize_incident_route, normalize_route, ErrorContextService, IncidentStore,
    NullIncidentStore, PageLookup, PageLookupService, RestIncidentStore, RouteStats,
};
use crate::metrics::{
    BugReportStats, ContextStats, MetricsCollector, MetricsSnapshot, PageCount,
    ProviderPerformance, SessionStats,
};
use crate::provider::{
    BugReportProvider, ContextProvider, CourseProvider, PageProvider, PlatformProvider,
    UserProvider,
};
use crate::registry::PageRegistry;
use crate::types::ContextBuildOptions;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Wiring for a [`ContextEngine`]. Anything not supplied comes from the configuration.
pub struct EngineBuilder {
    config: LiaContextConfig,
    registry: Option<PageRegistry>,
    incident_store: Option<Arc<dyn IncidentStore>>,
    replacements: Vec<Arc<dyn ContextProvider>>,
    extra: Vec<Arc<dyn ContextProvider>>,
}

impl EngineBuilder {
    pub fn new(config: LiaContextConfig) -> Self {
        Self {
            config,
            registry: None,
            incident_store: None,
            replacements: Vec::new(),
            extra: Vec::new(),
        }
    }

    /// Use this page table instead of the built-in one.
    pub fn registry(mut self, registry: PageRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn incident_store(mut self, store: Arc<dyn IncidentStore>) -> Self {
        self.incident_store = Some(store);
        self
    }

    /// Swap a built-in provider for one with the same name, keeping its position.
    pub fn replace_provider(mut self, provider: Arc<dyn ContextProvider>) -> Self {
        self.replacements.push(provider);
        self
    }

    /// Register an additional provider after the built-in ones.
    pub fn provider(mut self, provider: Arc<dyn ContextProvider>) -> Self {
        self.extra.push(provider);
        self
    }

    pub fn init(self) -> Result<ContextEngine, ContextError> {
        if let Err(errors) = self.config.validate() {
            let message = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ContextError::ConfigError(message));
        }

        let config = self.config;
        let registry = Arc::new(match self.registry {
            Some(registry) => registry,
            None => PageRegistry::builtin()?,
        });
        let store = match self.incident_store {
            Some(store) => store,
            None => incident_store_from_config(&config)?,
        };

        let ttl = TtlPolicy::from(&config.cache.ttl);
        let cache: Arc<ContextCache> = Arc::new(TtlCache::new(config.cache.max_entries));
        let metrics = Arc::new(MetricsCollector::from_config(&config.metrics));

        let pages = PageLookupService::new(Arc::clone(&registry), Arc::clone(&cache), ttl);
        let page_provider = PageProvider::new(pages.clone(), Arc::clone(&cache), ttl);
        let errors = ErrorContextService::new(store, Arc::clone(&cache), ttl, &config.incidents);

        let mut providers: Vec<Arc<dyn ContextProvider>> = vec![
            Arc::new(BugReportProvider::new(page_provider.clone(), errors.clone())),
            Arc::new(page_provider),
            Arc::new(CourseProvider::new(&config.course)),
            Arc::new(UserProvider::new()),
            Arc::new(PlatformProvider::new()),
        ];
        for replacement in self.replacements {
            match providers.iter().position(|p| p.name() == replacement.name()) {
                Some(index) => providers[index] = replacement,
                None => providers.push(replacement),
            }
        }
        providers.extend(self.extra);

        let mut builder = ContextBuilder::new(config.builder.clone())
            .with_metrics(Arc::clone(&metrics))
            .with_page_types(Arc::clone(&registry));
        for provider in providers {
            builder.register(provider)?;
        }

        let engine = ContextEngine {
            cache,
            metrics,
            builder,
            pages,
            errors,
            sweeper: Mutex::new(None),
            config,
        };
        engine.start_sweeper();
        info!(
            providers = ?engine.builder.provider_names(),
            routes = engine.pages.registry().len(),
            "context engine initialized"
        );
        Ok(engine)
    }
}

fn incident_store_from_config(
    config: &LiaContextConfig,
) -> Result<Arc<dyn IncidentStore>, ContextError> {
    if config.incidents.base_url.is_none() {
        debug!("no incident store configured; incident lookups disabled");
        return Ok(Arc::new(NullIncidentStore));
    }
    Ok(Arc::new(RestIncidentStore::new(&config.incidents)?))
}

/// Context aggregation service: one per process (or per test).
pub struct ContextEngine {
    config: LiaContextConfig,
    cache: Arc<ContextCache>,
    metrics: Arc<MetricsCollector>,
    builder: ContextBuilder,
    pages: PageLookupService,
    errors: ErrorContextService,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl ContextEngine {
    /// Wire an engine from configuration with the built-in registry and providers.
    pub fn init(config: LiaContextConfig) -> Result<Self, ContextError> {
        EngineBuilder::new(config).init()
    }

    pub fn builder(config: LiaContextConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    fn start_sweeper(&self) {
        match tokio::runtime::Handle::try_current() {
            Ok(_) => {
                let handle = self.cache.spawn_sweeper(self.config.cache.sweep_interval());
                *self.sweeper.lock() = Some(handle);
            }
            Err(_) => warn!("no tokio runtime; periodic cache sweep disabled"),
        }
    }

    /// Stop background work. Safe to call more than once.
    pub fn dispose(&self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
            debug!("cache sweep stopped");
        }
    }

    pub fn is_sweeping(&self) -> bool {
        self.sweeper
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn config(&self) -> &LiaContextConfig {
        &self.config
    }

    /// Build the context string for one chat request. Never fails.
    pub async fn build_context(&self, options: &ContextBuildOptions) -> String {
        self.builder.build_context(options).await
    }

    /// Build and report provider outcomes, budget use and timing.
    pub async fn build_report(&self, options: &ContextBuildOptions) -> BuildReport {
        self.builder.build(options).await
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.builder.provider_names()
    }

    pub fn registry(&self) -> &PageRegistry {
        self.pages.registry()
    }

    pub fn lookup_page(&self, route: &str) -> PageLookup {
        self.pages.lookup(route)
    }

    pub async fn route_stats(&self, route: &str) -> RouteStats {
        self.errors.route_stats(route).await
    }

    // Cache administration

    /// Drop everything cached for a user. Returns the number of entries removed.
    pub fn invalidate_user(&self, user_id: &str) -> usize {
        let removed = self.cache.invalidate_by_pattern(&keys::user_prefix(user_id));
        debug!(user_id, removed, "user cache invalidated");
        removed
    }

    /// Drop cached metadata, rendered context and incident lookups for a route.
    pub fn invalidate_page(&self, route: &str) -> usize {
        let route = normalize_route(route);
        let mut removed: usize = keys::page_prefixes(&route)
            .iter()
            .map(|prefix| self.cache.invalidate_by_pattern(prefix))
            .sum();
        removed += self
            .cache
            .invalidate_by_pattern(&keys::incidents(&normalize_incident_route(&route), ""));
        debug!(route = %route, removed, "page cache invalidated");
        removed
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Remove expired cache entries now instead of waiting for the sweep.
    pub fn cleanup_cache(&self) -> usize {
        self.cache.cleanup()
    }

    // Metrics export

    pub fn export_metrics(&self) -> MetricsSnapshot {
        self.metrics.export_metrics()
    }

    pub fn get_stats(&self) -> ContextStats {
        self.metrics.get_stats()
    }

    pub fn get_session_stats(&self) -> SessionStats {
        self.metrics.get_session_stats()
    }

    pub fn get_top_pages(&self, limit: usize) -> Vec<PageCount> {
        self.metrics.get_top_pages(limit)
    }

    pub fn get_bug_report_stats(&self) -> BugReportStats {
        self.metrics.get_bug_report_stats()
    }

    pub fn get_provider_performance(&self) -> BTreeMap<String, ProviderPerformance> {
        self.metrics.get_provider_performance()
    }

    /// Drop usage records older than the configured retention.
    pub fn cleanup_metrics(&self) -> usize {
        self.metrics.cleanup_expired()
    }
}

impl Drop for ContextEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}
