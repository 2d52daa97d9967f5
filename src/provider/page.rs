//! Page provider: static technical metadata for the current route.

use super::{priority, ContextProvider};
use crate::cache::{keys, CachedValue, ContextCache, TtlCategory, TtlPolicy};
use crate::error::ProviderError;
use crate::lookup::page::{render_compact, render_verbose};
use crate::lookup::PageLookupService;
use crate::types::{ContextBuildOptions, ContextFragment, ContextType, FragmentKind};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::trace;

/// A rendered page context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub content: String,
    pub page_type: String,
    pub cached: bool,
}

#[derive(Clone)]
pub struct PageProvider {
    lookup: PageLookupService,
    cache: Arc<ContextCache>,
    ttl: TtlPolicy,
}

impl PageProvider {
    pub fn new(lookup: PageLookupService, cache: Arc<ContextCache>, ttl: TtlPolicy) -> Self {
        Self { lookup, cache, ttl }
    }

    /// Render the compact or verbose page context for `route`, memoized per route and
    /// variant. `None` when the registry has nothing for the route.
    pub fn render(&self, route: &str, verbose: bool) -> Option<RenderedPage> {
        let found = self.lookup.lookup(route).found()?;
        let key = keys::page_context(&found.route, verbose);
        if let Some(CachedValue::Text(content)) = self.cache.get(&key) {
            trace!(route = %found.route, verbose, "page context served from cache");
            return Some(RenderedPage {
                content,
                page_type: found.metadata.page_type.clone(),
                cached: true,
            });
        }

        let content = if verbose {
            render_verbose(&found.metadata, &found.route)
        } else {
            render_compact(&found.metadata)
        };
        self.cache.set(
            key,
            CachedValue::Text(content.clone()),
            self.ttl.ttl(TtlCategory::Page),
        );
        Some(RenderedPage {
            content,
            page_type: found.metadata.page_type.clone(),
            cached: found.cached,
        })
    }
}

#[async_trait]
impl ContextProvider for PageProvider {
    fn name(&self) -> &str {
        "page"
    }

    fn priority(&self) -> i32 {
        priority::PAGE
    }

    /// Bug reports embed the verbose page context themselves.
    fn should_include(&self, context_type: &ContextType) -> bool {
        *context_type != ContextType::BugReport
    }

    async fn get_context(
        &self,
        options: &ContextBuildOptions,
    ) -> Result<Option<ContextFragment>, ProviderError> {
        let Some(route) = options.page() else {
            return Ok(None);
        };
        Ok(self.render(route, options.wants_bug_report()).map(|page| {
            ContextFragment::new(FragmentKind::Page, page.content, self.priority())
                .from_cache(page.cached)
        }))
    }
}
