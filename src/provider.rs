//! Context Providers
//!
//! A provider knows how to produce (or decline to produce) one fragment of context for a
//! build request. Providers are independent: each is asked concurrently, and the builder
//! decides what survives the token budget.

use crate::error::ProviderError;
use crate::types::{ContextBuildOptions, ContextFragment, ContextType};
use async_trait::async_trait;

pub mod bug_report;
pub mod course;
pub mod page;
pub mod platform;
pub mod user;

pub use bug_report::BugReportProvider;
pub use course::CourseProvider;
pub use page::PageProvider;
pub use platform::PlatformProvider;
pub use user::UserProvider;

/// Priorities of the built-in providers. Higher merges first.
pub mod priority {
    pub const BUG_REPORT: i32 = 100;
    pub const PAGE: i32 = 80;
    pub const COURSE: i32 = 70;
    pub const USER: i32 = 30;
    pub const PLATFORM: i32 = 10;
}

/// One pluggable source of context.
#[async_trait]
pub trait ContextProvider: Send + Sync {
    /// Unique name within a builder.
    fn name(&self) -> &str;

    fn priority(&self) -> i32;

    /// Cheap eligibility check for a context type.
    fn should_include(&self, context_type: &ContextType) -> bool;

    /// Produce this provider's fragment, `Ok(None)` when it has nothing to say.
    ///
    /// Errors are reported to the builder, which logs and skips them.
    async fn get_context(
        &self,
        options: &ContextBuildOptions,
    ) -> Result<Option<ContextFragment>, ProviderError>;
}
