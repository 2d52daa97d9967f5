//! LIA Context: prompt context aggregation for the LIA assistant
//!
//! Composes a bounded block of context text for each chat request from a set of
//! pluggable providers (page metadata, bug-report diagnostics, course, user, platform),
//! ordered by priority and merged under an estimated-token budget.

pub mod builder;
pub mod cache;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod lookup;
pub mod metrics;
pub mod provider;
pub mod registry;
pub mod types;

pub use builder::{merge_fragments, BuildReport, ContextBuilder, MergeOutcome};
pub use config::{ConfigLoader, LiaContextConfig};
pub use engine::{ContextEngine, EngineBuilder};
pub use error::{BuilderError, ContextError, LookupError, ProviderError, RegistryError};
pub use provider::ContextProvider;
pub use types::{
    estimate_tokens, ContextBuildOptions, ContextFragment, ContextType, EnrichedMetadata,
    FragmentKind,
};
