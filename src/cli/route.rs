//! CLI route: single route table and run context. Dispatches to the engine and presentation.

use crate::cli::parse::{Commands, OutputFormat};
use crate::cli::presentation::{
    format_build_json, format_build_text, format_lookup_json, format_lookup_text,
    format_routes_table,
};
use crate::config::{ConfigLoader, LiaContextConfig};
use crate::engine::ContextEngine;
use crate::error::ContextError;
use crate::lookup::{normalize_incident_route, normalize_route};
use crate::types::{ContextBuildOptions, ContextType, EnrichedMetadata};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Runtime context for CLI execution: project root, config path and the engine.
pub struct RunContext {
    engine: ContextEngine,
    root: PathBuf,
    config_path: Option<PathBuf>,
}

impl RunContext {
    /// Load configuration (explicit file, else layered from `root`) and wire the engine.
    ///
    /// Must be called inside a tokio runtime for the cache sweep to run.
    pub fn new(root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ContextError> {
        let config = load_config(&root, config_path.as_deref())?;
        let engine = ContextEngine::init(config)?;
        Ok(Self {
            engine,
            root,
            config_path,
        })
    }

    pub fn engine(&self) -> &ContextEngine {
        &self.engine
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub async fn execute(&self, command: &Commands) -> Result<String, ContextError> {
        match command {
            Commands::Build {
                page,
                context_type,
                user,
                metadata,
                report,
                format,
            } => {
                let context_type: ContextType = context_type.parse().unwrap_or_default();
                let mut options = ContextBuildOptions::new(context_type);
                if let Some(page) = page {
                    options = options.with_page(page.clone());
                }
                if let Some(user) = user {
                    options = options.with_user(user.clone());
                }
                if let Some(path) = metadata {
                    options = options.with_metadata(read_metadata(path)?);
                }
                debug!(
                    context_type = %options.context_type,
                    page = ?options.current_page,
                    "building context"
                );

                if !*report {
                    return Ok(self.engine.build_context(&options).await);
                }
                let report = self.engine.build_report(&options).await;
                Ok(match format {
                    OutputFormat::Text => format_build_text(&report),
                    OutputFormat::Json => format_build_json(&report),
                })
            }
            Commands::Routes { format } => Ok(match format {
                OutputFormat::Text => format_routes_table(self.engine.registry()),
                OutputFormat::Json => {
                    let pages: Vec<_> = self.engine.registry().pages().collect();
                    serde_json::to_string_pretty(&pages)?
                }
            }),
            Commands::Lookup {
                route,
                verbose,
                format,
            } => {
                let lookup = self.engine.lookup_page(route);
                Ok(match format {
                    OutputFormat::Text => format_lookup_text(route, &lookup, *verbose),
                    OutputFormat::Json => format_lookup_json(route, &lookup),
                })
            }
            Commands::Normalize { route } => {
                let normalized = normalize_route(route);
                let value = json!({
                    "input": route,
                    "route": normalized,
                    "incident_route": normalize_incident_route(&normalized),
                });
                Ok(serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()))
            }
            Commands::Config => self.engine.config().to_toml_string(),
        }
    }
}

fn load_config(root: &Path, config_path: Option<&Path>) -> Result<LiaContextConfig, ContextError> {
    match config_path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(root),
    }
}

fn read_metadata(path: &Path) -> Result<EnrichedMetadata, ContextError> {
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|e| {
        ContextError::ConfigError(format!("Invalid metadata file {}: {}", path.display(), e))
    })
}
