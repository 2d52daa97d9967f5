//! CLI parse: clap types for lia-context. No behavior; definitions only.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// lia-context CLI - inspect and exercise the LIA context engine
#[derive(Parser)]
#[command(name = "lia-context")]
#[command(about = "Compose and inspect the prompt context sent to the LIA assistant")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Project root; `config/lia-context.toml` is read from here
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the context string for one request
    Build {
        /// Current page route, e.g. /acme/business-panel/courses
        #[arg(long)]
        page: Option<String>,
        /// Context type (general, bug-report, course, help)
        #[arg(long = "type", default_value = "general")]
        context_type: String,
        /// Requesting user id
        #[arg(long)]
        user: Option<String>,
        /// JSON file with client-captured enriched metadata
        #[arg(long)]
        metadata: Option<PathBuf>,
        /// Print the build report (providers, tokens, timing) instead of the context
        #[arg(long)]
        report: bool,
        /// Output format for the report
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// List the routes in the page registry
    Routes {
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Resolve a concrete route against the page registry
    Lookup {
        route: String,
        /// Show the verbose technical rendition
        #[arg(long)]
        verbose: bool,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Show the normalized forms of a route
    Normalize { route: String },
    /// Print the effective configuration as TOML
    Config,
}
