//! lia-context CLI Binary
//!
//! Operator command-line interface for the LIA context engine.

use anyhow::Context;
use clap::Parser;
use lia_context::cli::{map_error, Cli, RunContext};
use lia_context::config::ConfigLoader;
use lia_context::error::ContextError;
use lia_context::logging::{init_logging, LoggingConfig};
use std::process;
use tracing::{error, info};

fn main() {
    let cli = Cli::parse();

    // Build logging config from CLI args and config file
    let logging_config = build_logging_config(&cli);

    if let Err(e) = init_logging(Some(&logging_config)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    info!("lia-context CLI starting");

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("{:#}", e);
            process::exit(1);
        }
    };

    match runtime.block_on(run(&cli)) {
        Ok(output) => {
            info!("Command completed successfully");
            println!("{}", output);
        }
        Err(e) => {
            error!("Command failed: {}", e);
            eprintln!("{}", map_error(&e));
            process::exit(1);
        }
    }
}

async fn run(cli: &Cli) -> Result<String, ContextError> {
    let context = RunContext::new(cli.root.clone(), cli.config.clone())?;
    info!("CLI context initialized");
    let output = context.execute(&cli.command).await;
    context.engine().dispose();
    output
}

/// Build logging configuration from CLI args and config file.
/// Precedence: CLI flags override config file override defaults.
fn build_logging_config(cli: &Cli) -> LoggingConfig {
    let mut config = if let Some(ref config_path) = cli.config {
        ConfigLoader::load_from_file(config_path)
            .ok()
            .map(|c| c.logging)
            .unwrap_or_default()
    } else {
        ConfigLoader::load(&cli.root)
            .ok()
            .map(|c| c.logging)
            .unwrap_or_default()
    };

    if cli.verbose {
        config.level = "debug".to_string();
    }
    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.format = format.clone();
    }
    if let Some(ref output) = cli.log_output {
        config.output = output.clone();
    }
    if let Some(ref file) = cli.log_file {
        config.file = file.clone();
    }

    config
}
