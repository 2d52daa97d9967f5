//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::ContextError;

/// Map engine errors to a string for CLI output.
pub fn map_error(e: &ContextError) -> String {
    match e {
        ContextError::ConfigError(_) => format!(
            "{}\nCheck config/lia-context.toml under --root, or pass --config <file>.",
            e
        ),
        _ => e.to_string(),
    }
}
