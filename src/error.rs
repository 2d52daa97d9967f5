//! Error types for the LIA context engine.
//!
//! Provider and lookup failures never reach the caller of `build_context`; they are
//! folded into "no fragment" at the builder. The remaining variants surface only from
//! setup paths (configuration, provider registration, registry loading).

use thiserror::Error;

/// Failure inside a single context provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Lookup failed: {0}")]
    Lookup(#[from] LookupError),

    #[error("Invalid request input: {0}")]
    InvalidInput(String),

    #[error("Provider timed out after {0} ms")]
    TimedOut(u64),

    #[error("Provider panicked: {0}")]
    Panicked(String),

    #[error("Provider failed: {0}")]
    Failed(String),
}

/// Failure talking to an external lookup source (incident report store).
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Incident store not configured")]
    NotConfigured,

    #[error("Incident store request failed: {0}")]
    Transport(String),

    #[error("Incident store returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Incident store response could not be decoded: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for LookupError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            LookupError::Decode(err.to_string())
        } else {
            LookupError::Transport(err.to_string())
        }
    }
}

/// Programmer errors raised while wiring providers into a builder.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuilderError {
    #[error("Provider name must not be empty")]
    EmptyProviderName,

    #[error("Provider already registered: {0}")]
    DuplicateProvider(String),
}

/// Static page registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Page registry could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid route pattern {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Top-level error for engine setup and the operator CLI.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Builder error: {0}")]
    Builder(#[from] BuilderError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<config::ConfigError> for ContextError {
    fn from(err: config::ConfigError) -> Self {
        ContextError::ConfigError(err.to_string())
    }
}
