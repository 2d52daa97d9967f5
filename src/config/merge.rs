//! Merge rules: compiled defaults first, later sources override earlier ones.

use super::LiaContextConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Create a Config builder seeded with the compiled defaults of every section.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let defaults = Config::try_from(&LiaContextConfig::default())?;
    Ok(Config::builder().add_source(defaults))
}
