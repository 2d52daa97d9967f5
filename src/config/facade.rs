//! Config loading entrypoint.

use super::{merge, sources, LiaContextConfig};
use crate::error::ContextError;
use config::File;
use std::path::{Path, PathBuf};

/// Loads `LiaContextConfig` from the layered sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a project rooted at `root`.
    ///
    /// Order (later wins): defaults, user-level file, `root/config/lia-context.toml`,
    /// `root/config/{LIA_CONTEXT_ENV}.toml`, `LIA_CONTEXT__*` environment variables.
    pub fn load(root: &Path) -> Result<LiaContextConfig, ContextError> {
        let builder = merge::builder_with_defaults()?;
        let builder = sources::user_file::add_to_builder(builder)?;
        let builder = sources::project_file::add_to_builder(builder, root)?;
        let builder = sources::environment::add_to_builder(builder);
        let config = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Load a single file over the compiled defaults.
    pub fn load_from_file(path: &Path) -> Result<LiaContextConfig, ContextError> {
        let config = merge::builder_with_defaults()?
            .add_source(File::from(path.to_path_buf()).required(true))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Path of the user-level config file, if a home directory is known.
    pub fn user_config_path() -> Option<PathBuf> {
        sources::user_file::user_config_path()
    }

    /// Compiled defaults.
    pub fn default() -> LiaContextConfig {
        LiaContextConfig::default()
    }
}
