//! Environment overrides: LIA_CONTEXT__<SECTION>__<KEY>=value

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment};

pub fn add_to_builder(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix("LIA_CONTEXT")
            .separator("__")
            .try_parsing(true),
    )
}
