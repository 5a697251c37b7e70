//! Environment source: `VENEER__<SECTION>__<KEY>`, e.g. `VENEER__ENGINE__VIEW_ROOT`.

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::Environment;

pub const PREFIX: &str = "VENEER";
pub const SEPARATOR: &str = "__";

/// Add the environment source to builder; it overrides every file.
pub fn add_to_builder(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix(PREFIX)
            .prefix_separator(SEPARATOR)
            .separator(SEPARATOR)
            .try_parsing(true),
    )
}
