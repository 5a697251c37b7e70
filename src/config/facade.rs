//! Loader facade: builds a `VeneerConfig` from every layered source.

use crate::config::merge::merge_policy;
use crate::config::sources::{env, global_file, workspace_file};
use crate::config::VeneerConfig;
use crate::error::EngineError;
use config::File;
use std::path::Path;
use tracing::debug;

/// Loads configuration, lowest precedence first: defaults, the global file,
/// workspace files, then `VENEER__*` environment variables.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration for `workspace_root`.
    pub fn load(workspace_root: &Path) -> Result<VeneerConfig, EngineError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = env::add_to_builder(builder);

        let config: VeneerConfig = builder.build()?.try_deserialize()?;
        debug!(
            workspace_root = %workspace_root.display(),
            environment = %workspace_file::environment_name(),
            "Loaded configuration"
        );
        Self::validated(config)
    }

    /// Load and validate a single configuration file over the defaults.
    pub fn load_from_file(path: &Path) -> Result<VeneerConfig, EngineError> {
        let config: VeneerConfig = merge_policy::builder_with_defaults()?
            .add_source(File::from(path))
            .build()?
            .try_deserialize()?;
        Self::validated(config)
    }

    /// Built-in defaults without touching any file or the environment
    pub fn default() -> VeneerConfig {
        VeneerConfig::default()
    }

    fn validated(config: VeneerConfig) -> Result<VeneerConfig, EngineError> {
        config.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            EngineError::Config(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;
        Ok(config)
    }
}
