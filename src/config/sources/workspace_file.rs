//! Workspace config file source: `config/veneer.toml`, then `config/<VENEER_ENV>.toml`.

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment name used to pick the env-specific file
pub fn environment_name() -> String {
    std::env::var("VENEER_ENV").unwrap_or_else(|_| "development".to_string())
}

/// Workspace files in the order they are layered
pub fn workspace_config_paths(workspace_root: &Path) -> Vec<PathBuf> {
    let config_dir = workspace_root.join("config");
    vec![
        config_dir.join("veneer.toml"),
        config_dir.join(format!("{}.toml", environment_name())),
    ]
}

/// Add the workspace files that exist to builder; later files override earlier ones.
pub fn add_to_builder(
    mut builder: ConfigBuilder<DefaultState>,
    workspace_root: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    for path in workspace_config_paths(workspace_root) {
        if path.is_file() {
            debug!(config_path = %path.display(), "Layering workspace configuration");
            builder = builder.add_source(File::from(path).required(false));
        }
    }
    Ok(builder)
}
