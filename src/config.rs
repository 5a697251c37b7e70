//! Configuration System
//!
//! Hierarchical configuration for the asset tree layout, template composition,
//! change watching and logging. Defaults are layered under the global config
//! file, workspace files and `VENEER__*` environment variables.

use crate::logging::LoggingConfig;
use crate::template::Delimiters;
use crate::watch::WatchConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VeneerConfig {
    /// Template engine settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Change watcher settings
    #[serde(default)]
    pub watch: WatchConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Template engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Layout namespace root (required)
    #[serde(default = "default_layout_root")]
    pub layout_root: String,

    /// Module namespace root (optional in the asset tree)
    #[serde(default = "default_module_root")]
    pub module_root: String,

    /// View namespace root (required)
    #[serde(default = "default_view_root")]
    pub view_root: String,

    /// Reserved layout fragment names, resolved nearest-ancestor first
    #[serde(default = "default_fragment_names")]
    pub layout_fragments: Vec<String>,

    /// Reserved module fragment names
    #[serde(default = "default_fragment_names")]
    pub module_fragments: Vec<String>,

    /// Extension appended to reserved fragment names
    #[serde(default = "default_fragment_extension")]
    pub fragment_extension: String,

    /// Action delimiter pairs, all recognized in every fragment
    #[serde(default = "Delimiters::default_set")]
    pub delimiters: Vec<Delimiters>,

    /// Block executed by `render`
    #[serde(default = "default_entry_block")]
    pub entry_block: String,

    /// Extension prefixes whose changes trigger a rebuild
    #[serde(default = "default_reload_extensions")]
    pub reload_extensions: Vec<String>,

    /// Local directory to watch; no watcher runs when unset or missing
    #[serde(default)]
    pub watch_root: Option<PathBuf>,
}

fn default_layout_root() -> String {
    "layout".to_string()
}

fn default_module_root() -> String {
    "module".to_string()
}

fn default_view_root() -> String {
    "view".to_string()
}

fn default_fragment_names() -> Vec<String> {
    vec!["layout".to_string(), "base".to_string()]
}

fn default_fragment_extension() -> String {
    ".html".to_string()
}

fn default_entry_block() -> String {
    "base.html".to_string()
}

fn default_reload_extensions() -> Vec<String> {
    vec![".htm".to_string(), ".json".to_string()]
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            layout_root: default_layout_root(),
            module_root: default_module_root(),
            view_root: default_view_root(),
            layout_fragments: default_fragment_names(),
            module_fragments: default_fragment_names(),
            fragment_extension: default_fragment_extension(),
            delimiters: Delimiters::default_set(),
            entry_block: default_entry_block(),
            reload_extensions: default_reload_extensions(),
            watch_root: None,
        }
    }
}

impl EngineConfig {
    /// Set the directory watched for changes.
    pub fn with_watch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.watch_root = Some(root.into());
        self
    }

    /// Validate engine configuration
    pub fn validate(&self) -> Result<(), String> {
        for (field, value) in [
            ("layout_root", &self.layout_root),
            ("module_root", &self.module_root),
            ("view_root", &self.view_root),
        ] {
            if value.trim_matches('/').is_empty() {
                return Err(format!("{} cannot be empty", field));
            }
        }
        if self.entry_block.is_empty() {
            return Err("entry_block cannot be empty".to_string());
        }
        if self.delimiters.is_empty() {
            return Err("at least one delimiter pair is required".to_string());
        }
        if let Some(pair) = self
            .delimiters
            .iter()
            .find(|d| d.left.is_empty() || d.right.is_empty())
        {
            return Err(format!(
                "delimiters cannot be empty (got {:?} / {:?})",
                pair.left, pair.right
            ));
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Engine(String),
    Watch(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Engine(msg) => write!(f, "Engine: {}", msg),
            ValidationError::Watch(msg) => write!(f, "Watch: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl VeneerConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.engine.validate() {
            errors.push(ValidationError::Engine(e));
        }
        if let Err(e) = self.watch.validate() {
            errors.push(ValidationError::Watch(e));
        }
        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
