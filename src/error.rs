//! Error types for the layered asset filesystem and the template engine.

use std::path::PathBuf;
use thiserror::Error;

/// Filesystem errors raised by sources and the layered filesystem
#[derive(Debug, Error)]
pub enum FsError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Is a directory: {0}")]
    IsADirectory(String),

    #[error("Filesystem I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FsError {
    /// True for the "absent from this source" condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::NotFound(_))
    }

    /// Map an I/O error for `path`, keeping "not found" distinguishable.
    ///
    /// A path running through a regular file (`a.css/b`) does not exist either.
    pub fn from_io(path: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::NotADirectory => {
                FsError::NotFound(path.to_string())
            }
            _ => FsError::Io(err),
        }
    }
}

/// Template parse and execution errors
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("{name}:{line}: {message}")]
    Parse {
        name: String,
        line: usize,
        message: String,
    },

    #[error("Block {0:?} is not defined")]
    UndefinedBlock(String),

    #[error("Executing {name:?}: {message}")]
    Exec { name: String, message: String },

    #[error("Executing {0:?}: exceeded maximum template depth")]
    DepthExceeded(String),
}

/// Change watcher errors
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Watcher error: {0}")]
    Notify(#[from] notify::Error),

    #[error("Watcher I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Watch root is not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Errors surfaced by the template engine to its host
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Template not found -> {0}")]
    NotFound(String),

    #[error("Invalid asset tree: {0}")]
    Structural(String),

    #[error("Asset error: {0}")]
    Fs(#[from] FsError),

    #[error("Composing {path}: {source}")]
    Composition {
        path: String,
        #[source]
        source: TemplateError,
    },

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Watch error: {0}")]
    Watch(#[from] WatchError),

    #[error("Render data error: {0}")]
    Data(#[from] serde_json::Error),

    #[error("Render output error: {0}")]
    Output(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::Config(err.to_string())
    }
}
