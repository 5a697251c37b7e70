//! Veneer: layered assets and hot-reloading view templates
//!
//! A layered virtual filesystem that overlays several file sources with
//! deduplicated, paginated directory listings, and a template engine that
//! composes layout, module and view fragments per directory and rebuilds
//! itself when the files change on disk.

pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod template;
pub mod vfs;
pub mod watch;

pub use config::{ConfigLoader, EngineConfig, VeneerConfig};
pub use engine::{EngineBuilder, TemplateEngine, TemplateTable};
pub use error::{EngineError, FsError, TemplateError, WatchError};
pub use vfs::{DiskSource, LayeredFileSystem, MemorySource, Node, Source};
pub use watch::{ChangeEvent, ChangeKind, ChangeWatcher, WatchConfig, WatchHandle};
