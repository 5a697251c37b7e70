//! Source and handle abstractions
//!
//! A [`Source`] opens logical paths; the resulting [`Node`] reads file content
//! through `io::Read` and, for directories, lists entries in pages.

use crate::error::FsError;
use std::io::Read;
use std::time::SystemTime;

/// Metadata for one entry, as returned by `stat` and directory listings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    /// Entry name (last path component; empty for a source root)
    pub name: String,
    /// Content length in bytes (zero for directories)
    pub len: u64,
    /// Whether the entry is a directory
    pub is_dir: bool,
    /// Last modification time, when the source tracks one
    pub modified: Option<SystemTime>,
}

impl EntryInfo {
    /// Metadata for a regular file.
    pub fn file(name: impl Into<String>, len: u64, modified: Option<SystemTime>) -> Self {
        Self {
            name: name.into(),
            len,
            is_dir: false,
            modified,
        }
    }

    /// Metadata for a directory.
    pub fn dir(name: impl Into<String>, modified: Option<SystemTime>) -> Self {
        Self {
            name: name.into(),
            len: 0,
            is_dir: true,
            modified,
        }
    }
}

/// An open path.
///
/// `read_entries` pages through a directory listing: `Some(n)` returns at most
/// `n` entries, `None` (or `Some(0)`) returns everything remaining. An empty
/// batch means the listing is exhausted. Calling it on a file is
/// [`FsError::NotADirectory`]; reading a directory through `Read` fails.
pub trait Node: Read + Send {
    /// Metadata of the opened entry
    fn stat(&self) -> Result<EntryInfo, FsError>;

    /// Next page of directory entries
    fn read_entries(&mut self, max: Option<usize>) -> Result<Vec<EntryInfo>, FsError>;
}

/// A filesystem-like provider in the layered stack.
pub trait Source: Send + Sync {
    /// Open `path` (slash separated, relative to the source root).
    ///
    /// Absence must be reported as [`FsError::NotFound`] so callers can fall
    /// through to the next source.
    fn open(&self, path: &str) -> Result<Box<dyn Node>, FsError>;

    /// Short description used in logs
    fn describe(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}

/// Page limit helper shared by source implementations.
///
/// Returns how many entries to take from `remaining`.
pub(crate) fn page_len(max: Option<usize>, remaining: usize) -> usize {
    match max {
        Some(n) if n > 0 => n.min(remaining),
        _ => remaining,
    }
}
