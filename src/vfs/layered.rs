//! Layered filesystem and merging directory handle
//!
//! Sources are consulted in precedence order `[primary, overlays.., fallback]`.
//! A file is served entirely by the first source that opens it. A directory is
//! served by a [`MergedDir`] that lists every source at that path, primary
//! first, yielding each name once.

use crate::error::FsError;
use crate::vfs::disk::DiskSource;
use crate::vfs::path;
use crate::vfs::source::{EntryInfo, Node, Source};
use std::collections::HashSet;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::trace;

/// One logical filesystem over an ordered list of sources
#[derive(Clone)]
pub struct LayeredFileSystem {
    /// `[primary, overlays.., fallback]`
    sources: Vec<Arc<dyn Source>>,
}

impl LayeredFileSystem {
    /// Layer a local directory over a fallback source.
    pub fn new(primary_root: impl Into<PathBuf>, fallback: impl Source + 'static) -> Self {
        Self::from_sources(Arc::new(DiskSource::new(primary_root)), Arc::new(fallback))
    }

    /// Layer arbitrary primary and fallback sources.
    pub fn from_sources(primary: Arc<dyn Source>, fallback: Arc<dyn Source>) -> Self {
        Self {
            sources: vec![primary, fallback],
        }
    }

    /// Add an overlay just above the fallback.
    ///
    /// Overlays added later have lower precedence than earlier ones. Taking
    /// `&mut self` means the stack cannot change once it is shared for reads.
    pub fn add_overlay(&mut self, source: impl Source + 'static) {
        self.add_overlay_arc(Arc::new(source));
    }

    /// [`LayeredFileSystem::add_overlay`] for an already shared source.
    pub fn add_overlay_arc(&mut self, source: Arc<dyn Source>) {
        let fallback_at = self.sources.len() - 1;
        self.sources.insert(fallback_at, source);
    }

    /// Number of layered sources, fallback included
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Open `path` from the first source that has it.
    ///
    /// Directories come back as a [`MergedDir`]. When no source opens the path,
    /// the first error other than "not found" is returned if there was one,
    /// otherwise [`FsError::NotFound`].
    pub fn open(&self, logical: &str) -> Result<Box<dyn Node>, FsError> {
        let clean = path::clean(logical);
        let mut first_failure: Option<FsError> = None;

        for (index, source) in self.sources.iter().enumerate() {
            match source.open(&clean) {
                Ok(node) => {
                    let info = node.stat()?;
                    trace!(path = %clean, source = %source.describe(), "Opened");
                    if info.is_dir {
                        return Ok(Box::new(MergedDir::new(
                            clean,
                            self.sources.clone(),
                            index,
                            node,
                            info,
                        )));
                    }
                    return Ok(node);
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    trace!(path = %clean, source = %source.describe(), error = %e, "Open failed");
                    first_failure.get_or_insert(e);
                }
            }
        }

        Err(first_failure.unwrap_or(FsError::NotFound(clean)))
    }

    /// Read a whole file.
    pub fn read(&self, logical: &str) -> Result<Vec<u8>, FsError> {
        let mut node = self.open(logical)?;
        if node.stat()?.is_dir {
            return Err(FsError::IsADirectory(path::clean(logical)));
        }
        let mut data = Vec::new();
        node.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Read a whole file as UTF-8 text.
    pub fn read_to_string(&self, logical: &str) -> Result<String, FsError> {
        let data = self.read(logical)?;
        String::from_utf8(data)
            .map_err(|e| FsError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
    }
}

impl std::fmt::Debug for LayeredFileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sources: Vec<String> = self.sources.iter().map(|s| s.describe()).collect();
        f.debug_struct("LayeredFileSystem")
            .field("sources", &sources)
            .finish()
    }
}

/// Per-source listing position
enum Cursor {
    /// Not opened yet
    Pending,
    /// Listing in progress
    Open(Box<dyn Node>),
    /// Source has nothing at this path, or it ran out of entries
    Done,
}

/// Directory handle aggregating one path across every source.
///
/// Each source keeps its own cursor, and the set of yielded names lives for the
/// whole handle, so successive `read_entries` calls continue where the last
/// one stopped and never repeat a name.
pub struct MergedDir {
    path: String,
    sources: Vec<Arc<dyn Source>>,
    cursors: Vec<Cursor>,
    seen: HashSet<String>,
    info: EntryInfo,
}

impl MergedDir {
    fn new(
        path: String,
        sources: Vec<Arc<dyn Source>>,
        opened_at: usize,
        node: Box<dyn Node>,
        info: EntryInfo,
    ) -> Self {
        // Sources before `opened_at` already failed to open this path
        let cursors = (0..sources.len())
            .map(|index| {
                if index < opened_at {
                    Cursor::Done
                } else {
                    Cursor::Pending
                }
            })
            .collect();
        let mut dir = Self {
            path,
            sources,
            cursors,
            seen: HashSet::new(),
            info,
        };
        dir.cursors[opened_at] = Cursor::Open(node);
        dir
    }

    /// Logical path of this directory
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Cursor for source `index`, opening it on first use.
    ///
    /// Returns `None` when the source has nothing (left) to list.
    fn cursor(&mut self, index: usize) -> Result<Option<&mut Box<dyn Node>>, FsError> {
        if matches!(self.cursors[index], Cursor::Pending) {
            self.cursors[index] = match self.sources[index].open(&self.path) {
                Ok(node) => {
                    // A file here is shadowed by the directory above it
                    if node.stat()?.is_dir {
                        Cursor::Open(node)
                    } else {
                        Cursor::Done
                    }
                }
                Err(e) if e.is_not_found() => Cursor::Done,
                Err(e) => return Err(e),
            };
        }
        match &mut self.cursors[index] {
            Cursor::Open(node) => Ok(Some(node)),
            _ => Ok(None),
        }
    }
}

impl Read for MergedDir {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::Other,
            format!("{} is a directory", self.path),
        ))
    }
}

impl Node for MergedDir {
    fn stat(&self) -> Result<EntryInfo, FsError> {
        Ok(self.info.clone())
    }

    fn read_entries(&mut self, max: Option<usize>) -> Result<Vec<EntryInfo>, FsError> {
        let limit = match max {
            Some(n) if n > 0 => n,
            _ => usize::MAX,
        };
        let mut batch = Vec::new();

        for index in 0..self.cursors.len() {
            while batch.len() < limit {
                let Some(node) = self.cursor(index)? else {
                    break;
                };
                let next = node.read_entries(Some(1))?;
                let Some(entry) = next.into_iter().next() else {
                    self.cursors[index] = Cursor::Done;
                    break;
                };
                if self.seen.insert(entry.name.clone()) {
                    batch.push(entry);
                }
            }
            if batch.len() >= limit {
                break;
            }
        }

        Ok(batch)
    }
}
