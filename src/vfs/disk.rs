//! Local directory source
//!
//! Serves files below a root directory on disk. Paths are cleaned before they
//! touch the filesystem, so `..` never escapes the root. Directory listings are
//! sorted by name for a deterministic order.

use crate::error::FsError;
use crate::vfs::path;
use crate::vfs::source::{page_len, EntryInfo, Node, Source};
use std::collections::VecDeque;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// A source backed by a local directory
#[derive(Debug, Clone)]
pub struct DiskSource {
    root: PathBuf,
}

impl DiskSource {
    /// Create a source rooted at `root`. The directory does not need to exist
    /// yet; every open simply reports not found until it does.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of this source
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, clean: &str) -> PathBuf {
        let mut full = self.root.clone();
        for component in path::components(clean) {
            full.push(component);
        }
        full
    }
}

impl Source for DiskSource {
    fn open(&self, logical: &str) -> Result<Box<dyn Node>, FsError> {
        let clean = path::clean(logical);
        let full = self.resolve(&clean);
        let metadata = fs::metadata(&full).map_err(|e| FsError::from_io(&clean, e))?;
        let name = path::file_name(&clean).to_string();
        let modified = metadata.modified().ok();

        if metadata.is_dir() {
            Ok(Box::new(DiskNode::Dir {
                info: EntryInfo::dir(name, modified),
                logical: clean,
                full,
                pending: None,
            }))
        } else {
            let file = fs::File::open(&full).map_err(|e| FsError::from_io(&clean, e))?;
            Ok(Box::new(DiskNode::File {
                info: EntryInfo::file(name, metadata.len(), modified),
                file,
            }))
        }
    }

    fn describe(&self) -> String {
        format!("disk:{}", self.root.display())
    }
}

enum DiskNode {
    File {
        info: EntryInfo,
        file: fs::File,
    },
    Dir {
        info: EntryInfo,
        logical: String,
        full: PathBuf,
        /// Remaining entries; loaded on the first listing call
        pending: Option<VecDeque<EntryInfo>>,
    },
}

fn list_sorted(logical: &str, full: &Path) -> Result<VecDeque<EntryInfo>, FsError> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(full).map_err(|e| FsError::from_io(logical, e))? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        // Follow symlinks the way a plain open would
        let metadata = match fs::metadata(entry.path()) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(FsError::Io(e)),
        };
        let modified = metadata.modified().ok();
        entries.push(if metadata.is_dir() {
            EntryInfo::dir(name, modified)
        } else {
            EntryInfo::file(name, metadata.len(), modified)
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries.into())
}

impl Read for DiskNode {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            DiskNode::File { file, .. } => file.read(buf),
            DiskNode::Dir { logical, .. } => Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{} is a directory", logical),
            )),
        }
    }
}

impl Node for DiskNode {
    fn stat(&self) -> Result<EntryInfo, FsError> {
        match self {
            DiskNode::File { info, .. } | DiskNode::Dir { info, .. } => Ok(info.clone()),
        }
    }

    fn read_entries(&mut self, max: Option<usize>) -> Result<Vec<EntryInfo>, FsError> {
        match self {
            DiskNode::File { info, .. } => Err(FsError::NotADirectory(info.name.clone())),
            DiskNode::Dir {
                logical,
                full,
                pending,
                ..
            } => {
                if pending.is_none() {
                    *pending = Some(list_sorted(logical, full)?);
                }
                let queue = pending.get_or_insert_with(VecDeque::new);
                let take = page_len(max, queue.len());
                Ok(queue.drain(..take).collect())
            }
        }
    }
}
