//! In-memory source
//!
//! Holds built-in assets compiled into the host application, usually as the
//! fallback layer. Directories are implied by the files below them and the
//! root always exists.

use crate::error::FsError;
use crate::vfs::path;
use crate::vfs::source::{page_len, EntryInfo, Node, Source};
use std::collections::{BTreeMap, VecDeque};
use std::io::{self, Cursor, Read};
use std::sync::Arc;

/// A source serving files from memory
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: BTreeMap<String, Arc<[u8]>>,
}

impl MemorySource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file.
    pub fn insert(&mut self, file_path: &str, content: impl AsRef<[u8]>) {
        self.files
            .insert(path::clean(file_path), Arc::from(content.as_ref()));
    }

    /// Builder-style [`MemorySource::insert`].
    pub fn with_file(mut self, file_path: &str, content: impl AsRef<[u8]>) -> Self {
        self.insert(file_path, content);
        self
    }

    /// Number of files held
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// True when the source holds no files
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Immediate children of `dir`, or `None` when no file lives below it.
    fn children(&self, dir: &str) -> Option<VecDeque<EntryInfo>> {
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{}/", dir)
        };

        let mut children: BTreeMap<String, EntryInfo> = BTreeMap::new();
        let mut found = dir.is_empty();
        for (key, content) in self.files.range(prefix.clone()..) {
            let Some(rest) = key.strip_prefix(&prefix) else {
                break;
            };
            found = true;
            match rest.split_once('/') {
                Some((child, _)) => {
                    children
                        .entry(child.to_string())
                        .or_insert_with(|| EntryInfo::dir(child, None));
                }
                None => {
                    children.insert(
                        rest.to_string(),
                        EntryInfo::file(rest, content.len() as u64, None),
                    );
                }
            }
        }

        found.then(|| children.into_values().collect())
    }
}

impl Source for MemorySource {
    fn open(&self, logical: &str) -> Result<Box<dyn Node>, FsError> {
        let clean = path::clean(logical);
        let name = path::file_name(&clean).to_string();

        if let Some(content) = self.files.get(&clean) {
            return Ok(Box::new(MemoryNode::File {
                info: EntryInfo::file(name, content.len() as u64, None),
                cursor: Cursor::new(Arc::clone(content)),
            }));
        }

        match self.children(&clean) {
            Some(entries) => Ok(Box::new(MemoryNode::Dir {
                info: EntryInfo::dir(name, None),
                entries,
            })),
            None => Err(FsError::NotFound(clean)),
        }
    }

    fn describe(&self) -> String {
        format!("memory:{} files", self.files.len())
    }
}

enum MemoryNode {
    File {
        info: EntryInfo,
        cursor: Cursor<Arc<[u8]>>,
    },
    Dir {
        info: EntryInfo,
        entries: VecDeque<EntryInfo>,
    },
}

impl Read for MemoryNode {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            MemoryNode::File { cursor, .. } => cursor.read(buf),
            MemoryNode::Dir { info, .. } => Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{} is a directory", info.name),
            )),
        }
    }
}

impl Node for MemoryNode {
    fn stat(&self) -> Result<EntryInfo, FsError> {
        match self {
            MemoryNode::File { info, .. } | MemoryNode::Dir { info, .. } => Ok(info.clone()),
        }
    }

    fn read_entries(&mut self, max: Option<usize>) -> Result<Vec<EntryInfo>, FsError> {
        match self {
            MemoryNode::File { info, .. } => Err(FsError::NotADirectory(info.name.clone())),
            MemoryNode::Dir { entries, .. } => {
                let take = page_len(max, entries.len());
                Ok(entries.drain(..take).collect())
            }
        }
    }
}
