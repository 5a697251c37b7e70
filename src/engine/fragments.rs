//! Fragment discovery for the layout and module namespaces.
//!
//! Every directory below a namespace root gets an ordered fragment list keyed by
//! its prefix (`""` for the root, otherwise `a/`, `a/b/`). A list starts with the
//! reserved fragments, each found independently by nearest-ancestor search, and
//! continues with the other files of that directory in listing order.

use crate::error::{EngineError, FsError};
use crate::vfs::{path, LayeredFileSystem, Node};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::trace;

/// One chunk of template source
#[derive(Debug, Clone)]
pub struct Fragment {
    /// Logical path the source was read from
    pub origin: String,
    pub source: Arc<str>,
}

impl Fragment {
    fn load(assets: &LayeredFileSystem, origin: String) -> Result<Self, FsError> {
        let source = assets.read_to_string(&origin)?;
        Ok(Self {
            origin,
            source: Arc::from(source),
        })
    }
}

/// Directory prefix -> ordered fragments
#[derive(Debug, Clone, Default)]
pub struct FragmentIndex {
    entries: BTreeMap<String, Vec<Fragment>>,
}

/// Parameters shared by one discovery pass
struct Discovery<'a> {
    assets: &'a LayeredFileSystem,
    root: &'a str,
    reserved: Vec<String>,
}

impl FragmentIndex {
    /// Index the namespace at `root`, whose directory handle is `dir`.
    ///
    /// `reserved` names get `extension` appended (`layout` -> `layout.html`).
    pub fn discover(
        assets: &LayeredFileSystem,
        root: &str,
        dir: Box<dyn Node>,
        reserved: &[String],
        extension: &str,
    ) -> Result<Self, EngineError> {
        let discovery = Discovery {
            assets,
            root,
            reserved: reserved
                .iter()
                .map(|name| format!("{}{}", name, extension))
                .collect(),
        };
        let mut index = Self::default();
        index.collect(&discovery, String::new(), dir)?;
        Ok(index)
    }

    fn collect(
        &mut self,
        discovery: &Discovery<'_>,
        prefix: String,
        mut dir: Box<dyn Node>,
    ) -> Result<(), EngineError> {
        let mut fragments = Vec::new();
        for file_name in &discovery.reserved {
            if let Some(fragment) =
                find_nearest(discovery.assets, discovery.root, &prefix, file_name)?
            {
                fragments.push(fragment);
            }
        }

        let reserved: HashSet<&str> = discovery.reserved.iter().map(String::as_str).collect();
        loop {
            let Some(entry) = dir.read_entries(Some(1))?.into_iter().next() else {
                break;
            };
            let relative = format!("{}{}", prefix, entry.name);
            let logical = path::join(discovery.root, &relative);

            if entry.is_dir {
                let child = discovery.assets.open(&logical)?;
                self.collect(discovery, format!("{}/", relative), child)?;
            } else if !reserved.contains(entry.name.as_str()) {
                fragments.push(Fragment::load(discovery.assets, logical)?);
            }
        }

        trace!(root = discovery.root, prefix = %prefix, fragments = fragments.len(), "Indexed directory");
        self.entries.insert(prefix, fragments);
        Ok(())
    }

    /// Fragments registered at `prefix`
    pub fn get(&self, prefix: &str) -> Option<&[Fragment]> {
        self.entries.get(prefix).map(Vec::as_slice)
    }

    pub fn contains(&self, prefix: &str) -> bool {
        self.entries.contains_key(prefix)
    }

    /// Registered prefixes, sorted
    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Find `file_name` in the directory at `prefix` or the closest ancestor that
/// has it, up to and including the namespace root.
pub fn find_nearest(
    assets: &LayeredFileSystem,
    root: &str,
    prefix: &str,
    file_name: &str,
) -> Result<Option<Fragment>, EngineError> {
    let parts = path::components(prefix);
    for depth in (0..=parts.len()).rev() {
        let dir = path::join(root, &parts[..depth].join("/"));
        let candidate = path::join(&dir, file_name);
        match Fragment::load(assets, candidate) {
            Ok(fragment) => return Ok(Some(fragment)),
            Err(FsError::NotFound(_)) | Err(FsError::IsADirectory(_)) => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(None)
}
