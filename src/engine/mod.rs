//! Template engine
//!
//! Discovers layout, module and view templates in a [`LayeredFileSystem`],
//! composes one template per view and serves renders from an immutable
//! [`TemplateTable`] snapshot. A change watcher marks the engine dirty; the
//! next render rebuilds the table under a lock and swaps it in whole.

pub mod compose;
pub mod fragments;

pub use fragments::{Fragment, FragmentIndex};

use crate::config::{EngineConfig, VeneerConfig};
use crate::engine::compose::Composer;
use crate::error::{EngineError, FsError, WatchError};
use crate::template::{FuncMap, Template};
use crate::vfs::{path, LayeredFileSystem, Node};
use crate::watch::{ChangeEvent, ChangeWatcher, WatchConfig, WatchHandle};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Called at the start of every rebuild
pub type RebuildHook = Arc<dyn Fn() + Send + Sync>;

/// View key -> compiled template
#[derive(Debug, Default)]
pub struct TemplateTable {
    templates: HashMap<String, Template>,
}

impl TemplateTable {
    pub fn get(&self, key: &str) -> Option<&Template> {
        self.templates.get(key)
    }

    /// View keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.templates.keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// True when `path` has an extension starting with one of `extensions`
/// (`.htm` matches `.html`).
pub fn is_reload_trigger(path: &Path, extensions: &[String]) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    let ext = format!(".{}", ext);
    extensions.iter().any(|prefix| ext.starts_with(prefix.as_str()))
}

/// Builder for [`TemplateEngine`]
pub struct EngineBuilder {
    assets: LayeredFileSystem,
    config: EngineConfig,
    watch: WatchConfig,
    funcs: FuncMap,
    hook: Option<RebuildHook>,
}

impl EngineBuilder {
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_watch_config(mut self, watch: WatchConfig) -> Self {
        self.watch = watch;
        self
    }

    /// Register a template function available from the first build on.
    pub fn with_function<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.funcs.insert(name, f);
        self
    }

    /// Run `hook` before every rebuild, the first one included.
    pub fn with_rebuild_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.hook = Some(Arc::new(hook));
        self
    }

    /// Start watching (when configured) and run the first full build.
    pub fn build(self) -> Result<TemplateEngine, EngineError> {
        self.config.validate().map_err(EngineError::Config)?;

        let engine = TemplateEngine {
            assets: self.assets,
            config: self.config,
            funcs: RwLock::new(Arc::new(self.funcs)),
            table: RwLock::new(Arc::new(TemplateTable::default())),
            dirty: Arc::new(AtomicBool::new(false)),
            rebuild_lock: Mutex::new(()),
            hook: self.hook,
            watcher: Mutex::new(None),
        };
        engine.start_watching(self.watch)?;
        engine.rebuild()?;
        Ok(engine)
    }
}

/// Composes and renders view templates from a layered asset tree
pub struct TemplateEngine {
    assets: LayeredFileSystem,
    config: EngineConfig,
    funcs: RwLock<Arc<FuncMap>>,
    table: RwLock<Arc<TemplateTable>>,
    dirty: Arc<AtomicBool>,
    /// Serializes rebuilds
    rebuild_lock: Mutex<()>,
    hook: Option<RebuildHook>,
    watcher: Mutex<Option<WatchHandle>>,
}

impl TemplateEngine {
    pub fn builder(assets: LayeredFileSystem) -> EngineBuilder {
        EngineBuilder {
            assets,
            config: EngineConfig::default(),
            watch: WatchConfig::default(),
            funcs: FuncMap::with_builtins(),
            hook: None,
        }
    }

    /// Build with `config` and the default watcher settings.
    pub fn new(assets: LayeredFileSystem, config: EngineConfig) -> Result<Self, EngineError> {
        Self::builder(assets).with_config(config).build()
    }

    /// Build from a loaded [`VeneerConfig`].
    pub fn from_config(
        assets: LayeredFileSystem,
        config: &VeneerConfig,
    ) -> Result<Self, EngineError> {
        Self::builder(assets)
            .with_config(config.engine.clone())
            .with_watch_config(config.watch.clone())
            .build()
    }

    fn start_watching(&self, watch: WatchConfig) -> Result<(), EngineError> {
        let Some(root) = &self.config.watch_root else {
            debug!("No watch root configured");
            return Ok(());
        };
        if !root.is_dir() {
            info!(root = %root.display(), "Watch root is not a local directory, templates will not reload");
            return Ok(());
        }

        let root = dunce::canonicalize(root).map_err(WatchError::Io)?;
        let dirty = Arc::clone(&self.dirty);
        let extensions = self.config.reload_extensions.clone();
        let handle = ChangeWatcher::start(&root, watch, move |event: &ChangeEvent| {
            if is_reload_trigger(&event.path, &extensions) {
                debug!(path = %event.path.display(), kind = %event.kind, "Templates marked dirty");
                dirty.store(true, Ordering::Release);
            }
        })?;
        *self.watcher.lock() = Some(handle);
        Ok(())
    }

    /// Stop the change watcher, if one is running.
    pub fn stop_watching(&self) {
        if let Some(mut handle) = self.watcher.lock().take() {
            handle.stop();
        }
    }

    pub fn is_watching(&self) -> bool {
        self.watcher
            .lock()
            .as_ref()
            .map_or(false, WatchHandle::is_running)
    }

    /// Mark the engine dirty if `event` touches a reload-triggering file.
    ///
    /// Returns whether the flag was set.
    pub fn mark_dirty(&self, event: &ChangeEvent) -> bool {
        let relevant = is_reload_trigger(&event.path, &self.config.reload_extensions);
        if relevant {
            self.dirty.store(true, Ordering::Release);
        }
        relevant
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Rebuild if dirty.
    ///
    /// Returns `Ok(true)` when a rebuild ran. A failed rebuild leaves the
    /// previous table serving and the engine dirty.
    pub fn check_and_reload(&self) -> Result<bool, EngineError> {
        if !self.dirty.load(Ordering::Acquire) {
            return Ok(false);
        }
        let _guard = self.rebuild_lock.lock();
        // Cleared before building so a change during the build is not lost
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(false);
        }
        self.rebuild_locked()?;
        Ok(true)
    }

    /// Rebuild unconditionally.
    pub fn rebuild(&self) -> Result<(), EngineError> {
        let _guard = self.rebuild_lock.lock();
        self.dirty.store(false, Ordering::Release);
        self.rebuild_locked()
    }

    fn rebuild_locked(&self) -> Result<(), EngineError> {
        let started = Instant::now();
        match self.build_table() {
            Ok(table) => {
                let views = table.len();
                *self.table.write() = Arc::new(table);
                info!(views, elapsed_ms = started.elapsed().as_millis() as u64, "Templates rebuilt");
                Ok(())
            }
            Err(e) => {
                self.dirty.store(true, Ordering::Release);
                warn!(error = %e, "Template rebuild failed, keeping previous templates");
                Err(e)
            }
        }
    }

    /// Open a namespace root; `None` when absent, an error when it is a file.
    fn open_namespace(&self, root: &str) -> Result<Option<Box<dyn Node>>, EngineError> {
        match self.assets.open(root) {
            Ok(node) => {
                if node.stat()?.is_dir {
                    Ok(Some(node))
                } else {
                    Err(EngineError::Structural(format!("{} is not a directory", root)))
                }
            }
            Err(FsError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn build_table(&self) -> Result<TemplateTable, EngineError> {
        if let Some(hook) = &self.hook {
            hook();
        }
        let config = &self.config;

        let layout_dir = self.open_namespace(&config.layout_root)?.ok_or_else(|| {
            EngineError::Structural(format!("layout root {:?} is missing", config.layout_root))
        })?;
        let layouts = FragmentIndex::discover(
            &self.assets,
            &config.layout_root,
            layout_dir,
            &config.layout_fragments,
            &config.fragment_extension,
        )?;

        let modules = match self.open_namespace(&config.module_root)? {
            Some(module_dir) => Some(FragmentIndex::discover(
                &self.assets,
                &config.module_root,
                module_dir,
                &config.module_fragments,
                &config.fragment_extension,
            )?),
            None => None,
        };

        let view_dir = self.open_namespace(&config.view_root)?.ok_or_else(|| {
            EngineError::Structural(format!("view root {:?} is missing", config.view_root))
        })?;

        let funcs = Arc::clone(&self.funcs.read());
        let composer = Composer {
            layouts: &layouts,
            modules: modules.as_ref(),
            delimiters: &config.delimiters,
            funcs: &funcs,
        };
        let mut table = TemplateTable::default();
        self.compile_views(&composer, String::new(), view_dir, &mut table)?;
        Ok(table)
    }

    fn compile_views(
        &self,
        composer: &Composer<'_>,
        prefix: String,
        mut dir: Box<dyn Node>,
        table: &mut TemplateTable,
    ) -> Result<(), EngineError> {
        loop {
            let Some(entry) = dir.read_entries(Some(1))?.into_iter().next() else {
                break;
            };
            let key = format!("{}{}", prefix, entry.name);
            let origin = path::join(&self.config.view_root, &key);

            if entry.is_dir {
                let child = self.assets.open(&origin)?;
                self.compile_views(composer, format!("{}/", key), child, table)?;
                continue;
            }

            let source = self.assets.read_to_string(&origin)?;
            let template = composer.compose(&key, &origin, &source)?;
            if !template.has_block(&self.config.entry_block) {
                warn!(view = %key, block = %self.config.entry_block, "View has no entry block");
            }
            debug!(view = %key, blocks = template.block_names().len(), "Compiled view");
            table.templates.insert(key, template);
        }
        Ok(())
    }

    /// Current table snapshot
    pub fn snapshot(&self) -> Arc<TemplateTable> {
        Arc::clone(&self.table.read())
    }

    /// Render view `key` with `data` into `sink`.
    ///
    /// A pending rebuild runs first; if it fails the previous table serves the
    /// render. Output reaches `sink` only when execution succeeds.
    pub fn render<T, W>(&self, key: &str, data: &T, sink: &mut W) -> Result<(), EngineError>
    where
        T: Serialize + ?Sized,
        W: Write + ?Sized,
    {
        let output = self.render_to_string(key, data)?;
        sink.write_all(output.as_bytes())?;
        Ok(())
    }

    /// [`TemplateEngine::render`] into a `String`.
    pub fn render_to_string<T>(&self, key: &str, data: &T) -> Result<String, EngineError>
    where
        T: Serialize + ?Sized,
    {
        if let Err(e) = self.check_and_reload() {
            debug!(error = %e, "Rendering from previous templates");
        }
        let table = self.snapshot();
        let template = table
            .get(key)
            .ok_or_else(|| EngineError::NotFound(key.to_string()))?;
        let data = serde_json::to_value(data)?;
        Ok(template.execute(&self.config.entry_block, &data)?)
    }

    /// Register a template function; the next render recompiles with it.
    pub fn add_template_function<F>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.funcs.write()).insert(name, f);
        self.dirty.store(true, Ordering::Release);
    }

    /// View keys of the current table, sorted
    pub fn template_keys(&self) -> Vec<String> {
        self.snapshot().keys()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The layered asset filesystem, e.g. for serving static files
    pub fn assets(&self) -> &LayeredFileSystem {
        &self.assets
    }

    /// Open `path` in the asset filesystem.
    pub fn open(&self, path: &str) -> Result<Box<dyn Node>, FsError> {
        self.assets.open(path)
    }
}

impl Drop for TemplateEngine {
    fn drop(&mut self) {
        self.stop_watching();
    }
}

impl std::fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEngine")
            .field("assets", &self.assets)
            .field("views", &self.snapshot().len())
            .field("dirty", &self.is_dirty())
            .finish()
    }
}
