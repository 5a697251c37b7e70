//! Change Watcher
//!
//! Recursively watches a local directory tree and forwards change events to a
//! callback from a dedicated thread. Repeated notifications for a file whose
//! modification time has not moved are suppressed; failed stats (deletions)
//! are always forwarded.

use crate::error::WatchError;
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, error, info, trace, warn};

/// How long the event loop waits before re-checking its stop flag
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Kind of filesystem change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Create,
    Write,
    Remove,
    Rename,
    /// Attribute or metadata change (last-write notifications on Windows)
    Attributes,
}

impl ChangeKind {
    /// Label forwarded to callbacks and logs
    pub fn label(&self) -> &'static str {
        match self {
            ChangeKind::Create => "create",
            ChangeKind::Write => "write",
            ChangeKind::Remove => "remove",
            ChangeKind::Rename => "rename",
            ChangeKind::Attributes => "attributes",
        }
    }

    fn from_notify(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(ChangeKind::Create),
            EventKind::Modify(ModifyKind::Name(_)) => Some(ChangeKind::Rename),
            EventKind::Modify(ModifyKind::Metadata(_)) => Some(ChangeKind::Attributes),
            EventKind::Modify(_) => Some(ChangeKind::Write),
            EventKind::Remove(_) => Some(ChangeKind::Remove),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Event forwarded to the watch callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    /// Absolute path of the changed entry
    pub path: PathBuf,
}

/// Watcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Seconds a cached modification time stays valid
    #[serde(default = "default_expiry_secs")]
    pub expiry_secs: u64,

    /// Seconds between sweeps of expired cache entries
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Slots between the notification thread and the debounce loop
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Recognized event kinds; anything else is dropped
    #[serde(default = "default_events")]
    pub events: Vec<ChangeKind>,
}

fn default_expiry_secs() -> u64 {
    5 * 60
}

fn default_sweep_interval_secs() -> u64 {
    30
}

fn default_queue_capacity() -> usize {
    1
}

/// Default recognized set: every content change, plus attribute changes on
/// Windows where editors often only touch the last-write time.
pub fn default_events() -> Vec<ChangeKind> {
    let mut events = vec![
        ChangeKind::Create,
        ChangeKind::Write,
        ChangeKind::Remove,
        ChangeKind::Rename,
    ];
    if cfg!(windows) {
        events.push(ChangeKind::Attributes);
    }
    events
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            expiry_secs: default_expiry_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            queue_capacity: default_queue_capacity(),
            events: default_events(),
        }
    }
}

impl WatchConfig {
    pub fn expiry(&self) -> Duration {
        Duration::from_secs(self.expiry_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// Validate watcher settings
    pub fn validate(&self) -> Result<(), String> {
        if self.queue_capacity == 0 {
            return Err("Watch queue capacity must be at least 1".to_string());
        }
        if self.events.is_empty() {
            return Err("Watch event set cannot be empty".to_string());
        }
        Ok(())
    }
}

struct CachedTime {
    modified: SystemTime,
    expires: Instant,
}

/// Time-bounded path -> modification time cache that decides which events
/// reach the callback.
pub struct Debouncer {
    entries: HashMap<PathBuf, CachedTime>,
    expiry: Duration,
    sweep_interval: Duration,
    last_sweep: Instant,
}

impl Debouncer {
    pub fn new(expiry: Duration, sweep_interval: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            expiry,
            sweep_interval,
            last_sweep: Instant::now(),
        }
    }

    /// Record an observation and report whether it should be forwarded.
    ///
    /// `modified` is `None` when the path could not be stat'ed; that is treated
    /// as a deletion and always forwarded.
    pub fn observe(&mut self, path: &Path, modified: Option<SystemTime>) -> bool {
        let now = Instant::now();
        let Some(modified) = modified else {
            self.entries.remove(path);
            return true;
        };

        let unchanged = self
            .entries
            .get(path)
            .map(|cached| cached.expires > now && cached.modified == modified)
            .unwrap_or(false);

        self.entries.insert(
            path.to_path_buf(),
            CachedTime {
                modified,
                expires: now + self.expiry,
            },
        );
        !unchanged
    }

    /// Drop expired entries.
    pub fn sweep(&mut self) {
        let now = Instant::now();
        self.entries.retain(|_, cached| cached.expires > now);
        self.last_sweep = now;
    }

    fn sweep_if_due(&mut self) {
        if self.last_sweep.elapsed() >= self.sweep_interval {
            self.sweep();
        }
    }

    /// Number of cached paths
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Handle to a running watch; stops the watch when dropped.
pub struct WatchHandle {
    root: PathBuf,
    running: Arc<AtomicBool>,
    watcher: Option<RecommendedWatcher>,
    thread: Option<JoinHandle<()>>,
}

impl WatchHandle {
    /// Watched root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop watching and wait for the event loop to exit.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        // Dropping the watcher closes the event channel and wakes the loop
        self.watcher.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!(root = ?self.root, "Watch loop panicked");
            }
            info!(root = ?self.root, "Stopped watching");
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("root", &self.root)
            .field("running", &self.is_running())
            .finish()
    }
}

/// Recursive directory watcher
pub struct ChangeWatcher;

impl ChangeWatcher {
    /// Start watching `root` recursively.
    ///
    /// `callback` runs on the watcher's own thread for every forwarded event.
    pub fn start<F>(root: &Path, config: WatchConfig, callback: F) -> Result<WatchHandle, WatchError>
    where
        F: Fn(&ChangeEvent) + Send + 'static,
    {
        if !root.is_dir() {
            return Err(WatchError::NotADirectory(root.to_path_buf()));
        }

        let (tx, rx) = mpsc::sync_channel(config.queue_capacity.max(1));
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // Receiver gone means the watch is stopping
            let _ = tx.send(res);
        })?;
        watcher.watch(root, RecursiveMode::Recursive)?;

        let running = Arc::new(AtomicBool::new(true));
        let loop_running = Arc::clone(&running);
        let thread = std::thread::Builder::new()
            .name("veneer-watch".to_string())
            .spawn(move || run_loop(rx, loop_running, config, callback))?;

        info!(root = ?root, "Watching for changes");

        Ok(WatchHandle {
            root: root.to_path_buf(),
            running,
            watcher: Some(watcher),
            thread: Some(thread),
        })
    }
}

fn run_loop<F>(
    rx: mpsc::Receiver<notify::Result<Event>>,
    running: Arc<AtomicBool>,
    config: WatchConfig,
    callback: F,
) where
    F: Fn(&ChangeEvent),
{
    let mut debouncer = Debouncer::new(config.expiry(), config.sweep_interval());

    while running.load(Ordering::SeqCst) {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(Ok(event)) => {
                let Some(kind) = ChangeKind::from_notify(&event.kind) else {
                    continue;
                };
                if !config.events.contains(&kind) {
                    continue;
                }
                for path in event.paths {
                    let modified = std::fs::metadata(&path)
                        .and_then(|m| m.modified())
                        .ok();
                    if debouncer.observe(&path, modified) {
                        debug!(kind = %kind, path = ?path, "File changed");
                        callback(&ChangeEvent { kind, path });
                    } else {
                        trace!(kind = %kind, path = ?path, "Suppressed duplicate change");
                    }
                }
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Watch error");
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
        debouncer.sweep_if_due();
    }

    running.store(false, Ordering::SeqCst);
}
