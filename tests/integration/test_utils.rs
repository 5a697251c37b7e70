//! Shared helpers for integration tests

use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Write `files` (relative path, content) below `root`, creating directories.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (relative, content) in files {
        let full = root.join(relative);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(full, content).unwrap();
    }
}

/// A fresh temporary directory holding `files`
pub fn asset_tree(files: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    write_tree(temp_dir.path(), files);
    temp_dir
}

/// Poll `check` every 50ms until it returns true or `timeout` passes.
pub fn wait_until<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

/// Layout defining the entry block around an `inner` block
pub const LAYOUT: &str = r#"<%define "base.html"%>HEAD{{template "inner" .}}FOOT<%end%>"#;
