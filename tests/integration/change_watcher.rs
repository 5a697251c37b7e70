//! Integration tests for the change watcher against a real directory

use crate::integration::test_utils::{asset_tree, wait_until, write_tree};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use veneer::{ChangeEvent, ChangeWatcher, WatchConfig, WatchError};

fn recorder() -> (Arc<Mutex<Vec<ChangeEvent>>>, impl Fn(&ChangeEvent) + Send + 'static) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    (events, move |event: &ChangeEvent| sink.lock().push(event.clone()))
}

fn saw_file(events: &Mutex<Vec<ChangeEvent>>, file_name: &str) -> bool {
    events
        .lock()
        .iter()
        .any(|e| e.path.file_name().map_or(false, |n| n == file_name))
}

#[test]
fn test_file_write_reaches_callback() {
    let temp_dir = asset_tree(&[("view/index.html", "v1")]);
    let root = dunce::canonicalize(temp_dir.path()).unwrap();
    let (events, callback) = recorder();
    let handle = ChangeWatcher::start(&root, WatchConfig::default(), callback).unwrap();
    assert!(handle.is_running());
    assert_eq!(handle.root(), root.as_path());

    write_tree(&root, &[("view/index.html", "v2")]);
    assert!(wait_until(Duration::from_secs(10), || saw_file(&events, "index.html")));
}

#[test]
fn test_nested_directories_are_watched() {
    let temp_dir = asset_tree(&[("layout/docs/layout.html", "")]);
    let root = dunce::canonicalize(temp_dir.path()).unwrap();
    let (events, callback) = recorder();
    let _handle = ChangeWatcher::start(&root, WatchConfig::default(), callback).unwrap();

    write_tree(&root, &[("layout/docs/extra.html", "new")]);
    assert!(wait_until(Duration::from_secs(10), || saw_file(&events, "extra.html")));
}

#[test]
fn test_stop_ends_delivery() {
    let temp_dir = asset_tree(&[("view/index.html", "v1")]);
    let root = dunce::canonicalize(temp_dir.path()).unwrap();
    let (events, callback) = recorder();
    let mut handle = ChangeWatcher::start(&root, WatchConfig::default(), callback).unwrap();

    handle.stop();
    assert!(!handle.is_running());
    // Stopping twice is harmless
    handle.stop();

    write_tree(&root, &[("view/late.html", "late")]);
    std::thread::sleep(Duration::from_millis(500));
    assert!(!saw_file(&events, "late.html"));
}

#[test]
fn test_start_requires_directory() {
    let temp_dir = asset_tree(&[("file.txt", "x")]);
    let result = ChangeWatcher::start(
        &temp_dir.path().join("file.txt"),
        WatchConfig::default(),
        |_: &ChangeEvent| {},
    );
    assert!(matches!(result, Err(WatchError::NotADirectory(_))));

    let result = ChangeWatcher::start(
        &temp_dir.path().join("missing"),
        WatchConfig::default(),
        |_: &ChangeEvent| {},
    );
    assert!(matches!(result, Err(WatchError::NotADirectory(_))));
}
