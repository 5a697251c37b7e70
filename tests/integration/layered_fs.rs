//! Integration tests for the layered filesystem over real directories

use crate::integration::test_utils::asset_tree;
use std::io::Read;
use std::sync::Arc;
use veneer::{DiskSource, FsError, LayeredFileSystem, MemorySource, Node};

fn names(dir: &mut Box<dyn Node>, page: Option<usize>) -> Vec<String> {
    let mut all = Vec::new();
    loop {
        let batch = dir.read_entries(page).unwrap();
        if batch.is_empty() {
            return all;
        }
        all.extend(batch.into_iter().map(|e| e.name));
    }
}

#[test]
fn test_disk_primary_wins_over_memory_fallback() {
    let temp_dir = asset_tree(&[("view/index.html", "from disk")]);
    let fallback = MemorySource::new()
        .with_file("view/index.html", "built in")
        .with_file("view/about.html", "built in about");
    let fs = LayeredFileSystem::new(temp_dir.path(), fallback);

    assert_eq!(fs.read_to_string("view/index.html").unwrap(), "from disk");
    assert_eq!(fs.read_to_string("view/about.html").unwrap(), "built in about");
    assert!(matches!(fs.read("view/none.html"), Err(FsError::NotFound(_))));
}

#[test]
fn test_file_served_entirely_by_one_source() {
    let temp_dir = asset_tree(&[("a.txt", "short")]);
    let fs = LayeredFileSystem::new(
        temp_dir.path(),
        MemorySource::new().with_file("a.txt", "a much longer fallback body"),
    );
    let mut node = fs.open("a.txt").unwrap();
    let mut body = String::new();
    node.read_to_string(&mut body).unwrap();
    assert_eq!(body, "short");
    assert_eq!(node.stat().unwrap().len, 5);
}

#[test]
fn test_directory_merges_all_layers_once() {
    let temp_dir = asset_tree(&[("static/a.css", "disk"), ("static/b.css", "disk")]);
    let mut fs = LayeredFileSystem::new(
        temp_dir.path(),
        MemorySource::new()
            .with_file("static/c.css", "fallback")
            .with_file("static/a.css", "fallback"),
    );
    fs.add_overlay(
        MemorySource::new()
            .with_file("static/b.css", "overlay")
            .with_file("static/d.css", "overlay"),
    );
    assert_eq!(fs.source_count(), 3);

    let mut dir = fs.open("static").unwrap();
    assert!(dir.stat().unwrap().is_dir);
    assert_eq!(names(&mut dir, None), vec!["a.css", "b.css", "d.css", "c.css"]);
    assert_eq!(fs.read_to_string("static/b.css").unwrap(), "disk");
    assert_eq!(fs.read_to_string("static/d.css").unwrap(), "overlay");
}

#[test]
fn test_paged_listing_matches_full_listing() {
    let temp_dir = asset_tree(&[
        ("view/a.html", ""),
        ("view/b.html", ""),
        ("view/sub/c.html", ""),
    ]);
    let fallback = MemorySource::new()
        .with_file("view/b.html", "")
        .with_file("view/x.html", "")
        .with_file("view/y.html", "");
    let fs = LayeredFileSystem::from_sources(
        Arc::new(DiskSource::new(temp_dir.path())),
        Arc::new(fallback),
    );

    let full = names(&mut fs.open("view").unwrap(), None);
    assert_eq!(full, vec!["a.html", "b.html", "sub", "x.html", "y.html"]);
    for page in 1..=4 {
        assert_eq!(names(&mut fs.open("view").unwrap(), Some(page)), full);
    }

    // Exhausted listings stay exhausted
    let mut dir = fs.open("view").unwrap();
    names(&mut dir, Some(2));
    assert!(dir.read_entries(None).unwrap().is_empty());
}

#[test]
fn test_file_shadows_fallback_directory() {
    let temp_dir = asset_tree(&[("docs", "plain file")]);
    let fs = LayeredFileSystem::new(
        temp_dir.path(),
        MemorySource::new().with_file("docs/guide.html", "guide"),
    );
    let mut node = fs.open("docs").unwrap();
    assert!(!node.stat().unwrap().is_dir);
    assert!(matches!(node.read_entries(None), Err(FsError::NotADirectory(_))));
}

#[test]
fn test_missing_primary_root_falls_through() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let fs = LayeredFileSystem::new(
        temp_dir.path().join("not-created"),
        MemorySource::new().with_file("view/index.html", "fallback"),
    );
    assert_eq!(fs.read_to_string("view/index.html").unwrap(), "fallback");
}

#[test]
fn test_paths_cannot_escape_disk_root() {
    let temp_dir = asset_tree(&[("root/inside.txt", "in"), ("outside.txt", "out")]);
    let fs = LayeredFileSystem::new(temp_dir.path().join("root"), MemorySource::new());
    assert_eq!(fs.read_to_string("../inside.txt").unwrap(), "in");
    assert!(fs.read("../outside.txt").is_err());
}

#[test]
fn test_path_through_file_is_not_found() {
    let temp_dir = asset_tree(&[("css/site.css", "body {}")]);
    let fs = LayeredFileSystem::new(temp_dir.path(), MemorySource::new());
    match fs.open("css/site.css/extra") {
        Err(err) => assert!(err.is_not_found(), "unexpected error: {}", err),
        Ok(_) => panic!("opened a path below a regular file"),
    }
    assert!(matches!(fs.read("css/site.css/extra"), Err(FsError::NotFound(_))));

    // Lower layers still get their turn
    let fs = LayeredFileSystem::new(
        temp_dir.path(),
        MemorySource::new().with_file("css/site.css/extra", "fallback"),
    );
    assert_eq!(fs.read_to_string("css/site.css/extra").unwrap(), "fallback");
}
