//! Integration tests for composing and rendering templates from disk

use crate::integration::test_utils::{asset_tree, wait_until, write_tree, LAYOUT};
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use veneer::{
    ChangeEvent, ChangeKind, EngineConfig, EngineError, FsError, LayeredFileSystem, MemorySource,
    Node, Source, TemplateEngine,
};

fn disk_engine(root: &std::path::Path) -> TemplateEngine {
    TemplateEngine::new(
        LayeredFileSystem::new(root, MemorySource::new()),
        EngineConfig::default(),
    )
    .unwrap()
}

fn view_changed(root: &std::path::Path, relative: &str) -> ChangeEvent {
    ChangeEvent {
        kind: ChangeKind::Write,
        path: root.join(relative),
    }
}

#[test]
fn test_render_from_disk() {
    let temp_dir = asset_tree(&[
        ("layout/layout.html", LAYOUT),
        ("view/index.html", r#"<%define "inner"%>HELLO<%end%>"#),
    ]);
    let engine = disk_engine(temp_dir.path());

    let mut out = Vec::new();
    engine.render("index.html", &json!({}), &mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "HEADHELLOFOOT");

    let err = engine.render_to_string("missing.html", &()).unwrap_err();
    assert!(matches!(err, EngineError::NotFound(ref key) if key == "missing.html"));
}

#[test]
fn test_builtin_fallback_assets_fill_gaps() {
    let temp_dir = asset_tree(&[("view/index.html", r#"<%define "inner"%>local<%end%>"#)]);
    let fallback = MemorySource::new()
        .with_file("layout/layout.html", LAYOUT)
        .with_file("view/index.html", r#"<%define "inner"%>builtin<%end%>"#)
        .with_file("view/about.html", r#"<%define "inner"%>about<%end%>"#);
    let engine = TemplateEngine::new(
        LayeredFileSystem::new(temp_dir.path(), fallback),
        EngineConfig::default(),
    )
    .unwrap();

    assert_eq!(engine.template_keys(), vec!["about.html", "index.html"]);
    assert_eq!(engine.render_to_string("index.html", &()).unwrap(), "HEADlocalFOOT");
    assert_eq!(engine.render_to_string("about.html", &()).unwrap(), "HEADaboutFOOT");
}

#[test]
fn test_nearest_layout_and_additive_modules() {
    let temp_dir = asset_tree(&[
        (
            "layout/layout.html",
            r#"<%define "base.html"%>root:<%template "nav"%>/<%template "inner" .%><%end%>"#,
        ),
        (
            "layout/docs/layout.html",
            r#"<%define "base.html"%>docs:<%template "nav"%>/<%template "inner" .%><%end%>"#,
        ),
        ("module/nav.html", r#"<%define "nav"%>site-nav<%end%>"#),
        ("module/docs/api/nav.html", r#"<%define "nav"%>api-nav<%end%>"#),
        ("view/index.html", r#"<%define "inner"%>home<%end%>"#),
        ("view/docs/intro.html", r#"<%define "inner"%>intro<%end%>"#),
        ("view/docs/api/ref.html", r#"<%define "inner"%><% .title %><%end%>"#),
    ]);
    let engine = disk_engine(temp_dir.path());

    assert_eq!(
        engine.render_to_string("index.html", &()).unwrap(),
        "root:site-nav/home"
    );
    assert_eq!(
        engine.render_to_string("docs/intro.html", &()).unwrap(),
        "docs:site-nav/intro"
    );
    assert_eq!(
        engine
            .render_to_string("docs/api/ref.html", &json!({"title": "Reference"}))
            .unwrap(),
        "docs:api-nav/Reference"
    );
}

#[test]
fn test_missing_namespaces_are_structural_errors() {
    let no_views = asset_tree(&[("layout/layout.html", LAYOUT)]);
    let result = TemplateEngine::new(
        LayeredFileSystem::new(no_views.path(), MemorySource::new()),
        EngineConfig::default(),
    );
    assert!(matches!(result, Err(EngineError::Structural(_))));

    let view_is_file = asset_tree(&[("layout/layout.html", LAYOUT), ("view", "oops")]);
    let result = TemplateEngine::new(
        LayeredFileSystem::new(view_is_file.path(), MemorySource::new()),
        EngineConfig::default(),
    );
    assert!(matches!(result, Err(EngineError::Structural(_))));
}

#[test]
fn test_failed_reload_keeps_previous_templates() {
    let temp_dir = asset_tree(&[
        ("layout/layout.html", LAYOUT),
        ("view/index.html", r#"<%define "inner"%>v1<%end%>"#),
    ]);
    let engine = disk_engine(temp_dir.path());
    assert_eq!(engine.render_to_string("index.html", &()).unwrap(), "HEADv1FOOT");

    write_tree(temp_dir.path(), &[("view/index.html", r#"<%define "inner"%><%if%>"#)]);
    assert!(engine.mark_dirty(&view_changed(temp_dir.path(), "view/index.html")));

    assert!(engine.check_and_reload().is_err());
    assert!(engine.is_dirty());
    assert_eq!(engine.render_to_string("index.html", &()).unwrap(), "HEADv1FOOT");
    assert!(engine.is_dirty());

    write_tree(temp_dir.path(), &[("view/index.html", r#"<%define "inner"%>v2<%end%>"#)]);
    assert_eq!(engine.render_to_string("index.html", &()).unwrap(), "HEADv2FOOT");
    assert!(!engine.is_dirty());
}

#[test]
fn test_reload_picks_up_new_and_removed_views() {
    let temp_dir = asset_tree(&[
        ("layout/layout.html", LAYOUT),
        ("view/index.html", r#"<%define "inner"%>home<%end%>"#),
    ]);
    let engine = disk_engine(temp_dir.path());

    write_tree(temp_dir.path(), &[("view/new.html", r#"<%define "inner"%>new<%end%>"#)]);
    std::fs::remove_file(temp_dir.path().join("view/index.html")).unwrap();
    engine.mark_dirty(&view_changed(temp_dir.path(), "view/new.html"));

    assert!(engine.check_and_reload().unwrap());
    assert_eq!(engine.template_keys(), vec!["new.html"]);
    assert!(matches!(
        engine.render_to_string("index.html", &()),
        Err(EngineError::NotFound(_))
    ));
}

#[test]
fn test_execution_error_reports_template() {
    let temp_dir = asset_tree(&[
        ("layout/layout.html", LAYOUT),
        ("view/index.html", r#"<%define "inner"%><% index .items 5 %><%end%>"#),
    ]);
    let engine = disk_engine(temp_dir.path());

    let mut out = Vec::new();
    let err = engine
        .render("index.html", &json!({"items": [1, 2]}), &mut out)
        .unwrap_err();
    assert!(matches!(err, EngineError::Template(_)));
    assert!(out.is_empty());
}

/// Serves one of several prepared trees, chosen by a shared generation counter
struct GenerationSource {
    trees: Vec<MemorySource>,
    current: Arc<AtomicUsize>,
}

impl GenerationSource {
    fn new(generations: usize, current: Arc<AtomicUsize>) -> Self {
        let trees = (0..generations)
            .map(|g| {
                MemorySource::new()
                    .with_file(
                        "layout/layout.html",
                        &format!(
                            r#"<%define "base.html"%>L{g}:<%template "a"%>:<%template "b"%><%end%>"#
                        ),
                    )
                    .with_file(
                        "view/page.html",
                        &format!(r#"<%define "a"%>A{g}<%end%><%define "b"%>B{g}<%end%>"#),
                    )
            })
            .collect();
        Self { trees, current }
    }
}

impl Source for GenerationSource {
    fn open(&self, path: &str) -> Result<Box<dyn Node>, FsError> {
        let generation = self.current.load(Ordering::SeqCst) % self.trees.len();
        self.trees[generation].open(path)
    }
}

#[test]
fn test_renders_never_observe_partial_rebuilds() {
    const GENERATIONS: usize = 4;
    let current = Arc::new(AtomicUsize::new(0));
    let source = GenerationSource::new(GENERATIONS, Arc::clone(&current));
    let assets = LayeredFileSystem::from_sources(Arc::new(source), Arc::new(MemorySource::new()));

    // Each rebuild switches the source to the next tree before reading it
    let builds = Arc::new(AtomicUsize::new(0));
    let hook_builds = Arc::clone(&builds);
    let hook_current = Arc::clone(&current);
    let engine = Arc::new(
        TemplateEngine::builder(assets)
            .with_rebuild_hook(move || {
                let next = hook_builds.fetch_add(1, Ordering::SeqCst);
                hook_current.store(next, Ordering::SeqCst);
            })
            .build()
            .unwrap(),
    );

    let done = Arc::new(AtomicBool::new(false));
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                let mut renders = 0usize;
                while !done.load(Ordering::SeqCst) || renders == 0 {
                    let output = engine.render_to_string("page.html", &()).unwrap();
                    let parts: Vec<&str> = output.split(':').collect();
                    assert_eq!(parts.len(), 3, "unexpected output {}", output);
                    let generation = &parts[0][1..];
                    assert_eq!(parts[1], format!("A{}", generation));
                    assert_eq!(parts[2], format!("B{}", generation));
                    renders += 1;
                }
                renders
            })
        })
        .collect();

    for _ in 0..50 {
        engine.rebuild().unwrap();
    }
    done.store(true, Ordering::SeqCst);

    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }
    assert_eq!(builds.load(Ordering::SeqCst), 51);
}

#[test]
fn test_concurrent_dirty_renders_rebuild_once() {
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&builds);
    let assets = LayeredFileSystem::from_sources(
        Arc::new(
            MemorySource::new()
                .with_file("layout/layout.html", LAYOUT)
                .with_file("view/index.html", r#"<%define "inner"%>x<%end%>"#),
        ),
        Arc::new(MemorySource::new()),
    );
    let engine = Arc::new(
        TemplateEngine::builder(assets)
            .with_rebuild_hook(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap(),
    );
    engine.mark_dirty(&ChangeEvent {
        kind: ChangeKind::Write,
        path: PathBuf::from("/assets/view/index.html"),
    });

    let renders: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || engine.render_to_string("index.html", &()).unwrap())
        })
        .collect();
    for render in renders {
        assert_eq!(render.join().unwrap(), "HEADxFOOT");
    }
    assert_eq!(builds.load(Ordering::SeqCst), 2);
    assert!(!engine.is_dirty());
}

#[test]
fn test_watcher_triggers_reload() {
    let temp_dir = asset_tree(&[
        ("layout/layout.html", LAYOUT),
        ("view/index.html", r#"<%define "inner"%>before<%end%>"#),
    ]);
    let config = EngineConfig::default().with_watch_root(temp_dir.path());
    let engine = TemplateEngine::new(
        LayeredFileSystem::new(temp_dir.path(), MemorySource::new()),
        config,
    )
    .unwrap();
    assert!(engine.is_watching());
    assert_eq!(engine.render_to_string("index.html", &()).unwrap(), "HEADbeforeFOOT");

    // Keep the mtime clearly distinct from the initial write
    std::thread::sleep(Duration::from_millis(50));
    write_tree(temp_dir.path(), &[("view/index.html", r#"<%define "inner"%>after<%end%>"#)]);

    let reloaded = wait_until(Duration::from_secs(10), || {
        engine
            .render_to_string("index.html", &())
            .map(|out| out == "HEADafterFOOT")
            .unwrap_or(false)
    });
    assert!(reloaded, "template change was not picked up");

    engine.stop_watching();
    assert!(!engine.is_watching());
}

#[test]
fn test_watcher_ignores_unrelated_files() {
    let temp_dir = asset_tree(&[
        ("layout/layout.html", LAYOUT),
        ("view/index.html", r#"<%define "inner"%>x<%end%>"#),
    ]);
    let config = EngineConfig::default().with_watch_root(temp_dir.path());
    let engine = TemplateEngine::new(
        LayeredFileSystem::new(temp_dir.path(), MemorySource::new()),
        config,
    )
    .unwrap();

    write_tree(temp_dir.path(), &[("static/site.css", "body {}")]);
    std::thread::sleep(Duration::from_millis(600));
    assert!(!engine.is_dirty());
}
