//! Integration tests for loading configuration and building an engine from it

use crate::integration::test_utils::asset_tree;
use veneer::{ConfigLoader, EngineError, LayeredFileSystem, MemorySource, TemplateEngine};

#[test]
fn test_engine_from_workspace_config() {
    let temp_dir = asset_tree(&[
        (
            "config/veneer.toml",
            r#"
[engine]
layout_root = "frames"
view_root = "pages"
entry_block = "page"

[[engine.delimiters]]
left = "[["
right = "]]"

[watch]
expiry_secs = 30
"#,
        ),
        ("frames/layout.html", r#"[[define "page"]]<[[template "body" .]]>[[end]]"#),
        ("pages/home.html", r#"[[define "body"]]Hi [[.who]][[end]]<% not a tag %>"#),
    ]);

    let config = ConfigLoader::load(temp_dir.path()).unwrap();
    assert_eq!(config.engine.layout_root, "frames");
    assert_eq!(config.watch.expiry_secs, 30);

    let engine = TemplateEngine::from_config(
        LayeredFileSystem::new(temp_dir.path(), MemorySource::new()),
        &config,
    )
    .unwrap();
    assert_eq!(
        engine
            .render_to_string("home.html", &serde_json::json!({"who": "there"}))
            .unwrap(),
        "<Hi there>"
    );
    assert!(!engine.is_watching());
}

#[test]
fn test_watch_root_from_config_starts_watcher() {
    let temp_dir = asset_tree(&[
        ("layout/layout.html", r#"<%define "base.html"%>ok<%end%>"#),
        ("view/index.html", ""),
    ]);
    let mut config = ConfigLoader::default();
    config.engine = config.engine.with_watch_root(temp_dir.path());

    let engine = TemplateEngine::from_config(
        LayeredFileSystem::new(temp_dir.path(), MemorySource::new()),
        &config,
    )
    .unwrap();
    assert!(engine.is_watching());
    assert_eq!(engine.render_to_string("index.html", &()).unwrap(), "ok");
}

#[test]
fn test_invalid_file_is_reported() {
    let temp_dir = asset_tree(&[("veneer.toml", "[engine]\nentry_block = \"\"\n")]);
    let result = ConfigLoader::load_from_file(&temp_dir.path().join("veneer.toml"));
    match result {
        Err(EngineError::Config(message)) => {
            assert!(message.starts_with("Configuration validation failed"));
        }
        other => panic!("expected a config error, got {:?}", other.map(|_| ())),
    }
}
