//! Integration tests for layered assets and the template engine

mod change_watcher;
mod config_integration;
mod layered_fs;
mod template_engine;
mod test_utils;
