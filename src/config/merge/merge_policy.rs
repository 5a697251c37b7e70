//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
///
/// Only scalar and string-list defaults are set here; nested tables such as
/// the delimiter pairs fall back to their serde defaults.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("engine.layout_root", "layout")?
        .set_default("engine.module_root", "module")?
        .set_default("engine.view_root", "view")?
        .set_default("engine.layout_fragments", vec!["layout", "base"])?
        .set_default("engine.module_fragments", vec!["layout", "base"])?
        .set_default("engine.fragment_extension", ".html")?
        .set_default("engine.entry_block", "base.html")?
        .set_default("engine.reload_extensions", vec![".htm", ".json"])?
        .set_default("watch.expiry_secs", 300)?
        .set_default("watch.sweep_interval_secs", 30)?
        .set_default("watch.queue_capacity", 1)
}
