//! View composition.
//!
//! A view at directory `D` is compiled into one template namespace from, in
//! order: the layout fragments of the nearest prefix of `D` that has any (only
//! that level), the module fragments of every prefix from the root down to `D`,
//! and finally the view's own source. Later definitions override earlier ones.

use crate::engine::fragments::{Fragment, FragmentIndex};
use crate::error::{EngineError, TemplateError};
use crate::template::{Delimiters, FuncMap, Template};
use std::sync::Arc;
use tracing::warn;

/// Everything composition needs besides the view itself
pub(crate) struct Composer<'a> {
    pub layouts: &'a FragmentIndex,
    pub modules: Option<&'a FragmentIndex>,
    pub delimiters: &'a [Delimiters],
    pub funcs: &'a Arc<FuncMap>,
}

impl<'a> Composer<'a> {
    /// Compile the view stored under `key` (e.g. `a/b/page.html`).
    pub fn compose(&self, key: &str, origin: &str, source: &str) -> Result<Template, EngineError> {
        let chain = prefix_chain(key);
        let mut template = Template::new(key, self.delimiters.to_vec(), Arc::clone(self.funcs));

        if let Some(fragments) = chain.iter().rev().find_map(|p| self.layouts.get(p)) {
            self.parse_all(&mut template, fragments)?;
        }

        if let Some(modules) = self.modules {
            for prefix in &chain {
                if let Some(fragments) = modules.get(prefix) {
                    self.parse_all(&mut template, fragments)?;
                }
            }
        }

        template
            .parse(origin, source)
            .map_err(|err| self.composition_error(origin, source, err))?;
        Ok(template)
    }

    fn parse_all(&self, template: &mut Template, fragments: &[Fragment]) -> Result<(), EngineError> {
        for fragment in fragments {
            template
                .parse(&fragment.origin, &fragment.source)
                .map_err(|err| self.composition_error(&fragment.origin, &fragment.source, err))?;
        }
        Ok(())
    }

    fn composition_error(&self, origin: &str, source: &str, err: TemplateError) -> EngineError {
        if matches!(err, TemplateError::Parse { .. }) && braces_are_actions(self.delimiters, source) {
            warn!(
                fragment = %origin,
                "Fragment contains {{{{ }}}} markup parsed as template actions; configure only <% %> delimiters to pass it through literally"
            );
        }
        EngineError::Composition {
            path: origin.to_string(),
            source: err,
        }
    }
}

/// True when `{{` opens an action and `source` contains it.
pub(crate) fn braces_are_actions(delimiters: &[Delimiters], source: &str) -> bool {
    delimiters.iter().any(|d| d.left == "{{") && source.contains("{{")
}

/// Directory prefixes of `key` from the root down: `a/b/x.html` gives
/// `["", "a/", "a/b/"]`.
pub(crate) fn prefix_chain(key: &str) -> Vec<String> {
    let mut chain = vec![String::new()];
    let mut prefix = String::new();
    let dirs = match key.rfind('/') {
        Some(at) => &key[..at],
        None => "",
    };
    for dir in dirs.split('/').filter(|d| !d.is_empty()) {
        prefix.push_str(dir);
        prefix.push('/');
        chain.push(prefix.clone());
    }
    chain
}
