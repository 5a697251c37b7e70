//! Composition template runtime
//!
//! A small action language executed against [`serde_json::Value`] data. It is
//! built for composing pages out of named blocks: fragments `define` blocks,
//! views override them, and the entry block pulls everything together with
//! `template` calls. A [`Template`] is one namespace of blocks assembled from
//! any number of parsed sources.

mod exec;
pub mod funcs;
mod lex;
mod parse;

pub use funcs::{truthy, FuncMap, TemplateFn};

use crate::error::TemplateError;
use parse::Node;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// One pair of action delimiters, e.g. `<%` and `%>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delimiters {
    pub left: String,
    pub right: String,
}

impl Delimiters {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }

    /// `<% %>` followed by `{{ }}`
    pub fn default_set() -> Vec<Delimiters> {
        vec![Delimiters::new("<%", "%>"), Delimiters::new("{{", "}}")]
    }
}

/// A namespace of named blocks
pub struct Template {
    name: String,
    delimiters: Vec<Delimiters>,
    funcs: Arc<FuncMap>,
    blocks: HashMap<String, Vec<Node>>,
}

impl Template {
    pub fn new(name: impl Into<String>, delimiters: Vec<Delimiters>, funcs: Arc<FuncMap>) -> Self {
        Self {
            name: name.into(),
            delimiters,
            funcs,
            blocks: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parse `source` into this namespace.
    ///
    /// Every `define`/`block` becomes a named block and the top-level text is
    /// stored under the template's own name. A later definition replaces an
    /// earlier one of the same name unless its body is only whitespace.
    /// `origin` names the source in parse errors.
    pub fn parse(&mut self, origin: &str, source: &str) -> Result<(), TemplateError> {
        let parsed = parse::parse(origin, source, &self.delimiters, &self.funcs)?;
        for (name, body) in parsed.defines {
            self.add_block(name, body);
        }
        self.add_block(self.name.clone(), parsed.body);
        Ok(())
    }

    fn add_block(&mut self, name: String, body: Vec<Node>) {
        if parse::is_blank(&body) && self.blocks.contains_key(&name) {
            return;
        }
        self.blocks.insert(name, body);
    }

    pub fn has_block(&self, name: &str) -> bool {
        self.blocks.contains_key(name)
    }

    /// Names of all defined blocks, sorted
    pub fn block_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.blocks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Execute `block` with `data` as both `.` and `$`.
    pub fn execute(&self, block: &str, data: &Value) -> Result<String, TemplateError> {
        exec::execute(&self.blocks, &self.funcs, block, data)
    }
}

impl std::fmt::Debug for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Template")
            .field("name", &self.name)
            .field("blocks", &self.block_names())
            .finish()
    }
}
