//! Executor for parsed blocks.

use crate::error::TemplateError;
use crate::template::funcs::{truthy, write_value, FuncMap};
use crate::template::parse::{BranchKind, Command, Node, Operand, Pipeline};
use serde_json::Value;
use std::collections::HashMap;

/// Maximum nesting of `template` calls
pub(crate) const MAX_DEPTH: usize = 100;

pub(crate) fn execute(
    blocks: &HashMap<String, Vec<Node>>,
    funcs: &FuncMap,
    block: &str,
    data: &Value,
) -> Result<String, TemplateError> {
    let mut state = State {
        blocks,
        funcs,
        root: data,
        out: String::new(),
        depth: 0,
    };
    state.call(block, data)?;
    Ok(state.out)
}

struct State<'a> {
    blocks: &'a HashMap<String, Vec<Node>>,
    funcs: &'a FuncMap,
    root: &'a Value,
    out: String,
    depth: usize,
}

impl<'a> State<'a> {
    fn call(&mut self, block: &str, dot: &Value) -> Result<(), TemplateError> {
        let blocks = self.blocks;
        let nodes = blocks
            .get(block)
            .ok_or_else(|| TemplateError::UndefinedBlock(block.to_string()))?;
        if self.depth >= MAX_DEPTH {
            return Err(TemplateError::DepthExceeded(block.to_string()));
        }
        self.depth += 1;
        let result = self.walk(block, nodes, dot);
        self.depth -= 1;
        result
    }

    fn walk(&mut self, block: &str, nodes: &[Node], dot: &Value) -> Result<(), TemplateError> {
        for node in nodes {
            match node {
                Node::Text(text) => self.out.push_str(text),
                Node::Action(pipe) => {
                    let value = self.pipeline(block, pipe, dot)?;
                    write_value(&mut self.out, &value);
                }
                Node::Branch {
                    kind,
                    pipe,
                    body,
                    otherwise,
                } => {
                    let value = self.pipeline(block, pipe, dot)?;
                    match kind {
                        BranchKind::If if truthy(&value) => self.walk(block, body, dot)?,
                        BranchKind::With if truthy(&value) => self.walk(block, body, &value)?,
                        BranchKind::If | BranchKind::With => self.walk(block, otherwise, dot)?,
                        BranchKind::Range => match &value {
                            Value::Array(items) if !items.is_empty() => {
                                for item in items {
                                    self.walk(block, body, item)?;
                                }
                            }
                            Value::Object(map) if !map.is_empty() => {
                                for item in map.values() {
                                    self.walk(block, body, item)?;
                                }
                            }
                            Value::Null | Value::Array(_) | Value::Object(_) => {
                                self.walk(block, otherwise, dot)?
                            }
                            other => {
                                return Err(exec_error(
                                    block,
                                    format!("range can't iterate over {}", other),
                                ))
                            }
                        },
                    }
                }
                Node::Template { name, pipe } => {
                    let value = match pipe {
                        Some(pipe) => self.pipeline(block, pipe, dot)?,
                        None => Value::Null,
                    };
                    self.call(name, &value)?;
                }
            }
        }
        Ok(())
    }

    fn pipeline(&self, block: &str, pipe: &Pipeline, dot: &Value) -> Result<Value, TemplateError> {
        let mut piped = None;
        for command in &pipe.commands {
            piped = Some(self.command(block, command, dot, piped.take())?);
        }
        Ok(piped.unwrap_or(Value::Null))
    }

    fn command(
        &self,
        block: &str,
        command: &Command,
        dot: &Value,
        piped: Option<Value>,
    ) -> Result<Value, TemplateError> {
        match command.operands.split_first() {
            Some((Operand::Func(name), args)) => {
                let mut values = args
                    .iter()
                    .map(|arg| self.operand(block, arg, dot))
                    .collect::<Result<Vec<_>, _>>()?;
                values.extend(piped);
                self.invoke(block, name, &values)
            }
            Some((operand, _)) => self.operand(block, operand, dot),
            None => Ok(Value::Null),
        }
    }

    fn operand(&self, block: &str, operand: &Operand, dot: &Value) -> Result<Value, TemplateError> {
        Ok(match operand {
            Operand::Field(path) => lookup(dot, path),
            Operand::Root(path) => lookup(self.root, path),
            Operand::Literal(value) => value.clone(),
            Operand::Func(name) => return self.invoke(block, name, &[]),
        })
    }

    fn invoke(&self, block: &str, name: &str, args: &[Value]) -> Result<Value, TemplateError> {
        let func = self
            .funcs
            .get(name)
            .ok_or_else(|| exec_error(block, format!("function {:?} not defined", name)))?;
        func(args).map_err(|message| exec_error(block, format!("error calling {}: {}", name, message)))
    }
}

fn exec_error(block: &str, message: String) -> TemplateError {
    TemplateError::Exec {
        name: block.to_string(),
        message,
    }
}

/// Follow `path` through nested objects; anything missing is null.
fn lookup(value: &Value, path: &[String]) -> Value {
    let mut current = value;
    for key in path {
        current = match current {
            Value::Object(map) => match map.get(key) {
                Some(next) => next,
                None => return Value::Null,
            },
            _ => return Value::Null,
        };
    }
    current.clone()
}
