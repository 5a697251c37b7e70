//! Function table and built-in functions

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A function callable from template pipelines
pub type TemplateFn = Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;

/// Named functions available to templates
#[derive(Clone)]
pub struct FuncMap {
    funcs: HashMap<String, TemplateFn>,
}

impl FuncMap {
    /// An empty table, without the built-ins
    pub fn new() -> Self {
        Self {
            funcs: HashMap::new(),
        }
    }

    /// A table holding `eq`, `ne`, `not`, `and`, `or`, `len`, `index` and `print`
    pub fn with_builtins() -> Self {
        let mut map = Self::new();
        map.insert("eq", eq);
        map.insert("ne", ne);
        map.insert("not", not);
        map.insert("and", and);
        map.insert("or", or);
        map.insert("len", len);
        map.insert("index", index);
        map.insert("print", print);
        map
    }

    /// Register `f` under `name`, replacing any previous function of that name.
    pub fn insert<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.insert_arc(name, Arc::new(f));
    }

    pub fn insert_arc(&mut self, name: impl Into<String>, f: TemplateFn) {
        self.funcs.insert(name.into(), f);
    }

    pub fn get(&self, name: &str) -> Option<&TemplateFn> {
        self.funcs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.funcs.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.funcs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for FuncMap {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for FuncMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

/// Truth value of `value`: false, 0, null and empty strings, arrays and
/// objects are false.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Append the printed form of `value`: strings verbatim, null as nothing,
/// anything else as JSON.
pub(crate) fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::String(s) => out.push_str(s),
        Value::Null => {}
        other => out.push_str(&other.to_string()),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn same(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn arity(name: &str, args: &[Value], expected: usize) -> Result<(), String> {
    if args.len() != expected {
        return Err(format!(
            "wrong number of args for {}: want {} got {}",
            name,
            expected,
            args.len()
        ));
    }
    Ok(())
}

/// `eq a b...` is true when `a` equals any of the rest
fn eq(args: &[Value]) -> Result<Value, String> {
    match args.split_first() {
        Some((first, rest)) if !rest.is_empty() => {
            Ok(Value::Bool(rest.iter().any(|other| same(first, other))))
        }
        _ => Err("missing argument for comparison".to_string()),
    }
}

fn ne(args: &[Value]) -> Result<Value, String> {
    arity("ne", args, 2)?;
    Ok(Value::Bool(!same(&args[0], &args[1])))
}

fn not(args: &[Value]) -> Result<Value, String> {
    arity("not", args, 1)?;
    Ok(Value::Bool(!truthy(&args[0])))
}

/// First falsy argument, or the last one
fn and(args: &[Value]) -> Result<Value, String> {
    args.iter()
        .find(|v| !truthy(v))
        .or(args.last())
        .cloned()
        .ok_or_else(|| "and needs at least one argument".to_string())
}

/// First truthy argument, or the last one
fn or(args: &[Value]) -> Result<Value, String> {
    args.iter()
        .find(|v| truthy(v))
        .or(args.last())
        .cloned()
        .ok_or_else(|| "or needs at least one argument".to_string())
}

fn len(args: &[Value]) -> Result<Value, String> {
    arity("len", args, 1)?;
    let n = match &args[0] {
        Value::String(s) => s.len(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        other => return Err(format!("len of {}", type_name(other))),
    };
    Ok(Value::from(n))
}

/// `index coll k1 k2...` is `coll[k1][k2]...`
fn index(args: &[Value]) -> Result<Value, String> {
    let Some((collection, keys)) = args.split_first() else {
        return Err("index needs a collection".to_string());
    };
    let mut current = collection.clone();
    for key in keys {
        current = match (&current, key) {
            (Value::Array(items), Value::Number(n)) => {
                let position = n
                    .as_u64()
                    .ok_or_else(|| format!("cannot index array with {}", n))?;
                usize::try_from(position)
                    .ok()
                    .and_then(|i| items.get(i))
                    .cloned()
                    .ok_or_else(|| format!("index out of range: {}", position))?
            }
            (Value::Object(map), Value::String(k)) => map.get(k).cloned().unwrap_or(Value::Null),
            (coll, key) => {
                return Err(format!(
                    "cannot index {} with {}",
                    type_name(coll),
                    type_name(key)
                ))
            }
        };
    }
    Ok(current)
}

/// Concatenate the printed arguments, with a space between two operands when
/// neither is a string.
fn print(args: &[Value]) -> Result<Value, String> {
    let mut out = String::new();
    for (i, value) in args.iter().enumerate() {
        if i > 0 && !value.is_string() && !args[i - 1].is_string() {
            out.push(' ');
        }
        write_value(&mut out, value);
    }
    Ok(Value::String(out))
}
