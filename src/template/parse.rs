//! Parser from lexed tokens to block trees.

use crate::error::TemplateError;
use crate::template::funcs::FuncMap;
use crate::template::lex::{lex, Token};
use crate::template::Delimiters;
use serde_json::{Number, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BranchKind {
    If,
    Range,
    With,
}

#[derive(Debug)]
pub(crate) enum Node {
    Text(String),
    Action(Pipeline),
    Branch {
        kind: BranchKind,
        pipe: Pipeline,
        body: Vec<Node>,
        otherwise: Vec<Node>,
    },
    Template {
        name: String,
        pipe: Option<Pipeline>,
    },
}

/// Commands joined by `|`; each result feeds the next command's last argument
#[derive(Debug)]
pub(crate) struct Pipeline {
    pub commands: Vec<Command>,
}

#[derive(Debug)]
pub(crate) struct Command {
    pub operands: Vec<Operand>,
}

#[derive(Debug)]
pub(crate) enum Operand {
    /// `.` or `.a.b`
    Field(Vec<String>),
    /// `$` or `$.a.b`
    Root(Vec<String>),
    Literal(Value),
    Func(String),
}

/// Result of parsing one source
pub(crate) struct Parsed {
    pub body: Vec<Node>,
    pub defines: Vec<(String, Vec<Node>)>,
}

/// True when the block would print nothing but whitespace
pub(crate) fn is_blank(nodes: &[Node]) -> bool {
    nodes.iter().all(|node| match node {
        Node::Text(text) => text.trim().is_empty(),
        _ => false,
    })
}

pub(crate) fn parse(
    name: &str,
    source: &str,
    delimiters: &[Delimiters],
    funcs: &FuncMap,
) -> Result<Parsed, TemplateError> {
    let tokens = lex(name, source, delimiters)?;
    let mut parser = Parser {
        name,
        funcs,
        tokens: tokens.into_iter(),
        defines: Vec::new(),
        line: 1,
        depth: 0,
    };
    let (body, stop) = parser.parse_list()?;
    match stop {
        Stop::Eof => Ok(Parsed {
            body,
            defines: parser.defines,
        }),
        Stop::End => Err(parser.error("unexpected end")),
        Stop::Else(_) => Err(parser.error("unexpected else")),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Word {
    Str(String),
    Num(Number),
    Ident(String),
    Field(Vec<String>),
    Var(Vec<String>),
    Pipe,
}

/// What ended a node list
enum Stop {
    Eof,
    End,
    /// Carries the words after `else`, e.g. `if .x` for `else if .x`
    Else(Vec<Word>),
}

struct Parser<'a> {
    name: &'a str,
    funcs: &'a FuncMap,
    tokens: std::vec::IntoIter<Token>,
    defines: Vec<(String, Vec<Node>)>,
    line: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, message: impl Into<String>) -> TemplateError {
        TemplateError::Parse {
            name: self.name.to_string(),
            line: self.line,
            message: message.into(),
        }
    }

    fn parse_list(&mut self) -> Result<(Vec<Node>, Stop), TemplateError> {
        let mut nodes = Vec::new();
        while let Some(token) = self.tokens.next() {
            let (body, line) = match token {
                Token::Text(text) => {
                    nodes.push(Node::Text(text));
                    continue;
                }
                Token::Action { body, line } => (body, line),
            };
            self.line = line;

            if body.starts_with("/*") {
                if body.len() < 4 || !body.ends_with("*/") {
                    return Err(self.error("unclosed comment"));
                }
                continue;
            }

            let words = split_words(&body).map_err(|message| self.error(message))?;
            let keyword = match words.first() {
                Some(Word::Ident(k)) => k.as_str(),
                Some(_) => "",
                None => return Err(self.error("missing value for command")),
            };
            let args = &words[1..];
            match keyword {
                "end" => {
                    if !args.is_empty() {
                        return Err(self.error("unexpected arguments to end"));
                    }
                    return Ok((nodes, Stop::End));
                }
                "else" => return Ok((nodes, Stop::Else(args.to_vec()))),
                "define" => self.parse_define(args)?,
                "block" => nodes.push(self.parse_block(args)?),
                "template" => nodes.push(self.parse_template(args)?),
                "if" => nodes.push(self.parse_branch(BranchKind::If, args)?),
                "range" => nodes.push(self.parse_branch(BranchKind::Range, args)?),
                "with" => nodes.push(self.parse_branch(BranchKind::With, args)?),
                _ => nodes.push(Node::Action(self.pipeline(&words)?)),
            }
        }
        Ok((nodes, Stop::Eof))
    }

    /// Parse a nested list that must be closed by `end`.
    fn parse_until_end(&mut self, what: &str) -> Result<Vec<Node>, TemplateError> {
        self.depth += 1;
        let (nodes, stop) = self.parse_list()?;
        self.depth -= 1;
        match stop {
            Stop::End => Ok(nodes),
            Stop::Else(_) => Err(self.error(format!("unexpected else in {}", what))),
            Stop::Eof => Err(self.error(format!("unexpected EOF in {}", what))),
        }
    }

    fn block_name(&self, args: &[Word], what: &str) -> Result<String, TemplateError> {
        match args.first() {
            Some(Word::Str(name)) => Ok(name.clone()),
            _ => Err(self.error(format!("{} needs a quoted block name", what))),
        }
    }

    fn optional_pipeline(&self, words: &[Word]) -> Result<Option<Pipeline>, TemplateError> {
        if words.is_empty() {
            Ok(None)
        } else {
            self.pipeline(words).map(Some)
        }
    }

    fn parse_define(&mut self, args: &[Word]) -> Result<(), TemplateError> {
        if self.depth > 0 {
            return Err(self.error("define is only allowed at the top level"));
        }
        let name = self.block_name(args, "define")?;
        if args.len() > 1 {
            return Err(self.error("unexpected arguments to define"));
        }
        let body = self.parse_until_end("define")?;
        self.defines.push((name, body));
        Ok(())
    }

    /// `block "name" pipe` defines `name` and invokes it in place.
    fn parse_block(&mut self, args: &[Word]) -> Result<Node, TemplateError> {
        let name = self.block_name(args, "block")?;
        let pipe = self.optional_pipeline(&args[1..])?;
        let body = self.parse_until_end("block")?;
        self.defines.push((name.clone(), body));
        Ok(Node::Template { name, pipe })
    }

    fn parse_template(&mut self, args: &[Word]) -> Result<Node, TemplateError> {
        let name = self.block_name(args, "template")?;
        let pipe = self.optional_pipeline(&args[1..])?;
        Ok(Node::Template { name, pipe })
    }

    fn parse_branch(&mut self, kind: BranchKind, args: &[Word]) -> Result<Node, TemplateError> {
        if args.is_empty() {
            return Err(self.error(format!("missing value for {:?}", kind).to_lowercase()));
        }
        let pipe = self.pipeline(args)?;

        self.depth += 1;
        let (body, stop) = self.parse_list()?;
        let otherwise = match stop {
            Stop::End => Vec::new(),
            Stop::Else(rest) if rest.is_empty() => {
                let (otherwise, stop) = self.parse_list()?;
                match stop {
                    Stop::End => otherwise,
                    Stop::Else(_) => return Err(self.error("expected end; found else")),
                    Stop::Eof => return Err(self.error("unexpected EOF")),
                }
            }
            // `else if` chains share the outer `end`
            Stop::Else(rest) if rest.first() == Some(&Word::Ident("if".to_string())) => {
                vec![self.parse_branch(BranchKind::If, &rest[1..])?]
            }
            Stop::Else(_) => return Err(self.error("unexpected arguments to else")),
            Stop::Eof => return Err(self.error("unexpected EOF")),
        };
        self.depth -= 1;

        Ok(Node::Branch {
            kind,
            pipe,
            body,
            otherwise,
        })
    }

    fn pipeline(&self, words: &[Word]) -> Result<Pipeline, TemplateError> {
        let mut commands = Vec::new();
        for (stage, segment) in words.split(|w| *w == Word::Pipe).enumerate() {
            if segment.is_empty() {
                return Err(self.error("missing command in pipeline"));
            }
            let operands = segment
                .iter()
                .map(|word| self.operand(word))
                .collect::<Result<Vec<_>, _>>()?;
            if !matches!(operands[0], Operand::Func(_)) {
                if operands.len() > 1 {
                    return Err(self.error("can't give argument to non-function"));
                }
                if stage > 0 {
                    return Err(self.error("non executable command in pipeline stage"));
                }
            }
            commands.push(Command { operands });
        }
        Ok(Pipeline { commands })
    }

    fn operand(&self, word: &Word) -> Result<Operand, TemplateError> {
        Ok(match word {
            Word::Str(s) => Operand::Literal(Value::String(s.clone())),
            Word::Num(n) => Operand::Literal(Value::Number(n.clone())),
            Word::Field(path) => Operand::Field(path.clone()),
            Word::Var(path) => Operand::Root(path.clone()),
            Word::Ident(ident) => match ident.as_str() {
                "true" => Operand::Literal(Value::Bool(true)),
                "false" => Operand::Literal(Value::Bool(false)),
                "nil" => Operand::Literal(Value::Null),
                name if self.funcs.contains(name) => Operand::Func(name.to_string()),
                name => return Err(self.error(format!("function {:?} not defined", name))),
            },
            Word::Pipe => return Err(self.error("unexpected |")),
        })
    }
}

fn is_word_end(c: char) -> bool {
    c.is_whitespace() || c == '|'
}

/// Split an action body into words.
fn split_words(body: &str) -> Result<Vec<Word>, String> {
    let mut words = Vec::new();
    let mut chars = body.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '|' {
            chars.next();
            words.push(Word::Pipe);
            continue;
        }
        if c == '"' || c == '`' {
            chars.next();
            words.push(Word::Str(quoted(&mut chars, c)?));
            continue;
        }

        let mut end = body.len();
        while let Some(&(at, c)) = chars.peek() {
            if is_word_end(c) {
                end = at;
                break;
            }
            chars.next();
        }
        words.push(bare_word(&body[start..end])?);
    }

    Ok(words)
}

fn quoted(
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    quote: char,
) -> Result<String, String> {
    let mut out = String::new();
    while let Some((_, c)) = chars.next() {
        match c {
            c if c == quote => return Ok(out),
            '\\' if quote == '"' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, escaped @ ('\\' | '"'))) => out.push(escaped),
                Some((_, other)) => return Err(format!("unknown escape sequence \\{}", other)),
                None => break,
            },
            c => out.push(c),
        }
    }
    Err("unterminated quoted string".to_string())
}

fn field_path(rest: &str, word: &str) -> Result<Vec<String>, String> {
    if rest.is_empty() {
        return Ok(Vec::new());
    }
    let Some(chain) = rest.strip_prefix('.') else {
        return Err(format!("bad field syntax {:?}", word));
    };
    let keys: Vec<String> = chain.split('.').map(str::to_string).collect();
    if keys.iter().any(|k| k.is_empty()) {
        return Err(format!("bad field syntax {:?}", word));
    }
    Ok(keys)
}

fn bare_word(word: &str) -> Result<Word, String> {
    if word.starts_with('.') {
        // `.` alone is the current value
        if word == "." {
            return Ok(Word::Field(Vec::new()));
        }
        return field_path(word, word).map(Word::Field);
    }
    if let Some(rest) = word.strip_prefix('$') {
        return field_path(rest, word).map(Word::Var);
    }

    let numeric = word.starts_with(|c: char| c.is_ascii_digit())
        || (word.len() > 1 && word.starts_with(&['-', '+'][..]));
    if numeric {
        return number(word).map(Word::Num);
    }

    if word.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Ok(Word::Ident(word.to_string()));
    }
    Err(format!("unexpected {:?} in command", word))
}

fn number(word: &str) -> Result<Number, String> {
    let trimmed = word.strip_prefix('+').unwrap_or(word);
    if let Ok(i) = trimmed.parse::<i64>() {
        return Ok(Number::from(i));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .ok_or_else(|| format!("bad number syntax: {:?}", word))
}
