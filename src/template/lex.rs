//! Splits template source into text runs and action bodies.

use crate::error::TemplateError;
use crate::template::Delimiters;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Text(String),
    Action { body: String, line: usize },
}

/// Tokenize `source`, recognizing actions opened by any of `delimiters`.
///
/// A `-` directly inside a delimiter followed by whitespace (`<%- x -%>`)
/// trims the whitespace on that side of the action.
pub(crate) fn lex(
    name: &str,
    source: &str,
    delimiters: &[Delimiters],
) -> Result<Vec<Token>, TemplateError> {
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut line = 1;
    let mut trim_next = false;

    loop {
        let next_open = delimiters
            .iter()
            .filter_map(|d| source[pos..].find(&d.left).map(|at| (pos + at, d)))
            .min_by_key(|(at, d)| (*at, std::cmp::Reverse(d.left.len())));

        let Some((open_at, delims)) = next_open else {
            push_text(&mut tokens, &source[pos..], trim_next);
            break;
        };

        let text = &source[pos..open_at];
        line += text.matches('\n').count();
        push_text(&mut tokens, text, trim_next);

        let body_start = open_at + delims.left.len();
        let Some(close_rel) = source[body_start..].find(&delims.right) else {
            return Err(TemplateError::Parse {
                name: name.to_string(),
                line,
                message: format!("unclosed action, expected {:?}", delims.right),
            });
        };
        let raw = &source[body_start..body_start + close_rel];

        let trim_before = raw.starts_with("- ") || raw == "-";
        trim_next = raw.len() > 1 && raw.ends_with(" -");
        if trim_before {
            trim_previous(&mut tokens);
        }

        let mut body = raw;
        if trim_before {
            body = &body[1..];
        }
        if trim_next {
            body = &body[..body.len() - 1];
        }

        tokens.push(Token::Action {
            body: body.trim().to_string(),
            line,
        });
        line += raw.matches('\n').count();
        pos = body_start + close_rel + delims.right.len();
    }

    Ok(tokens)
}

fn push_text(tokens: &mut Vec<Token>, text: &str, trim_start: bool) {
    let text = if trim_start { text.trim_start() } else { text };
    if !text.is_empty() {
        tokens.push(Token::Text(text.to_string()));
    }
}

fn trim_previous(tokens: &mut Vec<Token>) {
    if let Some(Token::Text(text)) = tokens.last_mut() {
        let trimmed_len = text.trim_end().len();
        text.truncate(trimmed_len);
        if text.is_empty() {
            tokens.pop();
        }
    }
}
