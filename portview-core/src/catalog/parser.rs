//! Port index parsing
//!
//! # Format
//!
//! ```text
//! zlib 151
//! categories archivers depends_lib {} description {Compression library} name zlib version 1.3.1 revision 0
//! py-numpy 96
//! ...
//! ```
//!
//! Every entry starts with a `NAME LENGTH` header line followed by exactly
//! `LENGTH` bytes of `attribute value` pairs. Values are bare words or brace
//! lists, and brace lists nest.
//!
//! A broken entry is reported and skipped; the rest of the file still loads.

use std::collections::BTreeMap;
use tracing::debug;

use super::port::Port;
use super::value::AttrValue;
use crate::error::CatalogError;

/// Ports read from one index, plus the entries that were skipped
#[derive(Debug, Default)]
pub struct ParseReport {
    /// Successfully parsed ports in file order
    pub ports: Vec<Port>,
    /// One `ParseEntry` error per skipped entry
    pub errors: Vec<CatalogError>,
}

/// Lexical token of an entry body
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    List(Vec<Token>),
}

/// Parse a whole index file.
pub fn parse_index(input: &[u8]) -> ParseReport {
    let mut report = ParseReport::default();
    let len = input.len();
    let mut pos = 0;

    loop {
        while pos < len && input[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos >= len {
            break;
        }

        let header_offset = pos;
        let line_end = input[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(len, |i| pos + i);
        let header = String::from_utf8_lossy(&input[pos..line_end]);
        let body_start = (line_end + 1).min(len);

        let (name, length) = match parse_header(&header) {
            Ok(parsed) => parsed,
            Err(reason) => {
                let name = header.split_whitespace().next().unwrap_or_default();
                report.errors.push(skip(name, header_offset, reason));
                pos = resync(input, body_start);
                continue;
            }
        };

        let body_end = match body_start.checked_add(length) {
            Some(end) if end <= len => end,
            _ => {
                let reason = format!(
                    "declared length {length} exceeds the {} bytes remaining",
                    len - body_start
                );
                report.errors.push(skip(&name, header_offset, reason));
                pos = resync(input, body_start);
                continue;
            }
        };

        let body = String::from_utf8_lossy(&input[body_start..body_end]);
        match parse_body(&body) {
            Ok(attributes) => report.ports.push(Port::new(name, attributes)),
            Err(reason) => report.errors.push(skip(&name, header_offset, reason)),
        }
        pos = body_end;
    }

    report
}

/// Start of the next line that looks like a real entry header.
///
/// A candidate must parse as `NAME LENGTH` and its declared body must end at
/// end of input or at a line boundary, so body lines of a skipped entry such
/// as `version 1` are not mistaken for headers.
fn resync(input: &[u8], mut pos: usize) -> usize {
    let len = input.len();

    while pos < len {
        let line_end = input[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(len, |i| pos + i);

        if is_plausible_header(input, pos, line_end) {
            return pos;
        }
        pos = line_end + 1;
    }

    len
}

fn is_plausible_header(input: &[u8], start: usize, line_end: usize) -> bool {
    let len = input.len();
    let header = String::from_utf8_lossy(&input[start..line_end]);
    let Ok((_, length)) = parse_header(&header) else {
        return false;
    };

    let body_start = (line_end + 1).min(len);
    let end = match body_start.checked_add(length) {
        Some(end) if end <= len => end,
        _ => return false,
    };

    let next = input[end..]
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .map_or(len, |i| end + i);

    next == len || input[end.saturating_sub(1)..next].contains(&b'\n')
}

fn skip(name: &str, offset: usize, reason: String) -> CatalogError {
    debug!(port = name, offset, "Skipping index entry: {}", reason);
    CatalogError::ParseEntry {
        name: name.to_string(),
        offset,
        reason,
    }
}

/// Split a `NAME LENGTH` header line
fn parse_header(line: &str) -> Result<(String, usize), String> {
    let fields: Vec<&str> = line.split_whitespace().collect();

    match fields.as_slice() {
        [name, length] => {
            let length = length
                .parse::<usize>()
                .map_err(|_| format!("invalid length '{length}'"))?;
            Ok((name.to_string(), length))
        }
        [_] => Err("missing length in header".to_string()),
        _ => Err(format!("malformed header '{}'", line.trim())),
    }
}

/// Parse an entry body into its attribute map.
fn parse_body(body: &str) -> Result<BTreeMap<String, AttrValue>, String> {
    let mut attributes = BTreeMap::new();
    let mut tokens = tokenize(body)?.into_iter();

    while let Some(token) = tokens.next() {
        let (attribute, value) = match token {
            Token::Word(attribute) => {
                let value = tokens
                    .next()
                    .ok_or_else(|| format!("attribute '{attribute}' has no value"))?;
                (attribute, to_value(value))
            }
            // `{attribute value}` written as a single list
            Token::List(pair) => read_pair(pair)?,
        };
        attributes.insert(attribute, value);
    }

    Ok(attributes)
}

fn read_pair(pair: Vec<Token>) -> Result<(String, AttrValue), String> {
    let mut items = pair.into_iter();
    let attribute = match items.next() {
        Some(Token::Word(attribute)) => attribute,
        Some(Token::List(_)) => return Err("attribute name cannot be a list".to_string()),
        None => return Err("empty attribute pair".to_string()),
    };

    let mut rest: Vec<Token> = items.collect();
    let value = match rest.len() {
        0 => return Err(format!("attribute '{attribute}' has no value")),
        1 => to_value(rest.remove(0)),
        _ => to_value(Token::List(rest)),
    };

    Ok((attribute, value))
}

/// Split a body into words and brace lists.
///
/// Brace depth is tracked with an explicit stack of open lists; a backslash
/// escapes the next character and never opens or closes a list.
fn tokenize(body: &str) -> Result<Vec<Token>, String> {
    let mut stack: Vec<Vec<Token>> = vec![Vec::new()];
    // Braces opened inside a word, per open list. They are literal text but
    // still count toward the depth of the list that holds them.
    let mut literal: Vec<usize> = vec![0];
    let mut word = String::new();
    let mut in_word = false;
    let mut chars = body.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let escaped = chars
                    .next()
                    .ok_or_else(|| "trailing backslash".to_string())?;
                word.push(escaped);
                in_word = true;
            }
            '{' if in_word => {
                word.push(c);
                if let Some(open) = literal.last_mut() {
                    *open += 1;
                }
            }
            '{' => {
                stack.push(Vec::new());
                literal.push(0);
            }
            '}' if literal.last().is_some_and(|open| *open > 0) => {
                word.push(c);
                in_word = true;
                if let Some(open) = literal.last_mut() {
                    *open -= 1;
                }
            }
            '}' => {
                flush(&mut stack, &mut word, &mut in_word);
                if stack.len() < 2 {
                    return Err("unbalanced braces: unexpected '}'".to_string());
                }
                literal.pop();
                let closed = stack.pop().unwrap_or_default();
                if let Some(parent) = stack.last_mut() {
                    parent.push(Token::List(closed));
                }
            }
            c if c.is_whitespace() => flush(&mut stack, &mut word, &mut in_word),
            c => {
                word.push(c);
                in_word = true;
            }
        }
    }
    flush(&mut stack, &mut word, &mut in_word);

    match stack.len() {
        1 => Ok(stack.pop().unwrap_or_default()),
        n => Err(format!("unbalanced braces: {} unclosed", n - 1)),
    }
}

fn flush(stack: &mut [Vec<Token>], word: &mut String, in_word: &mut bool) {
    if *in_word {
        if let Some(top) = stack.last_mut() {
            top.push(Token::Word(std::mem::take(word)));
        }
        *in_word = false;
    }
}

fn to_value(token: Token) -> AttrValue {
    match token {
        Token::Word(word) => AttrValue::Str(word),
        Token::List(items) if items.iter().all(|t| matches!(t, Token::Word(_))) => {
            AttrValue::List(
                items
                    .into_iter()
                    .filter_map(|t| match t {
                        Token::Word(word) => Some(word),
                        Token::List(_) => None,
                    })
                    .collect(),
            )
        }
        Token::List(items) => AttrValue::Nested(items.into_iter().map(to_value).collect()),
    }
}
