//! Attribute values stored for each port
//!
//! Index attributes are either a bare word, a brace list of words, or a brace
//! list that itself contains lists. The three shapes are kept apart so that
//! callers asking for the wrong one get an error instead of a guess.

use serde::Serialize;

use crate::error::{CatalogError, CatalogResult};

/// A single attribute value from the index
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// A bare word, e.g. `version 1.3`
    Str(String),
    /// A flat brace list, e.g. `categories {archivers devel}`
    List(Vec<String>),
    /// A brace list containing at least one nested list
    Nested(Vec<AttrValue>),
}

impl AttrValue {
    /// Name of the variant, used in type mismatch errors
    pub fn kind(&self) -> &'static str {
        match self {
            AttrValue::Str(_) => "string",
            AttrValue::List(_) => "list",
            AttrValue::Nested(_) => "nested list",
        }
    }

    /// Borrow a bare string value
    pub fn as_str(&self) -> CatalogResult<&str> {
        match self {
            AttrValue::Str(s) => Ok(s),
            other => Err(other.mismatch("string")),
        }
    }

    /// Borrow a flat list value
    pub fn as_list(&self) -> CatalogResult<&[String]> {
        match self {
            AttrValue::List(items) => Ok(items),
            other => Err(other.mismatch("list")),
        }
    }

    /// Borrow a nested list value
    pub fn as_nested(&self) -> CatalogResult<&[AttrValue]> {
        match self {
            AttrValue::Nested(items) => Ok(items),
            other => Err(other.mismatch("nested list")),
        }
    }

    /// Words of a value that may legitimately be a single word or a flat list.
    ///
    /// `categories archivers` and `categories {archivers}` mean the same thing.
    pub fn words(&self) -> CatalogResult<Vec<&str>> {
        match self {
            AttrValue::Str(s) => Ok(vec![s.as_str()]),
            AttrValue::List(items) => Ok(items.iter().map(String::as_str).collect()),
            other => Err(other.mismatch("word list")),
        }
    }

    /// Render the value as display text.
    ///
    /// Lists are joined with single spaces and nested lists are re-braced.
    pub fn to_text(&self) -> String {
        match self {
            AttrValue::Str(s) => s.clone(),
            AttrValue::List(items) => items.join(" "),
            AttrValue::Nested(items) => items
                .iter()
                .map(|item| match item {
                    AttrValue::Str(s) => s.clone(),
                    list => format!("{{{}}}", list.to_text()),
                })
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    /// Whether the value carries no text at all
    pub fn is_empty(&self) -> bool {
        match self {
            AttrValue::Str(s) => s.is_empty(),
            AttrValue::List(items) => items.is_empty(),
            AttrValue::Nested(items) => items.iter().all(AttrValue::is_empty),
        }
    }

    fn mismatch(&self, expected: &'static str) -> CatalogError {
        CatalogError::AttributeType {
            attribute: String::new(),
            expected,
            found: self.kind(),
        }
    }
}

/// Attach the attribute name to a type mismatch raised by an accessor
pub(crate) fn for_attribute(attribute: &str, err: CatalogError) -> CatalogError {
    match err {
        CatalogError::AttributeType {
            expected, found, ..
        } => CatalogError::AttributeType {
            attribute: attribute.to_string(),
            expected,
            found,
        },
        other => other,
    }
}
