//! Dependency link resolution
//!
//! Dependency specs in the index look like `port:zlib`, `lib:libz.dylib:zlib`,
//! `bin:perl:perl5.34` or `path:bin/cmake:cmake`. The last field always names
//! the port that satisfies the dependency; the middle field (when present) is
//! the file whose presence would satisfy it. The catalog only resolves specs;
//! following a link is up to whatever renders it.

use serde::Serialize;
use std::fmt;

use crate::error::CatalogError;

/// Link families with a registered handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Port,
    Lib,
    Bin,
    Path,
}

impl LinkKind {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "port" => Some(LinkKind::Port),
            "lib" => Some(LinkKind::Lib),
            "bin" => Some(LinkKind::Bin),
            "path" => Some(LinkKind::Path),
            _ => None,
        }
    }
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            LinkKind::Port => "port",
            LinkKind::Lib => "lib",
            LinkKind::Bin => "bin",
            LinkKind::Path => "path",
        };
        write!(f, "{tag}")
    }
}

/// A resolved link, or the original text when nothing handles it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Link {
    Resolved {
        kind: LinkKind,
        file_hint: Option<String>,
        target: String,
    },
    PlainText(String),
}

impl Link {
    /// Resolve a dependency spec. Unrecognized specs come back as plain text.
    pub fn parse(spec: &str) -> Self {
        Self::try_parse(spec).unwrap_or_else(|err| {
            tracing::trace!("{err}");
            Link::PlainText(spec.to_string())
        })
    }

    /// Resolve a dependency spec, reporting specs with no handler
    pub fn try_parse(spec: &str) -> Result<Self, CatalogError> {
        let unknown = || CatalogError::UnknownLink {
            text: spec.to_string(),
        };

        let mut fields = spec.split(':');
        let tag = fields.next().ok_or_else(unknown)?;
        let kind = LinkKind::from_tag(tag).ok_or_else(unknown)?;
        let rest: Vec<&str> = fields.collect();

        let (file_hint, target) = match (kind, rest.as_slice()) {
            (LinkKind::Port, [target]) => (None, *target),
            (LinkKind::Lib | LinkKind::Bin | LinkKind::Path, [file, target]) => {
                (Some(file.to_string()), *target)
            }
            _ => return Err(unknown()),
        };

        if target.is_empty() {
            return Err(unknown());
        }

        Ok(Link::Resolved {
            kind,
            file_hint,
            target: target.to_string(),
        })
    }

    /// Link straight to a port by name
    pub fn port(name: &str) -> Self {
        Link::Resolved {
            kind: LinkKind::Port,
            file_hint: None,
            target: name.to_string(),
        }
    }

    pub fn kind(&self) -> Option<LinkKind> {
        match self {
            Link::Resolved { kind, .. } => Some(*kind),
            Link::PlainText(_) => None,
        }
    }

    /// Port name for resolved links, the raw text otherwise
    pub fn target(&self) -> &str {
        match self {
            Link::Resolved { target, .. } => target,
            Link::PlainText(text) => text,
        }
    }

    pub fn file_hint(&self) -> Option<&str> {
        match self {
            Link::Resolved { file_hint, .. } => file_hint.as_deref(),
            Link::PlainText(_) => None,
        }
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Link::Resolved {
                kind,
                file_hint: Some(file),
                target,
            } => write!(f, "{kind}:{file}:{target}"),
            Link::Resolved {
                kind,
                file_hint: None,
                target,
            } => write!(f, "{kind}:{target}"),
            Link::PlainText(text) => write!(f, "{text}"),
        }
    }
}
