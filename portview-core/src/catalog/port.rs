//! A port record as described by the index

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use super::link::Link;
use super::value::{for_attribute, AttrValue};
use super::version::combined_version;
use crate::error::CatalogResult;

/// Leading run of letters followed by a hyphen, e.g. `py` in `py-numpy`
static NAME_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z]+)-.").expect("name prefix pattern is valid"));

/// Dependency attribute families found in the index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyKind {
    Fetch,
    Extract,
    Build,
    Lib,
    Run,
    Test,
}

impl DependencyKind {
    pub const ALL: [DependencyKind; 6] = [
        DependencyKind::Fetch,
        DependencyKind::Extract,
        DependencyKind::Build,
        DependencyKind::Lib,
        DependencyKind::Run,
        DependencyKind::Test,
    ];

    /// Index attribute holding this dependency list
    pub fn attribute(&self) -> &'static str {
        match self {
            DependencyKind::Fetch => "depends_fetch",
            DependencyKind::Extract => "depends_extract",
            DependencyKind::Build => "depends_build",
            DependencyKind::Lib => "depends_lib",
            DependencyKind::Run => "depends_run",
            DependencyKind::Test => "depends_test",
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.attribute().trim_start_matches("depends_");
        write!(f, "{label}")
    }
}

/// A port and its index attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Port {
    name: String,
    attributes: BTreeMap<String, AttrValue>,
}

impl Port {
    pub fn new(name: impl Into<String>, attributes: BTreeMap<String, AttrValue>) -> Self {
        Self {
            name: name.into(),
            attributes,
        }
    }

    /// Name as spelled in the index
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Case-folded identity key
    pub fn key(&self) -> String {
        port_key(&self.name)
    }

    /// Raw attribute value
    pub fn get(&self, attribute: &str) -> Option<&AttrValue> {
        self.attributes.get(attribute)
    }

    /// All attributes in name order
    pub fn attributes(&self) -> &BTreeMap<String, AttrValue> {
        &self.attributes
    }

    /// Attribute rendered as display text
    pub fn text(&self, attribute: &str) -> Option<String> {
        self.attributes.get(attribute).map(AttrValue::to_text)
    }

    /// Attribute read as a word list, failing on a nested list
    pub fn words(&self, attribute: &str) -> CatalogResult<Vec<&str>> {
        match self.attributes.get(attribute) {
            Some(value) => value.words().map_err(|e| for_attribute(attribute, e)),
            None => Ok(Vec::new()),
        }
    }

    pub fn version(&self) -> Option<String> {
        self.text("version")
    }

    pub fn revision(&self) -> Option<String> {
        self.text("revision")
    }

    pub fn epoch(&self) -> Option<String> {
        self.text("epoch")
    }

    pub fn variants(&self) -> CatalogResult<Vec<&str>> {
        self.words("variants")
    }

    pub fn negated_variants(&self) -> CatalogResult<Vec<&str>> {
        self.words("negated_variants")
    }

    pub fn categories(&self) -> CatalogResult<Vec<&str>> {
        self.words("categories")
    }

    pub fn description(&self) -> Option<String> {
        self.text("description")
    }

    pub fn long_description(&self) -> Option<String> {
        self.text("long_description")
    }

    pub fn maintainers(&self) -> CatalogResult<Vec<&str>> {
        self.words("maintainers")
    }

    pub fn platforms(&self) -> CatalogResult<Vec<&str>> {
        self.words("platforms")
    }

    pub fn homepage(&self) -> Option<String> {
        self.text("homepage")
    }

    pub fn license(&self) -> Option<String> {
        self.text("license")
    }

    pub fn depends(&self, kind: DependencyKind) -> CatalogResult<Vec<&str>> {
        self.words(kind.attribute())
    }

    pub fn subports(&self) -> CatalogResult<Vec<&str>> {
        self.words("subports")
    }

    pub fn replaced_by(&self) -> Option<String> {
        self.text("replaced_by")
    }

    /// Name prefix before the first hyphen, when the name has one
    pub fn prefix(&self) -> Option<&str> {
        name_prefix(&self.name)
    }

    /// Version string compared against registry entries: `version[_revision]`
    pub fn candidate_version(&self) -> String {
        combined_version(
            &self.version().unwrap_or_default(),
            &self.revision().unwrap_or_default(),
            "",
            "",
        )
    }

    /// Every link this port points at: dependencies, subports and replacement.
    ///
    /// Subports and `replaced_by` name ports directly.
    pub fn links(&self) -> CatalogResult<Vec<Link>> {
        let mut links = Vec::new();

        for kind in DependencyKind::ALL {
            links.extend(self.depends(kind)?.into_iter().map(Link::parse));
        }
        links.extend(self.subports()?.into_iter().map(Link::port));
        if let Some(replacement) = self.replaced_by() {
            links.push(Link::port(&replacement));
        }

        Ok(links)
    }
}

/// Case-folded key used for every by-name lookup
pub fn port_key(name: &str) -> String {
    name.to_lowercase()
}

/// Prefix of a `letters-rest` name
pub fn name_prefix(name: &str) -> Option<&str> {
    NAME_PREFIX
        .captures(name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}
