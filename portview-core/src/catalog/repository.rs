//! Port repository
//!
//! Owns every port read from the index, the install state reconciled from
//! the registry, and two lookups derived from the ports: category members
//! and name-prefix groups. The derived lookups are rebuilt from the ports
//! after every load and are never edited directly.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::warn;

use super::parser::parse_index;
use super::port::{port_key, Port};
use crate::error::CatalogError;

/// Install state of one port as recorded by the registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PortState {
    /// Active versions, combined `version[_revision][;epoch][variants]`
    pub installed: Vec<String>,
    /// Versions that are built and staged but not active
    pub imaged: Vec<String>,
    /// Dependent ports, filled in only when the port is inspected
    pub dependents: Option<Vec<String>>,
    /// Disk usage, filled in only when the port is inspected
    pub space: Option<String>,
}

impl PortState {
    /// No installed and no imaged versions
    pub fn is_empty(&self) -> bool {
        self.installed.is_empty() && self.imaged.is_empty()
    }

    pub(crate) fn add_installed(&mut self, version: String) {
        if !self.installed.contains(&version) {
            self.installed.push(version);
        }
    }

    pub(crate) fn add_imaged(&mut self, version: String) {
        if !self.imaged.contains(&version) {
            self.imaged.push(version);
        }
    }
}

/// Ports, their state, and the category and prefix lookups
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Repository {
    ports: HashMap<String, Port>,
    states: HashMap<String, PortState>,
    categories: BTreeMap<String, BTreeSet<String>>,
    prefixes: BTreeMap<String, BTreeSet<String>>,
}

impl Repository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an index and add its ports.
    ///
    /// A port already present under the same (case-insensitive) name is
    /// replaced, so the index loaded last wins. Returns the skipped entries.
    pub fn load_index(&mut self, input: &[u8]) -> Vec<CatalogError> {
        let report = parse_index(input);

        for port in report.ports {
            self.ports.insert(port.key(), port);
        }
        self.rebuild_indices();

        report.errors
    }

    /// Drop every port and the derived lookups. Install state is kept.
    pub fn clear_ports(&mut self) {
        self.ports.clear();
        self.categories.clear();
        self.prefixes.clear();
    }

    fn rebuild_indices(&mut self) {
        self.categories.clear();
        self.prefixes.clear();

        for port in self.ports.values() {
            match port.categories() {
                Ok(categories) => {
                    for category in categories {
                        self.categories
                            .entry(category.to_string())
                            .or_default()
                            .insert(port.name().to_string());
                    }
                }
                Err(e) => warn!(port = port.name(), "Ignoring categories: {}", e),
            }

            if let Some(prefix) = port.prefix() {
                self.prefixes
                    .entry(prefix.to_string())
                    .or_default()
                    .insert(port.name().to_string());
            }
        }
    }

    /// Look up a port by name, ignoring case
    pub fn get(&self, name: &str) -> Option<&Port> {
        self.ports.get(&port_key(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ports.contains_key(&port_key(name))
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Port names sorted case-insensitively
    pub fn names(&self) -> Vec<&str> {
        let mut keys: Vec<&String> = self.ports.keys().collect();
        keys.sort();
        keys.into_iter()
            .filter_map(|key| self.ports.get(key).map(Port::name))
            .collect()
    }

    /// Category name to member port names, in category order
    pub fn categories(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.categories
    }

    pub fn category(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.categories.get(name)
    }

    /// Name prefix to member port names
    pub fn prefix_groups(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.prefixes
    }

    pub fn prefix_group(&self, prefix: &str) -> Option<&BTreeSet<String>> {
        self.prefixes.get(prefix)
    }

    /// Install state of a port, if the registry knows it
    pub fn state(&self, name: &str) -> Option<&PortState> {
        self.states.get(&port_key(name))
    }

    pub(crate) fn state_mut(&mut self, name: &str) -> &mut PortState {
        self.states.entry(port_key(name)).or_default()
    }

    /// Forget all install state. Returns how many ports held state.
    pub(crate) fn clear_states(&mut self) -> usize {
        let cleared = self.states.len();
        self.states.clear();
        cleared
    }

    /// Registry entries naming ports the index does not know, sorted
    pub fn orphaned(&self) -> Vec<&str> {
        let mut orphans: Vec<&str> = self
            .states
            .keys()
            .filter(|key| !self.ports.contains_key(*key))
            .map(String::as_str)
            .collect();
        orphans.sort_unstable();
        orphans
    }

    /// Store the result of an on-demand inspection of one port
    pub(crate) fn set_inspection(&mut self, name: &str, dependents: Vec<String>, space: String) {
        let state = self.state_mut(name);
        state.dependents = Some(dependents);
        state.space = Some(space);
    }

    /// Ports whose name or description contains `query`, ignoring case
    pub fn search(&self, query: &str) -> Vec<&Port> {
        let query = query.to_lowercase();
        let mut matches: Vec<&Port> = self
            .ports
            .values()
            .filter(|port| {
                port.name().to_lowercase().contains(&query)
                    || port
                        .description()
                        .is_some_and(|d| d.to_lowercase().contains(&query))
            })
            .collect();
        matches.sort_by_key(|port| port.key());
        matches
    }
}
