//! Registry reconciliation
//!
//! The registry query returns one `|`-separated row per installed or imaged
//! version: `name|epoch|version|revision|state|variants`. Every pass starts
//! from a clean slate, so a port that disappeared from the registry loses its
//! state instead of keeping a stale version.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::repository::Repository;
use super::version::combined_version;

const FIELD_SEPARATOR: char = '|';
const FIELD_COUNT: usize = 6;

/// One row of the registry query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryRow {
    pub name: String,
    pub epoch: String,
    pub version: String,
    pub revision: String,
    pub state: String,
    pub variants: String,
}

impl RegistryRow {
    /// `version[_revision][;epoch][variants]`
    pub fn combined_version(&self) -> String {
        combined_version(&self.version, &self.revision, &self.epoch, &self.variants)
    }
}

/// Split the raw query output into rows, skipping malformed lines
pub fn parse_registry_rows(text: &str) -> Vec<RegistryRow> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(number, line)| {
            let fields: Vec<&str> = line.split(FIELD_SEPARATOR).map(str::trim).collect();
            match fields.as_slice() {
                [name, epoch, version, revision, state, variants] if !name.is_empty() => {
                    Some(RegistryRow {
                        name: name.to_string(),
                        epoch: epoch.to_string(),
                        version: version.to_string(),
                        revision: revision.to_string(),
                        state: state.to_string(),
                        variants: variants.to_string(),
                    })
                }
                _ => {
                    warn!(
                        line = number + 1,
                        "Skipping registry row with {} fields (expected {})",
                        fields.len(),
                        FIELD_COUNT
                    );
                    None
                }
            }
        })
        .collect()
}

/// State flag values that route a row to the installed or imaged list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryFlags {
    #[serde(default = "default_installed_flag")]
    pub installed: String,
    #[serde(default = "default_imaged_flag")]
    pub imaged: String,
}

fn default_installed_flag() -> String {
    "installed".to_string()
}

fn default_imaged_flag() -> String {
    "imaged".to_string()
}

impl Default for RegistryFlags {
    fn default() -> Self {
        Self {
            installed: default_installed_flag(),
            imaged: default_imaged_flag(),
        }
    }
}

/// Counts from one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    /// Ports that held state before the pass
    pub cleared: usize,
    pub installed: usize,
    pub imaged: usize,
    /// Rows with an unrecognized state flag
    pub skipped: usize,
}

/// Replace all install state in `repo` with what `rows` describe.
pub fn reconcile(repo: &mut Repository, rows: &[RegistryRow], flags: &RegistryFlags) -> ReconcileSummary {
    let mut summary = ReconcileSummary {
        cleared: repo.clear_states(),
        ..Default::default()
    };

    for row in rows {
        let version = row.combined_version();

        if row.state.eq_ignore_ascii_case(&flags.installed) {
            repo.state_mut(&row.name).add_installed(version);
            summary.installed += 1;
        } else if row.state.eq_ignore_ascii_case(&flags.imaged) {
            repo.state_mut(&row.name).add_imaged(version);
            summary.imaged += 1;
        } else {
            warn!(
                port = %row.name,
                state = %row.state,
                "Skipping registry row with unrecognized state"
            );
            summary.skipped += 1;
        }
    }

    let orphans = repo.orphaned().len();
    if orphans > 0 {
        debug!("{} registry port(s) are not in the index", orphans);
    }
    info!(
        installed = summary.installed,
        imaged = summary.imaged,
        cleared = summary.cleared,
        "Reconciled registry state"
    );

    summary
}
