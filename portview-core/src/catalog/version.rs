//! Version comparison between the index and the registry
//!
//! Registry entries carry more than the index version: revision, epoch and
//! the active variants are appended (`1.3_1;2+universal`). The index side is
//! compared as a prefix of each registry entry, so an entry that merely adds
//! variants or an epoch still matches exactly.

use serde::Serialize;
use std::cmp::Ordering;

/// Outcome of comparing an index version against installed versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionMatch {
    /// Some entry equals the index version over its length
    Exact,
    /// No exact entry, but some entry sorts after the index version
    Newer,
    /// Every entry sorts before the index version
    Older,
    /// Nothing installed
    Absent,
}

impl VersionMatch {
    /// Whether the installed copy is current or ahead of the index
    pub fn is_current(&self) -> bool {
        matches!(self, VersionMatch::Exact | VersionMatch::Newer)
    }
}

/// Classify `candidate` against every entry in `installed`.
///
/// Each entry is compared case-insensitively over at most `candidate.len()`
/// bytes. Exact wins over Newer, Newer over Older; an empty list is Absent.
pub fn classify<S: AsRef<str>>(candidate: &str, installed: &[S]) -> VersionMatch {
    let mut result = VersionMatch::Absent;

    for entry in installed {
        match compare_prefix(candidate, entry.as_ref()) {
            Ordering::Equal => return VersionMatch::Exact,
            Ordering::Greater => result = VersionMatch::Newer,
            Ordering::Less => {
                if result == VersionMatch::Absent {
                    result = VersionMatch::Older;
                }
            }
        }
    }

    result
}

/// Compare an installed entry, truncated to the candidate's length, with the
/// candidate. `Greater` means the entry sorts after the candidate.
fn compare_prefix(candidate: &str, installed: &str) -> Ordering {
    let limit = candidate.len().min(installed.len());
    let entry = installed.as_bytes()[..limit]
        .iter()
        .map(u8::to_ascii_lowercase);
    let wanted = candidate.bytes().map(|b| b.to_ascii_lowercase());

    entry.cmp(wanted)
}

/// Build the combined version string used by the registry:
/// `version[_revision][;epoch][variants]`, dropping empty or zero parts.
pub fn combined_version(version: &str, revision: &str, epoch: &str, variants: &str) -> String {
    let mut combined = version.to_string();

    if is_significant(revision) {
        combined.push('_');
        combined.push_str(revision);
    }
    if is_significant(epoch) {
        combined.push(';');
        combined.push_str(epoch);
    }
    combined.push_str(variants.trim());

    combined
}

fn is_significant(part: &str) -> bool {
    let part = part.trim();
    !part.is_empty() && part != "0"
}
