//! Catalog error types
//!
//! None of these are fatal to the process. Parse and source errors are
//! collected and reported while the catalog keeps serving its last good
//! state; protected-package and lookup errors are rejections handed back to
//! the caller.

use thiserror::Error;

/// Errors raised by the catalog engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// A single index entry could not be parsed and was skipped
    #[error("Skipped index entry '{name}' at byte {offset}: {reason}")]
    ParseEntry {
        name: String,
        offset: usize,
        reason: String,
    },

    /// An index file or the registry could not be read
    #[error("Source '{source_name}' is unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    /// An uninstall was requested for one or more built-in ports
    #[error("Refusing to uninstall protected port(s): {}", names.join(", "))]
    ProtectedPackage { names: Vec<String> },

    /// An attribute value did not have the requested shape
    #[error("Attribute '{attribute}' is a {found}, expected a {expected}")]
    AttributeType {
        attribute: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A dependency or link spec with no known link type
    #[error("No link handler for '{text}'")]
    UnknownLink { text: String },

    /// Lookup of a port the repository does not know
    #[error("Unknown port: {name}")]
    UnknownPort { name: String },

    /// Lookup of a category with no members
    #[error("Unknown category: {name}")]
    UnknownCategory { name: String },

    /// Lookup of a name prefix no port uses
    #[error("Unknown name prefix: {name}")]
    UnknownPrefix { name: String },
}

impl CatalogError {
    pub(crate) fn source_unavailable(source_name: &str, reason: impl ToString) -> Self {
        CatalogError::SourceUnavailable {
            source_name: source_name.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error is a skip-and-continue condition rather than a rejection
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CatalogError::ParseEntry { .. }
                | CatalogError::SourceUnavailable { .. }
                | CatalogError::UnknownLink { .. }
        )
    }
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;
