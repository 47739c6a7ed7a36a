//! Port catalog - index parsing, install state and grouping
//!
//! This module turns the package manager's index files and installation
//! registry into a queryable catalog.
//!
//! # Overview
//!
//! The catalog lets callers:
//! - Parse port indexes into attribute maps
//! - Reconcile installed and imaged versions from the registry
//! - Classify every port as outdated, inactive, installed or not installed
//! - Group ports by status and category for display
//! - Plan batched install/upgrade/uninstall requests
//!
//! # Architecture
//!
//! ```text
//! PortIndex files          registry.db
//!     │                        │
//!     ▼                        ▼
//! parser::parse_index    reconcile::reconcile
//!     │                        │
//!     └──────► Repository ◄────┘
//!                  │
//!                  ▼
//!           GroupingEngine      ← status buckets, outline
//!                  │
//!                  ▼
//!              MarkSet          ← action requests
//! ```
//!
//! `refresh::Catalog` owns the repository and rebuilds it only when a
//! source's modification time moves.

mod actions;
mod grouping;
mod link;
mod parser;
mod port;
mod reconcile;
mod refresh;
mod repository;
mod sources;
mod value;
mod version;

pub use actions::{Action, ActionRequest, MarkSet, ProtectedPorts};
pub use grouping::{
    classify_port, GroupHeader, GroupLevel, GroupRef, GroupingEngine, InstallStatus, PortRow,
    SortColumn, SortKey, StatusBuckets, TreeNode, CATEGORIZED_LABEL,
};
pub use link::{Link, LinkKind};
pub use parser::{parse_index, ParseReport};
pub use port::{name_prefix, port_key, DependencyKind, Port};
pub use reconcile::{parse_registry_rows, reconcile, ReconcileSummary, RegistryFlags, RegistryRow};
pub use refresh::{Catalog, RefreshReport};
pub use repository::{PortState, Repository};
pub use sources::{
    parse_dependents, parse_space, FileIndexSource, IndexSource, PortCommand, PortInspector,
    RegistrySource, SqliteRegistry, REGISTRY_QUERY,
};
pub use value::AttrValue;
pub use version::{classify, combined_version, VersionMatch};
