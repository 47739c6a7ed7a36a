//! Classification and grouping
//!
//! Every port lands in exactly one status bucket. Inactive wins over the
//! installed/outdated distinction, so a port with an imaged copy is listed
//! as inactive even when its active copy is also behind the index.
//!
//! The outline is built in levels: four status headers plus a
//! "Categorized" header at the root, one header per category below that,
//! four status headers per category, then the port rows. Each level is
//! computed on request from a [`GroupRef`], nothing below a header is built
//! until it is expanded.

use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use tracing::debug;

use super::actions::ProtectedPorts;
use super::port::{port_key, Port};
use super::repository::{PortState, Repository};
use super::version::{classify, VersionMatch};
use crate::error::{CatalogError, CatalogResult};

/// Label of the root header that holds the category tree
pub const CATEGORIZED_LABEL: &str = "Categorized";

/// Display bucket of a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstallStatus {
    Outdated,
    Inactive,
    Installed,
    NotInstalled,
}

impl InstallStatus {
    /// Buckets in display order
    pub const ALL: [InstallStatus; 4] = [
        InstallStatus::Outdated,
        InstallStatus::Inactive,
        InstallStatus::Installed,
        InstallStatus::NotInstalled,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            InstallStatus::Outdated => "Outdated",
            InstallStatus::Inactive => "Inactive",
            InstallStatus::Installed => "Installed",
            InstallStatus::NotInstalled => "Not Installed",
        }
    }
}

impl fmt::Display for InstallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classify a port from its index version and registry state
pub fn classify_port(port: &Port, state: Option<&PortState>) -> InstallStatus {
    let Some(state) = state else {
        return InstallStatus::NotInstalled;
    };
    let candidate = port.candidate_version();

    if classify(&candidate, &state.imaged) != VersionMatch::Absent {
        return InstallStatus::Inactive;
    }

    match classify(&candidate, &state.installed) {
        VersionMatch::Exact | VersionMatch::Newer => InstallStatus::Installed,
        VersionMatch::Older => InstallStatus::Outdated,
        VersionMatch::Absent => InstallStatus::NotInstalled,
    }
}

/// One port line of the outline
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortRow {
    pub id: String,
    pub version: String,
    pub description: String,
    /// Built-in port that must never be uninstalled
    pub builtin: bool,
    pub status: InstallStatus,
}

/// Row field used for ordering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortColumn {
    #[default]
    Name,
    Version,
    Description,
}

impl SortColumn {
    fn select<'r>(&self, row: &'r PortRow) -> &'r str {
        match self {
            SortColumn::Name => &row.id,
            SortColumn::Version => &row.version,
            SortColumn::Description => &row.description,
        }
    }
}

/// The single ordering applied to every bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    #[serde(default)]
    pub column: SortColumn,
    #[serde(default)]
    pub descending: bool,
}

impl SortKey {
    pub fn new(column: SortColumn, descending: bool) -> Self {
        Self { column, descending }
    }

    /// Same column flips the direction, a new column starts ascending
    pub fn toggle(&mut self, column: SortColumn) {
        if self.column == column {
            self.descending = !self.descending;
        } else {
            self.column = column;
            self.descending = false;
        }
    }

    fn compare(&self, a: &PortRow, b: &PortRow) -> Ordering {
        let (a, b) = (self.column.select(a), self.column.select(b));
        a.to_lowercase()
            .cmp(&b.to_lowercase())
            .then_with(|| a.cmp(b))
    }

    /// Stable sort; descending is the exact reverse of ascending
    pub fn sort(&self, rows: &mut [PortRow]) {
        rows.sort_by(|a, b| self.compare(a, b));
        if self.descending {
            rows.reverse();
        }
    }
}

/// Rows split by status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusBuckets {
    pub outdated: Vec<PortRow>,
    pub inactive: Vec<PortRow>,
    pub installed: Vec<PortRow>,
    pub not_installed: Vec<PortRow>,
}

impl StatusBuckets {
    pub fn bucket(&self, status: InstallStatus) -> &[PortRow] {
        match status {
            InstallStatus::Outdated => &self.outdated,
            InstallStatus::Inactive => &self.inactive,
            InstallStatus::Installed => &self.installed,
            InstallStatus::NotInstalled => &self.not_installed,
        }
    }

    fn bucket_mut(&mut self, status: InstallStatus) -> &mut Vec<PortRow> {
        match status {
            InstallStatus::Outdated => &mut self.outdated,
            InstallStatus::Inactive => &mut self.inactive,
            InstallStatus::Installed => &mut self.installed,
            InstallStatus::NotInstalled => &mut self.not_installed,
        }
    }

    /// Total rows across all buckets
    pub fn len(&self) -> usize {
        InstallStatus::ALL.iter().map(|s| self.bucket(*s).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bucket holding the named port
    pub fn status_of(&self, name: &str) -> Option<InstallStatus> {
        let key = port_key(name);
        InstallStatus::ALL.into_iter().find(|status| {
            self.bucket(*status)
                .iter()
                .any(|row| port_key(&row.id) == key)
        })
    }

    /// Buckets in display order
    pub fn iter(&self) -> impl Iterator<Item = (InstallStatus, &[PortRow])> {
        InstallStatus::ALL
            .into_iter()
            .map(move |status| (status, self.bucket(status)))
    }
}

/// Outline depth, used by renderers for indentation and folding.
///
/// Serialized as the numeric depth, 0 for the root through 3 for rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GroupLevel {
    Root = 0,
    Category = 1,
    CategoryStatus = 2,
    Leaf = 3,
}

impl GroupLevel {
    pub fn depth(&self) -> u8 {
        *self as u8
    }
}

impl Serialize for GroupLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.depth())
    }
}

/// What a header expands into
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupRef {
    /// Rows of one status over all ports
    Status(InstallStatus),
    /// One header per category
    Categorized,
    /// Status headers for one category
    Category(String),
    /// Rows of one status within one category
    CategoryStatus {
        category: String,
        status: InstallStatus,
    },
}

/// A foldable header line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupHeader {
    pub label: String,
    pub member_count: usize,
    pub level: GroupLevel,
    pub child: GroupRef,
}

/// One line of the outline
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeNode {
    Header(GroupHeader),
    Row(PortRow),
}

impl TreeNode {
    pub fn level(&self) -> GroupLevel {
        match self {
            TreeNode::Header(header) => header.level,
            TreeNode::Row(_) => GroupLevel::Leaf,
        }
    }
}

/// Builds buckets and outline levels over a repository
pub struct GroupingEngine<'a> {
    repo: &'a Repository,
    protected: &'a ProtectedPorts,
    sort: SortKey,
}

impl<'a> GroupingEngine<'a> {
    pub fn new(repo: &'a Repository, protected: &'a ProtectedPorts, sort: SortKey) -> Self {
        Self {
            repo,
            protected,
            sort,
        }
    }

    pub fn sort_key(&self) -> SortKey {
        self.sort
    }

    pub fn toggle_sort(&mut self, column: SortColumn) {
        self.sort.toggle(column);
    }

    /// Status of a single port
    pub fn status(&self, port: &Port) -> InstallStatus {
        classify_port(port, self.repo.state(port.name()))
    }

    fn row(&self, port: &Port) -> PortRow {
        PortRow {
            id: port.name().to_string(),
            version: port.candidate_version(),
            description: port.description().unwrap_or_default(),
            builtin: self.protected.contains(port.name()),
            status: self.status(port),
        }
    }

    fn collect<'p>(&self, ports: impl IntoIterator<Item = &'p Port>) -> StatusBuckets {
        let mut buckets = StatusBuckets::default();
        for port in ports {
            let row = self.row(port);
            buckets.bucket_mut(row.status).push(row);
        }
        for status in InstallStatus::ALL {
            self.sort.sort(buckets.bucket_mut(status));
        }
        buckets
    }

    /// Buckets over every port in the repository
    pub fn buckets(&self) -> StatusBuckets {
        let ports = self
            .repo
            .names()
            .into_iter()
            .filter_map(|name| self.repo.get(name));
        self.collect(ports)
    }

    /// Buckets over an explicit set of port names; unknown names are ignored
    pub fn buckets_for<'n>(&self, names: impl IntoIterator<Item = &'n str>) -> StatusBuckets {
        let ports = names.into_iter().filter_map(|name| {
            let port = self.repo.get(name);
            if port.is_none() {
                debug!(port = name, "Ignoring unknown port in grouping");
            }
            port
        });
        self.collect(ports)
    }

    /// Buckets for the members of one category
    pub fn compute_subgroup(&self, category: &str) -> CatalogResult<StatusBuckets> {
        let members = self
            .repo
            .category(category)
            .ok_or_else(|| CatalogError::UnknownCategory {
                name: category.to_string(),
            })?;
        Ok(self.buckets_for(members.iter().map(String::as_str)))
    }

    /// Buckets for the ports sharing a name prefix
    pub fn compute_prefix_subgroup(&self, prefix: &str) -> CatalogResult<StatusBuckets> {
        let members = self
            .repo
            .prefix_group(prefix)
            .ok_or_else(|| CatalogError::UnknownPrefix {
                name: prefix.to_string(),
            })?;
        Ok(self.buckets_for(members.iter().map(String::as_str)))
    }

    /// One header per category, alphabetical, carrying the member count
    pub fn category_headers(&self) -> Vec<GroupHeader> {
        self.repo
            .categories()
            .iter()
            .map(|(category, members)| GroupHeader {
                label: category.clone(),
                member_count: members.len(),
                level: GroupLevel::Category,
                child: GroupRef::Category(category.clone()),
            })
            .collect()
    }

    /// Root level: the four status headers and the "Categorized" header
    pub fn outline(&self) -> Vec<TreeNode> {
        let buckets = self.buckets();

        let mut nodes: Vec<TreeNode> = buckets
            .iter()
            .map(|(status, rows)| {
                TreeNode::Header(GroupHeader {
                    label: status.label().to_string(),
                    member_count: rows.len(),
                    level: GroupLevel::Root,
                    child: GroupRef::Status(status),
                })
            })
            .collect();

        nodes.push(TreeNode::Header(GroupHeader {
            label: CATEGORIZED_LABEL.to_string(),
            member_count: buckets.not_installed.len() + buckets.installed.len(),
            level: GroupLevel::Root,
            child: GroupRef::Categorized,
        }));

        nodes
    }

    /// The nodes directly below a header
    pub fn expand(&self, group: &GroupRef) -> CatalogResult<Vec<TreeNode>> {
        let nodes = match group {
            GroupRef::Status(status) => rows(self.buckets().bucket(*status)),
            GroupRef::Categorized => self
                .category_headers()
                .into_iter()
                .map(TreeNode::Header)
                .collect(),
            GroupRef::Category(category) => self
                .compute_subgroup(category)?
                .iter()
                .map(|(status, rows)| {
                    TreeNode::Header(GroupHeader {
                        label: status.label().to_string(),
                        member_count: rows.len(),
                        level: GroupLevel::CategoryStatus,
                        child: GroupRef::CategoryStatus {
                            category: category.clone(),
                            status,
                        },
                    })
                })
                .collect(),
            GroupRef::CategoryStatus { category, status } => {
                rows(self.compute_subgroup(category)?.bucket(*status))
            }
        };
        Ok(nodes)
    }
}

fn rows(rows: &[PortRow]) -> Vec<TreeNode> {
    rows.iter().cloned().map(TreeNode::Row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::reconcile::{reconcile, RegistryFlags, RegistryRow};
    use pretty_assertions::assert_eq;

    fn entry(name: &str, body: &str) -> String {
        format!("{name} {}\n{body}", body.len())
    }

    fn installed(name: &str, version: &str, state: &str) -> RegistryRow {
        RegistryRow {
            name: name.to_string(),
            epoch: "0".to_string(),
            version: version.to_string(),
            revision: "0".to_string(),
            state: state.to_string(),
            variants: String::new(),
        }
    }

    /// zlib current, xz outdated, curl inactive, bzip2 absent, gettext newer
    fn fixture() -> Repository {
        let mut index = String::new();
        index.push_str(&entry("zlib", "categories archivers description {Compression library} version 1.3.1"));
        index.push_str(&entry("xz", "categories {archivers sysutils} description {LZMA tools} version 5.6.0"));
        index.push_str(&entry("curl", "categories net description {Transfer tool} version 8.6.0"));
        index.push_str(&entry("bzip2", "categories archivers description {Block sorting} version 1.0.8"));
        index.push_str(&entry("gettext", "categories devel description {GNU i18n} version 0.22"));

        let mut repo = Repository::new();
        repo.load_index(index.as_bytes());
        reconcile(
            &mut repo,
            &[
                installed("zlib", "1.3.1", "installed"),
                installed("xz", "5.4.6", "installed"),
                installed("curl", "8.6.0", "installed"),
                installed("curl", "8.5.0", "imaged"),
                installed("gettext", "0.23", "installed"),
            ],
            &RegistryFlags::default(),
        );
        repo
    }

    fn ids(rows: &[PortRow]) -> Vec<&str> {
        rows.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_buckets() {
        let repo = fixture();
        let protected = ProtectedPorts::default();
        let engine = GroupingEngine::new(&repo, &protected, SortKey::default());
        let buckets = engine.buckets();

        assert_eq!(ids(&buckets.outdated), vec!["xz"]);
        assert_eq!(ids(&buckets.inactive), vec!["curl"]);
        assert_eq!(ids(&buckets.installed), vec!["gettext", "zlib"]);
        assert_eq!(ids(&buckets.not_installed), vec!["bzip2"]);
        assert_eq!(buckets.len(), repo.len());
    }

    #[test]
    fn test_imaged_outdated_port_is_inactive() {
        let mut repo = Repository::new();
        repo.load_index(entry("xz", "version 5.6.0").as_bytes());
        reconcile(
            &mut repo,
            &[
                installed("xz", "5.4.6", "installed"),
                installed("xz", "5.4.5", "imaged"),
            ],
            &RegistryFlags::default(),
        );
        let port = repo.get("xz").unwrap();
        assert_eq!(
            classify_port(port, repo.state("xz")),
            InstallStatus::Inactive
        );
    }

    #[test]
    fn test_sort_toggle_reverses() {
        let mut repo = Repository::new();
        let index = [
            entry("lz4", "description {Fast compression} version 1.9.4"),
            entry("Brotli", "description {Generic compression} version 1.1.0"),
            entry("zstd", "description {Zstandard} version 1.5.6"),
        ]
        .concat();
        repo.load_index(index.as_bytes());

        let protected = ProtectedPorts::default();
        let mut engine = GroupingEngine::new(&repo, &protected, SortKey::default());

        let ascending = engine.buckets().not_installed;
        assert_eq!(ids(&ascending), vec!["Brotli", "lz4", "zstd"]);

        engine.toggle_sort(SortColumn::Name);
        assert!(engine.sort_key().descending);
        let descending = engine.buckets().not_installed;

        let mut reversed = ascending.clone();
        reversed.reverse();
        assert_eq!(descending, reversed);

        engine.toggle_sort(SortColumn::Name);
        assert_eq!(engine.buckets().not_installed, ascending);
    }

    #[test]
    fn test_toggle_new_column_resets_ascending() {
        let mut key = SortKey::new(SortColumn::Name, true);
        key.toggle(SortColumn::Version);
        assert_eq!(key, SortKey::new(SortColumn::Version, false));
        key.toggle(SortColumn::Version);
        assert!(key.descending);
    }

    #[test]
    fn test_sort_by_description() {
        let repo = fixture();
        let protected = ProtectedPorts::default();
        let engine = GroupingEngine::new(
            &repo,
            &protected,
            SortKey::new(SortColumn::Description, false),
        );
        let buckets = engine.buckets_for(["zlib", "bzip2"]);
        assert_eq!(ids(&buckets.not_installed), vec!["bzip2"]);

        let mut rows = engine.buckets().installed;
        engine.sort_key().sort(&mut rows);
        // "Compression library" < "GNU i18n"
        assert_eq!(ids(&rows), vec!["zlib", "gettext"]);
    }

    #[test]
    fn test_outline_root() {
        let repo = fixture();
        let protected = ProtectedPorts::default();
        let engine = GroupingEngine::new(&repo, &protected, SortKey::default());

        let outline = engine.outline();
        let summary: Vec<(String, usize)> = outline
            .iter()
            .map(|node| match node {
                TreeNode::Header(h) => (h.label.clone(), h.member_count),
                TreeNode::Row(r) => (r.id.clone(), 0),
            })
            .collect();

        assert_eq!(
            summary,
            vec![
                ("Outdated".to_string(), 1),
                ("Inactive".to_string(), 1),
                ("Installed".to_string(), 2),
                ("Not Installed".to_string(), 1),
                ("Categorized".to_string(), 3),
            ]
        );
        assert!(outline.iter().all(|n| n.level() == GroupLevel::Root));
    }

    #[test]
    fn test_category_headers_and_expansion() {
        let repo = fixture();
        let protected = ProtectedPorts::default();
        let engine = GroupingEngine::new(&repo, &protected, SortKey::default());

        let headers = engine.category_headers();
        let labels: Vec<(&str, usize)> = headers
            .iter()
            .map(|h| (h.label.as_str(), h.member_count))
            .collect();
        assert_eq!(
            labels,
            vec![("archivers", 3), ("devel", 1), ("net", 1), ("sysutils", 1)]
        );

        let level2 = engine
            .expand(&GroupRef::Category("archivers".to_string()))
            .unwrap();
        assert_eq!(level2.len(), 4);
        assert!(level2.iter().all(|n| n.level() == GroupLevel::CategoryStatus));

        let leaves = engine
            .expand(&GroupRef::CategoryStatus {
                category: "archivers".to_string(),
                status: InstallStatus::Installed,
            })
            .unwrap();
        assert_eq!(leaves.len(), 1);
        assert!(matches!(&leaves[0], TreeNode::Row(row) if row.id == "zlib"));
        assert_eq!(leaves[0].level(), GroupLevel::Leaf);
    }

    #[test]
    fn test_subgroup_matches_category_members() {
        let repo = fixture();
        let protected = ProtectedPorts::default();
        let engine = GroupingEngine::new(&repo, &protected, SortKey::default());

        let archivers = engine.compute_subgroup("archivers").unwrap();
        assert_eq!(archivers.len(), 3);
        assert_eq!(archivers.status_of("xz"), Some(InstallStatus::Outdated));
        assert_eq!(archivers.status_of("curl"), None);

        assert!(matches!(
            engine.compute_subgroup("nope"),
            Err(CatalogError::UnknownCategory { .. })
        ));
    }

    #[test]
    fn test_builtin_flag_carried_to_rows() {
        let repo = fixture();
        let protected = ProtectedPorts::new(["GETTEXT"]);
        let engine = GroupingEngine::new(&repo, &protected, SortKey::default());

        let buckets = engine.buckets();
        let gettext = buckets.installed.iter().find(|r| r.id == "gettext").unwrap();
        assert!(gettext.builtin);
        assert!(buckets.installed.iter().filter(|r| r.id != "gettext").all(|r| !r.builtin));
    }

    #[test]
    fn test_prefix_subgroup() {
        let mut repo = fixture();
        let index = [
            entry("py-numpy", "version 2.0.1"),
            entry("py-scipy", "version 1.14.0"),
        ]
        .concat();
        repo.load_index(index.as_bytes());
        let protected = ProtectedPorts::default();
        let engine = GroupingEngine::new(&repo, &protected, SortKey::default());

        let py = engine.compute_prefix_subgroup("py").unwrap();
        assert_eq!(ids(&py.not_installed), vec!["py-numpy", "py-scipy"]);
        assert_eq!(py.len(), 2);

        assert_eq!(
            engine.compute_prefix_subgroup("php").unwrap_err(),
            CatalogError::UnknownPrefix {
                name: "php".to_string()
            }
        );
    }

    #[test]
    fn test_group_level_serializes_as_depth() {
        let header = GroupHeader {
            label: "archivers".to_string(),
            member_count: 3,
            level: GroupLevel::Category,
            child: GroupRef::Category("archivers".to_string()),
        };
        let json = serde_json::to_value(&header).unwrap();
        assert_eq!(json["level"], serde_json::json!(1));
        assert_eq!(
            serde_json::to_value(GroupLevel::Leaf).unwrap(),
            serde_json::json!(3)
        );
    }

    #[test]
    fn test_status_of_folds_non_ascii_names() {
        let mut repo = Repository::new();
        repo.load_index(entry("Émacs-app", "version 29.4").as_bytes());
        let protected = ProtectedPorts::default();
        let engine = GroupingEngine::new(&repo, &protected, SortKey::default());

        let buckets = engine.buckets();
        assert_eq!(buckets.status_of("émacs-app"), Some(InstallStatus::NotInstalled));
        assert_eq!(buckets.status_of("ÉMACS-APP"), Some(InstallStatus::NotInstalled));
    }

    #[test]
    fn test_classification_is_deterministic() {
        let repo = fixture();
        let protected = ProtectedPorts::default();
        let engine = GroupingEngine::new(&repo, &protected, SortKey::default());
        assert_eq!(engine.buckets(), engine.buckets());
    }
}
