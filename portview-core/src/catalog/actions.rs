//! Batched port actions
//!
//! Rows are marked one at a time; `plan` turns the marks into one request
//! per action for the package manager to run. Nothing here runs anything.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::grouping::InstallStatus;
use super::port::port_key;
use crate::error::{CatalogError, CatalogResult};

/// Built-in ports that must never be uninstalled
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtectedPorts(BTreeSet<String>);

impl ProtectedPorts {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(names.into_iter().map(|n| port_key(n.as_ref())).collect())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(&port_key(name))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Something the package manager can be asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    Install,
    Upgrade,
    Uninstall,
    UninstallInactive,
}

impl Action {
    /// Order in which requests are emitted
    pub const ALL: [Action; 4] = [
        Action::Install,
        Action::Upgrade,
        Action::Uninstall,
        Action::UninstallInactive,
    ];

    /// Whether the action removes software
    pub fn is_removal(&self) -> bool {
        matches!(self, Action::Uninstall | Action::UninstallInactive)
    }

    /// The action a user most likely wants for a port in `status`
    pub fn suggested_for(status: InstallStatus) -> Self {
        match status {
            InstallStatus::NotInstalled => Action::Install,
            InstallStatus::Outdated => Action::Upgrade,
            InstallStatus::Inactive => Action::UninstallInactive,
            InstallStatus::Installed => Action::Uninstall,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Action::Install => "install",
            Action::Upgrade => "upgrade",
            Action::Uninstall => "uninstall",
            Action::UninstallInactive => "uninstall-inactive",
        };
        f.write_str(label)
    }
}

/// One batch handed to the package manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionRequest {
    pub action: Action,
    pub ports: Vec<String>,
}

/// Per-port marks collected before a batch is planned
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkSet {
    marks: BTreeMap<String, (String, Action)>,
}

impl MarkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a port, replacing any earlier mark on it
    pub fn mark(&mut self, name: &str, action: Action) {
        self.marks
            .insert(port_key(name), (name.to_string(), action));
    }

    pub fn unmark(&mut self, name: &str) -> Option<Action> {
        self.marks.remove(&port_key(name)).map(|(_, action)| action)
    }

    pub fn clear(&mut self) {
        self.marks.clear();
    }

    pub fn get(&self, name: &str) -> Option<Action> {
        self.marks.get(&port_key(name)).map(|(_, action)| *action)
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    /// Names marked with `action`, in name order
    pub fn marked(&self, action: Action) -> Vec<&str> {
        self.marks
            .values()
            .filter(|(_, marked)| *marked == action)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Turn the marks into requests, one per action that has marks.
    ///
    /// Fails without producing any request when a removal names a protected
    /// port, even if other ports in the batch are fine.
    pub fn plan(&self, protected: &ProtectedPorts) -> CatalogResult<Vec<ActionRequest>> {
        let rejected: Vec<String> = self
            .marks
            .values()
            .filter(|(name, action)| action.is_removal() && protected.contains(name))
            .map(|(name, _)| name.clone())
            .collect();

        if !rejected.is_empty() {
            tracing::warn!(ports = ?rejected, "Rejected removal of protected ports");
            return Err(CatalogError::ProtectedPackage { names: rejected });
        }

        Ok(Action::ALL
            .into_iter()
            .filter_map(|action| {
                let ports: Vec<String> =
                    self.marked(action).into_iter().map(str::to_string).collect();
                (!ports.is_empty()).then_some(ActionRequest { action, ports })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plan_groups_by_action() {
        let mut marks = MarkSet::new();
        marks.mark("zlib", Action::Upgrade);
        marks.mark("curl", Action::Install);
        marks.mark("wget", Action::Install);
        marks.mark("xz", Action::UninstallInactive);

        let plan = marks.plan(&ProtectedPorts::default()).unwrap();

        assert_eq!(
            plan,
            vec![
                ActionRequest {
                    action: Action::Install,
                    ports: vec!["curl".to_string(), "wget".to_string()],
                },
                ActionRequest {
                    action: Action::Upgrade,
                    ports: vec!["zlib".to_string()],
                },
                ActionRequest {
                    action: Action::UninstallInactive,
                    ports: vec!["xz".to_string()],
                },
            ]
        );
    }

    #[test]
    fn test_protected_uninstall_rejects_whole_batch() {
        let protected = ProtectedPorts::new(["gettext"]);
        let mut marks = MarkSet::new();
        marks.mark("curl", Action::Uninstall);
        marks.mark("GetText", Action::Uninstall);
        marks.mark("zlib", Action::Install);

        let err = marks.plan(&protected).unwrap_err();
        assert_eq!(
            err,
            CatalogError::ProtectedPackage {
                names: vec!["GetText".to_string()],
            }
        );
    }

    #[test]
    fn test_protected_port_may_be_upgraded() {
        let protected = ProtectedPorts::new(["gettext"]);
        let mut marks = MarkSet::new();
        marks.mark("gettext", Action::Upgrade);

        let plan = marks.plan(&protected).unwrap();
        assert_eq!(plan[0].ports, vec!["gettext"]);
    }

    #[test]
    fn test_remark_replaces() {
        let mut marks = MarkSet::new();
        marks.mark("zlib", Action::Install);
        marks.mark("ZLIB", Action::Upgrade);

        assert_eq!(marks.len(), 1);
        assert_eq!(marks.get("zlib"), Some(Action::Upgrade));
        assert_eq!(marks.unmark("Zlib"), Some(Action::Upgrade));
        assert!(marks.is_empty());
        assert!(marks.plan(&ProtectedPorts::default()).unwrap().is_empty());
    }

    #[test]
    fn test_suggested_actions() {
        assert_eq!(Action::suggested_for(InstallStatus::NotInstalled), Action::Install);
        assert_eq!(Action::suggested_for(InstallStatus::Outdated), Action::Upgrade);
        assert_eq!(
            Action::suggested_for(InstallStatus::Inactive),
            Action::UninstallInactive
        );
        assert_eq!(Action::UninstallInactive.to_string(), "uninstall-inactive");
    }
}
