//! Portview configuration
//!
//! Loaded from `config.yaml` in the platform config directory unless a path
//! is given explicitly. Every field has a default, so a missing file or a
//! partial one is fine.
//!
//! ```yaml
//! indexes:
//!   - path: /opt/local/var/macports/sources/rsync.macports.org/macports/release/tarballs/ports/PortIndex
//!   - path: ~/Library/Application Support/portview/PortIndex
//!     optional: true
//! registry: /opt/local/var/macports/registry/registry.db
//! protected: [gettext, libiconv, ncurses]
//! sort:
//!   column: version
//!   descending: true
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::catalog::{
    Catalog, FileIndexSource, IndexSource, PortCommand, ProtectedPorts, RegistryFlags,
    SortKey, SqliteRegistry,
};

/// Config file name inside the config directory
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Index shipped with the system ports tree
pub const DEFAULT_SYSTEM_INDEX: &str =
    "/opt/local/var/macports/sources/rsync.macports.org/macports/release/tarballs/ports/PortIndex";

/// Installation registry database
pub const DEFAULT_REGISTRY: &str = "/opt/local/var/macports/registry/registry.db";

pub const DEFAULT_SQLITE: &str = "sqlite3";
pub const DEFAULT_PORT: &str = "port";

/// One index file, parsed in list order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexLocation {
    pub path: PathBuf,

    /// Skip silently when the file does not exist
    #[serde(default)]
    pub optional: bool,
}

impl IndexLocation {
    fn source(&self) -> FileIndexSource {
        if self.optional {
            FileIndexSource::optional(&self.path)
        } else {
            FileIndexSource::new(&self.path)
        }
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortviewConfig {
    /// Index files, system first and user overlay last
    pub indexes: Vec<IndexLocation>,

    /// Registry database path
    pub registry: PathBuf,

    /// SQL client used to query the registry
    pub sqlite: String,

    /// Package-management executable used for inspection
    pub port: String,

    /// Built-in ports that may not be uninstalled
    pub protected: Vec<String>,

    pub registry_flags: RegistryFlags,

    pub sort: SortKey,
}

impl Default for PortviewConfig {
    fn default() -> Self {
        let mut indexes = vec![IndexLocation {
            path: PathBuf::from(DEFAULT_SYSTEM_INDEX),
            optional: false,
        }];
        if let Some(data_dir) = data_dir() {
            indexes.push(IndexLocation {
                path: data_dir.join("PortIndex"),
                optional: true,
            });
        }

        Self {
            indexes,
            registry: PathBuf::from(DEFAULT_REGISTRY),
            sqlite: DEFAULT_SQLITE.to_string(),
            port: DEFAULT_PORT.to_string(),
            protected: Vec::new(),
            registry_flags: RegistryFlags::default(),
            sort: SortKey::default(),
        }
    }
}

impl PortviewConfig {
    /// Load from `path` if given, else from the default location
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => match default_config_path() {
                Some(path) => Self::load_from_path(&path),
                None => {
                    debug!("No config directory available, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    /// Load from a specific file; a missing file yields the defaults
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Self = serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;

        debug!(
            "Loaded config from {} ({} index file(s))",
            path.display(),
            config.indexes.len()
        );
        Ok(config)
    }

    /// Write the config as YAML, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_yaml_ng::to_string(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))
    }

    pub fn protected_ports(&self) -> ProtectedPorts {
        ProtectedPorts::new(&self.protected)
    }

    pub fn index_sources(&self) -> Vec<FileIndexSource> {
        self.indexes.iter().map(IndexLocation::source).collect()
    }

    pub fn registry_source(&self) -> SqliteRegistry {
        SqliteRegistry::new(&self.registry, &self.sqlite)
    }

    pub fn inspector(&self) -> PortCommand {
        PortCommand::new(&self.port)
    }

    /// A catalog wired to the configured files and executables
    pub fn build_catalog(&self) -> Catalog {
        let indexes = self
            .index_sources()
            .into_iter()
            .map(|source| Box::new(source) as Box<dyn IndexSource>)
            .collect();

        Catalog::new(
            indexes,
            Some(Box::new(self.registry_source())),
            self.registry_flags.clone(),
        )
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "portview")
}

/// `config.yaml` in the platform config directory
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs()
        .map(|dirs| dirs.config_dir().to_path_buf())
        .or_else(|| dirs::config_dir().map(|d| d.join("portview")))
        .map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Where the user overlay index lives by default
pub fn data_dir() -> Option<PathBuf> {
    project_dirs()
        .map(|dirs| dirs.data_dir().to_path_buf())
        .or_else(|| dirs::data_dir().map(|d| d.join("portview")))
}
