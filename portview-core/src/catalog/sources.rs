//! Where index text, registry rows and per-port details come from
//!
//! The catalog only talks to these traits. The file and command backed
//! implementations below are what the CLI wires up; tests substitute their
//! own.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::SystemTime;
use tracing::{debug, trace};

/// Query run against the registry database
pub const REGISTRY_QUERY: &str =
    "SELECT name, epoch, version, revision, state, variants FROM ports";

/// A port index file
pub trait IndexSource {
    /// Human-readable name used in notices and logs
    fn label(&self) -> String;

    /// Last modification time; an error means the source is unavailable
    fn modified(&self) -> Result<SystemTime>;

    /// Full contents of the index
    fn read(&self) -> Result<Vec<u8>>;

    /// Optional sources that do not exist are skipped instead of reported
    fn is_optional(&self) -> bool {
        false
    }
}

/// The local installation registry
pub trait RegistrySource {
    fn label(&self) -> String;

    /// Last modification time of the registry
    fn modified(&self) -> Result<SystemTime>;

    /// Raw `name|epoch|version|revision|state|variants` rows
    fn query(&self) -> Result<String>;
}

/// Details fetched for one port when a user inspects it
pub trait PortInspector {
    fn dependents(&self, name: &str) -> Result<Vec<String>>;
    fn space(&self, name: &str) -> Result<String>;
}

fn modified_time(path: &Path) -> Result<SystemTime> {
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .with_context(|| format!("Failed to stat {}", path.display()))
}

/// Index stored in a local file
#[derive(Debug, Clone)]
pub struct FileIndexSource {
    path: PathBuf,
    optional: bool,
}

impl FileIndexSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            optional: false,
        }
    }

    /// An overlay index that may not exist
    pub fn optional(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            optional: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IndexSource for FileIndexSource {
    fn label(&self) -> String {
        self.path.display().to_string()
    }

    fn modified(&self) -> Result<SystemTime> {
        modified_time(&self.path)
    }

    fn read(&self) -> Result<Vec<u8>> {
        let bytes = std::fs::read(&self.path)
            .with_context(|| format!("Failed to read index {}", self.path.display()))?;
        debug!("Read {} bytes from {}", bytes.len(), self.path.display());
        Ok(bytes)
    }

    fn is_optional(&self) -> bool {
        self.optional
    }
}

/// Registry database queried through the sqlite command-line client
#[derive(Debug, Clone)]
pub struct SqliteRegistry {
    database: PathBuf,
    client: String,
}

impl SqliteRegistry {
    pub fn new(database: impl Into<PathBuf>, client: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            client: client.into(),
        }
    }

    pub fn database(&self) -> &Path {
        &self.database
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.client);
        cmd.arg("-readonly")
            .arg("-batch")
            .arg("-separator")
            .arg("|")
            .arg(&self.database)
            .arg(REGISTRY_QUERY);
        cmd
    }
}

impl RegistrySource for SqliteRegistry {
    fn label(&self) -> String {
        self.database.display().to_string()
    }

    fn modified(&self) -> Result<SystemTime> {
        modified_time(&self.database)
    }

    fn query(&self) -> Result<String> {
        let mut cmd = self.command();
        trace!(?cmd, "Querying registry");

        let output = cmd
            .output()
            .with_context(|| format!("Failed to run {}", self.client))?;

        if !output.status.success() {
            bail!(
                "{} exited with {}: {}",
                self.client,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        String::from_utf8(output.stdout).context("Registry output is not valid UTF-8")
    }
}

/// Inspector that asks the package-management executable
#[derive(Debug, Clone)]
pub struct PortCommand {
    program: String,
}

impl PortCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, subcommand: &str, name: &str) -> Result<String> {
        let output = Command::new(&self.program)
            .arg(subcommand)
            .arg(name)
            .output()
            .with_context(|| format!("Failed to run {} {} {}", self.program, subcommand, name))?;

        if !output.status.success() {
            bail!(
                "{} {} {} exited with {}",
                self.program,
                subcommand,
                name,
                output.status
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl PortInspector for PortCommand {
    fn dependents(&self, name: &str) -> Result<Vec<String>> {
        self.run("dependents", name).map(|out| parse_dependents(&out))
    }

    fn space(&self, name: &str) -> Result<String> {
        self.run("space", name).map(|out| parse_space(&out))
    }
}

/// Dependents are the indented lines after the summary line
pub fn parse_dependents(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| line.starts_with(char::is_whitespace))
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// First non-empty line of the space report
pub fn parse_space(output: &str) -> String {
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .to_string()
}
