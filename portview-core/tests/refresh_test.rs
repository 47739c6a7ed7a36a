//! Refresh driver against real index files on disk

use anyhow::Result;
use portview_core::catalog::{
    Catalog, FileIndexSource, IndexSource, RegistryFlags, RegistrySource,
};
use portview_core::CatalogError;
use std::cell::Cell;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

fn entry(name: &str, body: &str) -> String {
    format!("{name} {}\n{body}\n", body.len())
}

/// Write `content` and pin the modification time so tests do not depend on
/// filesystem timestamp granularity
fn write_at(path: &Path, content: &str, secs: u64) -> Result<()> {
    std::fs::write(path, content)?;
    File::options()
        .write(true)
        .open(path)?
        .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))?;
    Ok(())
}

/// Registry rows held in memory with a counter of queries
struct StaticRegistry {
    rows: String,
    stamp: SystemTime,
    queries: Rc<Cell<usize>>,
}

impl RegistrySource for StaticRegistry {
    fn label(&self) -> String {
        "static".to_string()
    }

    fn modified(&self) -> Result<SystemTime> {
        Ok(self.stamp)
    }

    fn query(&self) -> Result<String> {
        self.queries.set(self.queries.get() + 1);
        Ok(self.rows.clone())
    }
}

fn catalog(indexes: Vec<FileIndexSource>, queries: &Rc<Cell<usize>>) -> Catalog {
    Catalog::new(
        indexes
            .into_iter()
            .map(|s| Box::new(s) as Box<dyn IndexSource>)
            .collect(),
        Some(Box::new(StaticRegistry {
            rows: "zlib|0|1.3.1|0|installed|\n".to_string(),
            stamp: SystemTime::UNIX_EPOCH,
            queries: Rc::clone(queries),
        })),
        RegistryFlags::default(),
    )
}

fn paths(dir: &TempDir) -> (PathBuf, PathBuf) {
    (dir.path().join("PortIndex"), dir.path().join("overlay"))
}

#[test]
fn test_initialize_twice_is_idempotent() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let (system, _) = paths(&temp_dir);
    write_at(&system, &entry("zlib", "version 1.3.1"), 100)?;

    let queries = Rc::new(Cell::new(0));
    let mut catalog = catalog(vec![FileIndexSource::new(&system)], &queries);

    let first = catalog.initialize();
    assert!(first.index_rebuilt && first.registry_reconciled);
    let snapshot = catalog.repository().clone();

    let second = catalog.initialize();
    assert!(second.is_noop());
    assert_eq!(queries.get(), 1);
    assert_eq!(catalog.repository(), &snapshot);
    Ok(())
}

#[test]
fn test_touched_index_is_reparsed() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let (system, _) = paths(&temp_dir);
    write_at(&system, &entry("zlib", "version 1.3.1"), 100)?;

    let queries = Rc::new(Cell::new(0));
    let mut catalog = catalog(vec![FileIndexSource::new(&system)], &queries);
    catalog.initialize();

    write_at(&system, &entry("zlib", "version 1.3.2"), 200)?;
    let report = catalog.initialize();

    assert!(report.index_rebuilt);
    assert!(!report.registry_reconciled);
    assert_eq!(
        catalog.repository().get("zlib").unwrap().version().as_deref(),
        Some("1.3.2")
    );
    // Install state survives an index rebuild
    assert!(catalog.repository().state("zlib").is_some());
    Ok(())
}

#[test]
fn test_user_overlay_takes_precedence() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let (system, overlay) = paths(&temp_dir);
    write_at(&system, &entry("zlib", "version 1.3.1 description system"), 100)?;

    let queries = Rc::new(Cell::new(0));
    let mut catalog = catalog(
        vec![
            FileIndexSource::new(&system),
            FileIndexSource::optional(&overlay),
        ],
        &queries,
    );

    let report = catalog.initialize();
    assert!(report.notices.is_empty());
    assert_eq!(
        catalog.repository().get("zlib").unwrap().description().as_deref(),
        Some("system")
    );

    write_at(&overlay, &entry("zlib", "version 1.4 description overlay"), 150)?;
    assert!(catalog.initialize().index_rebuilt);
    assert_eq!(
        catalog.repository().get("zlib").unwrap().description().as_deref(),
        Some("overlay")
    );
    Ok(())
}

#[test]
fn test_missing_system_index_keeps_last_good_state() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let (system, _) = paths(&temp_dir);
    write_at(&system, &entry("zlib", "version 1.3.1"), 100)?;

    let queries = Rc::new(Cell::new(0));
    let mut catalog = catalog(vec![FileIndexSource::new(&system)], &queries);
    catalog.initialize();

    std::fs::remove_file(&system)?;
    let report = catalog.initialize();

    assert!(!report.index_rebuilt);
    assert!(matches!(
        report.notices.as_slice(),
        [CatalogError::SourceUnavailable { .. }]
    ));
    assert!(catalog.repository().contains("zlib"));

    write_at(&system, &entry("xz", "version 5.6.2"), 300)?;
    let report = catalog.initialize();
    assert!(report.index_rebuilt);
    assert!(catalog.repository().contains("xz"));
    assert!(!catalog.repository().contains("zlib"));
    Ok(())
}
