//! Change detection and rebuild
//!
//! `Catalog::initialize` compares each source's modification time with the
//! one seen on the previous call and only reparses or reconciles what
//! changed. Unchanged stamps make the call a no-op. A source that cannot be
//! read leaves the last good state in place and keeps its old stamp, so the
//! next call tries again.

use anyhow::Result;
use std::time::SystemTime;
use tracing::{debug, info, warn};

use super::actions::ProtectedPorts;
use super::grouping::{GroupingEngine, SortKey};
use super::reconcile::{parse_registry_rows, reconcile, ReconcileSummary, RegistryFlags};
use super::repository::Repository;
use super::sources::{IndexSource, PortInspector, RegistrySource};
use crate::error::CatalogError;

/// What one `initialize` call did
#[derive(Debug, Default)]
pub struct RefreshReport {
    /// Ports were reparsed from every index
    pub index_rebuilt: bool,
    /// Install state was replaced from the registry
    pub registry_reconciled: bool,
    /// Entries skipped while parsing
    pub parse_errors: Vec<CatalogError>,
    /// Sources that could not be read
    pub notices: Vec<CatalogError>,
    pub reconcile: Option<ReconcileSummary>,
}

impl RefreshReport {
    /// Nothing was rebuilt
    pub fn is_noop(&self) -> bool {
        !self.index_rebuilt && !self.registry_reconciled
    }
}

/// A repository kept in sync with its index and registry sources
pub struct Catalog {
    repo: Repository,
    indexes: Vec<Box<dyn IndexSource>>,
    registry: Option<Box<dyn RegistrySource>>,
    flags: RegistryFlags,
    index_stamps: Option<Vec<Option<SystemTime>>>,
    registry_stamp: Option<SystemTime>,
}

impl Catalog {
    /// Indexes are parsed in the given order; later ones win on name clashes
    pub fn new(
        indexes: Vec<Box<dyn IndexSource>>,
        registry: Option<Box<dyn RegistrySource>>,
        flags: RegistryFlags,
    ) -> Self {
        Self {
            repo: Repository::new(),
            indexes,
            registry,
            flags,
            index_stamps: None,
            registry_stamp: None,
        }
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Grouping view over the current repository
    pub fn engine<'a>(&'a self, protected: &'a ProtectedPorts, sort: SortKey) -> GroupingEngine<'a> {
        GroupingEngine::new(&self.repo, protected, sort)
    }

    /// Forget the observed stamps so the next `initialize` rebuilds everything
    pub fn invalidate(&mut self) {
        self.index_stamps = None;
        self.registry_stamp = None;
    }

    /// Reparse and reconcile whatever changed since the last call
    pub fn initialize(&mut self) -> RefreshReport {
        let mut report = RefreshReport::default();
        self.refresh_indexes(&mut report);
        self.refresh_registry(&mut report);

        if report.is_noop() {
            debug!("Catalog sources unchanged");
        }
        report
    }

    fn refresh_indexes(&mut self, report: &mut RefreshReport) {
        let mut stamps = Vec::with_capacity(self.indexes.len());

        for source in &self.indexes {
            match source.modified() {
                Ok(stamp) => stamps.push(Some(stamp)),
                Err(_) if source.is_optional() => {
                    debug!("Optional index {} not present", source.label());
                    stamps.push(None);
                }
                Err(e) => {
                    report.notices.push(unavailable(&source.label(), &e));
                    return;
                }
            }
        }

        if self.index_stamps.as_ref() == Some(&stamps) {
            return;
        }

        let mut contents = Vec::with_capacity(self.indexes.len());
        for (source, stamp) in self.indexes.iter().zip(&stamps) {
            if stamp.is_none() {
                continue;
            }
            match source.read() {
                Ok(bytes) => contents.push((source.label(), bytes)),
                Err(e) => {
                    report.notices.push(unavailable(&source.label(), &e));
                    return;
                }
            }
        }

        self.repo.clear_ports();
        for (label, bytes) in contents {
            let errors = self.repo.load_index(&bytes);
            if !errors.is_empty() {
                warn!("Skipped {} malformed entries in {}", errors.len(), label);
            }
            report.parse_errors.extend(errors);
        }

        info!(
            ports = self.repo.len(),
            categories = self.repo.categories().len(),
            "Rebuilt port index"
        );
        self.index_stamps = Some(stamps);
        report.index_rebuilt = true;
    }

    fn refresh_registry(&mut self, report: &mut RefreshReport) {
        let Some(registry) = &self.registry else {
            return;
        };

        let stamp = match registry.modified() {
            Ok(stamp) => stamp,
            Err(e) => {
                report.notices.push(unavailable(&registry.label(), &e));
                return;
            }
        };

        if self.registry_stamp == Some(stamp) {
            return;
        }

        let text = match registry.query() {
            Ok(text) => text,
            Err(e) => {
                report.notices.push(unavailable(&registry.label(), &e));
                return;
            }
        };

        let rows = parse_registry_rows(&text);
        report.reconcile = Some(reconcile(&mut self.repo, &rows, &self.flags));
        self.registry_stamp = Some(stamp);
        report.registry_reconciled = true;
    }

    /// Fetch dependents and disk usage for one port
    pub fn inspect(&mut self, name: &str, inspector: &dyn PortInspector) -> Result<()> {
        if !self.repo.contains(name) && self.repo.state(name).is_none() {
            return Err(CatalogError::UnknownPort {
                name: name.to_string(),
            }
            .into());
        }

        let dependents = inspector.dependents(name)?;
        let space = inspector.space(name)?;
        debug!(port = name, dependents = dependents.len(), "Inspected port");
        self.repo.set_inspection(name, dependents, space);
        Ok(())
    }
}

fn unavailable(label: &str, err: &anyhow::Error) -> CatalogError {
    warn!("Source {} unavailable: {:#}", label, err);
    CatalogError::source_unavailable(label, format!("{err:#}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct Shared {
        stamp: Rc<Cell<u64>>,
        text: Rc<RefCell<Option<String>>>,
        reads: Rc<Cell<usize>>,
    }

    impl Shared {
        fn new(text: &str) -> Self {
            let shared = Self::default();
            shared.set(1, text);
            shared
        }

        fn set(&self, stamp: u64, text: &str) {
            self.stamp.set(stamp);
            *self.text.borrow_mut() = Some(text.to_string());
        }

        fn remove(&self) {
            *self.text.borrow_mut() = None;
        }

        fn time(&self) -> Result<SystemTime> {
            match &*self.text.borrow() {
                Some(_) => Ok(SystemTime::UNIX_EPOCH + Duration::from_secs(self.stamp.get())),
                None => Err(anyhow!("no such file")),
            }
        }

        fn contents(&self) -> Result<String> {
            self.reads.set(self.reads.get() + 1);
            self.text.borrow().clone().ok_or_else(|| anyhow!("no such file"))
        }
    }

    struct MemoryIndex(Shared, bool);

    impl IndexSource for MemoryIndex {
        fn label(&self) -> String {
            "memory-index".to_string()
        }
        fn modified(&self) -> Result<SystemTime> {
            self.0.time()
        }
        fn read(&self) -> Result<Vec<u8>> {
            self.0.contents().map(String::into_bytes)
        }
        fn is_optional(&self) -> bool {
            self.1
        }
    }

    struct MemoryRegistry(Shared);

    impl RegistrySource for MemoryRegistry {
        fn label(&self) -> String {
            "memory-registry".to_string()
        }
        fn modified(&self) -> Result<SystemTime> {
            self.0.time()
        }
        fn query(&self) -> Result<String> {
            self.0.contents()
        }
    }

    fn entry(name: &str, body: &str) -> String {
        format!("{name} {}\n{body}", body.len())
    }

    fn catalog(index: &Shared, registry: &Shared) -> Catalog {
        Catalog::new(
            vec![Box::new(MemoryIndex(index.clone(), false))],
            Some(Box::new(MemoryRegistry(registry.clone()))),
            RegistryFlags::default(),
        )
    }

    #[test]
    fn test_second_initialize_is_noop() {
        let index = Shared::new(&entry("zlib", "version 1.3"));
        let registry = Shared::new("zlib|0|1.3|0|installed|\n");
        let mut catalog = catalog(&index, &registry);

        let first = catalog.initialize();
        assert!(first.index_rebuilt);
        assert!(first.registry_reconciled);
        let snapshot = catalog.repository().clone();

        let second = catalog.initialize();
        assert!(second.is_noop());
        assert_eq!(index.reads.get(), 1);
        assert_eq!(registry.reads.get(), 1);
        assert_eq!(catalog.repository(), &snapshot);
    }

    #[test]
    fn test_changed_index_rebuilds_without_touching_state() {
        let index = Shared::new(&entry("zlib", "version 1.3"));
        let registry = Shared::new("zlib|0|1.3|0|installed|\n");
        let mut catalog = catalog(&index, &registry);
        catalog.initialize();

        index.set(2, &entry("xz", "version 5.4"));
        let report = catalog.initialize();

        assert!(report.index_rebuilt);
        assert!(!report.registry_reconciled);
        assert!(!catalog.repository().contains("zlib"));
        assert!(catalog.repository().contains("xz"));
        assert_eq!(catalog.repository().orphaned(), vec!["zlib"]);
    }

    #[test]
    fn test_registry_change_clears_removed_ports() {
        let index = Shared::new(&format!(
            "{}{}",
            entry("zlib", "version 1.3"),
            entry("xz", "version 5.4")
        ));
        let registry = Shared::new("zlib|0|1.3|0|installed|\nxz|0|5.4|0|installed|\n");
        let mut catalog = catalog(&index, &registry);
        catalog.initialize();

        registry.set(2, "xz|0|5.4|0|installed|\n");
        let report = catalog.initialize();

        assert!(report.registry_reconciled);
        assert!(catalog.repository().state("zlib").is_none());
        assert!(catalog.repository().state("xz").is_some());
    }

    #[test]
    fn test_unavailable_source_keeps_prior_state() {
        let index = Shared::new(&entry("zlib", "version 1.3"));
        let registry = Shared::new("zlib|0|1.3|0|installed|\n");
        let mut catalog = catalog(&index, &registry);
        catalog.initialize();
        let snapshot = catalog.repository().clone();

        index.remove();
        registry.remove();
        let report = catalog.initialize();

        assert!(report.is_noop());
        assert_eq!(report.notices.len(), 2);
        assert!(matches!(
            &report.notices[0],
            CatalogError::SourceUnavailable { source_name, .. } if source_name == "memory-index"
        ));
        assert_eq!(catalog.repository(), &snapshot);

        // Once the files come back with the old stamps nothing needs rebuilding
        index.set(1, &entry("zlib", "version 1.3"));
        registry.set(1, "zlib|0|1.3|0|installed|\n");
        assert!(catalog.initialize().is_noop());
    }

    #[test]
    fn test_optional_overlay_wins_and_may_be_missing() {
        let system = Shared::new(&entry("zlib", "version 1.2"));
        let overlay = Shared::new(&entry("ZLIB", "version 1.3"));
        let mut catalog = Catalog::new(
            vec![
                Box::new(MemoryIndex(system.clone(), false)),
                Box::new(MemoryIndex(overlay.clone(), true)),
            ],
            None,
            RegistryFlags::default(),
        );

        catalog.initialize();
        assert_eq!(
            catalog.repository().get("zlib").unwrap().version().as_deref(),
            Some("1.3")
        );

        overlay.remove();
        let report = catalog.initialize();
        assert!(report.index_rebuilt);
        assert!(report.notices.is_empty());
        assert_eq!(
            catalog.repository().get("zlib").unwrap().version().as_deref(),
            Some("1.2")
        );
    }

    #[test]
    fn test_invalidate_forces_rebuild() {
        let index = Shared::new(&entry("zlib", "version 1.3"));
        let registry = Shared::new("");
        let mut catalog = catalog(&index, &registry);
        catalog.initialize();

        catalog.invalidate();
        let report = catalog.initialize();
        assert!(report.index_rebuilt);
        assert!(report.registry_reconciled);
        assert_eq!(index.reads.get(), 2);
    }

    #[test]
    fn test_parse_errors_reported() {
        let index = Shared::new(&format!(
            "{}{}",
            entry("broken", "description {oops"),
            entry("zlib", "version 1.3")
        ));
        let registry = Shared::new("");
        let mut catalog = catalog(&index, &registry);

        let report = catalog.initialize();
        assert_eq!(report.parse_errors.len(), 1);
        assert_eq!(catalog.repository().len(), 1);
    }

    struct FakeInspector;

    impl PortInspector for FakeInspector {
        fn dependents(&self, _name: &str) -> Result<Vec<String>> {
            Ok(vec!["curl".to_string()])
        }
        fn space(&self, _name: &str) -> Result<String> {
            Ok("1.18 MiB".to_string())
        }
    }

    #[test]
    fn test_inspect_fills_one_port() {
        let index = Shared::new(&format!(
            "{}{}",
            entry("zlib", "version 1.3"),
            entry("xz", "version 5.4")
        ));
        let registry = Shared::new("zlib|0|1.3|0|installed|\nxz|0|5.4|0|installed|\n");
        let mut catalog = catalog(&index, &registry);
        catalog.initialize();

        catalog.inspect("zlib", &FakeInspector).unwrap();

        let zlib = catalog.repository().state("zlib").unwrap();
        assert_eq!(zlib.dependents.as_deref(), Some(&["curl".to_string()][..]));
        assert_eq!(zlib.space.as_deref(), Some("1.18 MiB"));
        assert_eq!(catalog.repository().state("xz").unwrap().space, None);

        assert!(catalog.inspect("nope", &FakeInspector).is_err());
    }
}
