//! Portview catalog commands
//!
//! Each command refreshes a catalog from the configured sources and prints
//! one view of it. Tables go to stdout, notices and logs to stderr.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::time::SystemTime;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

use portview_core::catalog::{
    Action, Catalog, DependencyKind, GroupingEngine, IndexSource, InstallStatus, Link, MarkSet,
    Port, PortRow, PortState, RegistrySource, SortColumn, SortKey, TreeNode,
};
use portview_core::config::PortviewConfig;
use portview_core::CatalogError;

const DESCRIPTION_WIDTH: usize = 50;

/// Refresh a catalog and report anything that went wrong on stderr
fn load_catalog(config: &PortviewConfig) -> Catalog {
    let mut catalog = config.build_catalog();
    let report = catalog.initialize();

    for notice in &report.notices {
        eprintln!("Warning: {notice}");
    }
    if !report.parse_errors.is_empty() {
        eprintln!(
            "Warning: skipped {} malformed index entr{}",
            report.parse_errors.len(),
            if report.parse_errors.len() == 1 { "y" } else { "ies" }
        );
    }

    let orphans = catalog.repository().orphaned();
    if !orphans.is_empty() {
        tracing::debug!(orphans = ?orphans, "Registry ports missing from the index");
    }

    catalog
}

fn truncate(text: &str) -> String {
    if text.chars().count() > DESCRIPTION_WIDTH {
        let cut: String = text.chars().take(DESCRIPTION_WIDTH - 3).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

fn print_table<T: Tabled>(rows: &[T]) {
    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string();

    println!("{table}");
}

fn print_node(node: &TreeNode) {
    let indent = "  ".repeat(usize::from(node.level().depth()));
    match node {
        TreeNode::Header(header) => {
            println!("{indent}{} ({})", header.label, header.member_count)
        }
        TreeNode::Row(row) => {
            let marker = if row.builtin { " [builtin]" } else { "" };
            println!(
                "{indent}{:<30} {:<20} {}{}",
                row.id,
                row.version,
                truncate(&row.description),
                marker
            );
        }
    }
}

fn print_expanded(engine: &GroupingEngine, nodes: &[TreeNode]) -> Result<()> {
    for node in nodes {
        print_node(node);
        if let TreeNode::Header(header) = node {
            let children = engine.expand(&header.child)?;
            print_expanded(engine, &children)?;
        }
    }
    Ok(())
}

pub fn execute_outline(config: &PortviewConfig, expand: bool) -> Result<()> {
    let catalog = load_catalog(config);
    let protected = config.protected_ports();
    let engine = catalog.engine(&protected, config.sort);

    let outline = engine.outline();
    if expand {
        print_expanded(&engine, &outline)?;
    } else {
        outline.iter().for_each(print_node);
    }

    Ok(())
}

#[derive(Tabled)]
struct PortTableRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Description")]
    description: String,
}

impl From<&PortRow> for PortTableRow {
    fn from(row: &PortRow) -> Self {
        let name = if row.builtin {
            format!("{} *", row.id)
        } else {
            row.id.clone()
        };
        Self {
            name,
            version: row.version.clone(),
            status: row.status.to_string(),
            description: truncate(&row.description),
        }
    }
}

pub fn execute_list(
    config: &PortviewConfig,
    status: Option<InstallStatus>,
    category: Option<&str>,
    prefix: Option<&str>,
    sort: Option<SortColumn>,
    descending: bool,
    json_output: bool,
) -> Result<()> {
    let catalog = load_catalog(config);
    let protected = config.protected_ports();
    let sort_key = match sort {
        Some(column) => SortKey::new(column, descending),
        None => SortKey::new(config.sort.column, config.sort.descending || descending),
    };
    let engine = catalog.engine(&protected, sort_key);

    let buckets = match (category, prefix) {
        (Some(category), _) => engine.compute_subgroup(category)?,
        (None, Some(prefix)) => engine.compute_prefix_subgroup(prefix)?,
        (None, None) => engine.buckets(),
    };

    let rows: Vec<&PortRow> = buckets
        .iter()
        .filter(|(bucket, _)| status.map_or(true, |wanted| wanted == *bucket))
        .flat_map(|(_, rows)| rows.iter())
        .collect();

    if json_output {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No ports found.");
        return Ok(());
    }

    let table_rows: Vec<PortTableRow> = rows.into_iter().map(PortTableRow::from).collect();
    print_table(&table_rows);
    println!("\n{} port(s), * = built-in", table_rows.len());
    Ok(())
}

pub fn execute_search(config: &PortviewConfig, query: &str) -> Result<()> {
    let catalog = load_catalog(config);
    let protected = config.protected_ports();
    let engine = catalog.engine(&protected, config.sort);

    let matches = catalog.repository().search(query);
    if matches.is_empty() {
        println!("No ports match '{query}'.");
        return Ok(());
    }

    let buckets = engine.buckets_for(matches.iter().map(|port| port.name()));
    let table_rows: Vec<PortTableRow> = buckets
        .iter()
        .flat_map(|(_, rows)| rows.iter())
        .map(PortTableRow::from)
        .collect();

    println!("Found {} port(s):\n", table_rows.len());
    print_table(&table_rows);
    Ok(())
}

#[derive(Tabled, Serialize)]
struct CategoryRow {
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Ports")]
    ports: usize,
}

pub fn execute_categories(config: &PortviewConfig, json_output: bool) -> Result<()> {
    let catalog = load_catalog(config);
    let protected = config.protected_ports();
    let engine = catalog.engine(&protected, config.sort);

    let rows: Vec<CategoryRow> = engine
        .category_headers()
        .into_iter()
        .map(|header| CategoryRow {
            category: header.label,
            ports: header.member_count,
        })
        .collect();

    if json_output {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else if rows.is_empty() {
        println!("No categories.");
    } else {
        print_table(&rows);
    }
    Ok(())
}

#[derive(Serialize)]
struct PortDetails<'a> {
    status: InstallStatus,
    builtin: bool,
    port: &'a Port,
    links: Vec<Link>,
    state: Option<&'a PortState>,
}

fn print_list(label: &str, values: &[&str]) {
    if !values.is_empty() {
        println!("{label:<14}{}", values.join(", "));
    }
}

pub fn execute_show(config: &PortviewConfig, name: &str, inspect: bool, json_output: bool) -> Result<()> {
    let mut catalog = load_catalog(config);

    if inspect {
        catalog
            .inspect(name, &config.inspector())
            .with_context(|| format!("Failed to inspect '{name}'"))?;
    }

    let protected = config.protected_ports();
    let repo = catalog.repository();
    let Some(port) = repo.get(name) else {
        return Err(CatalogError::UnknownPort {
            name: name.to_string(),
        }
        .into());
    };

    let engine = catalog.engine(&protected, config.sort);
    let details = PortDetails {
        status: engine.status(port),
        builtin: protected.contains(port.name()),
        port,
        links: port.links()?,
        state: repo.state(name),
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&details)?);
        return Ok(());
    }

    println!("{} @{}", port.name(), port.candidate_version());
    if let Some(description) = port.description() {
        println!("{description}");
    }
    println!();
    println!("{:<14}{}", "Status:", details.status);
    if details.builtin {
        println!("{:<14}yes", "Built-in:");
    }
    print_list("Categories:", &port.categories()?);
    print_list("Variants:", &port.variants()?);
    print_list("Maintainers:", &port.maintainers()?);
    print_list("Platforms:", &port.platforms()?);
    if let Some(license) = port.license() {
        println!("{:<14}{license}", "License:");
    }
    if let Some(homepage) = port.homepage() {
        println!("{:<14}{homepage}", "Homepage:");
    }
    for kind in DependencyKind::ALL {
        let label = format!("{} deps:", capitalize(&kind.to_string()));
        print_list(&label, &port.depends(kind)?);
    }
    if let Some(replaced_by) = port.replaced_by() {
        println!("{:<14}{replaced_by}", "Replaced by:");
    }

    if let Some(state) = details.state {
        let installed: Vec<&str> = state.installed.iter().map(String::as_str).collect();
        let imaged: Vec<&str> = state.imaged.iter().map(String::as_str).collect();
        print_list("Installed:", &installed);
        print_list("Imaged:", &imaged);
        if let Some(dependents) = &state.dependents {
            let dependents: Vec<&str> = dependents.iter().map(String::as_str).collect();
            if dependents.is_empty() {
                println!("{:<14}none", "Dependents:");
            } else {
                print_list("Dependents:", &dependents);
            }
        }
        if let Some(space) = &state.space {
            println!("{:<14}{space}", "Space:");
        }
    }

    if !details.links.is_empty() {
        println!("\nLinks:");
        for link in &details.links {
            println!("  {link}");
        }
    }

    let suggested = Action::suggested_for(details.status);
    if !(suggested.is_removal() && details.builtin) {
        println!("\nSuggested action: {suggested}");
    }

    Ok(())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Ports named on the command line, per action
#[derive(Debug, Default)]
pub struct PlanMarks {
    pub install: Vec<String>,
    pub upgrade: Vec<String>,
    pub uninstall: Vec<String>,
    pub uninstall_inactive: Vec<String>,
}

impl PlanMarks {
    fn into_mark_set(self) -> MarkSet {
        let mut marks = MarkSet::new();
        for (names, action) in [
            (self.install, Action::Install),
            (self.upgrade, Action::Upgrade),
            (self.uninstall, Action::Uninstall),
            (self.uninstall_inactive, Action::UninstallInactive),
        ] {
            for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
                marks.mark(name, action);
            }
        }
        marks
    }
}

pub fn execute_plan(config: &PortviewConfig, marks: PlanMarks) -> Result<()> {
    let catalog = load_catalog(config);
    let marks = marks.into_mark_set();

    if marks.is_empty() {
        bail!("No ports marked; pass --install, --upgrade, --uninstall or --uninstall-inactive");
    }

    for action in Action::ALL {
        for name in marks.marked(action) {
            let repo = catalog.repository();
            if !repo.contains(name) && repo.state(name).is_none() {
                eprintln!("Warning: '{name}' is not in the index or the registry");
            }
        }
    }

    let requests = marks.plan(&config.protected_ports())?;
    println!("{}", serde_json::to_string_pretty(&requests)?);
    Ok(())
}

#[derive(Tabled)]
struct SourceRow {
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Modified")]
    modified: String,
}

fn format_modified(modified: Result<SystemTime>, optional: bool) -> String {
    match modified {
        Ok(time) => DateTime::<Local>::from(time)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        Err(_) if optional => "not present (optional)".to_string(),
        Err(_) => "unavailable".to_string(),
    }
}

pub fn execute_sources(config: &PortviewConfig) -> Result<()> {
    let mut rows: Vec<SourceRow> = config
        .index_sources()
        .iter()
        .map(|source| SourceRow {
            source: source.label(),
            kind: if source.is_optional() {
                "index (overlay)".to_string()
            } else {
                "index".to_string()
            },
            modified: format_modified(source.modified(), source.is_optional()),
        })
        .collect();

    let registry = config.registry_source();
    rows.push(SourceRow {
        source: registry.label(),
        kind: "registry".to_string(),
        modified: format_modified(registry.modified(), false),
    });

    print_table(&rows);
    Ok(())
}
