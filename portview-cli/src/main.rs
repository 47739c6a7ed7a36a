//! Portview - browse, classify and act on ports from the terminal
//!
//! Every command loads the configuration, refreshes the catalog from the
//! index files and the registry, then prints a view of it.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use portview_core::catalog::{InstallStatus, SortColumn};
use portview_core::config::PortviewConfig;

mod catalog_cli;

/// Trace modules for catalog tracing
#[derive(Debug, Clone, ValueEnum)]
enum TraceModule {
    Parser,
    Registry,
    Grouping,
    Refresh,
    All,
}

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Status filter accepted on the command line
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatusArg {
    Outdated,
    Inactive,
    Installed,
    NotInstalled,
}

impl From<StatusArg> for InstallStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Outdated => InstallStatus::Outdated,
            StatusArg::Inactive => InstallStatus::Inactive,
            StatusArg::Installed => InstallStatus::Installed,
            StatusArg::NotInstalled => InstallStatus::NotInstalled,
        }
    }
}

/// Sort column accepted on the command line
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortArg {
    Name,
    Version,
    Description,
}

impl From<SortArg> for SortColumn {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Name => SortColumn::Name,
            SortArg::Version => SortColumn::Version,
            SortArg::Description => SortColumn::Description,
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "portview",
    about = "Browse, classify and plan actions on ports",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Enable catalog tracing (comma-separated: parser,registry,grouping,refresh,all)
    #[clap(long, value_delimiter = ',', global = true)]
    trace: Vec<TraceModule>,

    /// Set log level
    #[clap(long, default_value = "warn", global = true)]
    log_level: LogLevel,

    /// Override configuration file path
    #[clap(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
enum Command {
    /// Print the status outline with the "Categorized" root
    Outline {
        /// Expand every header down to individual ports
        #[clap(long)]
        expand: bool,
    },

    /// List ports as a table
    List {
        /// Only ports with this status
        #[clap(long, value_enum)]
        status: Option<StatusArg>,

        /// Only ports in this category
        #[clap(long, conflicts_with = "prefix")]
        category: Option<String>,

        /// Only ports whose name starts with `PREFIX-` (e.g. py, php)
        #[clap(long)]
        prefix: Option<String>,

        /// Column to sort by (defaults to the configured sort)
        #[clap(long, value_enum)]
        sort: Option<SortArg>,

        /// Sort descending
        #[clap(long)]
        desc: bool,

        /// Output results as JSON
        #[clap(long)]
        json: bool,
    },

    /// List categories and their member counts
    Categories {
        /// Output results as JSON
        #[clap(long)]
        json: bool,
    },

    /// Show detailed information about a port
    Show {
        /// Port name
        name: String,

        /// Also fetch dependents and disk usage from the package manager
        #[clap(long)]
        inspect: bool,

        /// Output as JSON
        #[clap(long)]
        json: bool,
    },

    /// Search port names and descriptions
    Search {
        /// Case-insensitive substring
        query: String,
    },

    /// Turn per-port marks into action requests (printed as JSON)
    Plan {
        /// Ports to install (comma-separated)
        #[clap(long, value_delimiter = ',')]
        install: Vec<String>,

        /// Ports to upgrade (comma-separated)
        #[clap(long, value_delimiter = ',')]
        upgrade: Vec<String>,

        /// Ports to uninstall (comma-separated)
        #[clap(long, value_delimiter = ',')]
        uninstall: Vec<String>,

        /// Ports whose inactive versions should be removed (comma-separated)
        #[clap(long, value_delimiter = ',')]
        uninstall_inactive: Vec<String>,
    },

    /// List the configured index files and registry with their modification times
    Sources,
}

/// Initialize tracing with CLI flags
///
/// Configures logging based on --log-level and --trace flags.
/// When --trace is set, enables JSON output for structured tracing.
fn initialize_tracing(log_level: &LogLevel, trace_modules: &[TraceModule]) {
    let mut filter = EnvFilter::new(log_level.to_filter_directive());

    for module in trace_modules {
        let directive = match module {
            TraceModule::Parser => "portview_core::catalog::parser=trace",
            TraceModule::Registry => "portview_core::catalog::reconcile=trace",
            TraceModule::Grouping => "portview_core::catalog::grouping=trace",
            TraceModule::Refresh => "portview_core::catalog::refresh=trace",
            TraceModule::All => "portview_core=trace",
        };

        if let Ok(parsed) = directive.parse() {
            filter = filter.add_directive(parsed);
        }
    }

    if !trace_modules.is_empty() {
        // JSON output for structured tracing - MUST go to stderr
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .init();

        tracing::info!(trace_modules = ?trace_modules, "Catalog tracing enabled");
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_tracing(&cli.log_level, &cli.trace);

    let config = PortviewConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Outline { expand } => catalog_cli::execute_outline(&config, expand),
        Command::List {
            status,
            category,
            prefix,
            sort,
            desc,
            json,
        } => catalog_cli::execute_list(
            &config,
            status.map(Into::into),
            category.as_deref(),
            prefix.as_deref(),
            sort.map(Into::into),
            desc,
            json,
        ),
        Command::Categories { json } => catalog_cli::execute_categories(&config, json),
        Command::Show {
            name,
            inspect,
            json,
        } => catalog_cli::execute_show(&config, &name, inspect, json),
        Command::Search { query } => catalog_cli::execute_search(&config, &query),
        Command::Plan {
            install,
            upgrade,
            uninstall,
            uninstall_inactive,
        } => catalog_cli::execute_plan(
            &config,
            catalog_cli::PlanMarks {
                install,
                upgrade,
                uninstall,
                uninstall_inactive,
            },
        ),
        Command::Sources => catalog_cli::execute_sources(&config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_accepts_prefix_but_not_with_category() {
        let cli = Cli::try_parse_from(["portview", "list", "--prefix", "py"]).unwrap();
        match cli.command {
            Command::List {
                prefix, category, ..
            } => {
                assert_eq!(prefix.as_deref(), Some("py"));
                assert!(category.is_none());
            }
            other => panic!("expected list, got {other:?}"),
        }

        let both = ["portview", "list", "--prefix", "py", "--category", "python"];
        assert!(Cli::try_parse_from(both).is_err());
    }
}
