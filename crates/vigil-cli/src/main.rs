//! Vigil CLI - tamper-evident audit trail.
//!
//! Writes signed audit records, searches and counts them, exports CSV, and
//! verifies every stored signature against the configured public key.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use vigil_audit::{Audit, AuditSettings, SearchOptions, SortOrder, get_audit, parse_time_limit};

mod commands;
mod config_bridge;
mod theme;

use commands::{export, filter_map, keys, log, parse_pair, search, verify};
use theme::Theme;

/// Vigil - tamper-evident audit trail
#[derive(Parser)]
#[command(name = "vigil")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file merged over the system and user layers
    #[arg(short, long, global = true, env = "VIGIL_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write one signed audit record
    Log {
        /// Field to record, as key=value (repeatable)
        #[arg(short, long = "field", value_parser = parse_pair)]
        fields: Vec<(String, String)>,

        /// Policy that matched this action (repeatable, order kept)
        #[arg(short, long = "policy")]
        policies: Vec<String>,
    },

    /// Show one page of matching records
    Search {
        #[command(flatten)]
        filters: FilterArgs,

        /// Page to show, starting at 1
        #[arg(long)]
        page: Option<u32>,

        /// Records per page
        #[arg(long)]
        page_size: Option<u32>,

        /// Timestamp order: asc or desc
        #[arg(long)]
        sort: Option<SortOrder>,

        /// Only records from the last duration, e.g. 1h, 7d
        #[arg(long)]
        timelimit: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Count matching records
    Count {
        #[command(flatten)]
        filters: FilterArgs,

        /// Only successful (true) or failed (false) actions
        #[arg(long)]
        success: Option<bool>,

        /// Only records from the last duration, e.g. 5m
        #[arg(long)]
        since: Option<String>,
    },

    /// Export matching records as CSV, oldest first
    Export {
        #[command(flatten)]
        filters: FilterArgs,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Emit a header line first
        #[arg(long)]
        header: bool,
    },

    /// Verify the signature of every matching record
    Verify {
        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Manage signing keys
    Keys {
        #[command(subcommand)]
        command: KeyCommands,
    },

    /// List searchable columns and their widths
    Columns,
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Generate a new key pair
    Generate {
        /// Directory for private.key and public.key
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
}

#[derive(clap::Args)]
struct FilterArgs {
    /// Search filter, as column=value; `*` matches any text (repeatable)
    #[arg(short, long = "filter", value_parser = parse_pair)]
    filters: Vec<(String, String)>,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{}", Theme::error(&format!("{e:#}")));
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = vigil_config::Config::load(cli.config.as_deref())
        .context("failed to load configuration")?
        .config;

    let mut log_config = config_bridge::to_log_config(&config);
    if cli.verbose {
        "debug".clone_into(&mut log_config.level);
    }
    if let Err(e) = vigil_telemetry::setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}; falling back to defaults");
        if let Err(e) = vigil_telemetry::setup_default_logging() {
            eprintln!("Failed to initialize default logging: {e}");
        }
    }

    let settings = config_bridge::to_audit_settings(&config)?;

    match cli.command {
        Commands::Log { fields, policies } => log::write_record(&open(&settings)?, &fields, &policies),
        Commands::Search {
            filters,
            page,
            page_size,
            sort,
            timelimit,
            json,
        } => {
            let options = SearchOptions {
                page,
                page_size,
                sort,
                timelimit: timelimit.as_deref().map(parse_time_limit).transpose()?,
            };
            search::search(&open(&settings)?, &filters.to_map(), &options, json)
        },
        Commands::Count {
            filters,
            success,
            since,
        } => search::count(&open(&settings)?, &filters.to_map(), success, since.as_deref()),
        Commands::Export {
            filters,
            output,
            header,
        } => export::export_csv(&open(&settings)?, &filters.to_map(), output.as_deref(), header),
        Commands::Verify { filters } => verify::verify_records(&open(&settings)?, &filters.to_map()),
        Commands::Keys {
            command: KeyCommands::Generate { dir },
        } => keys::generate(&dir),
        Commands::Columns => {
            search::columns(&settings);
            Ok(())
        },
    }
}

impl FilterArgs {
    fn to_map(&self) -> vigil_audit::FilterMap {
        filter_map(&self.filters)
    }
}

fn open(settings: &AuditSettings) -> Result<Audit> {
    tracing::debug!(backend = %settings.backend, database = ?settings.database, "opening audit store");
    get_audit(settings).context("failed to open the audit trail")
}
