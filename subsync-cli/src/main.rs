//! subsync: synchronize course submission repositories from a CSV table.
//!
//! # Usage
//!
//! ```text
//! subsync [--debug] [--config FILE] sync <REPOS_CSV> <REFERENCE> <DEST> [--repo ID]...
//!         [--output FILE] [--append] [--omit-failed] [--utc] [--date-format FMT]
//!         [--id-column C] [--url-column C] [--ref-column C]
//! subsync authors <REPOS_CSV> <DEST> [--repo ID]... [--output FILE]
//! subsync status <TIMESTAMPS_CSV> [--dest DIR] [--json]
//! subsync refs <LOCATOR>
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use commands::{authors::AuthorsArgs, refs::RefsArgs, status::StatusArgs, sync::SyncArgs};
use subsync_core::{config, Config};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "subsync",
    version,
    about = "Clone and update course submission repositories listed in a CSV table",
    long_about = None,
)]
struct Cli {
    /// Verbose logging (same as RUST_LOG=debug).
    #[arg(long, global = true)]
    debug: bool,

    /// Configuration file (default: ./subsync.yaml, then the user config dir).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Bring every listed repository to the commit its reference names.
    Sync(SyncArgs),

    /// Count commits per author over existing working copies.
    Authors(AuthorsArgs),

    /// Show a timestamp table, optionally checked against the working copies.
    Status(StatusArgs),

    /// List the references a remote advertises.
    Refs(RefsArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let (config, found) = config::resolve(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(path) = &found {
        tracing::debug!(config = %path.display(), "loaded configuration");
    }

    match cli.command {
        Commands::Sync(args) => args.run(&config),
        Commands::Authors(args) => args.run(&config),
        Commands::Status(args) => args.run(&config),
        Commands::Refs(args) => args.run(&config),
    }
}

/// Logs go to stderr; stdout carries the reports.
fn init_tracing(debug: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Shared `--repo` handling: keep only the requested identifiers and warn
/// about the ones the table does not list.
pub(crate) fn select_records(
    records: Vec<subsync_core::SubmissionRecord>,
    ids: &[String],
) -> Vec<subsync_core::SubmissionRecord> {
    for id in ids {
        if !records.iter().any(|r| r.id.matches(id)) {
            tracing::warn!(repo = %id, "not listed in the repository table");
        }
    }
    subsync_core::roster::filter_ids(records, ids)
}

/// Open the repository table with the configured columns and delimiter.
pub(crate) fn load_roster(
    path: &std::path::Path,
    config: &Config,
) -> Result<Vec<subsync_core::SubmissionRecord>> {
    let delimiter = config.delimiter_byte()?;
    let roster = subsync_core::Roster::open_with_delimiter(path, &config.columns, delimiter)
        .with_context(|| format!("cannot read repository table {}", path.display()))?;
    let records = roster
        .load()
        .with_context(|| format!("invalid repository table {}", path.display()))?;
    tracing::debug!(
        rows = records.len(),
        reference_column = roster.has_reference_column(),
        "loaded repository table"
    );
    Ok(records)
}
