//! `subsync sync`: bring every working copy to its reference and record
//! the submission timestamps.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use subsync_core::config::{FailedRows, TimeZoneChoice, WriteMode};
use subsync_core::{Config, RepoId, SyncReference, SyncStatus};
use subsync_git::GitCli;
use subsync_sync::{
    prune_untracked, BatchSummary, SyncOptions, Synchronizer, TimestampWriter, WriterOptions,
};

/// Arguments for `subsync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// CSV table listing the repositories.
    pub repos_csv: PathBuf,

    /// Tag or branch to synchronize to (e.g. `submission`).
    pub reference: String,

    /// Directory holding one working copy per repository.
    pub dest: PathBuf,

    /// Only process these identifiers (repeatable, case-insensitive).
    #[arg(long = "repo", value_name = "ID")]
    pub repos: Vec<String>,

    /// Timestamp table to write.
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Append to the timestamp table instead of replacing it.
    #[arg(long)]
    pub append: bool,

    /// Leave failed repositories out of the timestamp table.
    #[arg(long)]
    pub omit_failed: bool,

    /// Write timestamps in UTC instead of local time.
    #[arg(long)]
    pub utc: bool,

    /// strftime format for timestamps.
    #[arg(long, value_name = "FMT")]
    pub date_format: Option<String>,

    /// Identifier column name.
    #[arg(long, value_name = "C")]
    pub id_column: Option<String>,

    /// Repository URL column name.
    #[arg(long, value_name = "C")]
    pub url_column: Option<String>,

    /// Per-row reference override column name.
    #[arg(long, value_name = "C")]
    pub ref_column: Option<String>,

    /// Afterwards, delete working copies under DEST for identifiers no
    /// longer in the table.
    #[arg(long, conflicts_with = "repos")]
    pub prune: bool,
}

impl SyncArgs {
    pub fn run(self, config: &Config) -> Result<()> {
        let config = self.apply_overrides(config.clone());

        let records = crate::load_roster(&self.repos_csv, &config)?;
        let restricted = !self.repos.is_empty();
        let records = crate::select_records(records, &self.repos);

        std::fs::create_dir_all(&self.dest)
            .with_context(|| format!("cannot create destination {}", self.dest.display()))?;
        let dest = std::fs::canonicalize(&self.dest)
            .with_context(|| format!("cannot resolve destination {}", self.dest.display()))?;

        let writer = TimestampWriter::new(
            &config.timestamps.file,
            WriterOptions {
                mode: config.timestamps.mode,
                failed: config.timestamps.failed,
                timezone: config.timestamps.timezone,
                date_format: config.timestamps.date_format.clone(),
                keep_other_rows: restricted,
            },
        )
        .context("invalid timestamp settings")?;

        let git = GitCli::new(&config.git.program);
        let options = SyncOptions {
            reference: SyncReference::from(self.reference.as_str()),
            dest: dest.clone(),
            remote_prefix: config.remote_prefix.clone(),
        };
        let reports = Synchronizer::new(&git, &options).run(records);

        let written = writer
            .write(&reports)
            .with_context(|| format!("failed to write {}", writer.path().display()))?;

        print_summary(&BatchSummary::from_reports(&reports));
        if self.prune {
            let pruned = prune_untracked(&dest, reports.iter().map(|r| &r.record.id))
                .with_context(|| format!("failed to prune {}", dest.display()))?;
            if !pruned.is_empty() {
                let names: Vec<String> = pruned
                    .iter()
                    .filter_map(|p| p.file_name())
                    .map(|n| n.to_string_lossy().into_owned())
                    .collect();
                println!(
                    "{} ({}): {}",
                    "PRUNED".yellow().bold(),
                    pruned.len(),
                    names.join(", ")
                );
            }
        }
        println!(
            "Timestamps: {} ({} rows{}, {})",
            written.path.display(),
            written.rows_written,
            if written.carried_over > 0 {
                format!(", {} carried over", written.carried_over)
            } else {
                String::new()
            },
            config.timestamps.mode,
        );
        if let Some(backup) = &written.backup {
            println!("Previous table saved as {}", backup.display());
        }
        Ok(())
    }

    fn apply_overrides(&self, mut config: Config) -> Config {
        if let Some(output) = &self.output {
            config.timestamps.file = output.clone();
        }
        if self.append {
            config.timestamps.mode = WriteMode::Append;
        }
        if self.omit_failed {
            config.timestamps.failed = FailedRows::Omit;
        }
        if self.utc {
            config.timestamps.timezone = TimeZoneChoice::Utc;
        }
        if let Some(format) = &self.date_format {
            config.timestamps.date_format = format.clone();
        }
        if let Some(id) = &self.id_column {
            config.columns.id = id.clone();
        }
        if let Some(url) = &self.url_column {
            config.columns.url = url.clone();
        }
        if let Some(reference) = &self.ref_column {
            config.columns.reference = Some(reference.clone());
        }
        config
    }
}

fn print_summary(summary: &BatchSummary) {
    println!(
        "Processed {} repositories: {} created, {} updated, {} unchanged, {} removed, {} failed",
        summary.total(),
        summary.count(SyncStatus::Created).to_string().green(),
        summary.count(SyncStatus::Updated).to_string().cyan(),
        summary.count(SyncStatus::Unchanged),
        summary.count(SyncStatus::Removed).to_string().yellow(),
        summary.count(SyncStatus::Failed).to_string().red(),
    );
    print_group("NEW", &summary.created, |s| s.green().bold().to_string());
    print_group("UPDATED", &summary.updated, |s| s.cyan().bold().to_string());
    print_group("REMOVED", &summary.removed, |s| s.yellow().bold().to_string());
    if !summary.failed.is_empty() {
        println!("{} ({}):", "FAILED".red().bold(), summary.failed.len());
        for (id, detail) in &summary.failed {
            println!("  ✗  {id}: {detail}");
        }
    }
}

fn print_group(label: &str, ids: &[RepoId], paint: impl Fn(&str) -> String) {
    if ids.is_empty() {
        return;
    }
    let names: Vec<&str> = ids.iter().map(|id| id.0.as_str()).collect();
    println!("{} ({}): {}", paint(label), ids.len(), names.join(", "));
}
