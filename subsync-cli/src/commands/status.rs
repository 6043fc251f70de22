//! `subsync status`: show a timestamp table and how the working copies
//! compare to it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use subsync_core::{Config, RepoId, SyncStatus};
use subsync_git::{GitCli, GitOps};
use subsync_sync::{read_rows, TimestampRow};

/// Arguments for `subsync status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Timestamp table written by `subsync sync`.
    pub timestamps_csv: PathBuf,

    /// Check each row against the working copy under this directory.
    #[arg(long, value_name = "DIR")]
    pub dest: Option<PathBuf>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self, config: &Config) -> Result<()> {
        let mut rows = read_rows(&self.timestamps_csv)
            .with_context(|| format!("cannot read {}", self.timestamps_csv.display()))?;

        let checks: Vec<Option<CopyCheck>> = match &self.dest {
            Some(dest) => {
                // Appended tables hold a history; only the newest row per team
                // describes what should be on disk.
                rows = latest_per_team(rows);
                let git = GitCli::new(&config.git.program);
                rows.iter()
                    .map(|row| Some(check_working_copy(&git, dest, row)))
                    .collect()
            }
            None => vec![None; rows.len()],
        };

        let report = StatusReport {
            entries: rows
                .into_iter()
                .zip(checks)
                .map(|(row, check)| StatusEntry { row, check })
                .collect(),
        };

        if self.json {
            print_json(&report)?;
            return Ok(());
        }
        print_table(&report, &self.timestamps_csv);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Working-copy check
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum CopyCheck {
    /// HEAD is the recorded commit (or nothing recorded and nothing on disk).
    Current,
    Drifted { detail: String },
    Missing,
}

fn check_working_copy<G: GitOps>(git: &G, dest: &Path, row: &TimestampRow) -> CopyCheck {
    let Some(dir) = RepoId::from(row.team.as_str()).dir_name() else {
        return CopyCheck::Missing;
    };
    let dir = dest.join(dir);
    match (row.commit(), dir.exists()) {
        (None, false) => CopyCheck::Current,
        (None, true) => CopyCheck::Drifted {
            detail: "working copy present, no commit recorded".to_string(),
        },
        (Some(_), false) => CopyCheck::Missing,
        (Some(recorded), true) => match git.head(&dir) {
            Ok(head) if head.as_str() == recorded => CopyCheck::Current,
            Ok(head) => CopyCheck::Drifted {
                detail: format!("HEAD is {}", head.short()),
            },
            Err(err) => CopyCheck::Drifted {
                detail: err.to_string(),
            },
        },
    }
}

fn latest_per_team(rows: Vec<TimestampRow>) -> Vec<TimestampRow> {
    let mut order: Vec<String> = Vec::new();
    let mut latest: BTreeMap<String, TimestampRow> = BTreeMap::new();
    for row in rows {
        let key = row.team.to_lowercase();
        if !latest.contains_key(&key) {
            order.push(key.clone());
        }
        latest.insert(key, row);
    }
    order
        .into_iter()
        .filter_map(|key| latest.remove(&key))
        .collect()
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

struct StatusEntry {
    row: TimestampRow,
    check: Option<CopyCheck>,
}

struct StatusReport {
    entries: Vec<StatusEntry>,
}

impl StatusReport {
    fn count(&self, status: SyncStatus) -> usize {
        self.entries
            .iter()
            .filter(|e| e.row.status() == Some(status))
            .count()
    }

    fn count_check(&self, wanted: fn(&CopyCheck) -> bool) -> usize {
        self.entries
            .iter()
            .filter(|e| e.check.as_ref().is_some_and(wanted))
            .count()
    }
}

#[derive(Serialize)]
struct StatusReportJson {
    summary: BTreeMap<String, usize>,
    rows: Vec<StatusRowJson>,
}

#[derive(Serialize)]
struct StatusRowJson {
    team: String,
    commit: Option<String>,
    submitted_at: String,
    tagged_at: String,
    status: String,
    reference: String,
    no_commits: String,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    working_copy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    working_copy_detail: Option<String>,
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "team")]
    team: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "commit")]
    commit: String,
    #[tabled(rename = "submitted")]
    submitted_at: String,
    #[tabled(rename = "tagged")]
    tagged_at: String,
    #[tabled(rename = "working copy")]
    working_copy: String,
}

fn print_json(report: &StatusReport) -> Result<()> {
    let mut summary = BTreeMap::new();
    for status in SyncStatus::ALL {
        summary.insert(status.to_string(), report.count(status));
    }
    summary.insert("total".to_string(), report.entries.len());

    let payload = StatusReportJson {
        summary,
        rows: report
            .entries
            .iter()
            .map(|entry| StatusRowJson {
                team: entry.row.team.clone(),
                commit: entry.row.commit().map(str::to_string),
                submitted_at: entry.row.submitted_at.clone(),
                tagged_at: entry.row.tagged_at.clone(),
                status: entry.row.status.clone(),
                reference: entry.row.reference.clone(),
                no_commits: entry.row.no_commits.clone(),
                detail: entry.row.detail.clone(),
                working_copy: entry.check.as_ref().map(|c| check_key(c).to_string()),
                working_copy_detail: entry.check.as_ref().and_then(check_detail),
            })
            .collect(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
    );
    Ok(())
}

fn print_table(report: &StatusReport, path: &Path) {
    println!(
        "subsync v{} | {} | {} rows | {} created | {} updated | {} unchanged | {} removed | {} failed",
        env!("CARGO_PKG_VERSION"),
        path.display(),
        report.entries.len(),
        report.count(SyncStatus::Created),
        report.count(SyncStatus::Updated),
        report.count(SyncStatus::Unchanged),
        report.count(SyncStatus::Removed),
        report.count(SyncStatus::Failed),
    );
    if report.entries.is_empty() {
        println!("No rows.");
        return;
    }

    let rows: Vec<StatusTableRow> = report
        .entries
        .iter()
        .map(|entry| StatusTableRow {
            team: entry.row.team.clone(),
            status: paint_status(&entry.row.status),
            commit: entry
                .row
                .commit()
                .map(|c| c.get(..7).unwrap_or(c).to_string())
                .unwrap_or_else(|| "-".to_string()),
            submitted_at: entry.row.submitted_at.clone(),
            tagged_at: entry.row.tagged_at.clone(),
            working_copy: entry.check.as_ref().map_or_else(|| "-".to_string(), check_label),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    let drifted = report.count_check(|c| matches!(c, CopyCheck::Drifted { .. }));
    let missing = report.count_check(|c| matches!(c, CopyCheck::Missing));
    if drifted + missing > 0 {
        println!(
            "{} drifted, {} missing. Run 'subsync sync' to bring the working copies back in line.",
            drifted, missing
        );
    }
    for entry in &report.entries {
        if entry.row.status() == Some(SyncStatus::Failed) {
            println!("  ✗  {}: {}", entry.row.team, entry.row.detail);
        }
    }
}

fn paint_status(status: &str) -> String {
    match status.parse::<SyncStatus>() {
        Ok(SyncStatus::Created) => status.green().bold().to_string(),
        Ok(SyncStatus::Updated) => status.cyan().bold().to_string(),
        Ok(SyncStatus::Unchanged) => status.bright_black().to_string(),
        Ok(SyncStatus::Removed) => status.yellow().bold().to_string(),
        Ok(SyncStatus::Failed) => status.red().bold().to_string(),
        Err(_) => status.to_string(),
    }
}

fn check_key(check: &CopyCheck) -> &'static str {
    match check {
        CopyCheck::Current => "current",
        CopyCheck::Drifted { .. } => "drifted",
        CopyCheck::Missing => "missing",
    }
}

fn check_detail(check: &CopyCheck) -> Option<String> {
    match check {
        CopyCheck::Drifted { detail } => Some(detail.clone()),
        _ => None,
    }
}

fn check_label(check: &CopyCheck) -> String {
    match check {
        CopyCheck::Current => "■ current".green().to_string(),
        CopyCheck::Drifted { detail } => format!("{} ({detail})", "■ drifted".yellow()),
        CopyCheck::Missing => "■ missing".red().to_string(),
    }
}
