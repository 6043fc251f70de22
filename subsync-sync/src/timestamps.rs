//! Result writer: the submission timestamp table.
//!
//! One row per processed record:
//!
//! ```text
//! team,commit,submitted_at,tagged_at,status,reference,no_commits,detail
//! teamA,5f3c…,2024-01-01 00:00:00,2024-01-02 00:00:00,created,submission,12,-
//! teamB,-,-,-,unchanged,submission,-,-
//! ```
//!
//! Absent values are written as `-`.
//!
//! ## Modes
//!
//! - **overwrite**: an existing table is first copied to
//!   `<file>-<YYYY-mm-dd-HH-MM-SS>.bak`. When the batch was restricted to
//!   some identifiers, rows of the previous table for other identifiers
//!   are carried over. The new table is written to `<file>.tmp` and renamed
//!   into place.
//! - **append**: rows are added to the end; the header is written only to
//!   a missing or empty file, and an existing file must carry the same
//!   header.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use subsync_core::config::{FailedRows, TimeZoneChoice, WriteMode};
use subsync_core::SyncStatus;

use crate::error::{csv_err, io_err, OutputError};
use crate::synchronizer::RecordReport;

pub const HEADER: [&str; 8] = [
    "team",
    "commit",
    "submitted_at",
    "tagged_at",
    "status",
    "reference",
    "no_commits",
    "detail",
];

/// Placeholder for an absent value.
pub const MISSING: &str = "-";

/// One row of the timestamp table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampRow {
    pub team: String,
    pub commit: String,
    pub submitted_at: String,
    pub tagged_at: String,
    pub status: String,
    /// Older tables call this column `tag`.
    #[serde(alias = "tag", default = "missing")]
    pub reference: String,
    #[serde(default = "missing")]
    pub no_commits: String,
    #[serde(default = "missing")]
    pub detail: String,
}

fn missing() -> String {
    MISSING.to_string()
}

impl TimestampRow {
    pub fn status(&self) -> Option<SyncStatus> {
        self.status.parse().ok()
    }

    pub fn commit(&self) -> Option<&str> {
        Some(self.commit.as_str()).filter(|c| !c.is_empty() && *c != MISSING)
    }
}

/// How rows are rendered and stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterOptions {
    pub mode: WriteMode,
    pub failed: FailedRows,
    pub timezone: TimeZoneChoice,
    pub date_format: String,
    /// Carry over rows of other identifiers from the previous table
    /// (overwrite mode only).
    pub keep_other_rows: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            mode: WriteMode::Overwrite,
            failed: FailedRows::Flag,
            timezone: TimeZoneChoice::Local,
            date_format: subsync_core::config::DEFAULT_DATE_FORMAT.to_string(),
            keep_other_rows: false,
        }
    }
}

/// What [`TimestampWriter::write`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    pub path: PathBuf,
    pub rows_written: usize,
    pub carried_over: usize,
    pub backup: Option<PathBuf>,
}

/// Writes [`RecordReport`]s to a timestamp table.
#[derive(Debug, Clone)]
pub struct TimestampWriter {
    path: PathBuf,
    options: WriterOptions,
}

impl TimestampWriter {
    /// Fails when `options.date_format` is not a valid strftime string.
    pub fn new(path: impl Into<PathBuf>, options: WriterOptions) -> Result<Self, OutputError> {
        validate_date_format(&options.date_format)?;
        Ok(Self {
            path: path.into(),
            options,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Render reports as rows, honouring the failed-row policy.
    pub fn rows(&self, reports: &[RecordReport]) -> Vec<TimestampRow> {
        reports
            .iter()
            .filter(|r| {
                r.outcome.status != SyncStatus::Failed || self.options.failed == FailedRows::Flag
            })
            .map(|r| self.row(r))
            .collect()
    }

    fn row(&self, report: &RecordReport) -> TimestampRow {
        let outcome = &report.outcome;
        let snapshot = outcome.snapshot.as_ref();
        TimestampRow {
            team: report.record.id.0.clone(),
            commit: snapshot.map_or_else(missing, |s| s.commit.0.clone()),
            submitted_at: snapshot.map_or_else(missing, |s| self.format_time(s.committed_at)),
            tagged_at: snapshot.map_or_else(missing, |s| self.format_time(s.tagged_at)),
            status: outcome.status.to_string(),
            reference: outcome.reference.0.clone(),
            no_commits: snapshot
                .and_then(|s| s.commit_count)
                .map_or_else(missing, |n| n.to_string()),
            detail: outcome
                .detail
                .as_deref()
                .map(single_line)
                .unwrap_or_else(missing),
        }
    }

    fn format_time(&self, at: DateTime<Utc>) -> String {
        let format = self.options.date_format.as_str();
        match self.options.timezone {
            TimeZoneChoice::Utc => at.format(format).to_string(),
            TimeZoneChoice::Local => at.with_timezone(&Local).format(format).to_string(),
        }
    }

    /// Persist `reports` according to the configured mode.
    pub fn write(&self, reports: &[RecordReport]) -> Result<WriteSummary, OutputError> {
        let rows = self.rows(reports);
        match self.options.mode {
            WriteMode::Overwrite => self.overwrite(reports, rows),
            WriteMode::Append => self.append(rows),
        }
    }

    fn overwrite(
        &self,
        reports: &[RecordReport],
        rows: Vec<TimestampRow>,
    ) -> Result<WriteSummary, OutputError> {
        let mut backup = None;
        let mut carried = Vec::new();
        if self.path.exists() {
            if self.options.keep_other_rows {
                let processed: HashSet<String> = reports
                    .iter()
                    .map(|r| r.record.id.0.to_lowercase())
                    .collect();
                carried = read_rows(&self.path)?
                    .into_iter()
                    .filter(|row| !processed.contains(&row.team.to_lowercase()))
                    .collect();
            }
            let bak = backup_path(&self.path, Local::now());
            std::fs::copy(&self.path, &bak).map_err(|e| io_err(&bak, e))?;
            tracing::info!(backup = %bak.display(), "backed up previous timestamp table");
            backup = Some(bak);
        }

        let tmp = PathBuf::from(format!("{}.tmp", self.path.display()));
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        let result = write_table(&tmp, carried.iter().chain(rows.iter()));
        if let Err(err) = result {
            let _ = std::fs::remove_file(&tmp);
            return Err(err);
        }
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_err(&self.path, e));
        }

        Ok(WriteSummary {
            path: self.path.clone(),
            rows_written: rows.len(),
            carried_over: carried.len(),
            backup,
        })
    }

    fn append(&self, rows: Vec<TimestampRow>) -> Result<WriteSummary, OutputError> {
        let needs_header = match first_line(&self.path)? {
            None => true,
            Some(found) => {
                let expected = HEADER.join(",");
                if found.trim() != expected {
                    return Err(OutputError::HeaderMismatch {
                        path: self.path.clone(),
                        found,
                        expected,
                    });
                }
                false
            }
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| io_err(&self.path, e))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        for row in &rows {
            writer.serialize(row).map_err(|e| csv_err(&self.path, e))?;
        }
        writer.flush().map_err(|e| io_err(&self.path, e))?;

        Ok(WriteSummary {
            path: self.path.clone(),
            rows_written: rows.len(),
            carried_over: 0,
            backup: None,
        })
    }
}

/// Read a timestamp table back.
pub fn read_rows(path: &Path) -> Result<Vec<TimestampRow>, OutputError> {
    let file = File::open(path).map_err(|e| io_err(path, e))?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);
    reader
        .deserialize()
        .collect::<Result<Vec<TimestampRow>, _>>()
        .map_err(|e| csv_err(path, e))
}

/// `<file>-<YYYY-mm-dd-HH-MM-SS>.bak` next to `path`.
pub fn backup_path(path: &Path, now: DateTime<Local>) -> PathBuf {
    PathBuf::from(format!(
        "{}-{}.bak",
        path.display(),
        now.format("%Y-%m-%d-%H-%M-%S")
    ))
}

/// Reject strftime strings chrono cannot render.
pub fn validate_date_format(format: &str) -> Result<(), OutputError> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(OutputError::DateFormat(format.to_string()));
    }
    Ok(())
}

fn write_table<'a>(
    path: &Path,
    rows: impl Iterator<Item = &'a TimestampRow>,
) -> Result<(), OutputError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| csv_err(path, e))?;
    writer.write_record(HEADER).map_err(|e| csv_err(path, e))?;
    for row in rows {
        // Header already written; serialize would emit it again for the first row.
        writer
            .write_record([
                &row.team,
                &row.commit,
                &row.submitted_at,
                &row.tagged_at,
                &row.status,
                &row.reference,
                &row.no_commits,
                &row.detail,
            ])
            .map_err(|e| csv_err(path, e))?;
    }
    writer.flush().map_err(|e| io_err(path, e))
}

fn first_line(path: &Path) -> Result<Option<String>, OutputError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_err(path, e)),
    };
    let mut line = String::new();
    BufReader::new(file)
        .read_line(&mut line)
        .map_err(|e| io_err(path, e))?;
    let line = line.trim_end_matches(['\r', '\n']).to_string();
    Ok(Some(line).filter(|l| !l.trim().is_empty()))
}

fn single_line(detail: &str) -> String {
    detail.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::TimeZone;
    use subsync_core::{CommitId, RepoId, RepoLocator, SubmissionRecord, SyncReference};
    use subsync_git::RefKind;
    use tempfile::TempDir;

    use super::*;
    use crate::synchronizer::{Snapshot, SyncOutcome};

    fn report(id: &str, status: SyncStatus, commit: Option<&str>) -> RecordReport {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        RecordReport {
            record: SubmissionRecord {
                id: RepoId::from(id),
                locator: RepoLocator::from("/r"),
                reference: None,
                extra: BTreeMap::new(),
                line: 2,
            },
            outcome: SyncOutcome {
                status,
                reference: SyncReference::from("submission"),
                snapshot: commit.map(|c| Snapshot {
                    commit: CommitId::from(c),
                    kind: RefKind::AnnotatedTag,
                    committed_at: at,
                    tagged_at: at + chrono::Duration::days(1),
                    commit_count: Some(4),
                }),
                detail: (status == SyncStatus::Failed).then(|| "transport error:\n  boom".to_string()),
            },
        }
    }

    fn utc_options(mode: WriteMode) -> WriterOptions {
        WriterOptions {
            mode,
            timezone: TimeZoneChoice::Utc,
            date_format: "%Y-%m-%d".to_string(),
            ..WriterOptions::default()
        }
    }

    #[test]
    fn rows_render_missing_values_as_dash() {
        let writer = TimestampWriter::new("t.csv", utc_options(WriteMode::Overwrite)).unwrap();
        let rows = writer.rows(&[
            report("teamA", SyncStatus::Created, Some("c1")),
            report("teamB", SyncStatus::Unchanged, None),
        ]);
        assert_eq!(rows[0].commit, "c1");
        assert_eq!(rows[0].submitted_at, "2024-01-01");
        assert_eq!(rows[0].tagged_at, "2024-01-02");
        assert_eq!(rows[0].no_commits, "4");
        assert_eq!(rows[1].commit, MISSING);
        assert_eq!(rows[1].submitted_at, MISSING);
        assert_eq!(rows[1].status, "unchanged");
        assert_eq!(rows[1].commit(), None);
    }

    #[test]
    fn failed_rows_are_flagged_or_omitted() {
        let reports = [
            report("teamA", SyncStatus::Created, Some("c1")),
            report("teamB", SyncStatus::Failed, None),
        ];
        let flag = TimestampWriter::new("t.csv", utc_options(WriteMode::Overwrite)).unwrap();
        let rows = flag.rows(&reports);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].detail, "transport error: boom", "detail is one line");

        let omit = TimestampWriter::new(
            "t.csv",
            WriterOptions {
                failed: FailedRows::Omit,
                ..utc_options(WriteMode::Overwrite)
            },
        )
        .unwrap();
        assert_eq!(omit.rows(&reports).len(), 1);
    }

    #[test]
    fn invalid_date_format_is_rejected() {
        let err = TimestampWriter::new(
            "t.csv",
            WriterOptions {
                date_format: "%Q".to_string(),
                ..WriterOptions::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, OutputError::DateFormat(_)));
    }

    #[test]
    fn overwrite_backs_up_and_replaces() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("stamps.csv");
        let writer = TimestampWriter::new(&path, utc_options(WriteMode::Overwrite)).unwrap();

        let first = writer
            .write(&[report("teamA", SyncStatus::Created, Some("c1"))])
            .unwrap();
        assert!(first.backup.is_none());

        let second = writer
            .write(&[report("teamB", SyncStatus::Created, Some("c2"))])
            .unwrap();
        let bak = second.backup.expect("backup of previous table");
        assert!(bak.exists());
        assert_eq!(read_rows(&bak).unwrap()[0].team, "teamA");

        let rows = read_rows(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].team, "teamB");
        assert!(!PathBuf::from(format!("{}.tmp", path.display())).exists());
    }

    #[test]
    fn restricted_overwrite_carries_over_other_rows() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("stamps.csv");
        TimestampWriter::new(&path, utc_options(WriteMode::Overwrite))
            .unwrap()
            .write(&[
                report("teamA", SyncStatus::Created, Some("c1")),
                report("teamB", SyncStatus::Created, Some("c2")),
            ])
            .unwrap();

        let writer = TimestampWriter::new(
            &path,
            WriterOptions {
                keep_other_rows: true,
                ..utc_options(WriteMode::Overwrite)
            },
        )
        .unwrap();
        let summary = writer
            .write(&[report("TEAMB", SyncStatus::Updated, Some("c3"))])
            .unwrap();
        assert_eq!(summary.carried_over, 1);

        let rows = read_rows(&path).unwrap();
        let teams: Vec<_> = rows.iter().map(|r| (r.team.as_str(), r.commit.as_str())).collect();
        assert_eq!(teams, vec![("teamA", "c1"), ("TEAMB", "c3")]);
    }

    #[test]
    fn append_accumulates_history_with_single_header() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("stamps.csv");
        let writer = TimestampWriter::new(&path, utc_options(WriteMode::Append)).unwrap();
        writer
            .write(&[report("teamA", SyncStatus::Created, Some("c1"))])
            .unwrap();
        writer
            .write(&[report("teamA", SyncStatus::Updated, Some("c2"))])
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.matches("team,commit").count(), 1);
        let rows = read_rows(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].status(), Some(SyncStatus::Updated));
    }

    #[test]
    fn append_refuses_foreign_header() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("stamps.csv");
        std::fs::write(&path, "team,submitted_at,commit\nx,1,abc\n").unwrap();
        let writer = TimestampWriter::new(&path, utc_options(WriteMode::Append)).unwrap();
        let err = writer
            .write(&[report("teamA", SyncStatus::Created, Some("c1"))])
            .unwrap_err();
        assert!(matches!(err, OutputError::HeaderMismatch { .. }), "got: {err}");
    }

    #[test]
    fn reads_legacy_tables_with_tag_column() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("old.csv");
        std::fs::write(
            &path,
            "team,submitted_at,commit,tag,tagged_at,no_commits,status\nteamA,1/1/2024 0:0:0,abc,submission,1/1/2024 0:0:0,5,new\n",
        )
        .unwrap();
        let rows = read_rows(&path).unwrap();
        assert_eq!(rows[0].reference, "submission");
        assert_eq!(rows[0].status(), Some(SyncStatus::Created));
        assert_eq!(rows[0].detail, MISSING);
    }

    #[test]
    fn backup_name_has_timestamp_suffix() {
        let now = Local.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        let bak = backup_path(Path::new("out/stamps.csv"), now);
        assert_eq!(bak, PathBuf::from("out/stamps.csv-2024-03-05-07-08-09.bak"));
    }
}
