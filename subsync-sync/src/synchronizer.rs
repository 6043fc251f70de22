//! Batch synchronizer.
//!
//! ## Decision table (per record)
//!
//! | remote reference | working copy      | action                       | status      |
//! |------------------|-------------------|------------------------------|-------------|
//! | absent           | present           | delete working copy          | `removed`   |
//! | absent           | absent            | nothing                      | `unchanged` |
//! | present          | absent            | clone, detached checkout     | `created`   |
//! | present          | HEAD ≠ resolved   | fetch, detached checkout     | `updated`   |
//! | present          | HEAD = resolved   | fetch                        | `unchanged` |
//!
//! An existing working copy is always fetched from the record's current
//! locator before its snapshot is taken, so tag dates reflect the remote
//! at run time.
//!
//! Any other error is caught at the record boundary and reported as
//! `failed`; the batch always runs to the end. A working copy git cannot
//! read is deleted so the next run clones it again, and a clone that fails
//! half-way leaves no directory behind.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use subsync_core::{CommitId, RepoId, SubmissionRecord, SyncReference, SyncStatus};
use subsync_git::{GitOps, RefKind, ResolvedRef};

use crate::error::RecordError;

// ---------------------------------------------------------------------------
// Options and outcomes
// ---------------------------------------------------------------------------

/// Batch-wide settings handed to the synchronizer at construction.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Reference used for records without an override.
    pub reference: SyncReference,
    /// Directory holding one working copy per record.
    pub dest: PathBuf,
    /// Prefix for `owner/name` locators.
    pub remote_prefix: String,
}

/// What the reference pointed to when the record was processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub commit: CommitId,
    pub kind: RefKind,
    pub committed_at: DateTime<Utc>,
    /// Tagger date for annotated tags, otherwise the commit date.
    pub tagged_at: DateTime<Utc>,
    /// Commits reachable from `commit`; `None` when git could not count them.
    pub commit_count: Option<u64>,
}

/// Result of processing one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub status: SyncStatus,
    pub reference: SyncReference,
    pub snapshot: Option<Snapshot>,
    /// Diagnostic; always set for `failed`.
    pub detail: Option<String>,
}

impl SyncOutcome {
    fn without_snapshot(status: SyncStatus, reference: SyncReference) -> Self {
        Self {
            status,
            reference,
            snapshot: None,
            detail: None,
        }
    }

    fn failed(reference: SyncReference, detail: String) -> Self {
        Self {
            status: SyncStatus::Failed,
            reference,
            snapshot: None,
            detail: Some(detail),
        }
    }
}

/// A record paired with its outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordReport {
    pub record: SubmissionRecord,
    pub outcome: SyncOutcome,
}

// ---------------------------------------------------------------------------
// Synchronizer
// ---------------------------------------------------------------------------

/// Synchronizes working copies under [`SyncOptions::dest`], one record at a
/// time.
pub struct Synchronizer<'a, G: GitOps> {
    git: &'a G,
    options: &'a SyncOptions,
}

impl<'a, G: GitOps> Synchronizer<'a, G> {
    pub fn new(git: &'a G, options: &'a SyncOptions) -> Self {
        Self { git, options }
    }

    /// Process every record in input order.
    pub fn run(&self, records: Vec<SubmissionRecord>) -> Vec<RecordReport> {
        let total = records.len();
        tracing::info!(
            total,
            dest = %self.options.dest.display(),
            reference = %self.options.reference,
            "synchronizing repositories"
        );
        records
            .into_iter()
            .enumerate()
            .map(|(n, record)| {
                tracing::info!(repo = %record.id, "processing {}/{}", n + 1, total);
                let outcome = self.sync_record(&record);
                RecordReport { record, outcome }
            })
            .collect()
    }

    /// Synchronize one record. Never fails: errors become `failed` outcomes.
    pub fn sync_record(&self, record: &SubmissionRecord) -> SyncOutcome {
        let reference = record.reference_or(&self.options.reference).clone();
        let working_copy = record.working_copy(&self.options.dest);

        match self.try_sync(record, &reference, &working_copy) {
            Ok(outcome) => {
                log_outcome(&record.id, &outcome);
                outcome
            }
            Err(err) => {
                tracing::warn!(repo = %record.id, error = %err, "synchronization failed");
                if err.is_local_state() && working_copy.exists() {
                    match remove_working_copy(&working_copy) {
                        Ok(()) => tracing::warn!(
                            repo = %record.id,
                            path = %working_copy.display(),
                            "removed unusable working copy; next run will clone again"
                        ),
                        Err(e) => tracing::error!(repo = %record.id, error = %e, "could not remove working copy"),
                    }
                }
                SyncOutcome::failed(reference, err.to_string())
            }
        }
    }

    fn try_sync(
        &self,
        record: &SubmissionRecord,
        reference: &SyncReference,
        working_copy: &Path,
    ) -> Result<SyncOutcome, RecordError> {
        let url = record.locator.url(&self.options.remote_prefix);
        let exists = working_copy.exists();
        tracing::debug!(repo = %record.id, %url, exists, "resolving {reference}");

        let resolved = match self.git.resolve(&url, reference) {
            Ok(resolved) => resolved,
            Err(err) if err.is_reference_not_found() => {
                if !exists {
                    return Ok(SyncOutcome::without_snapshot(
                        SyncStatus::Unchanged,
                        reference.clone(),
                    ));
                }
                remove_working_copy(working_copy)?;
                return Ok(SyncOutcome::without_snapshot(
                    SyncStatus::Removed,
                    reference.clone(),
                ));
            }
            Err(err) => return Err(err.into()),
        };

        let status = if exists {
            let head = self.git.head(working_copy)?;
            self.git.fetch(&url, working_copy)?;
            if head == resolved.commit {
                SyncStatus::Unchanged
            } else {
                tracing::debug!(repo = %record.id, from = head.short(), to = resolved.commit.short(), "updating");
                self.git.checkout(working_copy, &resolved.commit)?;
                SyncStatus::Updated
            }
        } else {
            if let Err(err) = self.git.clone_at(&url, working_copy, &resolved.commit) {
                if working_copy.exists() {
                    if let Err(e) = remove_working_copy(working_copy) {
                        tracing::error!(
                            repo = %record.id,
                            path = %working_copy.display(),
                            error = %e,
                            "could not remove partial clone"
                        );
                    }
                }
                return Err(err.into());
            }
            SyncStatus::Created
        };

        let snapshot = self.snapshot(working_copy, &resolved)?;
        Ok(SyncOutcome {
            status,
            reference: reference.clone(),
            snapshot: Some(snapshot),
            detail: None,
        })
    }

    fn snapshot(&self, working_copy: &Path, resolved: &ResolvedRef) -> Result<Snapshot, RecordError> {
        let committed_at = self.git.commit_time(working_copy, &resolved.commit)?;
        let tagged_at = match resolved.kind {
            RefKind::AnnotatedTag => self
                .git
                .tag_time(working_copy, &resolved.name)?
                .unwrap_or(committed_at),
            _ => committed_at,
        };
        let commit_count = match self.git.commit_count(working_copy, &resolved.commit) {
            Ok(count) => Some(count),
            Err(err) => {
                tracing::debug!(error = %err, "could not count commits");
                None
            }
        };
        Ok(Snapshot {
            commit: resolved.commit.clone(),
            kind: resolved.kind,
            committed_at,
            tagged_at,
            commit_count,
        })
    }
}

fn log_outcome(id: &RepoId, outcome: &SyncOutcome) {
    match &outcome.snapshot {
        Some(s) => tracing::info!(
            repo = %id,
            status = %outcome.status,
            commit = s.commit.short(),
            committed_at = %s.committed_at,
            "{} {}", outcome.reference, s.kind
        ),
        None => tracing::info!(repo = %id, status = %outcome.status, "no {} on remote", outcome.reference),
    }
}

fn remove_working_copy(path: &Path) -> Result<(), RecordError> {
    let result = if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    result.map_err(|e| RecordError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// Pruning
// ---------------------------------------------------------------------------

/// Delete working copies under `dest` that belong to none of `ids`.
///
/// Only directories holding a `.git` entry are considered; other files are
/// left alone. Returns the removed paths, sorted.
pub fn prune_untracked<'r>(
    dest: &Path,
    ids: impl IntoIterator<Item = &'r RepoId>,
) -> Result<Vec<PathBuf>, RecordError> {
    let tracked: HashSet<String> = ids.into_iter().filter_map(RepoId::dir_name).collect();
    let entries = std::fs::read_dir(dest).map_err(|e| RecordError::Io {
        path: dest.to_path_buf(),
        source: e,
    })?;

    let mut untracked = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| RecordError::Io {
            path: dest.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if path.is_dir() && path.join(".git").exists() && !tracked.contains(&name) {
            untracked.push(path);
        }
    }
    untracked.sort();

    for path in &untracked {
        remove_working_copy(path)?;
        tracing::warn!(path = %path.display(), "pruned working copy not in the table");
    }
    Ok(untracked)
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Identifiers grouped by outcome, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub created: Vec<RepoId>,
    pub updated: Vec<RepoId>,
    pub unchanged: Vec<RepoId>,
    pub removed: Vec<RepoId>,
    pub failed: Vec<(RepoId, String)>,
}

impl BatchSummary {
    pub fn from_reports(reports: &[RecordReport]) -> Self {
        let mut summary = Self::default();
        for report in reports {
            let id = report.record.id.clone();
            match report.outcome.status {
                SyncStatus::Created => summary.created.push(id),
                SyncStatus::Updated => summary.updated.push(id),
                SyncStatus::Unchanged => summary.unchanged.push(id),
                SyncStatus::Removed => summary.removed.push(id),
                SyncStatus::Failed => summary
                    .failed
                    .push((id, report.outcome.detail.clone().unwrap_or_default())),
            }
        }
        summary
    }

    pub fn count(&self, status: SyncStatus) -> usize {
        match status {
            SyncStatus::Created => self.created.len(),
            SyncStatus::Updated => self.updated.len(),
            SyncStatus::Unchanged => self.unchanged.len(),
            SyncStatus::Removed => self.removed.len(),
            SyncStatus::Failed => self.failed.len(),
        }
    }

    pub fn total(&self) -> usize {
        SyncStatus::ALL.iter().map(|s| self.count(*s)).sum()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
