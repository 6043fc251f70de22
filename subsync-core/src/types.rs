//! Domain types shared by the roster reader, the git layer and the synchronizer.
//!
//! All path fields use `PathBuf`; identifiers, locators and references are
//! newtypes so they cannot be swapped by accident.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Team or student identifier, unique within a batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepoId(pub String);

impl RepoId {
    /// Single path component used for the working copy of this identifier.
    ///
    /// Separators, whitespace and control characters become `_`. Returns
    /// `None` when nothing usable is left (empty, `.` or `..`).
    pub fn dir_name(&self) -> Option<String> {
        let name: String = self
            .0
            .trim()
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' => '_',
                c if c.is_whitespace() || c.is_control() => '_',
                c => c,
            })
            .collect();
        match name.as_str() {
            "" | "." | ".." => None,
            _ => Some(name),
        }
    }

    /// Case-insensitive comparison used by `--repo` filters.
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other.trim())
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RepoId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RepoId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Where a repository lives: a git URL, a local path, or an `owner/name`
/// pair on the hosting platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoLocator(pub String);

impl RepoLocator {
    /// True for bare `owner/name` pairs (no scheme, no `:`, exactly two
    /// non-empty segments, not starting with `.`, `/` or `~`).
    pub fn is_owner_pair(&self) -> bool {
        let s = self.0.trim();
        if s.contains(':') || s.starts_with(['.', '/', '~']) {
            return false;
        }
        let mut parts = s.split('/');
        matches!(
            (parts.next(), parts.next(), parts.next()),
            (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty()
        )
    }

    /// The URL handed to git. Owner pairs are expanded with `prefix`
    /// (for example `https://github.com/`); anything else is used verbatim.
    pub fn url(&self, prefix: &str) -> String {
        let s = self.0.trim();
        if !self.is_owner_pair() {
            return s.to_string();
        }
        let prefix = if prefix.ends_with('/') || prefix.ends_with(':') {
            prefix.to_string()
        } else {
            format!("{prefix}/")
        };
        if s.ends_with(".git") {
            format!("{prefix}{s}")
        } else {
            format!("{prefix}{s}.git")
        }
    }
}

impl fmt::Display for RepoLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for RepoLocator {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for RepoLocator {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Tag or branch name selecting the commit to synchronize to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncReference(pub String);

impl SyncReference {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SyncReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for SyncReference {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for SyncReference {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Full hexadecimal commit id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitId(pub String);

impl CommitId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First seven characters, for log lines.
    pub fn short(&self) -> &str {
        self.0.get(..7).unwrap_or(&self.0)
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for CommitId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for CommitId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Outcome class of one record in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Created,
    Updated,
    Removed,
    Unchanged,
    Failed,
}

impl SyncStatus {
    pub const ALL: [SyncStatus; 5] = [
        SyncStatus::Created,
        SyncStatus::Updated,
        SyncStatus::Unchanged,
        SyncStatus::Removed,
        SyncStatus::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SyncStatus::Created => "created",
            SyncStatus::Updated => "updated",
            SyncStatus::Removed => "removed",
            SyncStatus::Unchanged => "unchanged",
            SyncStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "created" | "new" => Ok(SyncStatus::Created),
            "updated" => Ok(SyncStatus::Updated),
            "removed" => Ok(SyncStatus::Removed),
            "unchanged" => Ok(SyncStatus::Unchanged),
            "failed" => Ok(SyncStatus::Failed),
            other => Err(format!(
                "unknown status '{other}'; expected: created, updated, removed, unchanged, failed"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One row of the input table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRecord {
    pub id: RepoId,
    pub locator: RepoLocator,
    /// Per-record override of the batch reference.
    pub reference: Option<SyncReference>,
    /// Every other column of the row, keyed by header name.
    pub extra: BTreeMap<String, String>,
    /// 1-based line in the source file.
    pub line: u64,
}

impl SubmissionRecord {
    /// The reference to use for this record.
    pub fn reference_or<'a>(&'a self, batch: &'a SyncReference) -> &'a SyncReference {
        self.reference.as_ref().unwrap_or(batch)
    }

    /// Deterministic working-copy path under `dest`.
    ///
    /// Records produced by the roster reader always have a valid directory
    /// name; a hand-built record with an unusable id falls back to `_`.
    pub fn working_copy(&self, dest: &Path) -> PathBuf {
        dest.join(self.id.dir_name().unwrap_or_else(|| "_".to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
