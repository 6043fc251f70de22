//! The narrow interface the synchronizer needs from git.

use std::path::Path;

use chrono::{DateTime, Utc};
use subsync_core::{CommitId, SyncReference};

use crate::error::GitError;
use crate::refs::{self, RemoteRef, ResolvedRef};

/// Author of one commit, as recorded (after `.mailmap`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Author {
    pub name: String,
    pub email: String,
}

/// Remote and working-copy operations.
///
/// Remote operations take the URL; working-copy operations take the
/// checkout directory. Every method fails with a distinguishable
/// [`GitError`] variant.
pub trait GitOps {
    /// Every reference the remote advertises.
    fn list_references(&self, url: &str) -> Result<Vec<RemoteRef>, GitError>;

    /// Resolve `reference` on the remote to the commit it addresses.
    fn resolve(&self, url: &str, reference: &SyncReference) -> Result<ResolvedRef, GitError> {
        let listing = self.list_references(url)?;
        refs::resolve_in(&listing, reference).ok_or_else(|| GitError::ReferenceNotFound {
            url: url.to_string(),
            reference: reference.to_string(),
        })
    }

    /// Fresh clone of `url` into `dir`, checked out (detached) at `commit`.
    fn clone_at(&self, url: &str, dir: &Path, commit: &CommitId) -> Result<(), GitError>;

    /// Point the working copy's origin at `url` and fetch branches and tags
    /// from it, replacing moved tags and dropping withdrawn ones. The
    /// checkout is left alone.
    fn fetch(&self, url: &str, dir: &Path) -> Result<(), GitError>;

    /// Check out `commit` (already fetched) detached.
    fn checkout(&self, dir: &Path, commit: &CommitId) -> Result<(), GitError>;

    /// Commit currently checked out in `dir`.
    fn head(&self, dir: &Path) -> Result<CommitId, GitError>;

    fn commit_time(&self, dir: &Path, commit: &CommitId) -> Result<DateTime<Utc>, GitError>;

    /// Tagger date of the annotated tag `tag_ref` (full name), `None` for
    /// lightweight or unknown tags.
    fn tag_time(&self, dir: &Path, tag_ref: &str) -> Result<Option<DateTime<Utc>>, GitError>;

    /// Number of commits reachable from `commit`.
    fn commit_count(&self, dir: &Path, commit: &CommitId) -> Result<u64, GitError>;

    /// One entry per commit reachable from `rev`, newest first.
    fn authors(&self, dir: &Path, rev: &str) -> Result<Vec<Author>, GitError>;
}
