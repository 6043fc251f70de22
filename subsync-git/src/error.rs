//! Error types for subsync-git.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from talking to git.
///
/// The variants are the per-record failure classes of a batch:
/// [`GitError::ReferenceNotFound`] is not a failure at all for the
/// synchronizer (it drives the removed/unchanged branch), everything else
/// marks the record as failed.
#[derive(Debug, Error)]
pub enum GitError {
    /// The remote is reachable but does not carry the requested reference.
    #[error("reference '{reference}' not found at {url}")]
    ReferenceNotFound { url: String, reference: String },

    /// Network or remote-side failure (unreachable host, no such repository,
    /// authentication refused, fetch aborted).
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    /// The local working copy is missing, corrupted, or a local git command
    /// on it failed.
    #[error("working copy at {path} is unusable: {message}")]
    LocalState { path: PathBuf, message: String },

    /// The git executable could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// git succeeded but printed something we could not interpret.
    #[error("unexpected git output: {0}")]
    Parse(String),
}

impl GitError {
    pub fn is_reference_not_found(&self) -> bool {
        matches!(self, GitError::ReferenceNotFound { .. })
    }

    /// True when the error is about the local working copy rather than the
    /// remote.
    pub fn is_local_state(&self) -> bool {
        matches!(self, GitError::LocalState { .. })
    }
}
