//! Error types for subsync-sync.

use std::path::PathBuf;

use thiserror::Error;

use subsync_git::GitError;

/// Why a single record failed. Never escapes the record boundary: the
/// synchronizer turns it into a `failed` outcome.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error(transparent)]
    Git(#[from] GitError),

    /// Removing a working copy or preparing its directory failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RecordError {
    /// The working copy itself is broken; deleting it lets the next run
    /// start from a fresh clone.
    pub fn is_local_state(&self) -> bool {
        matches!(self, RecordError::Git(e) if e.is_local_state())
    }
}

/// Errors writing or reading output tables. Always fatal.
#[derive(Debug, Error)]
pub enum OutputError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error at {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Append mode refuses to mix rows into a table with another layout.
    #[error("cannot append to {path}: header is '{found}', expected '{expected}'")]
    HeaderMismatch {
        path: PathBuf,
        found: String,
        expected: String,
    },

    #[error("invalid date format '{0}'")]
    DateFormat(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> OutputError {
    OutputError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn csv_err(path: impl Into<PathBuf>, source: csv::Error) -> OutputError {
    OutputError::Csv {
        path: path.into(),
        source,
    }
}
