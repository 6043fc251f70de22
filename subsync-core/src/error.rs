//! Error types for subsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// Malformed input table. Always fatal: nothing is synchronized when the
/// roster cannot be read.
#[derive(Debug, Error)]
pub enum InputError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV syntax error: includes file path and the position reported by `csv`.
    #[error("failed to parse CSV at {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A required column is not present in the header row.
    #[error("{path}: required column '{column}' is missing (found: {found})")]
    MissingColumn {
        path: PathBuf,
        column: String,
        found: String,
    },

    /// A data row has an empty identifier cell.
    #[error("{path}:{line}: empty value in identifier column '{column}'")]
    EmptyIdentifier {
        path: PathBuf,
        line: u64,
        column: String,
    },

    /// A data row has an empty remote locator cell.
    #[error("{path}:{line}: empty value in locator column '{column}' for '{id}'")]
    EmptyLocator {
        path: PathBuf,
        line: u64,
        column: String,
        id: String,
    },

    /// The identifier cannot be turned into a working-copy directory name.
    #[error("{path}:{line}: identifier '{id}' cannot be used as a directory name")]
    InvalidIdentifier { path: PathBuf, line: u64, id: String },

    /// Two rows map to the same working-copy directory.
    #[error("{path}:{line}: identifier '{id}' collides with line {first_line} (directory '{dir}')")]
    DuplicateIdentifier {
        path: PathBuf,
        line: u64,
        first_line: u64,
        id: String,
        dir: String,
    },
}

/// Errors from loading the optional YAML configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load: includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The explicitly requested config file does not exist.
    #[error("config file not found at {path}")]
    NotFound { path: PathBuf },

    /// A value parsed but is not acceptable.
    #[error("invalid config value for '{key}': {reason}")]
    Invalid { key: &'static str, reason: String },
}

pub(crate) fn input_io_err(path: impl Into<PathBuf>, source: std::io::Error) -> InputError {
    InputError::Io {
        path: path.into(),
        source,
    }
}
