//! Optional YAML configuration.
//!
//! # Lookup order
//!
//! 1. `--config <file>` (must exist)
//! 2. `./subsync.yaml`
//! 3. `<config_dir>/subsync/config.yaml` (`dirs::config_dir()`)
//! 4. built-in defaults
//!
//! Every key is optional. Command-line flags override whatever is loaded
//! here.
//!
//! ```yaml
//! columns:
//!   id: REPO_ID
//!   url: REPO_URL
//!   reference: REF
//! delimiter: ","
//! remote_prefix: "https://github.com/"
//! timestamps:
//!   file: submissions_timestamps.csv
//!   timezone: local        # or utc
//!   date_format: "%Y-%m-%d %H:%M:%S"
//!   failed: flag           # or omit
//!   mode: overwrite        # or append
//! git:
//!   program: git
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::roster::Columns;

pub const CONFIG_FILE_NAME: &str = "subsync.yaml";
pub const DEFAULT_TIMESTAMPS_FILE: &str = "submissions_timestamps.csv";
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DEFAULT_REMOTE_PREFIX: &str = "https://github.com/";

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Zone used when rendering timestamps in the output table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimeZoneChoice {
    #[default]
    Local,
    Utc,
}

/// What to do with failed records in the output table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailedRows {
    /// Write the row with status `failed` and the diagnostic.
    #[default]
    Flag,
    /// Leave failed records out of the table.
    Omit,
}

/// How the output table is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    #[default]
    Overwrite,
    Append,
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteMode::Overwrite => write!(f, "overwrite"),
            WriteMode::Append => write!(f, "append"),
        }
    }
}

impl FromStr for TimeZoneChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "utc" => Ok(Self::Utc),
            other => Err(format!("unknown timezone '{other}'; expected: local, utc")),
        }
    }
}

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

/// Output table settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimestampConfig {
    pub file: PathBuf,
    pub timezone: TimeZoneChoice,
    pub date_format: String,
    pub failed: FailedRows,
    pub mode: WriteMode,
}

impl Default for TimestampConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from(DEFAULT_TIMESTAMPS_FILE),
            timezone: TimeZoneChoice::default(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            failed: FailedRows::default(),
            mode: WriteMode::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    /// The git executable.
    pub program: PathBuf,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("git"),
        }
    }
}

/// Root of `subsync.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub columns: Columns,
    pub delimiter: char,
    pub remote_prefix: String,
    pub timestamps: TimestampConfig,
    pub git: GitConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            columns: Columns::default(),
            delimiter: ',',
            remote_prefix: DEFAULT_REMOTE_PREFIX.to_string(),
            timestamps: TimestampConfig::default(),
            git: GitConfig::default(),
        }
    }
}

impl Config {
    /// The delimiter as the single byte the CSV reader wants.
    pub fn delimiter_byte(&self) -> Result<u8, ConfigError> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| ConfigError::Invalid {
                key: "delimiter",
                reason: format!("'{}' is not a single ASCII character", self.delimiter),
            })
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Parse the config file at `path`.
pub fn load_at(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    let config: Config = serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    config.delimiter_byte()?;
    Ok(config)
}

/// Candidate locations searched when no explicit file is given.
pub fn default_paths_at(cwd: &Path, config_dir: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = vec![cwd.join(CONFIG_FILE_NAME)];
    if let Some(dir) = config_dir {
        paths.push(dir.join("subsync").join("config.yaml"));
    }
    paths
}

/// Resolve the effective config: `explicit` if given, else the first
/// existing default location, else built-in defaults.
pub fn resolve_at(
    explicit: Option<&Path>,
    cwd: &Path,
    config_dir: Option<&Path>,
) -> Result<(Config, Option<PathBuf>), ConfigError> {
    if let Some(path) = explicit {
        return Ok((load_at(path)?, Some(path.to_path_buf())));
    }
    for candidate in default_paths_at(cwd, config_dir) {
        if candidate.is_file() {
            let config = load_at(&candidate)?;
            return Ok((config, Some(candidate)));
        }
    }
    Ok((Config::default(), None))
}

/// `resolve_at` convenience wrapper using the process working directory and
/// `dirs::config_dir()`.
pub fn resolve(explicit: Option<&Path>) -> Result<(Config, Option<PathBuf>), ConfigError> {
    let cwd = std::env::current_dir().map_err(|e| ConfigError::Io {
        path: PathBuf::from("."),
        source: e,
    })?;
    let config_dir = dirs::config_dir();
    resolve_at(explicit, &cwd, config_dir.as_deref())
}
