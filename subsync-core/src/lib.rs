//! subsync core library: domain types, roster reading, configuration, errors.
//!
//! - [`types`]: newtypes, records and the outcome status
//! - [`roster`]: CSV row-source reader
//! - [`config`]: optional YAML configuration
//! - [`error`]: [`InputError`], [`ConfigError`]

pub mod config;
pub mod error;
pub mod roster;
pub mod types;

pub use config::Config;
pub use error::{ConfigError, InputError};
pub use roster::{Columns, Roster};
pub use types::{CommitId, RepoId, RepoLocator, SubmissionRecord, SyncReference, SyncStatus};
