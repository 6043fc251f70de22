//! # subsync-sync
//!
//! Batch synchronization of submission repositories and the tables it
//! produces.
//!
//! [`Synchronizer::run`] brings every working copy under the destination
//! directory to the commit its reference names and reports one
//! [`SyncOutcome`] per record. [`TimestampWriter`] turns those reports into
//! the submission timestamp table; [`collect_authors`] counts commits per
//! author over the resulting working copies.

pub mod authors;
pub mod error;
pub mod synchronizer;
pub mod timestamps;

pub use authors::{collect_authors, write_authors, AuthorCount};
pub use error::{OutputError, RecordError};
pub use synchronizer::{
    prune_untracked, BatchSummary, RecordReport, Snapshot, SyncOptions, SyncOutcome, Synchronizer,
};
pub use timestamps::{read_rows, TimestampRow, TimestampWriter, WriteSummary, WriterOptions};
