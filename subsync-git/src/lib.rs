//! # subsync-git
//!
//! Git access for subsync: the [`GitOps`] trait the synchronizer is
//! written against, and [`GitCli`], the implementation that drives the
//! `git` executable.

pub mod cli;
pub mod error;
pub mod ops;
pub mod refs;

pub use cli::GitCli;
pub use error::GitError;
pub use ops::{Author, GitOps};
pub use refs::{RefKind, RemoteRef, ResolvedRef};
