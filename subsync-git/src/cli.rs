//! [`GitOps`] backed by the `git` executable.
//!
//! Remote-facing commands (`ls-remote`, `clone`, `fetch`) map failures to
//! [`GitError::Transport`]; commands run inside a working copy map them to
//! [`GitError::LocalState`]. Every command runs with
//! `GIT_TERMINAL_PROMPT=0`, so a private or missing repository fails
//! instead of waiting for credentials. Commands inside a working copy run
//! on its absolute path with the parent as ceiling, and the copy must be
//! the top level of its own repository: a broken copy never lets git
//! climb into an enclosing one.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use chrono::{DateTime, TimeZone, Utc};
use subsync_core::CommitId;

use crate::error::GitError;
use crate::ops::{Author, GitOps};
use crate::refs::{self, RemoteRef};

const FIELD_SEP: char = '\u{1f}';

/// Git client shelling out to `program`.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn output<I, S>(&self, dir: Option<&Path>, args: I) -> Result<Output, GitError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(&self.program);
        cmd.env("GIT_TERMINAL_PROMPT", "0")
            .args(["-c", "advice.detachedHead=false"]);
        if let Some(dir) = dir {
            // Git ignores relative ceiling entries.
            let dir = absolute(dir)?;
            if let Some(parent) = dir.parent() {
                cmd.env("GIT_CEILING_DIRECTORIES", parent);
            }
            cmd.arg("-C").arg(&dir);
        }
        cmd.args(args);
        tracing::trace!(command = ?cmd, "running git");
        cmd.output().map_err(|e| GitError::Spawn {
            program: self.program.clone(),
            source: e,
        })
    }

    fn remote<I, S>(&self, url: &str, dir: Option<&Path>, args: I) -> Result<String, GitError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = self.output(dir, args)?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }
        Err(GitError::Transport {
            url: url.to_string(),
            message: failure_message(&output),
        })
    }

    fn local<I, S>(&self, dir: &Path, args: I) -> Result<String, GitError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = self.output(Some(dir), args)?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }
        Err(GitError::LocalState {
            path: dir.to_path_buf(),
            message: failure_message(&output),
        })
    }

    /// `dir` must be the top level of its own repository.
    fn ensure_working_copy(&self, dir: &Path) -> Result<(), GitError> {
        if !dir.join(".git").exists() {
            return Err(GitError::LocalState {
                path: dir.to_path_buf(),
                message: "not a git working copy (no .git)".to_string(),
            });
        }
        let stdout = self.local(dir, ["rev-parse", "--show-toplevel"])?;
        let toplevel = absolute(Path::new(stdout.trim()))?;
        if toplevel != absolute(dir)? {
            return Err(GitError::LocalState {
                path: dir.to_path_buf(),
                message: format!("working copy resolves to {}", toplevel.display()),
            });
        }
        Ok(())
    }
}

impl GitOps for GitCli {
    fn list_references(&self, url: &str) -> Result<Vec<RemoteRef>, GitError> {
        let stdout = self.remote(url, None, ["ls-remote", url])?;
        refs::parse_ls_remote(&stdout)
    }

    fn clone_at(&self, url: &str, dir: &Path, commit: &CommitId) -> Result<(), GitError> {
        if let Some(parent) = dir.parent() {
            std::fs::create_dir_all(parent).map_err(|e| GitError::LocalState {
                path: parent.to_path_buf(),
                message: e.to_string(),
            })?;
        }
        let dir_arg = dir.as_os_str();
        self.remote(
            url,
            None,
            [
                OsStr::new("clone"),
                OsStr::new("--quiet"),
                OsStr::new("--no-checkout"),
                OsStr::new(url),
                dir_arg,
            ],
        )?;
        self.remote(
            url,
            Some(dir),
            ["fetch", "--quiet", "--tags", "--force", "origin"],
        )?;
        self.local(
            dir,
            ["checkout", "--quiet", "--detach", "--force", commit.as_str()],
        )?;
        Ok(())
    }

    fn fetch(&self, url: &str, dir: &Path) -> Result<(), GitError> {
        self.ensure_working_copy(dir)?;
        // The locator may have changed since the clone.
        self.local(dir, ["remote", "set-url", "origin", url])?;
        // Tags are forced: a re-created submission tag must replace the old one.
        self.remote(
            url,
            Some(dir),
            [
                "fetch",
                "--quiet",
                "--tags",
                "--force",
                "--prune",
                "--prune-tags",
                "origin",
            ],
        )?;
        Ok(())
    }

    fn checkout(&self, dir: &Path, commit: &CommitId) -> Result<(), GitError> {
        self.ensure_working_copy(dir)?;
        self.local(
            dir,
            ["checkout", "--quiet", "--detach", "--force", commit.as_str()],
        )?;
        Ok(())
    }

    fn head(&self, dir: &Path) -> Result<CommitId, GitError> {
        self.ensure_working_copy(dir)?;
        let stdout = self.local(dir, ["rev-parse", "--verify", "HEAD^{commit}"])?;
        Ok(CommitId::from(stdout.trim()))
    }

    fn commit_time(&self, dir: &Path, commit: &CommitId) -> Result<DateTime<Utc>, GitError> {
        let stdout = self.local(dir, ["log", "-1", "--format=%ct", commit.as_str()])?;
        parse_unix_seconds(stdout.trim())
    }

    fn tag_time(&self, dir: &Path, tag_ref: &str) -> Result<Option<DateTime<Utc>>, GitError> {
        let stdout = self.local(
            dir,
            [
                "for-each-ref",
                "--format=%(objecttype) %(taggerdate:raw)",
                tag_ref,
            ],
        )?;
        let mut fields = stdout.split_whitespace();
        match (fields.next(), fields.next()) {
            (Some("tag"), Some(seconds)) => parse_unix_seconds(seconds).map(Some),
            _ => Ok(None),
        }
    }

    fn commit_count(&self, dir: &Path, commit: &CommitId) -> Result<u64, GitError> {
        let stdout = self.local(dir, ["rev-list", "--count", commit.as_str()])?;
        stdout
            .trim()
            .parse()
            .map_err(|_| GitError::Parse(format!("rev-list --count printed '{}'", stdout.trim())))
    }

    fn authors(&self, dir: &Path, rev: &str) -> Result<Vec<Author>, GitError> {
        self.ensure_working_copy(dir)?;
        let stdout = self.local(dir, ["log", "--format=%aN%x1f%aE", rev])?;
        Ok(stdout
            .lines()
            .filter(|l| !l.is_empty())
            .map(|line| {
                let (name, email) = line.split_once(FIELD_SEP).unwrap_or((line, ""));
                Author {
                    name: name.to_string(),
                    email: email.to_string(),
                }
            })
            .collect())
    }
}

fn absolute(path: &Path) -> Result<PathBuf, GitError> {
    std::fs::canonicalize(path).map_err(|e| GitError::LocalState {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn parse_unix_seconds(raw: &str) -> Result<DateTime<Utc>, GitError> {
    let seconds: i64 = raw
        .parse()
        .map_err(|_| GitError::Parse(format!("expected unix seconds, got '{raw}'")))?;
    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| GitError::Parse(format!("timestamp out of range: {seconds}")))
}

fn failure_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let detail = if stderr.is_empty() { stdout } else { stderr };
    format!("git exited with {}: {}", output.status, detail)
}
