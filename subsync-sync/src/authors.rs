//! Per-author commit counts over existing working copies.
//!
//! Works on what a previous `sync` left under the destination directory;
//! no network access.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use subsync_core::SubmissionRecord;
use subsync_git::GitOps;

use crate::error::{csv_err, io_err, OutputError};

/// Commits by one author in one team's repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorCount {
    pub team: String,
    pub author: String,
    pub email: String,
    pub commits: u64,
}

/// Count commits per author at the checked-out commit of each record.
///
/// Records without a working copy, and working copies git cannot read,
/// are skipped with a warning. The result is sorted by team, then by
/// descending commit count, then by author name.
pub fn collect_authors<G: GitOps>(
    git: &G,
    records: &[SubmissionRecord],
    dest: &Path,
) -> Vec<AuthorCount> {
    let mut counts = Vec::new();
    for record in records {
        let dir = record.working_copy(dest);
        if !dir.exists() {
            tracing::warn!(repo = %record.id, dir = %dir.display(), "no working copy; skipping");
            continue;
        }
        let authors = match git.authors(&dir, "HEAD") {
            Ok(authors) => authors,
            Err(err) => {
                tracing::warn!(repo = %record.id, error = %err, "cannot read history; skipping");
                continue;
            }
        };

        let mut per_author: BTreeMap<_, u64> = BTreeMap::new();
        for author in authors {
            *per_author.entry(author).or_default() += 1;
        }
        tracing::debug!(repo = %record.id, authors = per_author.len(), "collected authors");
        counts.extend(per_author.into_iter().map(|(author, commits)| AuthorCount {
            team: record.id.0.clone(),
            author: author.name,
            email: author.email,
            commits,
        }));
    }

    counts.sort_by(|a, b| {
        a.team
            .cmp(&b.team)
            .then(b.commits.cmp(&a.commits))
            .then_with(|| a.author.cmp(&b.author))
    });
    counts
}

/// Write `counts` as `team,author,email,commits`.
pub fn write_authors(path: &Path, counts: &[AuthorCount]) -> Result<PathBuf, OutputError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let mut writer = csv::Writer::from_path(path).map_err(|e| csv_err(path, e))?;
    if counts.is_empty() {
        writer
            .write_record(["team", "author", "email", "commits"])
            .map_err(|e| csv_err(path, e))?;
    }
    for count in counts {
        writer.serialize(count).map_err(|e| csv_err(path, e))?;
    }
    writer.flush().map_err(|e| io_err(path, e))?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{DateTime, TimeZone, Utc};
    use subsync_core::{CommitId, RepoId, RepoLocator};
    use subsync_git::{Author, GitError, RemoteRef};
    use tempfile::TempDir;

    use super::*;

    struct History(Vec<(&'static str, &'static str)>);

    impl GitOps for History {
        fn list_references(&self, _url: &str) -> Result<Vec<RemoteRef>, GitError> {
            Ok(Vec::new())
        }
        fn clone_at(&self, _: &str, _: &Path, _: &CommitId) -> Result<(), GitError> {
            Ok(())
        }
        fn fetch(&self, _: &str, _: &Path) -> Result<(), GitError> {
            Ok(())
        }
        fn checkout(&self, _: &Path, _: &CommitId) -> Result<(), GitError> {
            Ok(())
        }
        fn head(&self, _: &Path) -> Result<CommitId, GitError> {
            Ok(CommitId::from("c"))
        }
        fn commit_time(&self, _: &Path, _: &CommitId) -> Result<DateTime<Utc>, GitError> {
            Ok(Utc.timestamp_opt(0, 0).unwrap())
        }
        fn tag_time(&self, _: &Path, _: &str) -> Result<Option<DateTime<Utc>>, GitError> {
            Ok(None)
        }
        fn commit_count(&self, _: &Path, _: &CommitId) -> Result<u64, GitError> {
            Ok(self.0.len() as u64)
        }
        fn authors(&self, _: &Path, _: &str) -> Result<Vec<Author>, GitError> {
            Ok(self
                .0
                .iter()
                .map(|(name, email)| Author {
                    name: name.to_string(),
                    email: email.to_string(),
                })
                .collect())
        }
    }

    fn record(id: &str) -> SubmissionRecord {
        SubmissionRecord {
            id: RepoId::from(id),
            locator: RepoLocator::from("/r"),
            reference: None,
            extra: BTreeMap::new(),
            line: 2,
        }
    }

    #[test]
    fn counts_are_grouped_and_sorted() {
        let dest = TempDir::new().unwrap();
        std::fs::create_dir(dest.path().join("teamB")).unwrap();
        std::fs::create_dir(dest.path().join("teamA")).unwrap();
        let git = History(vec![
            ("Bo", "bo@x"),
            ("Al", "al@x"),
            ("Bo", "bo@x"),
            ("Cy", "cy@x"),
        ]);

        let counts = collect_authors(
            &git,
            &[record("teamB"), record("teamA"), record("teamC")],
            dest.path(),
        );
        let rows: Vec<_> = counts
            .iter()
            .map(|c| (c.team.as_str(), c.author.as_str(), c.commits))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("teamA", "Bo", 2),
                ("teamA", "Al", 1),
                ("teamA", "Cy", 1),
                ("teamB", "Bo", 2),
                ("teamB", "Al", 1),
                ("teamB", "Cy", 1),
            ],
            "teamC has no working copy and is skipped"
        );
    }

    #[test]
    fn empty_result_still_writes_header() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("authors.csv");
        write_authors(&path, &[]).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "team,author,email,commits\n"
        );
    }
}
