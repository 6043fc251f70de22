//! Test support shared by the workspace: throwaway upstream repositories
//! driven through the real `git` binary.

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

pub const JAN_1_2024: i64 = 1_704_067_200;
pub const DAY: i64 = 24 * 60 * 60;

pub fn git(dir: &Path, args: &[&str], when: i64) -> String {
    let date = format!("{when} +0000");
    let output = Command::new("git")
        .args(["-c", "commit.gpgsign=false", "-c", "tag.gpgsign=false"])
        .arg("-C")
        .arg(dir)
        .args(args)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .env("GIT_AUTHOR_NAME", "Ada Student")
        .env("GIT_AUTHOR_EMAIL", "ada@example.edu")
        .env("GIT_COMMITTER_NAME", "Ada Student")
        .env("GIT_COMMITTER_EMAIL", "ada@example.edu")
        .env("GIT_AUTHOR_DATE", &date)
        .env("GIT_COMMITTER_DATE", &date)
        .output()
        .expect("run git command");
    assert!(
        output.status.success(),
        "git {:?} failed:\nstdout: {}\nstderr: {}",
        args,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr),
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A non-bare repository used as the remote of a test.
pub struct Upstream {
    dir: TempDir,
}

impl Default for Upstream {
    fn default() -> Self {
        Self::new()
    }
}

impl Upstream {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("upstream tempdir");
        git(dir.path(), &["init", "--quiet"], JAN_1_2024);
        git(
            dir.path(),
            &["symbolic-ref", "HEAD", "refs/heads/main"],
            JAN_1_2024,
        );
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn url(&self) -> String {
        self.dir.path().display().to_string()
    }

    /// Commit `content` to `file` at unix time `when`; returns the commit id.
    pub fn commit(&self, file: &str, content: &str, when: i64) -> String {
        std::fs::write(self.path().join(file), content).expect("write upstream file");
        git(self.path(), &["add", file], when);
        git(self.path(), &["commit", "--quiet", "-m", file], when);
        git(self.path(), &["rev-parse", "HEAD"], when)
    }

    pub fn commit_as(&self, file: &str, name: &str, email: &str, when: i64) -> String {
        std::fs::write(self.path().join(file), file).expect("write upstream file");
        git(self.path(), &["add", file], when);
        let author = format!("{name} <{email}>");
        git(
            self.path(),
            &["commit", "--quiet", "-m", file, "--author", &author],
            when,
        );
        git(self.path(), &["rev-parse", "HEAD"], when)
    }

    /// Create or move an annotated tag to HEAD, tagged at `when`.
    pub fn tag_annotated(&self, name: &str, when: i64) {
        git(self.path(), &["tag", "-f", "-a", name, "-m", name], when);
    }

    /// Create or move a lightweight tag to HEAD.
    pub fn tag_lightweight(&self, name: &str) {
        git(self.path(), &["tag", "-f", name], JAN_1_2024);
    }

    pub fn delete_tag(&self, name: &str) {
        git(self.path(), &["tag", "-d", name], JAN_1_2024);
    }
}
