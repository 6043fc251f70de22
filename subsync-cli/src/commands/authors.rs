//! `subsync authors`: commits per author in each working copy.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use subsync_core::Config;
use subsync_git::GitCli;
use subsync_sync::{collect_authors, write_authors};

const DEFAULT_AUTHORS_FILE: &str = "submissions_authors.csv";

/// Arguments for `subsync authors`.
#[derive(Args, Debug)]
pub struct AuthorsArgs {
    /// CSV table listing the repositories.
    pub repos_csv: PathBuf,

    /// Directory holding the working copies from a previous `sync`.
    pub dest: PathBuf,

    /// Only process these identifiers (repeatable, case-insensitive).
    #[arg(long = "repo", value_name = "ID")]
    pub repos: Vec<String>,

    /// Where to write the author table.
    #[arg(long, value_name = "FILE", default_value = DEFAULT_AUTHORS_FILE)]
    pub output: PathBuf,
}

impl AuthorsArgs {
    pub fn run(self, config: &Config) -> Result<()> {
        let records = crate::load_roster(&self.repos_csv, config)?;
        let records = crate::select_records(records, &self.repos);

        let git = GitCli::new(&config.git.program);
        let counts = collect_authors(&git, &records, &self.dest);
        write_authors(&self.output, &counts)
            .with_context(|| format!("failed to write {}", self.output.display()))?;

        let teams = counts
            .iter()
            .map(|c| c.team.as_str())
            .collect::<std::collections::BTreeSet<_>>()
            .len();
        println!(
            "✓ {} authors across {} repositories written to {}",
            counts.len(),
            teams,
            self.output.display()
        );
        Ok(())
    }
}
