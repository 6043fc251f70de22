//! `subsync refs`: what a remote advertises, as the synchronizer sees it.

use anyhow::{Context, Result};
use clap::Args;
use tabled::{settings::Style, Table, Tabled};

use subsync_core::{Config, RepoLocator, SyncReference};
use subsync_git::{refs::resolve_in, GitCli, GitOps};

/// Arguments for `subsync refs`.
#[derive(Args, Debug)]
pub struct RefsArgs {
    /// Git URL, local path, or `owner/name`.
    pub locator: String,
}

#[derive(Tabled)]
struct RefRow {
    #[tabled(rename = "reference")]
    name: String,
    #[tabled(rename = "kind")]
    kind: String,
    #[tabled(rename = "commit")]
    commit: String,
}

impl RefsArgs {
    pub fn run(self, config: &Config) -> Result<()> {
        let url = RepoLocator::from(self.locator.as_str()).url(&config.remote_prefix);
        let git = GitCli::new(&config.git.program);
        let listing = git
            .list_references(&url)
            .with_context(|| format!("cannot list references of {url}"))?;

        let rows: Vec<RefRow> = listing
            .iter()
            .filter(|r| !r.peeled)
            .filter_map(|r| resolve_in(&listing, &SyncReference::from(r.name.as_str())))
            .map(|resolved| RefRow {
                name: resolved.name,
                kind: resolved.kind.to_string(),
                commit: resolved.commit.0,
            })
            .collect();

        println!("{url}");
        if rows.is_empty() {
            println!("No references.");
            return Ok(());
        }
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}
