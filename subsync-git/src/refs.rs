//! Remote reference listing and resolution.
//!
//! `git ls-remote` prints one `<sha>\t<refname>` line per reference. An
//! annotated tag appears twice: `refs/tags/x` names the tag object and
//! `refs/tags/x^{}` names the commit it points to. Resolution always
//! answers with a commit id, so annotated tags resolve through their
//! peeled line.

use std::fmt;

use subsync_core::{CommitId, SyncReference};

use crate::error::GitError;

const PEELED_SUFFIX: &str = "^{}";

/// What kind of reference a name resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    /// Tag object with its own tagger and date.
    AnnotatedTag,
    /// Bare pointer to a commit.
    LightweightTag,
    Branch,
    Head,
    Other,
}

impl RefKind {
    pub fn is_tag(self) -> bool {
        matches!(self, RefKind::AnnotatedTag | RefKind::LightweightTag)
    }
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefKind::AnnotatedTag => write!(f, "annotated tag"),
            RefKind::LightweightTag => write!(f, "lightweight tag"),
            RefKind::Branch => write!(f, "branch"),
            RefKind::Head => write!(f, "HEAD"),
            RefKind::Other => write!(f, "ref"),
        }
    }
}

/// One line of `git ls-remote`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    /// Full reference name without the `^{}` suffix.
    pub name: String,
    pub object: CommitId,
    /// True for the `^{}` line of an annotated tag.
    pub peeled: bool,
}

/// A reference name resolved to the commit it currently addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRef {
    /// Full reference name, e.g. `refs/tags/submission`.
    pub name: String,
    pub commit: CommitId,
    pub kind: RefKind,
}

/// Parse `git ls-remote` output.
pub fn parse_ls_remote(output: &str) -> Result<Vec<RemoteRef>, GitError> {
    let mut refs = Vec::new();
    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let Some((sha, name)) = line.split_once(char::is_whitespace) else {
            return Err(GitError::Parse(format!("ls-remote line without a name: {line}")));
        };
        let name = name.trim();
        if sha.is_empty() || !sha.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(GitError::Parse(format!("ls-remote line with bad object id: {line}")));
        }
        let (name, peeled) = match name.strip_suffix(PEELED_SUFFIX) {
            Some(base) => (base, true),
            None => (name, false),
        };
        refs.push(RemoteRef {
            name: name.to_string(),
            object: CommitId::from(sha),
            peeled,
        });
    }
    Ok(refs)
}

/// Resolve `reference` against a listing.
///
/// Short names are tried as `refs/tags/<name>` first, then
/// `refs/heads/<name>`; `HEAD` and full `refs/...` names match exactly.
pub fn resolve_in(refs: &[RemoteRef], reference: &SyncReference) -> Option<ResolvedRef> {
    let wanted = reference.as_str().trim();
    let candidates: Vec<String> = if wanted == "HEAD" || wanted.starts_with("refs/") {
        vec![wanted.to_string()]
    } else {
        vec![format!("refs/tags/{wanted}"), format!("refs/heads/{wanted}")]
    };

    candidates.iter().find_map(|name| resolve_name(refs, name))
}

fn resolve_name(refs: &[RemoteRef], name: &str) -> Option<ResolvedRef> {
    let peeled = refs.iter().find(|r| r.peeled && r.name == name);
    let direct = refs.iter().find(|r| !r.peeled && r.name == name);

    let (commit, kind) = match (peeled, direct) {
        (Some(p), _) => (p.object.clone(), RefKind::AnnotatedTag),
        (None, Some(d)) => (d.object.clone(), kind_of(name)),
        (None, None) => return None,
    };
    Some(ResolvedRef {
        name: name.to_string(),
        commit,
        kind,
    })
}

fn kind_of(name: &str) -> RefKind {
    if name == "HEAD" {
        RefKind::Head
    } else if name.starts_with("refs/tags/") {
        RefKind::LightweightTag
    } else if name.starts_with("refs/heads/") {
        RefKind::Branch
    } else {
        RefKind::Other
    }
}
