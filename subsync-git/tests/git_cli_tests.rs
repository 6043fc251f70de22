//! `GitCli` against real repositories created in temp dirs.

use subsync_core::{CommitId, SyncReference};
use subsync_git::{GitCli, GitError, GitOps, RefKind};
use subsync_testkit::{git, Upstream, DAY, JAN_1_2024};
use tempfile::TempDir;

#[test]
fn resolves_annotated_tag_to_its_commit() {
    let upstream = Upstream::new();
    let c1 = upstream.commit("a.txt", "one", JAN_1_2024);
    upstream.tag_annotated("submission", JAN_1_2024 + DAY);

    let resolved = GitCli::default()
        .resolve(&upstream.url(), &SyncReference::from("submission"))
        .expect("resolve");
    assert_eq!(resolved.commit, CommitId::from(c1));
    assert_eq!(resolved.kind, RefKind::AnnotatedTag);
    assert_eq!(resolved.name, "refs/tags/submission");
}

#[test]
fn missing_reference_is_reference_not_found() {
    let upstream = Upstream::new();
    upstream.commit("a.txt", "one", JAN_1_2024);

    let err = GitCli::default()
        .resolve(&upstream.url(), &SyncReference::from("submission"))
        .unwrap_err();
    assert!(err.is_reference_not_found(), "got: {err}");
}

#[test]
fn unreachable_remote_is_transport_error() {
    let tmp = TempDir::new().unwrap();
    let nowhere = tmp.path().join("no-such-repo");
    let err = GitCli::default()
        .list_references(&nowhere.display().to_string())
        .unwrap_err();
    assert!(matches!(err, GitError::Transport { .. }), "got: {err}");
}

#[test]
fn clone_checks_out_commit_and_reads_timestamps() {
    let upstream = Upstream::new();
    let c1 = upstream.commit("a.txt", "one", JAN_1_2024);
    upstream.tag_annotated("submission", JAN_1_2024 + DAY);
    upstream.commit("b.txt", "two", JAN_1_2024 + 2 * DAY);

    let git = GitCli::default();
    let resolved = git
        .resolve(&upstream.url(), &SyncReference::from("submission"))
        .expect("resolve");

    let dest = TempDir::new().unwrap();
    let wc = dest.path().join("nested").join("teamA");
    git.clone_at(&upstream.url(), &wc, &resolved.commit).expect("clone");

    assert_eq!(git.head(&wc).expect("head"), CommitId::from(c1.clone()));
    assert!(wc.join("a.txt").exists());
    assert!(!wc.join("b.txt").exists(), "later commit must not be checked out");

    let committed = git.commit_time(&wc, &resolved.commit).expect("commit time");
    assert_eq!(committed.timestamp(), JAN_1_2024);
    let tagged = git
        .tag_time(&wc, &resolved.name)
        .expect("tag time")
        .expect("annotated tag has a date");
    assert_eq!(tagged.timestamp(), JAN_1_2024 + DAY);
    assert_eq!(git.commit_count(&wc, &resolved.commit).expect("count"), 1);
}

#[test]
fn lightweight_tag_has_no_tag_time() {
    let upstream = Upstream::new();
    upstream.commit("a.txt", "one", JAN_1_2024);
    upstream.tag_lightweight("submission");

    let git = GitCli::default();
    let resolved = git
        .resolve(&upstream.url(), &SyncReference::from("submission"))
        .expect("resolve");
    assert_eq!(resolved.kind, RefKind::LightweightTag);

    let dest = TempDir::new().unwrap();
    let wc = dest.path().join("teamA");
    git.clone_at(&upstream.url(), &wc, &resolved.commit).expect("clone");
    assert_eq!(git.tag_time(&wc, &resolved.name).expect("tag time"), None);
}

#[test]
fn update_follows_a_moved_tag() {
    let upstream = Upstream::new();
    upstream.commit("a.txt", "one", JAN_1_2024);
    upstream.tag_annotated("submission", JAN_1_2024);

    let git = GitCli::default();
    let reference = SyncReference::from("submission");
    let first = git.resolve(&upstream.url(), &reference).expect("resolve");
    let dest = TempDir::new().unwrap();
    let wc = dest.path().join("teamA");
    git.clone_at(&upstream.url(), &wc, &first.commit).expect("clone");

    let c2 = upstream.commit("b.txt", "two", JAN_1_2024 + DAY);
    upstream.tag_annotated("submission", JAN_1_2024 + DAY);
    let second = git.resolve(&upstream.url(), &reference).expect("resolve");
    assert_eq!(second.commit, CommitId::from(c2.clone()));

    git.fetch(&upstream.url(), &wc).expect("fetch");
    git.checkout(&wc, &second.commit).expect("checkout");
    assert_eq!(git.head(&wc).expect("head"), CommitId::from(c2));
    assert!(wc.join("b.txt").exists());
    let tagged = git.tag_time(&wc, &second.name).expect("tag").expect("date");
    assert_eq!(tagged.timestamp(), JAN_1_2024 + DAY, "forced fetch refreshes the tag");
}

#[test]
fn authors_lists_one_entry_per_commit() {
    let upstream = Upstream::new();
    upstream.commit_as("a.txt", "Ada", "ada@example.edu", JAN_1_2024);
    upstream.commit_as("b.txt", "Bob", "bob@example.edu", JAN_1_2024 + 1);
    upstream.commit_as("c.txt", "Ada", "ada@example.edu", JAN_1_2024 + 2);
    let head = git(upstream.path(), &["rev-parse", "HEAD"], JAN_1_2024);

    let git_cli = GitCli::default();
    let dest = TempDir::new().unwrap();
    let wc = dest.path().join("teamA");
    git_cli
        .clone_at(&upstream.url(), &wc, &CommitId::from(head))
        .expect("clone");

    let authors = git_cli.authors(&wc, "HEAD").expect("authors");
    let names: Vec<_> = authors.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["Ada", "Bob", "Ada"]);
    assert_eq!(authors[1].email, "bob@example.edu");
}

#[test]
fn fetch_follows_a_changed_locator() {
    let old = Upstream::new();
    old.commit("a.txt", "one", JAN_1_2024);
    old.tag_annotated("submission", JAN_1_2024);
    let moved = Upstream::new();
    let c2 = moved.commit("z.txt", "elsewhere", JAN_1_2024 + DAY);
    moved.tag_annotated("submission", JAN_1_2024 + DAY);

    let git = GitCli::default();
    let reference = SyncReference::from("submission");
    let first = git.resolve(&old.url(), &reference).expect("resolve");
    let dest = TempDir::new().unwrap();
    let wc = dest.path().join("teamA");
    git.clone_at(&old.url(), &wc, &first.commit).expect("clone");

    git.fetch(&moved.url(), &wc).expect("fetch from new locator");
    git.checkout(&wc, &CommitId::from(c2.clone())).expect("checkout");
    assert_eq!(git.head(&wc).expect("head"), CommitId::from(c2));
    let origin = subsync_testkit::git(&wc, &["remote", "get-url", "origin"], JAN_1_2024);
    assert_eq!(origin, moved.url());
}

#[test]
fn broken_copy_inside_a_repository_leaves_the_outer_tags_alone() {
    let outer = Upstream::new();
    outer.commit("notes.txt", "private", JAN_1_2024);
    outer.tag_lightweight("my-private-tag");
    let remote = Upstream::new();
    remote.commit("a.txt", "one", JAN_1_2024);
    remote.tag_annotated("submission", JAN_1_2024);

    let wc = outer.path().join("clones").join("teamA");
    std::fs::create_dir_all(wc.join(".git")).unwrap();

    let cli = GitCli::default();
    let err = cli.fetch(&remote.url(), &wc).unwrap_err();
    assert!(err.is_local_state(), "got: {err}");
    assert_eq!(git(outer.path(), &["tag", "-l"], JAN_1_2024), "my-private-tag");
}
