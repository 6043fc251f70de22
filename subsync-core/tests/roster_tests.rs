//! Roster error-message, laziness and restartability tests.

use assert_fs::prelude::*;
use predicates::prelude::predicate;
use rstest::rstest;
use subsync_core::{
    roster::{self, Columns, Roster},
    InputError, RepoId,
};

fn table(contents: &str) -> (assert_fs::TempDir, std::path::PathBuf) {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("repos.csv");
    file.write_str(contents).expect("write table");
    let path = file.path().to_path_buf();
    (dir, path)
}

// ---------------------------------------------------------------------------
// 1. Malformed input
// ---------------------------------------------------------------------------

#[rstest]
#[case::no_id_column("TEAM,REPO_URL\na,/x\n", "REPO_ID")]
#[case::no_url_column("REPO_ID,GIT\na,/x\n", "REPO_URL")]
#[case::empty_file("", "REPO_ID")]
fn missing_required_column_is_reported_with_name(#[case] contents: &str, #[case] column: &str) {
    let (_dir, path) = table(contents);
    let err = Roster::open(&path, &Columns::default()).unwrap_err();
    assert!(matches!(err, InputError::MissingColumn { .. }), "got: {err}");
    let msg = err.to_string();
    assert!(msg.contains(column), "must name the column, got: {msg}");
    assert!(msg.contains("repos.csv"), "must name the file, got: {msg}");
}

#[test]
fn empty_identifier_reports_line() {
    let (_dir, path) = table("REPO_ID,REPO_URL\nteamA,/a\n   ,/b\n");
    let roster = Roster::open(&path, &Columns::default()).expect("open");
    let err = roster.load().unwrap_err();
    assert!(matches!(err, InputError::EmptyIdentifier { line: 3, .. }), "got: {err}");
    assert!(err.to_string().contains("repos.csv:3"));
}

#[test]
fn empty_locator_is_malformed() {
    let (_dir, path) = table("REPO_ID,REPO_URL\nteamA,\n");
    let err = Roster::open(&path, &Columns::default())
        .expect("open")
        .load()
        .unwrap_err();
    assert!(matches!(err, InputError::EmptyLocator { .. }), "got: {err}");
}

#[test]
fn identifier_without_usable_directory_is_malformed() {
    let (_dir, path) = table("REPO_ID,REPO_URL\n..,/a\n");
    let err = Roster::open(&path, &Columns::default())
        .expect("open")
        .load()
        .unwrap_err();
    assert!(matches!(err, InputError::InvalidIdentifier { .. }), "got: {err}");
}

#[rstest]
#[case::same_name("teamA", "teamA")]
#[case::case_only("teamA", "TEAMA")]
#[case::separator("w6/jdoe", "w6_jdoe")]
fn colliding_directories_are_rejected(#[case] first: &str, #[case] second: &str) {
    let (_dir, path) = table(&format!("REPO_ID,REPO_URL\n{first},/a\n{second},/b\n"));
    let err = Roster::open(&path, &Columns::default())
        .expect("open")
        .load()
        .unwrap_err();
    match err {
        InputError::DuplicateIdentifier {
            line, first_line, ..
        } => {
            assert_eq!(first_line, 2);
            assert_eq!(line, 3);
        }
        other => panic!("expected DuplicateIdentifier, got: {other}"),
    }
}

// ---------------------------------------------------------------------------
// 2. Lazy + restartable reading
// ---------------------------------------------------------------------------

#[test]
fn records_can_be_read_twice_with_same_result() {
    let (_dir, path) = table("REPO_ID,REPO_URL,REF\nteamA,/a,\nteamB,/b,final\n");
    let roster = Roster::open(&path, &Columns::default()).expect("open");
    assert!(roster.has_reference_column());

    let first: Vec<_> = roster
        .records()
        .expect("records")
        .collect::<Result<_, _>>()
        .expect("rows");
    let second: Vec<_> = roster
        .records()
        .expect("records")
        .collect::<Result<_, _>>()
        .expect("rows");
    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
}

#[test]
fn lazy_iteration_yields_good_rows_before_bad_one() {
    let (_dir, path) = table("REPO_ID,REPO_URL\nteamA,/a\n,/b\nteamC,/c\n");
    let roster = Roster::open(&path, &Columns::default()).expect("open");
    let mut rows = roster.records().expect("records");

    let first = rows.next().expect("row").expect("valid");
    assert_eq!(first.id, RepoId::from("teamA"));
    assert!(rows.next().expect("row").is_err());
    let third = rows.next().expect("row").expect("valid");
    assert_eq!(third.id, RepoId::from("teamC"));
    assert!(rows.next().is_none());
}

#[test]
fn custom_columns_and_delimiter() {
    let (_dir, path) = table("TEAM;GIT-URL;TAG\nalpha;/srv/a.git;v2\n");
    let columns = Columns {
        id: "TEAM".to_string(),
        url: "GIT-URL".to_string(),
        reference: Some("TAG".to_string()),
    };
    let records = Roster::open_with_delimiter(&path, &columns, b';')
        .expect("open")
        .load()
        .expect("load");
    assert_eq!(records[0].id, RepoId::from("alpha"));
    assert_eq!(records[0].reference.as_ref().map(|r| r.as_str()), Some("v2"));
    assert!(records[0].extra.is_empty());
}

#[test]
fn missing_file_is_io_error_with_path() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let path = dir.child("absent.csv");
    path.assert(predicate::path::missing());
    let err = Roster::open(path.path(), &Columns::default()).unwrap_err();
    assert!(matches!(err, InputError::Io { .. }), "got: {err}");
    assert!(err.to_string().contains("absent.csv"));
}

#[test]
fn filter_with_no_ids_keeps_everything() {
    let (_dir, path) = table("REPO_ID,REPO_URL\na,/a\nb,/b\n");
    let records = Roster::open(&path, &Columns::default())
        .expect("open")
        .load()
        .expect("load");
    assert_eq!(roster::filter_ids(records, &[]).len(), 2);
}
