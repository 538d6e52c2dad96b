//! Integration tests for the read cursor.

use std::fs::{self, OpenOptions};
use std::io::Write;

use tail_supervisor::supervisor::FailureKind;
use tail_supervisor::watcher::{end_of_file, ReadCursor, TailError};
use tempfile::TempDir;

fn lines(results: Vec<Result<String, TailError>>) -> Vec<String> {
    results.into_iter().map(|r| r.unwrap()).collect()
}

#[tokio::test]
async fn cursor_follows_a_growing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    fs::write(&path, "existing\n").unwrap();

    let mut cursor = ReadCursor::at_end(path.clone()).await.unwrap();
    assert_eq!(cursor.offset(), 9);
    assert!(cursor.read_new_lines().await.unwrap().is_empty());

    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(b"first\nsec").unwrap();
    assert_eq!(lines(cursor.read_new_lines().await.unwrap()), vec!["first"]);

    file.write_all(b"ond\r\nthird\n").unwrap();
    assert_eq!(
        lines(cursor.read_new_lines().await.unwrap()),
        vec!["second", "third"]
    );
    assert_eq!(cursor.offset(), end_of_file(&path).await.unwrap());
}

#[tokio::test]
async fn bad_line_is_skipped_and_benign() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    fs::write(&path, b"ok\n\xfe\xff\nafter\n").unwrap();

    let mut cursor = ReadCursor::with_offset(path, 0);
    let results = cursor.read_new_lines().await.unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_deref().unwrap(), "ok");
    let err = results[1].as_ref().unwrap_err();
    assert_eq!(err.kind(), FailureKind::Benign);
    assert_eq!(results[2].as_deref().unwrap(), "after");
}

#[tokio::test]
async fn deleted_file_is_transient() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    fs::write(&path, "").unwrap();

    let mut cursor = ReadCursor::at_end(path.clone()).await.unwrap();
    fs::remove_file(&path).unwrap();

    let err = cursor.read_new_lines().await.unwrap_err();
    assert!(matches!(err, TailError::FileDeleted(_)));
    assert_eq!(err.kind(), FailureKind::Transient);
}

#[tokio::test]
async fn directory_is_unsupported() {
    let dir = TempDir::new().unwrap();
    let err = end_of_file(dir.path()).await.unwrap_err();
    assert!(matches!(err, TailError::NotAFile(_)));
    assert_eq!(err.kind(), FailureKind::Unsupported);
}
