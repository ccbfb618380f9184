//! End-to-end: a prior run's uncompressed backups are found at startup and
//! handed to the compression worker.

use std::fs;

use compress::{recovery, CompressFormat, Compressor};

#[test]
fn uncompressed_backups_are_discovered_and_compressed() {
    let dir = tempfile::tempdir().unwrap();
    let app_dir = dir.path().join("billing");
    fs::create_dir(&app_dir).unwrap();

    let left_over = app_dir.join("root.log.2024-01-01-00-00-00-000000");
    fs::write(&left_over, b"stale").unwrap();
    fs::write(app_dir.join("root.log"), b"live, not a backup").unwrap();
    fs::write(app_dir.join("root.log.2023-12-31-00-00-00-000000.gz"), b"already done").unwrap();

    let found = recovery::find_uncompressed(dir.path());
    assert_eq!(found, vec![left_over.clone()]);

    let compressor = Compressor::spawn(CompressFormat::Gzip);
    for path in found {
        compressor.compress(path);
    }
    compressor.shutdown();

    assert!(!left_over.exists());
    assert!(app_dir.join("root.log.2024-01-01-00-00-00-000000.gz").exists());
}
