//! Error case tests
//!
//! Error handling of the scanner, stores and error conversions

use catalog_reconcile::analyzer::AnalysisFile;
use catalog_reconcile::error::ReconcileError;
use catalog_reconcile::matcher::OverrideTable;
use catalog_reconcile::patcher::{CatalogStore, FileCatalogStore};
use catalog_reconcile::scanner;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

/// Scanning a folder that does not exist
#[test]
fn test_scan_nonexistent_folder() {
    let result = scanner::scan_folder(Path::new("/nonexistent/path/12345"), false);
    assert!(matches!(result, Err(ReconcileError::FolderNotFound(_))));
}

/// An empty folder is not an error
#[test]
fn test_scan_empty_folder() {
    let dir = tempdir().expect("Failed to create temp dir");
    let result = scanner::scan_folder(dir.path(), false);

    assert!(result.is_ok());
    assert!(result.unwrap().is_empty());
}

/// A folder with no images
#[test]
fn test_scan_folder_no_images() {
    let dir = tempdir().expect("Failed to create temp dir");
    std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();
    std::fs::write(dir.path().join("products.json"), "[]").unwrap();

    let result = scanner::scan_folder(dir.path(), false);
    assert!(result.unwrap().is_empty());
}

/// Missing catalog file
#[test]
fn test_missing_catalog() {
    let dir = tempdir().expect("Failed to create temp dir");
    let store = FileCatalogStore::new(dir.path().join("products.json"));
    assert!(matches!(store.read_all(), Err(ReconcileError::FileNotFound(_))));
}

/// A catalog that is not valid JSON
#[test]
fn test_malformed_json_catalog() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("products.json");
    std::fs::write(&path, "[{\"id\": \"td-001\",").unwrap();

    let store = FileCatalogStore::new(&path);
    assert!(matches!(store.read_all(), Err(ReconcileError::InvalidCatalog(_))));
}

/// Unsupported override table version
#[test]
fn test_override_version_rejected() {
    let result = OverrideTable::from_json(r#"{"version": 7, "entries": {}}"#);
    assert!(matches!(result, Err(ReconcileError::InvalidOverrides(_))));
}

/// Missing analysis file
#[test]
fn test_missing_analysis_file() {
    let dir = tempdir().expect("Failed to create temp dir");
    let result = AnalysisFile::load(&dir.path().join("analysis.json"));
    assert!(matches!(result, Err(ReconcileError::FileNotFound(_))));
}

/// Display of every variant
#[test]
fn test_error_display() {
    let errors = vec![
        ReconcileError::Config("bad threshold".to_string()),
        ReconcileError::FileNotFound("products.json".to_string()),
        ReconcileError::FolderNotFound("/path/to/images".to_string()),
        ReconcileError::InvalidCatalog("not an array".to_string()),
        ReconcileError::InvalidOverrides("version 7".to_string()),
        ReconcileError::BackupFailure("disk full".to_string()),
        ReconcileError::StoreLocked(PathBuf::from("products.json.lock")),
        ReconcileError::Cancelled,
        ReconcileError::CliExecution("claude exited with 1".to_string()),
    ];

    for err in errors {
        let display = format!("{}", err);
        assert!(!display.is_empty(), "empty message: {:?}", err);
    }
}

/// Fatal errors name what happened to the catalog
#[test]
fn test_fatal_error_messages() {
    let backup = ReconcileError::BackupFailure("disk full".to_string()).to_string();
    assert!(backup.contains("no record was modified"));
    assert!(backup.contains("disk full"));

    let locked = ReconcileError::StoreLocked(PathBuf::from("/tmp/products.json.lock")).to_string();
    assert!(locked.contains("/tmp/products.json.lock"));
}

/// Debug output
#[test]
fn test_error_debug() {
    let err = ReconcileError::Config("test".to_string());
    let debug = format!("{:?}", err);

    assert!(debug.contains("Config"));
    assert!(debug.contains("test"));
}

/// From io::Error
#[test]
fn test_io_error_conversion() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let err: ReconcileError = io_err.into();

    assert!(matches!(err, ReconcileError::Io(_)));
    assert!(format!("{}", err).contains("IO"));
}

/// From serde_json::Error
#[test]
fn test_json_error_conversion() {
    let json_err = serde_json::from_str::<serde_json::Value>("{ invalid }").unwrap_err();
    let err: ReconcileError = json_err.into();

    assert!(matches!(err, ReconcileError::JsonParse(_)));
}

/// From the common error, shown transparently
#[test]
fn test_common_error_conversion() {
    let common_err = catalog_reconcile_common::Error::Parse("no JSON object".to_string());
    let err: ReconcileError = common_err.into();

    assert!(matches!(err, ReconcileError::Common(_)));
    assert!(format!("{}", err).contains("no JSON object"));
}
