use crate::report::RunReport;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Folder not found: {0}")]
    FolderNotFound(String),

    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    #[error("Invalid override table: {0}")]
    InvalidOverrides(String),

    #[error("Backup failed, no record was modified: {0}")]
    BackupFailure(String),

    #[error("Catalog store is locked by another run: {}", .0.display())]
    StoreLocked(PathBuf),

    #[error("Run cancelled before the patch stage")]
    Cancelled,

    /// Fatal error during patching; the report holds every decision made
    #[error("{source}")]
    RunAborted {
        source: Box<ReconcileError>,
        report: Box<RunReport>,
    },

    #[error("CLI execution error: {0}")]
    CliExecution(String),

    #[error("JSON error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] catalog_reconcile_common::Error),
}

pub type Result<T> = std::result::Result<T, ReconcileError>;

impl ReconcileError {
    /// The underlying error of an aborted run, or the error itself
    pub fn root(&self) -> &ReconcileError {
        match self {
            ReconcileError::RunAborted { source, .. } => source.root(),
            other => other,
        }
    }
}
