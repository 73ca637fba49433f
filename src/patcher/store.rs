//! Catalog storage
//!
//! `CatalogStore` is what the patcher needs from a store: read products,
//! lock, snapshot, load the editable document, write atomically.
//! `FileCatalogStore` implements it over one catalog file.

use super::document::{CatalogDocument, FieldNames, RecordSyntax};
use super::lock::StoreLock;
use crate::error::{ReconcileError, Result};
use catalog_reconcile_common::Product;
use chrono::{DateTime, Local};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const BACKUP_DIR_NAME: &str = ".catalog-backups";

/// Snapshot taken before a mutation
#[derive(Debug, Clone, PartialEq)]
pub struct BackupHandle {
    pub path: PathBuf,
    pub created_at: DateTime<Local>,
}

pub trait CatalogStore {
    fn read_all(&self) -> Result<Vec<Product>>;

    /// Exclusive lock for the backup-then-swap sequence
    fn lock(&self) -> Result<StoreLock>;

    /// Copy the whole store aside; any failure is `BackupFailure`
    fn backup(&self) -> Result<BackupHandle>;

    fn load_document(&self) -> Result<CatalogDocument>;

    fn write_atomic(&self, content: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileCatalogStore {
    path: PathBuf,
    syntax: RecordSyntax,
    fields: FieldNames,
    backup_dir: PathBuf,
}

impl FileCatalogStore {
    /// Store over `path`, syntax picked from the extension
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let syntax = RecordSyntax::from_path(&path);
        let backup_dir = path
            .parent()
            .map(|p| p.join(BACKUP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from(BACKUP_DIR_NAME));
        Self {
            path,
            syntax,
            fields: FieldNames::default(),
            backup_dir,
        }
    }

    pub fn with_syntax(mut self, syntax: RecordSyntax) -> Self {
        self.syntax = syntax;
        self
    }

    pub fn with_fields(mut self, fields: FieldNames) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = dir.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn syntax(&self) -> RecordSyntax {
        self.syntax
    }

    fn read_text(&self) -> Result<String> {
        if !self.path.exists() {
            return Err(ReconcileError::FileNotFound(self.path.display().to_string()));
        }
        Ok(fs::read_to_string(&self.path)?)
    }

    fn products_from_json(&self, text: &str) -> Result<Vec<Product>> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| ReconcileError::InvalidCatalog(format!("{}: {}", self.path.display(), e)))?;

        let records = match &value {
            Value::Array(items) => items,
            Value::Object(map) => match map.get("products") {
                Some(Value::Array(items)) => items,
                _ => {
                    return Err(ReconcileError::InvalidCatalog(
                        "expected an array or an object with a \"products\" array".into(),
                    ))
                }
            },
            _ => return Err(ReconcileError::InvalidCatalog("expected an array of products".into())),
        };

        let text_field = |record: &serde_json::Map<String, Value>, key: &str| {
            record.get(key).and_then(Value::as_str).map(str::to_string)
        };

        records
            .iter()
            .enumerate()
            .map(|(index, record)| -> Result<Product> {
                let record = record.as_object().ok_or_else(|| {
                    ReconcileError::InvalidCatalog(format!("record {} is not an object", index))
                })?;
                let id = text_field(record, &self.fields.id).ok_or_else(|| {
                    ReconcileError::InvalidCatalog(format!("record {} has no string \"{}\"", index, self.fields.id))
                })?;
                Ok(Product {
                    id,
                    name: text_field(record, &self.fields.name).unwrap_or_default(),
                    localized_name: text_field(record, &self.fields.localized_name),
                    category: text_field(record, &self.fields.category),
                    image_ref: text_field(record, &self.fields.image).filter(|v| !v.is_empty()),
                })
            })
            .collect()
    }

    fn backup_path(&self, now: &DateTime<Local>) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "catalog".to_string());
        let stem = format!("{}.backup-{}", file_name, now.format("%Y%m%d-%H%M%S%.3f"));

        let mut candidate = self.backup_dir.join(&stem);
        let mut n = 1;
        while candidate.exists() {
            candidate = self.backup_dir.join(format!("{}-{}", stem, n));
            n += 1;
        }
        candidate
    }
}

fn temp_path_for(file_path: &Path) -> PathBuf {
    let file_name = file_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    file_path.with_file_name(format!("{}.tmp", file_name))
}

impl CatalogStore for FileCatalogStore {
    fn read_all(&self) -> Result<Vec<Product>> {
        let text = self.read_text()?;
        let products = match self.syntax {
            RecordSyntax::Json => self.products_from_json(&text)?,
            RecordSyntax::ObjectLiteral => {
                CatalogDocument::parse(text, self.syntax, self.fields.clone()).products()
            }
        };

        // Ids are unique; later duplicates are dropped and left to the patcher
        let mut seen = BTreeSet::new();
        let unique = products
            .into_iter()
            .filter(|p| {
                let fresh = seen.insert(p.id.clone());
                if !fresh {
                    warn!(product_id = %p.id, "duplicate product id in catalog");
                }
                fresh
            })
            .collect();
        Ok(unique)
    }

    fn lock(&self) -> Result<StoreLock> {
        StoreLock::acquire(&self.path)
    }

    fn backup(&self) -> Result<BackupHandle> {
        let failure = |e: std::io::Error| ReconcileError::BackupFailure(e.to_string());

        let created_at = Local::now();
        fs::create_dir_all(&self.backup_dir).map_err(failure)?;
        let path = self.backup_path(&created_at);

        let original = fs::read(&self.path).map_err(failure)?;
        let mut file = File::create(&path).map_err(failure)?;
        file.write_all(&original).map_err(failure)?;
        file.sync_all().map_err(failure)?;

        info!(backup = %path.display(), "catalog backed up");
        Ok(BackupHandle { path, created_at })
    }

    fn load_document(&self) -> Result<CatalogDocument> {
        let text = self.read_text()?;
        Ok(CatalogDocument::parse(text, self.syntax, self.fields.clone()))
    }

    fn write_atomic(&self, content: &str) -> Result<()> {
        let temp_path = temp_path_for(&self.path);
        let written = write_synced(&temp_path, content).and_then(|_| fs::rename(&temp_path, &self.path));

        if let Err(e) = written {
            // The catalog is still the previous version; only the temp file goes
            if temp_path.exists() {
                if let Err(cleanup) = fs::remove_file(&temp_path) {
                    warn!(path = %temp_path.display(), error = %cleanup, "failed to remove temp file");
                }
            }
            return Err(e.into());
        }
        Ok(())
    }
}

fn write_synced(path: &Path, content: &str) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()
}
