//! Catalog patcher
//!
//! ## Sequence
//! 1. Lock the store (fails fast with `StoreLocked`)
//! 2. Classify every reassignment against the current document
//! 3. Nothing to write: stop, no backup
//! 4. Back up the whole store; failure aborts with zero mutations
//! 5. Replace only the image field of each pending record
//! 6. Write the document atomically
//!
//! Per-record failures after the backup are reported, never fatal.

pub mod document;
pub mod lock;
pub mod store;

pub use document::{CatalogDocument, Field, FieldNames, RecordHandle, RecordSyntax};
pub use lock::StoreLock;
pub use store::{BackupHandle, CatalogStore, FileCatalogStore};

use crate::error::{ReconcileError, Result};
use catalog_reconcile_common::Reassignment;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PatchFailureKind {
    RecordNotFound,
    FieldNotFound,
    /// Record changed since the decision, ambiguous id, or unverifiable edit
    WriteConflict,
}

impl std::fmt::Display for PatchFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatchFailureKind::RecordNotFound => write!(f, "RecordNotFound"),
            PatchFailureKind::FieldNotFound => write!(f, "FieldNotFound"),
            PatchFailureKind::WriteConflict => write!(f, "WriteConflict"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchFailure {
    pub product_id: String,
    pub kind: PatchFailureKind,
    pub detail: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchResult {
    /// Product ids whose image field was rewritten
    pub applied: Vec<String>,
    /// Product ids already pointing at the target image
    pub skipped: Vec<String>,
    pub failures: Vec<PatchFailure>,
    pub backup: Option<PathBuf>,
}

enum Check {
    Pending,
    AlreadyApplied,
    Failed(PatchFailureKind, String),
}

fn check(document: &CatalogDocument, reassignment: &Reassignment) -> Check {
    let handle = match document.locate(&reassignment.product_id) {
        Ok(handle) => handle,
        Err(kind) => return Check::Failed(kind, format!("cannot locate record '{}'", reassignment.product_id)),
    };

    let field = &document.field_names().image;
    let current = match document.field_value(&handle, Field::Image) {
        Some(slot) => slot.value,
        None => {
            return Check::Failed(
                PatchFailureKind::FieldNotFound,
                format!("record has no string '{}' field", field),
            )
        }
    };

    if current == reassignment.to_image_ref {
        return Check::AlreadyApplied;
    }

    let current = Some(current).filter(|v| !v.is_empty());
    if current.as_deref() != reassignment.from_image_ref.as_deref() {
        return Check::Failed(
            PatchFailureKind::WriteConflict,
            format!(
                "expected '{}' to be {:?}, found {:?}",
                field, reassignment.from_image_ref, current
            ),
        );
    }

    Check::Pending
}

/// Apply reassignments to the store
///
/// Re-running with the same list against the patched store applies nothing
/// and fails nothing.
pub fn apply_reassignments<S>(store: &S, reassignments: &[Reassignment]) -> Result<PatchResult>
where
    S: CatalogStore + ?Sized,
{
    let lock = store.lock()?;
    apply_reassignments_locked(store, &lock, reassignments)
}

/// `apply_reassignments` for a caller that already holds the store lock
pub fn apply_reassignments_locked<S>(
    store: &S,
    _lock: &StoreLock,
    reassignments: &[Reassignment],
) -> Result<PatchResult>
where
    S: CatalogStore + ?Sized,
{
    let mut document = store.load_document()?;
    let mut result = PatchResult::default();

    let mut pending = Vec::new();
    for r in reassignments {
        match check(&document, r) {
            Check::Pending => pending.push(r),
            Check::AlreadyApplied => result.skipped.push(r.product_id.clone()),
            Check::Failed(kind, detail) => {
                warn!(product_id = %r.product_id, %kind, %detail, "patch failed");
                result.failures.push(PatchFailure {
                    product_id: r.product_id.clone(),
                    kind,
                    detail,
                });
            }
        }
    }

    if pending.is_empty() {
        info!(skipped = result.skipped.len(), failed = result.failures.len(), "nothing to patch");
        return Ok(result);
    }

    let backup = store.backup()?;
    result.backup = Some(backup.path.clone());

    for r in pending {
        // A repeated product in the list sees the earlier edit
        match check(&document, r) {
            Check::Pending => {}
            Check::AlreadyApplied => {
                result.skipped.push(r.product_id.clone());
                continue;
            }
            Check::Failed(kind, detail) => {
                result.failures.push(PatchFailure { product_id: r.product_id.clone(), kind, detail });
                continue;
            }
        }

        let outcome = document
            .locate(&r.product_id)
            .and_then(|handle| document.replace_field(&handle, Field::Image, &r.to_image_ref));

        match outcome {
            Ok(()) => {
                info!(
                    product_id = %r.product_id,
                    from = ?r.from_image_ref,
                    to = %r.to_image_ref,
                    "image reassigned"
                );
                result.applied.push(r.product_id.clone());
            }
            Err(kind) => {
                warn!(product_id = %r.product_id, %kind, "patch failed");
                result.failures.push(PatchFailure {
                    product_id: r.product_id.clone(),
                    kind,
                    detail: "edit could not be verified".to_string(),
                });
            }
        }
    }

    if !result.applied.is_empty() {
        store.write_atomic(document.text())?;
    }

    Ok(result)
}

/// Put a backup back in place of the catalog, under the store lock
pub fn restore<S>(store: &S, backup: &Path) -> Result<()>
where
    S: CatalogStore + ?Sized,
{
    let _lock = store.lock()?;
    if !backup.exists() {
        return Err(ReconcileError::FileNotFound(backup.display().to_string()));
    }
    let content = std::fs::read_to_string(backup)?;
    store.write_atomic(&content)?;
    info!(backup = %backup.display(), "catalog restored");
    Ok(())
}
