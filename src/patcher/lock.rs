//! Exclusive write lock on a catalog file
//!
//! `<catalog>.lock` created with `create_new`; a second run fails fast
//! instead of waiting. The file is removed when the guard drops.

use crate::error::{ReconcileError, Result};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
}

impl StoreLock {
    pub fn lock_path_for(catalog_path: &Path) -> PathBuf {
        let file_name = catalog_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        catalog_path.with_file_name(format!("{}.lock", file_name))
    }

    pub fn acquire(catalog_path: &Path) -> Result<Self> {
        let path = Self::lock_path_for(catalog_path);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(ReconcileError::StoreLocked(path));
            }
            Err(e) => return Err(e.into()),
        };

        // Owner info for whoever finds a stale lock
        let _ = writeln!(file, "pid={} at={}", std::process::id(), chrono::Local::now().to_rfc3339());
        debug!(path = %path.display(), "store lock acquired");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to release store lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_second_lock_fails_fast() {
        let dir = tempdir().unwrap();
        let catalog = dir.path().join("products.json");

        let first = StoreLock::acquire(&catalog).unwrap();
        assert!(first.path().exists());

        let second = StoreLock::acquire(&catalog);
        assert!(matches!(second, Err(ReconcileError::StoreLocked(_))));

        drop(first);
        assert!(!dir.path().join("products.json.lock").exists());
        assert!(StoreLock::acquire(&catalog).is_ok());
    }
}
