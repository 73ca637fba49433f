//! Versioned table of confirmed fixes
//!
//! A product listed here keeps its image without being scored.

use crate::error::{ReconcileError, Result};
use catalog_reconcile_common::Product;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const OVERRIDES_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideEntry {
    /// Image confirmed for the product
    pub image_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideTable {
    pub version: u32,
    #[serde(default)]
    pub entries: BTreeMap<String, OverrideEntry>,
}

impl Default for OverrideTable {
    fn default() -> Self {
        Self {
            version: OVERRIDES_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

impl OverrideTable {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ReconcileError::FileNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let table: OverrideTable = serde_json::from_str(content)
            .map_err(|e| ReconcileError::InvalidOverrides(e.to_string()))?;
        if table.version != OVERRIDES_VERSION {
            return Err(ReconcileError::InvalidOverrides(format!(
                "unsupported version {} (expected {})",
                table.version, OVERRIDES_VERSION
            )));
        }
        Ok(table)
    }

    pub fn get(&self, product_id: &str) -> Option<&OverrideEntry> {
        self.entries.get(product_id)
    }

    pub fn insert(&mut self, product_id: impl Into<String>, entry: OverrideEntry) {
        self.entries.insert(product_id.into(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Overridden product whose current image differs from the pinned one
    pub fn pin_mismatch(&self, product: &Product) -> Option<String> {
        let entry = self.get(&product.id)?;
        match product.current_image_id() {
            Some(current) if current == entry.image_id => None,
            current => Some(format!(
                "{}: override pins {} but catalog references {}",
                product.id,
                entry.image_id,
                current.unwrap_or("no image")
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_from_json() {
        let table = OverrideTable::from_json(
            r#"{"version": 1, "entries": {"td-021": {"imageId": "img-21.jpg", "note": "green box"}}}"#,
        )
        .unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("td-021").unwrap().image_id, "img-21.jpg");
        assert!(table.get("td-024").is_none());
    }

    #[test]
    fn test_rejects_unknown_version() {
        let err = OverrideTable::from_json(r#"{"version": 2, "entries": {}}"#).unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidOverrides(_)));
    }

    #[test]
    fn test_rejects_malformed() {
        let err = OverrideTable::from_json("[1, 2]").unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidOverrides(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let err = OverrideTable::load(&dir.path().join("overrides.json")).unwrap_err();
        assert!(matches!(err, ReconcileError::FileNotFound(_)));
    }

    #[test]
    fn test_pin_mismatch() {
        let mut table = OverrideTable::default();
        table.insert(
            "td-021",
            OverrideEntry { image_id: "img-21.jpg".to_string(), note: None },
        );

        let pinned = Product {
            id: "td-021".to_string(),
            image_ref: Some("/images/img-21.jpg".to_string()),
            ..Default::default()
        };
        assert!(table.pin_mismatch(&pinned).is_none());

        let drifted = Product { image_ref: Some("/images/img-24.jpg".to_string()), ..pinned.clone() };
        assert!(table.pin_mismatch(&drifted).unwrap().contains("img-24.jpg"));
    }
}
