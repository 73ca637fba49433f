//! Analysis files
//!
//! The output of `analyze`, reusable as the evidence of `plan`/`apply`.
//! Raw payloads are stored, not normalized records, so a normalizer fix
//! applies to old files too.

use super::gather::Evidence;
use super::types::{ProviderError, RawAnalysisPayload};
use crate::error::{ReconcileError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisFile {
    #[serde(default)]
    pub timestamp: String,

    #[serde(default)]
    pub provider: String,

    #[serde(default, alias = "total_images")]
    pub total_images: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Image id → raw payload
    #[serde(default)]
    pub results: BTreeMap<String, Value>,

    /// Image id → why no payload exists
    #[serde(default)]
    pub unavailable: BTreeMap<String, String>,
}

impl AnalysisFile {
    pub fn from_evidence(provider: &str, evidence: &Evidence) -> Self {
        let mut results = BTreeMap::new();
        let mut unavailable = BTreeMap::new();

        for (image_id, outcome) in evidence {
            match outcome {
                Ok(payload) => {
                    results.insert(image_id.clone(), payload.body.clone());
                }
                Err(e) => {
                    unavailable.insert(image_id.clone(), e.to_string());
                }
            }
        }

        Self {
            timestamp: chrono::Local::now().to_rfc3339(),
            provider: provider.to_string(),
            total_images: evidence.len(),
            model: None,
            results,
            unavailable,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ReconcileError::FileNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Payloads in image id order
    pub fn payloads(&self) -> Vec<RawAnalysisPayload> {
        self.results
            .iter()
            .map(|(image_id, body)| RawAnalysisPayload {
                image_id: image_id.clone(),
                body: body.clone(),
            })
            .collect()
    }

    /// Evidence as if freshly gathered; recorded failures stay permanent
    pub fn to_evidence(&self) -> Evidence {
        let mut evidence: Evidence = self
            .payloads()
            .into_iter()
            .map(|payload| (payload.image_id.clone(), Ok(payload)))
            .collect();
        for (image_id, reason) in &self.unavailable {
            evidence
                .entry(image_id.clone())
                .or_insert_with(|| Err(ProviderError::Permanent(reason.clone())));
        }
        evidence
    }
}
