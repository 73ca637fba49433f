use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Provider answer for one image, before normalization
///
/// `body` is either the raw text answer (`Value::String`) or an already
/// structured JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAnalysisPayload {
    pub image_id: String,
    pub body: Value,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Retryable (timeouts, non-zero exits, rate limits)
    #[error("transient provider failure: {0}")]
    Transient(String),

    /// Not retryable; the image becomes unavailable
    #[error("permanent provider failure: {0}")]
    Permanent(String),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transient(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::Transient(_) => "transient",
            ProviderError::Permanent(_) => "permanent",
        }
    }
}
