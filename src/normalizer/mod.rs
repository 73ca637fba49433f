//! Analysis normalizer
//!
//! Maps each provider's JSON shape onto one `AnalysisRecord`.
//!
//! ## Rules
//! 1. Structured (nested) fields win over legacy flat fields
//! 2. The first usable value wins; conflicting values are never merged
//! 3. Anything that cannot be mapped with confidence is dropped
//!
//! Only a payload that is not a record at all is an error.

pub mod packaging;
pub mod text;

use crate::analyzer::RawAnalysisPayload;
use catalog_reconcile_common::{parse_payload, AnalysisRecord};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

/// Shape of the JSON a provider answers with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderSchema {
    /// snake_case answer of the vision prompt (`product_type`, `packaging.*`, `text.*`)
    #[default]
    VisionJson,
    /// camelCase `AnalysisRecord` as this crate serializes it
    Canonical,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizationError {
    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("payload could not be parsed: {0}")]
    Unparseable(String),

    #[error("provider reported an error: {0}")]
    ProviderReported(String),
}

/// Normalize one raw payload
pub fn normalize(
    raw: &RawAnalysisPayload,
    schema: ProviderSchema,
) -> Result<AnalysisRecord, NormalizationError> {
    let value = match &raw.body {
        Value::String(response) => {
            parse_payload(response).map_err(|e| NormalizationError::Unparseable(e.to_string()))?
        }
        other => other.clone(),
    };

    let object = value.as_object().ok_or(NormalizationError::NotAnObject)?;

    if let Some(error) = object.get("error").filter(|e| !e.is_null()) {
        let message = match error {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Err(NormalizationError::ProviderReported(message));
    }

    let record = match schema {
        ProviderSchema::VisionJson => from_vision_json(&raw.image_id, object),
        ProviderSchema::Canonical => from_canonical(&raw.image_id, object)?,
    };

    debug!(
        image_id = %record.image_id,
        product_type = ?record.product_type,
        variant = ?record.packaging.is_distinctive_variant,
        "normalized"
    );
    Ok(record)
}

/// Normalize a batch, keeping failures per image
pub fn normalize_all<'a>(
    payloads: impl IntoIterator<Item = &'a RawAnalysisPayload>,
    schema: ProviderSchema,
) -> (BTreeMap<String, AnalysisRecord>, BTreeMap<String, NormalizationError>) {
    let mut records = BTreeMap::new();
    let mut failures = BTreeMap::new();

    for raw in payloads {
        match normalize(raw, schema) {
            Ok(record) => {
                records.insert(raw.image_id.clone(), record);
            }
            Err(e) => {
                warn!(image_id = %raw.image_id, error = %e, "evidence dropped");
                failures.insert(raw.image_id.clone(), e);
            }
        }
    }

    (records, failures)
}

fn from_vision_json(image_id: &str, object: &Map<String, Value>) -> AnalysisRecord {
    AnalysisRecord {
        image_id: image_id.to_string(),
        product_type: text::product_type(object),
        packaging: packaging::packaging(object),
        detected_text: text::detected_text(object),
        confidence: text::confidence(object.get("confidence")),
    }
}

fn from_canonical(
    image_id: &str,
    object: &Map<String, Value>,
) -> Result<AnalysisRecord, NormalizationError> {
    let mut object = object.clone();
    object.insert("imageId".to_string(), Value::String(image_id.to_string()));

    let record: AnalysisRecord = serde_json::from_value(Value::Object(object))
        .map_err(|e| NormalizationError::Unparseable(e.to_string()))?;

    // The canonical shape is trusted for structure, not for content
    Ok(AnalysisRecord {
        product_type: record
            .product_type
            .as_deref()
            .and_then(text::clean)
            .map(|t| t.to_lowercase()),
        detected_text: record.detected_text.as_deref().and_then(text::clean),
        confidence: record.confidence.filter(|c| (0.0..=1.0).contains(c)),
        packaging: catalog_reconcile_common::Packaging {
            dominant_color: record
                .packaging
                .dominant_color
                .as_deref()
                .and_then(text::clean),
            ..record.packaging
        },
        image_id: record.image_id,
    })
}

/// Walk a nested key path
pub(crate) fn lookup<'a>(object: &'a Map<String, Value>, path: &[&str]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut current = object.get(*first)?;
    for key in rest {
        current = current.as_object()?.get(*key)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_reconcile_common::PackagingKind;
    use serde_json::json;

    fn raw(body: Value) -> RawAnalysisPayload {
        RawAnalysisPayload {
            image_id: "img-21.jpg".to_string(),
            body,
        }
    }

    #[test]
    fn test_full_vision_payload() {
        let payload = raw(json!({
            "product_type": "Burger",
            "packaging": {"type": "box", "color": "green", "is_green_box": true, "is_okara": true},
            "text": {"hebrew_text": "קציצות אוקרה", "brand": "טבעול"},
            "confidence": 0.9
        }));
        let record = normalize(&payload, ProviderSchema::VisionJson).unwrap();
        assert_eq!(record.image_id, "img-21.jpg");
        assert_eq!(record.product_type.as_deref(), Some("burger"));
        assert_eq!(record.packaging.kind, Some(PackagingKind::Box));
        assert_eq!(record.packaging.dominant_color.as_deref(), Some("green"));
        assert_eq!(record.packaging.is_distinctive_variant, Some(true));
        assert_eq!(record.detected_text.as_deref(), Some("קציצות אוקרה"));
        assert_eq!(record.confidence, Some(0.9));
    }

    #[test]
    fn test_nested_beats_flat() {
        let payload = raw(json!({
            "packaging": {"is_okara": false},
            "is_okara": true,
            "hebrew_text": "שניצל",
            "text": {"hebrew_text": "קציצות"}
        }));
        let record = normalize(&payload, ProviderSchema::VisionJson).unwrap();
        assert_eq!(record.packaging.is_distinctive_variant, Some(false));
        assert_eq!(record.detected_text.as_deref(), Some("קציצות"));
    }

    #[test]
    fn test_flat_legacy_fields() {
        let payload = raw(json!({"is_green_box": true, "packaging_color": "Green"}));
        let record = normalize(&payload, ProviderSchema::VisionJson).unwrap();
        assert_eq!(record.packaging.is_distinctive_variant, Some(true));
        assert_eq!(record.packaging.dominant_color.as_deref(), Some("Green"));
        assert_eq!(record.product_type, None);
    }

    #[test]
    fn test_text_response_is_extracted() {
        let payload = raw(Value::String(
            "Here you go:\n```json\n{\"product_type\": \"schnitzel\"}\n```".to_string(),
        ));
        let record = normalize(&payload, ProviderSchema::VisionJson).unwrap();
        assert_eq!(record.product_type.as_deref(), Some("schnitzel"));
    }

    #[test]
    fn test_missing_fields_are_not_errors() {
        let record = normalize(&raw(json!({})), ProviderSchema::VisionJson).unwrap();
        assert_eq!(record, AnalysisRecord { image_id: "img-21.jpg".to_string(), ..Default::default() });
    }

    #[test]
    fn test_placeholders_dropped() {
        let payload = raw(json!({
            "product_type": "unknown",
            "packaging": {"type": "box/tray/wrapper", "color": ""},
            "text": {"hebrew_text": "null"},
            "confidence": 1.7
        }));
        let record = normalize(&payload, ProviderSchema::VisionJson).unwrap();
        assert_eq!(record.product_type, None);
        assert_eq!(record.packaging.kind, None);
        assert_eq!(record.packaging.dominant_color, None);
        assert_eq!(record.detected_text, None);
        assert_eq!(record.confidence, None);
    }

    #[test]
    fn test_unparseable_payloads() {
        assert_eq!(
            normalize(&raw(json!([1, 2, 3])), ProviderSchema::VisionJson),
            Err(NormalizationError::NotAnObject)
        );
        assert!(matches!(
            normalize(&raw(Value::String("no json here".into())), ProviderSchema::VisionJson),
            Err(NormalizationError::Unparseable(_))
        ));
    }

    #[test]
    fn test_provider_reported_error() {
        let err = normalize(&raw(json!({"error": "rate limited"})), ProviderSchema::VisionJson).unwrap_err();
        assert_eq!(err, NormalizationError::ProviderReported("rate limited".to_string()));
    }

    #[test]
    fn test_canonical_schema() {
        let payload = raw(json!({
            "productType": "Okara Burger",
            "packaging": {"kind": "box", "isDistinctiveVariant": true},
            "detectedText": "unknown",
            "confidence": 0.8
        }));
        let record = normalize(&payload, ProviderSchema::Canonical).unwrap();
        assert_eq!(record.image_id, "img-21.jpg");
        assert_eq!(record.product_type.as_deref(), Some("okara burger"));
        assert_eq!(record.packaging.is_distinctive_variant, Some(true));
        assert_eq!(record.detected_text, None);
    }

    #[test]
    fn test_normalize_all_keeps_failures_per_image() {
        let payloads = vec![
            RawAnalysisPayload { image_id: "a.jpg".into(), body: json!({"product_type": "tofu"}) },
            RawAnalysisPayload { image_id: "b.jpg".into(), body: json!("garbage") },
        ];
        let (records, failures) = normalize_all(&payloads, ProviderSchema::VisionJson);
        assert_eq!(records.len(), 1);
        assert!(records.contains_key("a.jpg"));
        assert!(failures.contains_key("b.jpg"));
    }
}
