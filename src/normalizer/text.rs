//! Free-text fields: product type, detected text, confidence

use super::lookup;
use serde_json::{Map, Value};

/// Values providers emit when they have nothing to say
const PLACEHOLDERS: &[&str] = &["unknown", "error", "null", "none", "n/a"];

/// Trimmed text, or `None` for an empty or placeholder value
pub fn clean(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() || PLACEHOLDERS.contains(&trimmed.to_lowercase().as_str()) {
        return None;
    }
    Some(trimmed.to_string())
}

/// First usable string among the paths, in priority order
pub fn first_text(object: &Map<String, Value>, paths: &[&[&str]]) -> Option<String> {
    paths
        .iter()
        .filter_map(|path| lookup(object, path))
        .filter_map(Value::as_str)
        .find_map(clean)
}

pub fn product_type(object: &Map<String, Value>) -> Option<String> {
    first_text(object, &[&["product_type"], &["productType"]]).map(|t| t.to_lowercase())
}

pub fn detected_text(object: &Map<String, Value>) -> Option<String> {
    first_text(
        object,
        &[
            &["text", "hebrew_text"],
            &["text", "product_name_hebrew"],
            &["hebrew_text", "product_name"],
            &["hebrew_text"],
        ],
    )
}

/// Provider confidence; out-of-range values are dropped
pub fn confidence(value: Option<&Value>) -> Option<f64> {
    value
        .and_then(Value::as_f64)
        .filter(|c| (0.0..=1.0).contains(c))
}
