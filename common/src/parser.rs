//! Provider response parser
//!
//! Vision CLIs answer in prose with a JSON object somewhere inside.
//! This module pulls that object out.

use crate::error::{Error, Result};
use serde_json::Value;

/// Extract the JSON part of a provider response
///
/// Extraction priority:
/// 1. ```json ... ``` block
/// 2. generic ``` ... ``` block
/// 3. the outermost `{...}` object
///
/// # Examples
/// ```
/// use catalog_reconcile_common::extract_json;
///
/// let response = "Result: {\"product_type\": \"burger\"} done";
/// let json = extract_json(response).unwrap();
/// assert_eq!(json, "{\"product_type\": \"burger\"}");
/// ```
pub fn extract_json(response: &str) -> Result<&str> {
    if let Some(start_marker) = response.find("```json") {
        let start = start_marker + 7;
        if let Some(end_offset) = response[start..].find("```") {
            return Ok(response[start..start + end_offset].trim());
        }
    }

    if let Some(start_marker) = response.find("```") {
        let start = start_marker + 3;
        if let Some(end_offset) = response[start..].find("```") {
            let block = response[start..start + end_offset].trim();
            if block.starts_with('{') {
                return Ok(block);
            }
        }
    }

    if let Some(start) = response.find('{') {
        if let Some(end) = response.rfind('}') {
            if end > start {
                return Ok(&response[start..=end]);
            }
        }
    }

    Err(Error::Parse("no JSON object found in response".into()))
}

/// Parse a provider response into a JSON value
pub fn parse_payload(response: &str) -> Result<Value> {
    let json_str = extract_json(response)?;
    serde_json::from_str(json_str)
        .map_err(|e| Error::Parse(format!("invalid analysis JSON: {}", e)))
}
