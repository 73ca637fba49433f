//! Prompt builder
//!
//! - PACKAGING_KINDS: packaging labels the provider may answer with
//! - build_analysis_prompt: vision prompt for a single product image

/// Packaging labels understood by the normalizer
pub const PACKAGING_KINDS: &[&str] = &["box", "tray", "wrapper", "vacuum", "none"];

/// Build the analysis prompt for one image
///
/// # Arguments
/// * `file_name` - image file name, echoed back so answers can be audited
///
/// # Returns
/// Prompt asking for a single JSON object in the `VisionJson` schema
pub fn build_analysis_prompt(file_name: &str) -> String {
    let packaging = PACKAGING_KINDS.join("/");

    format!(
        r#"You are auditing product photos of a vegan deli catalog. Analyze the food product image {file_name}.

1. Product type: what specific product is shown (e.g. schnitzel, burger, tofu, okara, seitan, shawarma, kebab, sausage)?
2. Packaging: type ({packaging}), main color, and whether it is the green box used only for OKARA products.
3. Text: transcribe any Hebrew text exactly. Do not translate.

Respond with this JSON object only, no explanation:
{{
  "product_type": "specific type of product",
  "packaging": {{
    "type": "{packaging}",
    "color": "main color(s)",
    "is_green_box": true/false,
    "is_okara": true/false
  }},
  "text": {{
    "hebrew_text": "exact Hebrew text or null",
    "brand": "brand name or null"
  }},
  "confidence": 0.0-1.0
}}

Report only what is visible. Use null when unsure."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_mentions_file_and_schema() {
        let prompt = build_analysis_prompt("img-21.jpg");
        assert!(prompt.contains("img-21.jpg"));
        assert!(prompt.contains("\"is_okara\""));
        assert!(prompt.contains("box/tray/wrapper/vacuum/none"));
        assert!(!prompt.contains("suggested_category"));
    }
}
