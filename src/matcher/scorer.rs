//! Candidate scoring
//!
//! Additive weighted rules, evaluated in a fixed order:
//! 1. product type agreement (exact keyword > category bucket)
//! 2. distinctive packaging variant
//! 3. secondary-language text containment
//!
//! A rule whose evidence is missing contributes exactly 0.

use super::signature::{contains_phrase, normalize_phrase};
use super::types::Signature;
use catalog_reconcile_common::{AnalysisRecord, MatchScore};
use serde::{Deserialize, Serialize};

/// Rule weights
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoringWeights {
    /// Product type names one of the product's own keywords
    pub exact_type: f64,
    /// Product type falls in one of the product's category buckets
    pub bucket_type: f64,
    /// Provider flagged the distinctive packaging variant
    pub distinctive_variant: f64,
    /// Packaging color alone matches the variant (flag absent)
    pub variant_color: f64,
    /// Localized name token found in detected text
    pub localized_text: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            exact_type: 0.5,
            bucket_type: 0.35,
            distinctive_variant: 0.6,
            variant_color: 0.4,
            localized_text: 0.25,
        }
    }
}

impl ScoringWeights {
    pub fn validate(&self) -> Result<(), String> {
        let weights = [
            ("exactType", self.exact_type),
            ("bucketType", self.bucket_type),
            ("distinctiveVariant", self.distinctive_variant),
            ("variantColor", self.variant_color),
            ("localizedText", self.localized_text),
        ];
        for (name, value) in weights {
            if !(value >= 0.0) {
                return Err(format!("weight {} must not be negative, got {}", name, value));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Scorer {
    weights: ScoringWeights,
}

impl Scorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    /// Score one candidate image for one product
    pub fn score(&self, signature: &Signature, analysis: &AnalysisRecord) -> MatchScore {
        let mut result = MatchScore::empty(&signature.product_id, &analysis.image_id);

        if let Some((weight, reason)) = self.type_agreement(signature, analysis) {
            result.score += weight;
            result.contributing_reasons.push(reason);
        }
        if let Some((weight, reason)) = self.variant_match(signature, analysis) {
            result.score += weight;
            result.contributing_reasons.push(reason);
        }
        if let Some((weight, reason)) = self.text_match(signature, analysis) {
            result.score += weight;
            result.contributing_reasons.push(reason);
        }

        result
    }

    fn type_agreement(&self, signature: &Signature, analysis: &AnalysisRecord) -> Option<(f64, String)> {
        let product_type = analysis.product_type.as_deref()?;
        let normalized = normalize_phrase(product_type);

        // The image shows a distinctive variant this product is not
        if signature
            .forbidden_keywords
            .iter()
            .any(|kw| contains_phrase(&normalized, kw))
        {
            return None;
        }

        if let Some(keyword) = signature
            .required_keywords
            .iter()
            .find(|kw| contains_phrase(&normalized, kw))
        {
            return Some((
                self.weights.exact_type,
                format!("product type '{}' matches keyword '{}'", product_type, keyword),
            ));
        }

        for tag in &signature.tags {
            if let Some(keyword) = tag.keywords().find(|kw| contains_phrase(&normalized, kw)) {
                return Some((
                    self.weights.bucket_type,
                    format!(
                        "product type '{}' matches category '{}' (keyword '{}')",
                        product_type, tag, keyword
                    ),
                ));
            }
        }

        None
    }

    fn variant_match(&self, signature: &Signature, analysis: &AnalysisRecord) -> Option<(f64, String)> {
        let cue = signature.variant()?;

        match analysis.packaging.is_distinctive_variant {
            Some(true) => Some((
                self.weights.distinctive_variant,
                format!("distinctive variant match: {}", cue.name),
            )),
            Some(false) => None,
            None => {
                let color = analysis.packaging.dominant_color.as_deref()?;
                if contains_phrase(&normalize_phrase(color), cue.color) {
                    Some((
                        self.weights.variant_color,
                        format!("packaging color '{}' matches {}", color, cue.name),
                    ))
                } else {
                    None
                }
            }
        }
    }

    fn text_match(&self, signature: &Signature, analysis: &AnalysisRecord) -> Option<(f64, String)> {
        let text = analysis.detected_text.as_deref()?;
        let matched: Vec<&str> = signature
            .localized_tokens
            .iter()
            .filter(|token| text.contains(token.as_str()))
            .map(String::as_str)
            .collect();

        if matched.is_empty() {
            return None;
        }

        Some((
            self.weights.localized_text,
            format!("detected text contains '{}'", matched.join("', '")),
        ))
    }
}
