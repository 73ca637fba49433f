//! Reconciliation data model
//!
//! Shared between the engine and every adapter around it:
//! - Product: one catalog entry, normalized from whatever store holds it
//! - AnalysisRecord: provider-agnostic evidence for one image
//! - MatchScore: product/image score with the reasons that produced it
//! - Reassignment: a decided image change for one product

use serde::{Deserialize, Serialize};

/// Catalog entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,

    #[serde(default)]
    pub name: String,

    /// Name in the catalog's secondary language (Hebrew in practice)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub localized_name: Option<String>,

    /// Declared taxonomy tag such as "schnitzels" or "deli-meats"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
}

impl Product {
    /// Image id of the currently associated image, if any
    pub fn current_image_id(&self) -> Option<&str> {
        self.image_ref.as_deref().map(image_id_of)
    }
}

/// Image id referenced by an image ref (its last path segment)
///
/// ```
/// use catalog_reconcile_common::types::image_id_of;
///
/// assert_eq!(image_id_of("/images/vendors/teva-deli/img-21.jpg"), "img-21.jpg");
/// assert_eq!(image_id_of("img-21.jpg"), "img-21.jpg");
/// ```
pub fn image_id_of(image_ref: &str) -> &str {
    image_ref.rsplit('/').next().unwrap_or(image_ref)
}

/// Build the ref for `image_id`, keeping the directory of the current ref
///
/// Without a current ref the optional prefix is used instead.
pub fn image_ref_for(current: Option<&str>, image_id: &str, prefix: Option<&str>) -> String {
    match current.and_then(|r| r.rfind('/').map(|idx| &r[..=idx])) {
        Some(dir) => format!("{}{}", dir, image_id),
        None => match prefix {
            Some(p) if p.ends_with('/') => format!("{}{}", p, image_id),
            Some(p) if !p.is_empty() => format!("{}/{}", p, image_id),
            _ => image_id.to_string(),
        },
    }
}

/// Packaging shape as reported by a vision provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackagingKind {
    Box,
    Tray,
    Wrapper,
    Vacuum,
    None,
}

impl PackagingKind {
    /// Map a free-text label; unknown labels map to `None` (no evidence)
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        match label.as_str() {
            "box" | "carton" | "cardboard box" => Some(Self::Box),
            "tray" => Some(Self::Tray),
            "wrapper" | "wrap" | "bag" | "pouch" => Some(Self::Wrapper),
            "vacuum" | "vacuum sealed" | "vacuum-sealed" | "vacuum pack" => Some(Self::Vacuum),
            "none" | "unpackaged" | "no packaging" => Some(Self::None),
            _ => None,
        }
    }
}

/// Packaging evidence; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Packaging {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<PackagingKind>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dominant_color: Option<String>,

    /// Visually unambiguous variant cue (the OKARA green box)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_distinctive_variant: Option<bool>,
}

/// Normalized evidence for one image
///
/// Missing fields mean "no evidence", never a negative signal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub image_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_type: Option<String>,

    #[serde(default)]
    pub packaging: Packaging,

    /// Transcribed secondary-language text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_text: Option<String>,

    /// Provider's own confidence in [0, 1]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// Score of one image for one product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchScore {
    pub product_id: String,
    pub image_id: String,
    pub score: f64,
    /// Reasons in the order the rules fired
    pub contributing_reasons: Vec<String>,
}

impl MatchScore {
    pub fn empty(product_id: &str, image_id: &str) -> Self {
        Self {
            product_id: product_id.to_string(),
            image_id: image_id.to_string(),
            score: 0.0,
            contributing_reasons: Vec::new(),
        }
    }

    /// Score as compared against thresholds (anything above 1.0 is 1.0)
    pub fn effective(&self) -> f64 {
        self.score.min(1.0)
    }
}

/// Decided image change for one product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reassignment {
    pub product_id: String,
    pub from_image_ref: Option<String>,
    pub to_image_ref: String,
    pub score: f64,
    pub reasons: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_deserialize_minimal() {
        let json = r#"{"id": "td-021", "name": "Okara Vegetable Patties"}"#;
        let product: Product = serde_json::from_str(json).unwrap();
        assert_eq!(product.id, "td-021");
        assert_eq!(product.localized_name, None);
        assert_eq!(product.image_ref, None);
        assert_eq!(product.current_image_id(), None);
    }

    #[test]
    fn test_product_current_image_id() {
        let product = Product {
            id: "td-021".to_string(),
            image_ref: Some("/images/vendors/teva-deli/img-24.jpg".to_string()),
            ..Default::default()
        };
        assert_eq!(product.current_image_id(), Some("img-24.jpg"));
    }

    #[test]
    fn test_image_ref_for_keeps_directory() {
        let r = image_ref_for(Some("/images/vendors/teva-deli/img-24.jpg"), "img-21.jpg", Some("/other"));
        assert_eq!(r, "/images/vendors/teva-deli/img-21.jpg");
    }

    #[test]
    fn test_image_ref_for_prefix_fallback() {
        assert_eq!(image_ref_for(None, "img-21.jpg", Some("/images")), "/images/img-21.jpg");
        assert_eq!(image_ref_for(None, "img-21.jpg", Some("/images/")), "/images/img-21.jpg");
        assert_eq!(image_ref_for(Some("img-24.jpg"), "img-21.jpg", None), "img-21.jpg");
    }

    #[test]
    fn test_packaging_kind_from_label() {
        assert_eq!(PackagingKind::from_label("Box"), Some(PackagingKind::Box));
        assert_eq!(PackagingKind::from_label("vacuum sealed"), Some(PackagingKind::Vacuum));
        assert_eq!(PackagingKind::from_label("box/tray/wrapper"), None);
        assert_eq!(PackagingKind::from_label(""), None);
    }

    #[test]
    fn test_analysis_record_serialize_skips_missing() {
        let record = AnalysisRecord {
            image_id: "img-21.jpg".to_string(),
            product_type: Some("burger".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"imageId\":\"img-21.jpg\""));
        assert!(json.contains("\"productType\":\"burger\""));
        assert!(!json.contains("detectedText"));
        assert!(!json.contains("isDistinctiveVariant"));
    }

    #[test]
    fn test_match_score_effective_clamps() {
        let mut score = MatchScore::empty("td-021", "img-21.jpg");
        score.score = 1.35;
        assert_eq!(score.effective(), 1.0);
        score.score = 0.35;
        assert_eq!(score.effective(), 0.35);
    }
}
