use catalog_reconcile_common::taxonomy::{CategoryTag, VariantCue};
use catalog_reconcile_common::Reassignment;
use serde::Serialize;
use std::collections::BTreeSet;

/// Expected visual signature of a product (derived, never stored)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Signature {
    pub product_id: String,
    pub tags: BTreeSet<CategoryTag>,
    /// Keywords found literally in the product's names
    pub required_keywords: BTreeSet<String>,
    /// Keywords of distinctive variants the product does not belong to
    pub forbidden_keywords: BTreeSet<String>,
    /// Secondary-language name tokens for literal text matching
    pub localized_tokens: BTreeSet<String>,
    /// No keyword matched; tags come from the declared category
    pub from_declared_category: bool,
}

impl Signature {
    /// Packaging variant this product is expected to show
    pub fn variant(&self) -> Option<VariantCue> {
        self.tags.iter().find_map(|tag| tag.variant())
    }

    pub fn shares_tag_with(&self, other: &Signature) -> bool {
        !self.tags.is_disjoint(&other.tags)
    }
}

/// Why a product keeps its current image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeepReason {
    ConfirmedOverride,
    NoCandidates,
    BelowThreshold,
    CurrentIsBest,
    InsufficientMargin,
}

impl std::fmt::Display for KeepReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeepReason::ConfirmedOverride => write!(f, "confirmed override"),
            KeepReason::NoCandidates => write!(f, "no candidate images"),
            KeepReason::BelowThreshold => write!(f, "best alternative below threshold"),
            KeepReason::CurrentIsBest => write!(f, "current image scores best"),
            KeepReason::InsufficientMargin => write!(f, "lead below minimum margin"),
        }
    }
}

/// Where a decision came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DecisionSource {
    Override { version: u32 },
    Computed,
}

/// Terminal per-product outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum Decision {
    #[serde(rename_all = "camelCase")]
    Unchanged {
        product_id: String,
        image_ref: Option<String>,
        reason: KeepReason,
        source: DecisionSource,
    },
    Reassigned(Reassignment),
}

impl Decision {
    pub fn product_id(&self) -> &str {
        match self {
            Decision::Unchanged { product_id, .. } => product_id,
            Decision::Reassigned(r) => &r.product_id,
        }
    }

    pub fn reassignment(&self) -> Option<&Reassignment> {
        match self {
            Decision::Reassigned(r) => Some(r),
            Decision::Unchanged { .. } => None,
        }
    }
}
