//! Reconciliation engine: signature → score → decision

pub mod overrides;
pub mod scorer;
pub mod selector;
pub mod signature;
pub mod types;

pub use overrides::{OverrideEntry, OverrideTable};
pub use scorer::{Scorer, ScoringWeights};
pub use selector::{SelectionPolicy, Selector};
pub use signature::extract_signature;
pub use types::{Decision, DecisionSource, KeepReason, Signature};

use catalog_reconcile_common::{AnalysisRecord, MatchScore};
use std::collections::BTreeMap;

/// Score every analysed image for one product, keyed by image id
pub fn score_candidates<'a>(
    scorer: &Scorer,
    signature: &Signature,
    records: impl IntoIterator<Item = &'a AnalysisRecord>,
) -> BTreeMap<String, MatchScore> {
    records
        .into_iter()
        .map(|record| (record.image_id.clone(), scorer.score(signature, record)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_reconcile_common::{Packaging, Product};

    fn record(image_id: &str, variant: bool) -> AnalysisRecord {
        AnalysisRecord {
            image_id: image_id.to_string(),
            product_type: Some("burger".to_string()),
            packaging: Packaging {
                is_distinctive_variant: Some(variant),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn product(name: &str) -> Product {
        Product {
            id: "td-021".to_string(),
            name: name.to_string(),
            category: Some("burgers".to_string()),
            image_ref: Some("img-24".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_okara_product_moves_to_green_box() {
        let records = vec![record("img-24", false), record("img-21", true)];
        let product = product("Okara Vegetable Patties");
        let signature = extract_signature(&product);
        let scores = score_candidates(&Scorer::default(), &signature, &records);

        let decision = Selector::default().select(&product.id, product.image_ref.as_deref(), &scores);
        let r = decision.reassignment().unwrap();
        assert_eq!(r.from_image_ref.as_deref(), Some("img-24"));
        assert_eq!(r.to_image_ref, "img-21");
        assert!(r.reasons.iter().any(|s| s.contains("distinctive variant match")));
    }

    #[test]
    fn test_plain_product_stays_on_tie() {
        let records = vec![record("img-24", false), record("img-21", true)];
        let product = product("Classic Burger");
        let signature = extract_signature(&product);
        let scores = score_candidates(&Scorer::default(), &signature, &records);

        assert_eq!(scores["img-24"].score, scores["img-21"].score);
        let decision = Selector::default().select(&product.id, product.image_ref.as_deref(), &scores);
        assert!(decision.reassignment().is_none());
    }
}
