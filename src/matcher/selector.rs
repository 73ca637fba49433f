//! Best-candidate selection
//!
//! Per-product, no cross-product state. Every outcome is terminal:
//! uncertainty resolves to `Unchanged`.

use super::overrides::OverrideTable;
use super::types::{Decision, DecisionSource, KeepReason};
use catalog_reconcile_common::types::image_ref_for;
use catalog_reconcile_common::{MatchScore, Product, Reassignment};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

/// Tolerance for float noise when comparing the lead against the margin
const MARGIN_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionPolicy {
    /// Best alternative must score strictly above this
    pub acceptance_threshold: f64,
    /// Best alternative must lead the current image by at least this
    pub min_margin: f64,
    pub image_ref_prefix: Option<String>,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            acceptance_threshold: 0.5,
            min_margin: 0.1,
            image_ref_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Selector {
    policy: SelectionPolicy,
    overrides: OverrideTable,
}

impl Selector {
    pub fn new(policy: SelectionPolicy, overrides: OverrideTable) -> Self {
        Self { policy, overrides }
    }

    pub fn overrides(&self) -> &OverrideTable {
        &self.overrides
    }

    /// Confirmed-fix short circuit, checked before any scoring
    pub fn override_decision(&self, product: &Product) -> Option<Decision> {
        self.overrides.get(&product.id).map(|_| Decision::Unchanged {
            product_id: product.id.clone(),
            image_ref: product.image_ref.clone(),
            reason: KeepReason::ConfirmedOverride,
            source: DecisionSource::Override {
                version: self.overrides.version,
            },
        })
    }

    /// Decide between the current image and the best alternative
    ///
    /// An absent current image, or one without evidence, scores 0.
    pub fn select(
        &self,
        product_id: &str,
        current_image_ref: Option<&str>,
        scores: &BTreeMap<String, MatchScore>,
    ) -> Decision {
        let current_id = current_image_ref.map(catalog_reconcile_common::types::image_id_of);
        let current_score = current_id
            .and_then(|id| scores.get(id))
            .map(MatchScore::effective)
            .unwrap_or(0.0);

        let keep = |reason: KeepReason| Decision::Unchanged {
            product_id: product_id.to_string(),
            image_ref: current_image_ref.map(str::to_string),
            reason,
            source: DecisionSource::Computed,
        };

        let mut candidates: Vec<&MatchScore> = scores
            .values()
            .filter(|s| Some(s.image_id.as_str()) != current_id)
            .collect();
        // Highest score first, then the smallest image id
        candidates.sort_by(|a, b| match b.effective().total_cmp(&a.effective()) {
            Ordering::Equal => a.image_id.cmp(&b.image_id),
            other => other,
        });

        let Some(best) = candidates.first() else {
            return keep(KeepReason::NoCandidates);
        };
        let best_score = best.effective();

        debug!(
            product_id = %product_id,
            best_image = %best.image_id,
            best_score,
            current_score,
            "selecting"
        );

        if best_score <= current_score {
            return keep(KeepReason::CurrentIsBest);
        }
        if best_score - current_score + MARGIN_EPSILON < self.policy.min_margin {
            return keep(KeepReason::InsufficientMargin);
        }
        if best_score <= self.policy.acceptance_threshold {
            return keep(KeepReason::BelowThreshold);
        }

        Decision::Reassigned(Reassignment {
            product_id: product_id.to_string(),
            from_image_ref: current_image_ref.map(str::to_string),
            to_image_ref: image_ref_for(
                current_image_ref,
                &best.image_id,
                self.policy.image_ref_prefix.as_deref(),
            ),
            score: best.score,
            reasons: best.contributing_reasons.clone(),
        })
    }
}
