//! Run report
//!
//! Every failure of a run is listed here by kind and id; nothing is
//! dropped silently.

use crate::error::Result;
use crate::matcher::{Decision, DecisionSource};
use crate::patcher::PatchResult;
use catalog_reconcile_common::Reassignment;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub products: usize,
    pub images_analyzed: usize,
    pub images_unavailable: usize,
    pub normalization_failures: usize,
    pub overridden: usize,
    pub unchanged: usize,
    pub reassigned: usize,
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Image without usable evidence
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceFailure {
    pub image_id: String,
    /// `transient`, `permanent` or `normalization`
    pub kind: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub generated_at: String,
    pub dry_run: bool,
    pub totals: Totals,
    pub decisions: Vec<Decision>,
    pub reassignments: Vec<Reassignment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<PatchResult>,
    pub evidence_failures: Vec<EvidenceFailure>,
    pub override_warnings: Vec<String>,
    pub shared_image_warnings: Vec<String>,
    /// Analyzed images no product references once the reassignments land
    pub unused_images: Vec<String>,
    /// Fatal patch error; no record was written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
}

impl RunReport {
    pub fn new(
        dry_run: bool,
        images_analyzed: usize,
        decisions: Vec<Decision>,
        patch: Option<PatchResult>,
        evidence_failures: Vec<EvidenceFailure>,
    ) -> Self {
        let reassignments: Vec<Reassignment> = decisions
            .iter()
            .filter_map(|d| d.reassignment().cloned())
            .collect();
        let overridden = decisions
            .iter()
            .filter(|d| matches!(d, Decision::Unchanged { source: DecisionSource::Override { .. }, .. }))
            .count();

        let totals = Totals {
            products: decisions.len(),
            images_analyzed,
            images_unavailable: evidence_failures.iter().filter(|f| f.kind != "normalization").count(),
            normalization_failures: evidence_failures.iter().filter(|f| f.kind == "normalization").count(),
            overridden,
            unchanged: decisions.len() - reassignments.len(),
            reassigned: reassignments.len(),
            applied: patch.as_ref().map(|p| p.applied.len()).unwrap_or(0),
            skipped: patch.as_ref().map(|p| p.skipped.len()).unwrap_or(0),
            failed: patch.as_ref().map(|p| p.failures.len()).unwrap_or(0),
        };

        Self {
            generated_at: chrono::Local::now().to_rfc3339(),
            dry_run,
            totals,
            decisions,
            reassignments,
            patch,
            evidence_failures,
            override_warnings: Vec::new(),
            shared_image_warnings: Vec::new(),
            unused_images: Vec::new(),
            aborted: None,
        }
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        let t = &self.totals;

        let _ = writeln!(md, "# Catalog reconciliation report\n");
        let _ = writeln!(md, "Generated: {}", self.generated_at);
        if self.dry_run {
            let _ = writeln!(md, "\n**Dry run**: the catalog was not modified.");
        }
        if let Some(reason) = &self.aborted {
            let _ = writeln!(md, "\n**Aborted**: {}", reason);
        }

        let _ = writeln!(md, "\n## Totals\n");
        let _ = writeln!(md, "| | |\n|---|---|");
        let _ = writeln!(md, "| Products | {} |", t.products);
        let _ = writeln!(md, "| Images analyzed | {} |", t.images_analyzed);
        let _ = writeln!(md, "| Images unavailable | {} |", t.images_unavailable);
        let _ = writeln!(md, "| Normalization failures | {} |", t.normalization_failures);
        let _ = writeln!(md, "| Confirmed overrides | {} |", t.overridden);
        let _ = writeln!(md, "| Unchanged | {} |", t.unchanged);
        let _ = writeln!(md, "| Reassigned | {} |", t.reassigned);
        let _ = writeln!(md, "| Applied | {} |", t.applied);
        let _ = writeln!(md, "| Skipped | {} |", t.skipped);
        let _ = writeln!(md, "| Failed | {} |", t.failed);

        if !self.reassignments.is_empty() {
            let _ = writeln!(md, "\n## Reassignments\n");
            let _ = writeln!(md, "| Product | From | To | Score | Reasons |\n|---|---|---|---|---|");
            for r in &self.reassignments {
                let _ = writeln!(
                    md,
                    "| {} | {} | {} | {:.2} | {} |",
                    r.product_id,
                    r.from_image_ref.as_deref().unwrap_or("-"),
                    r.to_image_ref,
                    r.score,
                    r.reasons.join("; ")
                );
            }
        }

        if let Some(patch) = self.patch.as_ref().filter(|p| !p.failures.is_empty()) {
            let _ = writeln!(md, "\n## Patch failures\n");
            for f in &patch.failures {
                let _ = writeln!(md, "- `{}` {}: {}", f.product_id, f.kind, f.detail);
            }
        }

        if !self.evidence_failures.is_empty() {
            let _ = writeln!(md, "\n## Evidence failures\n");
            for f in &self.evidence_failures {
                let _ = writeln!(md, "- `{}` ({}): {}", f.image_id, f.kind, f.detail);
            }
        }

        let warnings: Vec<&String> = self
            .override_warnings
            .iter()
            .chain(&self.shared_image_warnings)
            .collect();
        if !warnings.is_empty() {
            let _ = writeln!(md, "\n## Warnings\n");
            for w in warnings {
                let _ = writeln!(md, "- {}", w);
            }
        }

        if !self.unused_images.is_empty() {
            let _ = writeln!(md, "\n## Unused images\n");
            for image_id in &self.unused_images {
                let _ = writeln!(md, "- `{}`", image_id);
            }
        }

        if let Some(backup) = self.patch.as_ref().and_then(|p| p.backup.as_ref()) {
            let _ = writeln!(md, "\nBackup: `{}`", backup.display());
        }

        md
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::KeepReason;
    use crate::patcher::{PatchFailure, PatchFailureKind};

    fn decisions() -> Vec<Decision> {
        vec![
            Decision::Reassigned(Reassignment {
                product_id: "td-021".to_string(),
                from_image_ref: Some("img-24.jpg".to_string()),
                to_image_ref: "img-21.jpg".to_string(),
                score: 0.95,
                reasons: vec!["distinctive variant match: OKARA green box".to_string()],
            }),
            Decision::Unchanged {
                product_id: "td-024".to_string(),
                image_ref: Some("img-24.jpg".to_string()),
                reason: KeepReason::CurrentIsBest,
                source: DecisionSource::Computed,
            },
        ]
    }

    #[test]
    fn test_totals() {
        let patch = PatchResult {
            applied: vec![],
            skipped: vec![],
            failures: vec![PatchFailure {
                product_id: "td-021".to_string(),
                kind: PatchFailureKind::RecordNotFound,
                detail: "gone".to_string(),
            }],
            backup: None,
        };
        let failures = vec![
            EvidenceFailure { image_id: "img-30.jpg".into(), kind: "permanent".into(), detail: "x".into() },
            EvidenceFailure { image_id: "img-31.jpg".into(), kind: "normalization".into(), detail: "y".into() },
        ];
        let report = RunReport::new(false, 3, decisions(), Some(patch), failures);

        assert_eq!(report.totals.products, 2);
        assert_eq!(report.totals.reassigned, 1);
        assert_eq!(report.totals.unchanged, 1);
        assert_eq!(report.totals.failed, 1);
        assert_eq!(report.totals.images_unavailable, 1);
        assert_eq!(report.totals.normalization_failures, 1);
    }

    #[test]
    fn test_markdown_lists_failures() {
        let patch = PatchResult {
            failures: vec![PatchFailure {
                product_id: "td-021".to_string(),
                kind: PatchFailureKind::FieldNotFound,
                detail: "no image".to_string(),
            }],
            ..Default::default()
        };
        let mut report = RunReport::new(false, 2, decisions(), Some(patch), vec![]);
        report.shared_image_warnings.push("img-24.jpg shared".to_string());

        let md = report.to_markdown();
        assert!(md.contains("| td-021 | img-24.jpg | img-21.jpg | 0.95 |"));
        assert!(md.contains("`td-021` FieldNotFound: no image"));
        assert!(md.contains("- img-24.jpg shared"));
    }

    #[test]
    fn test_markdown_unused_images_and_abort() {
        let mut report = RunReport::new(false, 3, decisions(), None, vec![]);
        report.unused_images.push("img-40.jpg".to_string());
        report.aborted = Some("Backup failed, no record was modified: disk full".to_string());

        let md = report.to_markdown();
        assert!(md.contains("## Unused images"));
        assert!(md.contains("- `img-40.jpg`"));
        assert!(md.contains("**Aborted**: Backup failed"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["unusedImages"][0], "img-40.jpg");
        assert!(json["aborted"].as_str().unwrap().contains("disk full"));
    }

    #[test]
    fn test_json_shape() {
        let report = RunReport::new(true, 2, decisions(), None, vec![]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["dryRun"], true);
        assert_eq!(json["reassignments"][0]["toImageRef"], "img-21.jpg");
        assert_eq!(json["decisions"][1]["outcome"], "unchanged");
        assert_eq!(json["decisions"][1]["reason"], "current-is-best");
        assert!(json.get("patch").is_none());
        assert!(json.get("aborted").is_none());
    }
}
