//! Run coordinator
//!
//! products → evidence → normalize → signature → score → select → patch → report
//!
//! Evidence gathering is the only async, cancellable stage. Everything
//! after it runs synchronously in catalog order.

use crate::analyzer::{self, AnalysisFile, AnalysisProvider, Evidence, GatherOptions};
use crate::config::Config;
use crate::error::{ReconcileError, Result};
use crate::matcher::{extract_signature, score_candidates, Decision, OverrideTable, Scorer, Selector, Signature};
use crate::normalizer::{normalize_all, ProviderSchema};
use crate::patcher::{apply_reassignments_locked, CatalogStore, StoreLock};
use crate::report::{EvidenceFailure, RunReport};
use crate::scanner::scan_folder;
use catalog_reconcile_common::types::image_id_of;
use catalog_reconcile_common::{AnalysisRecord, Product, Reassignment};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Where the evidence of a run comes from
#[derive(Debug, Clone)]
pub enum EvidenceSource {
    /// Live analysis of an image folder
    Images {
        folder: PathBuf,
        recursive: bool,
        use_cache: bool,
    },
    /// A previously written analysis file
    AnalysisFile(PathBuf),
}

/// Collect raw evidence per image id
///
/// Returns `Cancelled` if gathering was cancelled; nothing has been
/// touched at that point.
pub async fn collect_evidence<P>(
    source: &EvidenceSource,
    provider: &P,
    options: &GatherOptions,
    cancel: &CancellationToken,
) -> Result<Evidence>
where
    P: AnalysisProvider + ?Sized,
{
    match source {
        EvidenceSource::Images { folder, recursive, use_cache } => {
            let images = scan_folder(folder, *recursive)?;
            info!(folder = %folder.display(), images = images.len(), "images found");
            if *use_cache {
                analyzer::gather_with_cache(provider, &images, folder, options, cancel).await
            } else {
                analyzer::gather_evidence(provider, &images, options, cancel).await
            }
        }
        EvidenceSource::AnalysisFile(path) => {
            let file = AnalysisFile::load(path)?;
            info!(path = %path.display(), results = file.results.len(), "analysis file loaded");
            Ok(file.to_evidence())
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunOptions {
    /// Decide and report without touching the store
    pub dry_run: bool,
    pub schema: ProviderSchema,
}

pub struct Coordinator {
    scorer: Scorer,
    selector: Selector,
    options: RunOptions,
}

impl Coordinator {
    pub fn new(scorer: Scorer, selector: Selector, options: RunOptions) -> Self {
        Self { scorer, selector, options }
    }

    pub fn from_config(config: &Config, overrides: OverrideTable, options: RunOptions) -> Self {
        Self::new(
            Scorer::new(config.weights),
            Selector::new(config.selection_policy(), overrides),
            options,
        )
    }

    pub fn set_dry_run(&mut self, dry_run: bool) {
        self.options.dry_run = dry_run;
    }

    /// One decision per product, in catalog order
    pub fn decide(&self, products: &[Product], records: &BTreeMap<String, AnalysisRecord>) -> Vec<Decision> {
        products
            .iter()
            .map(|product| {
                if let Some(decision) = self.selector.override_decision(product) {
                    return decision;
                }
                let signature = extract_signature(product);
                let scores = score_candidates(&self.scorer, &signature, records.values());
                self.selector
                    .select(&product.id, product.image_ref.as_deref(), &scores)
            })
            .collect()
    }

    /// Reconcile the store against already collected evidence
    ///
    /// A non-dry run holds the store lock through the patch stage.
    pub fn run<S>(&self, store: &S, evidence: &Evidence) -> Result<RunReport>
    where
        S: CatalogStore + ?Sized,
    {
        if self.options.dry_run {
            return self.reconcile_with(store, evidence, None);
        }
        let lock = store.lock()?;
        self.reconcile_with(store, evidence, Some(&lock))
    }

    /// `run` for a caller that already holds the store lock
    pub fn run_locked<S>(&self, store: &S, evidence: &Evidence, lock: &StoreLock) -> Result<RunReport>
    where
        S: CatalogStore + ?Sized,
    {
        self.reconcile_with(store, evidence, Some(lock))
    }

    /// Collect evidence, then reconcile
    ///
    /// A non-dry run locks the store before the first provider call, so a
    /// locked store refuses the run up front.
    pub async fn reconcile<S, P>(
        &self,
        store: &S,
        source: &EvidenceSource,
        provider: &P,
        options: &GatherOptions,
        cancel: &CancellationToken,
    ) -> Result<RunReport>
    where
        S: CatalogStore + ?Sized,
        P: AnalysisProvider + ?Sized,
    {
        let lock = if self.options.dry_run { None } else { Some(store.lock()?) };
        let evidence = collect_evidence(source, provider, options, cancel).await?;
        self.reconcile_with(store, &evidence, lock.as_ref())
    }

    fn reconcile_with<S>(&self, store: &S, evidence: &Evidence, lock: Option<&StoreLock>) -> Result<RunReport>
    where
        S: CatalogStore + ?Sized,
    {
        let products = store.read_all()?;
        info!(products = products.len(), images = evidence.len(), "reconciling");

        let mut failures = Vec::new();
        let mut payloads = Vec::new();
        for (image_id, outcome) in evidence {
            match outcome {
                Ok(payload) => payloads.push(payload),
                Err(e) => failures.push(EvidenceFailure {
                    image_id: image_id.clone(),
                    kind: e.kind().to_string(),
                    detail: e.to_string(),
                }),
            }
        }

        let (records, normalization_failures) = normalize_all(payloads, self.options.schema);
        failures.extend(normalization_failures.into_iter().map(|(image_id, e)| EvidenceFailure {
            image_id,
            kind: "normalization".to_string(),
            detail: e.to_string(),
        }));
        failures.sort_by(|a, b| a.image_id.cmp(&b.image_id));

        let decisions = self.decide(&products, &records);
        let reassignments: Vec<Reassignment> = decisions
            .iter()
            .filter_map(|d| d.reassignment().cloned())
            .collect();
        info!(reassignments = reassignments.len(), dry_run = self.options.dry_run, "decisions made");

        let (patch, fatal) = match lock {
            Some(lock) if !self.options.dry_run && !reassignments.is_empty() => {
                match apply_reassignments_locked(store, lock, &reassignments) {
                    Ok(result) => (Some(result), None),
                    Err(e) => (None, Some(e)),
                }
            }
            _ => (None, None),
        };

        let override_warnings: Vec<String> = products
            .iter()
            .filter_map(|p| self.selector.overrides().pin_mismatch(p))
            .collect();
        for w in &override_warnings {
            warn!(warning = %w, "override pin differs from catalog");
        }
        let refs = final_image_refs(&products, &decisions);
        let shared = shared_image_warnings(&products, &refs);
        let unused = unused_images(evidence.keys(), &refs);

        let mut report = RunReport::new(self.options.dry_run, records.len(), decisions, patch, failures);
        report.override_warnings = override_warnings;
        report.shared_image_warnings = shared;
        report.unused_images = unused;

        if let Some(e) = fatal {
            error!(error = %e, "patch aborted");
            report.aborted = Some(e.to_string());
            return Err(ReconcileError::RunAborted {
                source: Box::new(e),
                report: Box::new(report),
            });
        }
        Ok(report)
    }
}

/// Image ref per product id once the planned reassignments land
fn final_image_refs<'a>(products: &'a [Product], decisions: &'a [Decision]) -> BTreeMap<&'a str, &'a str> {
    let planned: BTreeMap<&str, &str> = decisions
        .iter()
        .filter_map(|d| match d {
            Decision::Reassigned(r) => Some((r.product_id.as_str(), r.to_image_ref.as_str())),
            Decision::Unchanged { .. } => None,
        })
        .collect();

    products
        .iter()
        .filter_map(|p| {
            let image_ref = planned.get(p.id.as_str()).copied().or(p.image_ref.as_deref())?;
            Some((p.id.as_str(), image_ref))
        })
        .collect()
}

/// Images that end up referenced by products with no category tag in common
fn shared_image_warnings(products: &[Product], refs: &BTreeMap<&str, &str>) -> Vec<String> {
    let mut by_image: BTreeMap<&str, Vec<(&Product, Signature)>> = BTreeMap::new();
    for product in products {
        if let Some(image_ref) = refs.get(product.id.as_str()) {
            let signature = extract_signature(product);
            if !signature.tags.is_empty() {
                by_image
                    .entry(image_id_of(image_ref))
                    .or_default()
                    .push((product, signature));
            }
        }
    }

    let mut warnings = Vec::new();
    for (image_id, users) in by_image {
        let unrelated = users.iter().enumerate().any(|(i, (_, a))| {
            users[i + 1..].iter().any(|(_, b)| !a.shares_tag_with(b))
        });
        if unrelated {
            let ids: Vec<&str> = users.iter().map(|(p, _)| p.id.as_str()).collect();
            warn!(image_id, products = ?ids, "image shared across unrelated categories");
            warnings.push(format!(
                "{} is referenced by unrelated products: {}",
                image_id,
                ids.join(", ")
            ));
        }
    }
    warnings
}

/// Analyzed image ids no product points at
fn unused_images<'a>(image_ids: impl IntoIterator<Item = &'a String>, refs: &BTreeMap<&str, &str>) -> Vec<String> {
    let used: BTreeSet<&str> = refs.values().map(|r| image_id_of(r)).collect();
    image_ids
        .into_iter()
        .filter(|id| !used.contains(id.as_str()))
        .cloned()
        .collect()
}
