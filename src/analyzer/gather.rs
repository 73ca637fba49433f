//! Evidence gathering
//!
//! Provider calls run concurrently up to `max_concurrent`. Each call has
//! its own timeout; transient failures are retried with exponential
//! backoff until the retry budget is spent. Failures never abort the batch
//! unless `abort_on_unavailable` is set, in which case the shared
//! cancellation token is fired.

use super::types::{ProviderError, RawAnalysisPayload};
use super::AnalysisProvider;
use crate::error::{ReconcileError, Result};
use crate::scanner::ImageInfo;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Outcome per image id
pub type Evidence = BTreeMap<String, std::result::Result<RawAnalysisPayload, ProviderError>>;

#[derive(Debug, Clone, PartialEq)]
pub struct GatherOptions {
    pub max_concurrent: usize,
    pub timeout: Duration,
    pub retry_budget: u32,
    /// Delay before the first retry, doubled on each further retry
    pub retry_backoff: Duration,
    pub abort_on_unavailable: bool,
    pub show_progress: bool,
}

impl Default for GatherOptions {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            timeout: Duration::from_secs(120),
            retry_budget: 2,
            retry_backoff: Duration::from_millis(500),
            abort_on_unavailable: false,
            show_progress: false,
        }
    }
}

/// Analyze every image, bounded by `options.max_concurrent`
///
/// Returns `Cancelled` when the token fired before all images settled.
pub async fn gather_evidence<P>(
    provider: &P,
    images: &[ImageInfo],
    options: &GatherOptions,
    cancel: &CancellationToken,
) -> Result<Evidence>
where
    P: AnalysisProvider + ?Sized,
{
    let bar = progress_bar(images.len() as u64, options.show_progress);

    let mut outcomes = stream::iter(images)
        .map(|image| analyze_with_retry(provider, image, options, cancel))
        .buffer_unordered(options.max_concurrent.max(1));

    let mut evidence = Evidence::new();
    while let Some((image_id, outcome)) = outcomes.next().await {
        if let Err(e) = &outcome {
            warn!(image_id = %image_id, kind = e.kind(), error = %e, "image unavailable");
            if options.abort_on_unavailable && !cancel.is_cancelled() {
                info!("aborting evidence gathering");
                cancel.cancel();
            }
        }
        bar.inc(1);
        evidence.insert(image_id, outcome);
    }
    bar.finish_and_clear();

    if cancel.is_cancelled() {
        return Err(ReconcileError::Cancelled);
    }

    Ok(evidence)
}

async fn analyze_with_retry<P>(
    provider: &P,
    image: &ImageInfo,
    options: &GatherOptions,
    cancel: &CancellationToken,
) -> (String, std::result::Result<RawAnalysisPayload, ProviderError>)
where
    P: AnalysisProvider + ?Sized,
{
    let image_id = image.image_id().to_string();
    let cancelled = || ProviderError::Permanent("cancelled".to_string());
    let mut attempt: u32 = 0;

    loop {
        let outcome = tokio::select! {
            _ = cancel.cancelled() => return (image_id, Err(cancelled())),
            result = tokio::time::timeout(options.timeout, provider.analyze(image)) => match result {
                Ok(outcome) => outcome,
                Err(_) => Err(ProviderError::Transient(format!(
                    "timed out after {} ms",
                    options.timeout.as_millis()
                ))),
            },
        };

        match outcome {
            Ok(payload) => return (image_id, Ok(payload)),
            Err(e) if e.is_transient() && attempt < options.retry_budget => {
                let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
                let delay = options.retry_backoff.saturating_mul(factor);
                attempt += 1;
                debug!(image_id = %image_id, attempt, delay_ms = delay.as_millis() as u64, error = %e, "retrying");

                tokio::select! {
                    _ = cancel.cancelled() => return (image_id, Err(cancelled())),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            Err(e) => return (image_id, Err(e)),
        }
    }
}

fn progress_bar(len: u64, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len);
    let style = ProgressStyle::with_template("  {bar:40} {pos}/{len} images ({elapsed})")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar
}
