//! Evidence gathering tests
//!
//! Retry, timeout, concurrency bound and cancellation against a scripted
//! provider

use async_trait::async_trait;
use catalog_reconcile::analyzer::{
    gather_evidence, AnalysisProvider, GatherOptions, ProviderError, RawAnalysisPayload,
};
use catalog_reconcile::error::ReconcileError;
use catalog_reconcile::scanner::ImageInfo;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Answers from a per-image script, then succeeds
struct ScriptedProvider {
    script: Mutex<HashMap<String, VecDeque<ProviderError>>>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedProvider {
    fn new(delay: Duration) -> Self {
        Self {
            script: Mutex::new(HashMap::new()),
            delay,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    fn fail(self, image_id: &str, errors: Vec<ProviderError>) -> Self {
        self.script
            .lock()
            .unwrap()
            .insert(image_id.to_string(), errors.into_iter().collect());
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn analyze(&self, image: &ImageInfo) -> Result<RawAnalysisPayload, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let scripted = self
            .script
            .lock()
            .unwrap()
            .get_mut(&image.file_name)
            .and_then(|queue| queue.pop_front());
        match scripted {
            Some(error) => Err(error),
            None => Ok(RawAnalysisPayload {
                image_id: image.file_name.clone(),
                body: json!({"product_type": "burger"}),
            }),
        }
    }
}

fn images(n: usize) -> Vec<ImageInfo> {
    (1..=n)
        .map(|i| {
            let file_name = format!("img-{:02}.jpg", i);
            ImageInfo {
                path: PathBuf::from("/photos").join(&file_name),
                file_name,
            }
        })
        .collect()
}

fn options() -> GatherOptions {
    GatherOptions {
        max_concurrent: 4,
        timeout: Duration::from_secs(5),
        retry_budget: 2,
        retry_backoff: Duration::from_millis(1),
        abort_on_unavailable: false,
        show_progress: false,
    }
}

fn transient() -> ProviderError {
    ProviderError::Transient("rate limited".to_string())
}

#[tokio::test]
async fn test_every_image_gets_an_outcome() {
    let provider = ScriptedProvider::new(Duration::from_millis(1));
    let evidence = gather_evidence(&provider, &images(5), &options(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(evidence.len(), 5);
    assert!(evidence.values().all(|outcome| outcome.is_ok()));
    assert_eq!(provider.calls(), 5);
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let provider = ScriptedProvider::new(Duration::from_millis(1)).fail("img-01.jpg", vec![transient(), transient()]);
    let evidence = gather_evidence(&provider, &images(1), &options(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(evidence["img-01.jpg"].is_ok());
    assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn test_retry_budget_exhausted() {
    let provider = ScriptedProvider::new(Duration::from_millis(1))
        .fail("img-02.jpg", vec![transient(), transient(), transient()]);
    let evidence = gather_evidence(&provider, &images(3), &options(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(evidence["img-02.jpg"], Err(ProviderError::Transient(_))));
    assert!(evidence["img-01.jpg"].is_ok());
    assert!(evidence["img-03.jpg"].is_ok());
    // 3 calls for img-02, 1 each for the others
    assert_eq!(provider.calls(), 5);
}

#[tokio::test]
async fn test_permanent_failure_is_not_retried() {
    let provider = ScriptedProvider::new(Duration::from_millis(1))
        .fail("img-01.jpg", vec![ProviderError::Permanent("unreadable image".to_string())]);
    let evidence = gather_evidence(&provider, &images(2), &options(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(evidence["img-01.jpg"], Err(ProviderError::Permanent(_))));
    assert!(evidence["img-02.jpg"].is_ok());
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn test_concurrency_is_bounded() {
    let provider = ScriptedProvider::new(Duration::from_millis(20));
    let options = GatherOptions { max_concurrent: 3, ..options() };
    let evidence = gather_evidence(&provider, &images(10), &options, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(evidence.len(), 10);
    let peak = provider.max_in_flight.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak in flight was {}", peak);
    assert!(peak >= 1);
}

#[tokio::test]
async fn test_timeout_counts_as_transient() {
    let provider = ScriptedProvider::new(Duration::from_millis(500));
    let options = GatherOptions {
        timeout: Duration::from_millis(20),
        retry_budget: 1,
        ..options()
    };
    let evidence = gather_evidence(&provider, &images(1), &options, &CancellationToken::new())
        .await
        .unwrap();

    match &evidence["img-01.jpg"] {
        Err(ProviderError::Transient(message)) => assert!(message.contains("timed out")),
        other => panic!("expected a transient timeout, got {:?}", other),
    }
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn test_abort_on_unavailable_cancels_the_run() {
    let provider = ScriptedProvider::new(Duration::from_millis(10))
        .fail("img-01.jpg", vec![ProviderError::Permanent("gone".to_string())]);
    let options = GatherOptions {
        max_concurrent: 1,
        abort_on_unavailable: true,
        ..options()
    };
    let cancel = CancellationToken::new();

    let result = gather_evidence(&provider, &images(6), &options, &cancel).await;
    assert!(matches!(result, Err(ReconcileError::Cancelled)));
    assert!(cancel.is_cancelled());
}

#[tokio::test]
async fn test_failures_do_not_abort_by_default() {
    let provider = ScriptedProvider::new(Duration::from_millis(1))
        .fail("img-01.jpg", vec![ProviderError::Permanent("gone".to_string())]);
    let cancel = CancellationToken::new();

    let evidence = gather_evidence(&provider, &images(4), &options(), &cancel).await.unwrap();
    assert_eq!(evidence.len(), 4);
    assert!(!cancel.is_cancelled());
}

#[tokio::test]
async fn test_cancelled_token_stops_gathering() {
    let provider = ScriptedProvider::new(Duration::from_millis(200));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = gather_evidence(&provider, &images(3), &options(), &cancel).await;
    assert!(matches!(result, Err(ReconcileError::Cancelled)));
}
