//! Fetch orchestrator: cache check, retries, layer fallback.
//!
//! Each request walks a small state machine:
//!
//! ```text
//! CacheCheck ──hit──────────────────────────▶ Success
//!     │ miss
//!     ▼
//! LayerIteration: for each catalog candidate,
//!     retry loop under RetryPolicy ──success─▶ Success (write-through)
//!     │ all candidates exhausted
//!     ▼
//! Exhausted (typed failure, per-layer history)
//! ```
//!
//! Availability over purity: a single upstream outage degrades to the
//! next candidate layer, cache read errors degrade to a miss, and a
//! payload too large for the cache is still returned to the caller.
//!
//! Layer attempts for one request are strictly sequential in catalog
//! order; racing candidates in parallel would waste upstream quota.
//! Every individual attempt first acquires a permit from the shared
//! concurrency limiter, which is released on completion or
//! cancellation.

mod types;

pub use types::{FetchError, FetchExhaustedError, LayerAttempt};

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{CacheError, CacheKey, DiskCacheStore};
use crate::catalog::{LayerCandidate, LayerCatalog};
use crate::config::FetchConfig;
use crate::fetch::{FetchFailure, RetryPolicy, UpstreamFetch};
use crate::request::ImageRequest;

/// Outcome of one layer's retry loop.
enum LayerOutcome {
    Failed(LayerAttempt),
    Cancelled,
}

/// Coordinates cache, catalog, fetcher and retry policy per request.
///
/// Explicitly constructed and lifetime-scoped; the cache is injected
/// rather than ambient, so tests and embedders control setup and
/// teardown.
pub struct FetchOrchestrator {
    catalog: LayerCatalog,
    cache: Arc<DiskCacheStore>,
    fetcher: Arc<dyn UpstreamFetch>,
    retry_policy: RetryPolicy,
    fetch_limiter: Arc<Semaphore>,
    shutdown: CancellationToken,
}

impl FetchOrchestrator {
    /// Create an orchestrator from its collaborators and tunables.
    pub fn new(
        catalog: LayerCatalog,
        cache: Arc<DiskCacheStore>,
        fetcher: Arc<dyn UpstreamFetch>,
        config: &FetchConfig,
    ) -> Self {
        Self {
            catalog,
            cache,
            fetcher,
            retry_policy: config.retry_policy(),
            fetch_limiter: Arc::new(Semaphore::new(config.max_concurrent_fetches)),
            shutdown: CancellationToken::new(),
        }
    }

    /// Token cancelling all in-flight requests on shutdown.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// The cache store backing this orchestrator.
    pub fn cache(&self) -> &Arc<DiskCacheStore> {
        &self.cache
    }

    /// Retrieve the image for a request.
    ///
    /// Served from cache when possible; otherwise fetched from the
    /// first candidate layer that yields an image, with write-through
    /// to the cache.
    ///
    /// # Errors
    ///
    /// [`FetchError::UnsupportedProduct`] for unregistered
    /// satellite/product pairs, [`FetchError::Exhausted`] when every
    /// candidate layer failed, [`FetchError::Cancelled`] on shutdown.
    pub async fn fetch_image(&self, request: &ImageRequest) -> Result<Bytes, FetchError> {
        self.fetch_with_token(request, self.shutdown.child_token())
            .await
    }

    /// As [`fetch_image`](Self::fetch_image), but also honouring a
    /// per-request cancellation token (e.g. a caller-side deadline).
    pub async fn fetch_image_with_cancellation(
        &self,
        request: &ImageRequest,
        cancellation: CancellationToken,
    ) -> Result<Bytes, FetchError> {
        self.fetch_with_token(request, cancellation).await
    }

    async fn fetch_with_token(
        &self,
        request: &ImageRequest,
        cancellation: CancellationToken,
    ) -> Result<Bytes, FetchError> {
        let key = CacheKey::for_request(request);

        // CacheCheck
        match self.cache.get(&key).await {
            Ok(Some(payload)) => {
                debug!(key = %key, "cache hit");
                return Ok(payload);
            }
            Ok(None) => {}
            Err(e) => {
                // A broken cache must not take fetching down with it.
                warn!(key = %key, error = %e, "cache read failed, treating as miss");
            }
        }

        let candidates = self
            .catalog
            .candidates(request.satellite(), request.product())?;

        // LayerIteration
        let mut attempts = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if cancellation.is_cancelled() {
                return Err(FetchError::Cancelled);
            }

            match self.try_layer(candidate, request, &cancellation).await {
                Ok(payload) => {
                    // Success: write-through, then return.
                    self.write_through(&key, &payload).await;
                    info!(
                        layer = %candidate.layer_id,
                        bytes = payload.len(),
                        "image fetched"
                    );
                    return Ok(payload);
                }
                Err(LayerOutcome::Cancelled) => return Err(FetchError::Cancelled),
                Err(LayerOutcome::Failed(attempt)) => {
                    warn!(
                        layer = %attempt.layer_id,
                        attempts = attempt.attempts,
                        failure = %attempt.failure,
                        "layer failed, falling through"
                    );
                    attempts.push(attempt);
                }
            }
        }

        // Exhausted
        Err(FetchExhaustedError { attempts }.into())
    }

    /// Run one layer's retry loop.
    async fn try_layer(
        &self,
        candidate: &LayerCandidate,
        request: &ImageRequest,
        cancellation: &CancellationToken,
    ) -> Result<Bytes, LayerOutcome> {
        let mut attempt_number = 1u32;
        loop {
            let delay = self.retry_policy.backoff_delay(attempt_number);
            if !delay.is_zero() {
                tokio::select! {
                    _ = cancellation.cancelled() => return Err(LayerOutcome::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            let permit = tokio::select! {
                _ = cancellation.cancelled() => return Err(LayerOutcome::Cancelled),
                permit = self.fetch_limiter.acquire() => match permit {
                    Ok(p) => p,
                    // Closed semaphore means the process is going down.
                    Err(_) => return Err(LayerOutcome::Cancelled),
                },
            };

            let result = tokio::select! {
                _ = cancellation.cancelled() => return Err(LayerOutcome::Cancelled),
                result = self.fetcher.fetch(candidate, request) => result,
            };
            drop(permit);

            match result {
                Ok(payload) => return Ok(payload),
                Err(failure) if self.retry_policy.should_retry(attempt_number, &failure) => {
                    debug!(
                        layer = %candidate.layer_id,
                        attempt = attempt_number,
                        failure = %failure,
                        "transient failure, retrying"
                    );
                    attempt_number += 1;
                }
                Err(failure) => {
                    return Err(LayerOutcome::Failed(LayerAttempt {
                        layer_id: candidate.layer_id.clone(),
                        attempts: attempt_number,
                        failure,
                    }));
                }
            }
        }
    }

    /// Store a fresh payload, absorbing cache failures.
    async fn write_through(&self, key: &CacheKey, payload: &[u8]) {
        match self.cache.put(key, payload).await {
            Ok(()) => {}
            Err(CacheError::EntryTooLarge { size, max }) => {
                warn!(key = %key, size, max, "payload too large to cache");
            }
            Err(e) => {
                warn!(key = %key, error = %e, "cache write failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::LayerCandidate;
    use crate::request::Satellite;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    use crate::fetch::BoxFuture;

    /// Fetcher serving a scripted response sequence per layer id.
    /// The last response for a layer repeats once exhausted.
    struct ScriptedFetcher {
        scripts: Mutex<HashMap<String, Vec<Result<Bytes, FetchFailure>>>>,
        calls: AtomicUsize,
    }

    impl ScriptedFetcher {
        fn new(scripts: Vec<(&str, Vec<Result<Bytes, FetchFailure>>)>) -> Arc<Self> {
            let scripts = scripts
                .into_iter()
                .map(|(layer, mut responses)| {
                    responses.reverse();
                    (layer.to_string(), responses)
                })
                .collect();
            Arc::new(Self {
                scripts: Mutex::new(scripts),
                calls: AtomicUsize::new(0),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl UpstreamFetch for ScriptedFetcher {
        fn fetch<'a>(
            &'a self,
            candidate: &'a LayerCandidate,
            _request: &'a ImageRequest,
        ) -> BoxFuture<'a, Result<Bytes, FetchFailure>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut scripts = self.scripts.lock().unwrap();
            let responses = scripts
                .get_mut(&candidate.layer_id)
                .unwrap_or_else(|| panic!("no script for layer {}", candidate.layer_id));
            let result = if responses.len() > 1 {
                responses.pop().unwrap()
            } else {
                responses[0].clone()
            };
            Box::pin(async move { result })
        }
    }

    fn jpeg() -> Bytes {
        Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46])
    }

    fn sample_request() -> ImageRequest {
        ImageRequest::new(
            Satellite::Modis,
            "MOD09GA",
            NaiveDate::from_ymd_opt(2024, 8, 15).unwrap(),
            38.5,
            -120.5,
            50.0,
        )
        .unwrap()
    }

    fn catalog_with_layers(layers: &[&str]) -> LayerCatalog {
        let mut catalog = LayerCatalog::new();
        catalog.register(
            Satellite::Modis,
            "MOD09GA",
            layers.iter().map(|l| LayerCandidate::worldview(*l)).collect(),
        );
        catalog
    }

    async fn orchestrator(
        dir: &TempDir,
        catalog: LayerCatalog,
        fetcher: Arc<ScriptedFetcher>,
        cache_max: u64,
    ) -> FetchOrchestrator {
        let cache = Arc::new(
            DiskCacheStore::open(dir.path().to_path_buf(), cache_max)
                .await
                .unwrap(),
        );
        // Tight backoff keeps unpaused tests fast.
        let config = FetchConfig::default().with_backoff_base(Duration::from_millis(1));
        FetchOrchestrator::new(catalog, cache, fetcher, &config)
    }

    #[tokio::test]
    async fn test_success_on_first_layer() {
        let dir = TempDir::new().unwrap();
        let fetcher = ScriptedFetcher::new(vec![("layer-1", vec![Ok(jpeg())])]);
        let orch = orchestrator(&dir, catalog_with_layers(&["layer-1"]), fetcher.clone(), 100_000)
            .await;

        let payload = orch.fetch_image(&sample_request()).await.unwrap();
        assert_eq!(payload, jpeg());
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn test_second_request_served_from_cache() {
        let dir = TempDir::new().unwrap();
        let fetcher = ScriptedFetcher::new(vec![("layer-1", vec![Ok(jpeg())])]);
        let orch = orchestrator(&dir, catalog_with_layers(&["layer-1"]), fetcher.clone(), 100_000)
            .await;

        orch.fetch_image(&sample_request()).await.unwrap();
        let payload = orch.fetch_image(&sample_request()).await.unwrap();

        assert_eq!(payload, jpeg());
        // Zero additional upstream calls for the identical request.
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn test_fallback_to_second_layer_on_not_found() {
        let dir = TempDir::new().unwrap();
        let fetcher = ScriptedFetcher::new(vec![
            ("layer-1", vec![Err(FetchFailure::NotFound)]),
            ("layer-2", vec![Ok(jpeg())]),
        ]);
        let orch = orchestrator(
            &dir,
            catalog_with_layers(&["layer-1", "layer-2"]),
            fetcher.clone(),
            100_000,
        )
        .await;

        let payload = orch.fetch_image(&sample_request()).await.unwrap();
        assert_eq!(payload, jpeg());
        // NotFound is permanent for the layer: one call, no retries.
        assert_eq!(fetcher.call_count(), 2);
        // The fallback result was cached.
        assert_eq!(orch.cache().entry_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_layer_attempted_three_times_with_backoff() {
        let dir = TempDir::new().unwrap();
        let fetcher = ScriptedFetcher::new(vec![(
            "layer-1",
            vec![Err(FetchFailure::Timeout { timeout_secs: 30 })],
        )]);
        let cache = Arc::new(
            DiskCacheStore::open(dir.path().to_path_buf(), 100_000)
                .await
                .unwrap(),
        );
        let orch = FetchOrchestrator::new(
            catalog_with_layers(&["layer-1"]),
            cache,
            fetcher.clone(),
            &FetchConfig::default(),
        );

        let started = tokio::time::Instant::now();
        let err = orch.fetch_image(&sample_request()).await.unwrap_err();

        // Exactly 3 attempts, with 0s + 2s + 4s of backoff.
        assert_eq!(fetcher.call_count(), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(6));
        match err {
            FetchError::Exhausted(e) => {
                assert_eq!(e.attempts.len(), 1);
                assert_eq!(e.attempts[0].attempts, 3);
                assert_eq!(
                    e.attempts[0].failure,
                    FetchFailure::Timeout { timeout_secs: 30 }
                );
            }
            other => panic!("expected Exhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_exhaustion_reports_every_layer_and_caches_nothing() {
        let dir = TempDir::new().unwrap();
        let fetcher = ScriptedFetcher::new(vec![
            ("layer-1", vec![Err(FetchFailure::NotFound)]),
            ("layer-2", vec![Err(FetchFailure::MalformedResponse("html".into()))]),
            ("layer-3", vec![Err(FetchFailure::Network("refused".into()))]),
        ]);
        let orch = orchestrator(
            &dir,
            catalog_with_layers(&["layer-1", "layer-2", "layer-3"]),
            fetcher.clone(),
            100_000,
        )
        .await;

        let err = orch.fetch_image(&sample_request()).await.unwrap_err();
        match err {
            FetchError::Exhausted(e) => {
                let layers: Vec<_> = e.attempts.iter().map(|a| a.layer_id.as_str()).collect();
                assert_eq!(layers, vec!["layer-1", "layer-2", "layer-3"]);
                // Permanent failures: single attempt each; transient
                // network errors: retried to the cap.
                assert_eq!(e.attempts[0].attempts, 1);
                assert_eq!(e.attempts[1].attempts, 1);
                assert_eq!(e.attempts[2].attempts, 3);
            }
            other => panic!("expected Exhausted, got {:?}", other),
        }
        assert_eq!(orch.cache().entry_count(), 0);
    }

    #[tokio::test]
    async fn test_transient_failure_then_success_on_same_layer() {
        let dir = TempDir::new().unwrap();
        let fetcher = ScriptedFetcher::new(vec![(
            "layer-1",
            vec![Err(FetchFailure::RateLimited), Ok(jpeg())],
        )]);
        let orch = orchestrator(&dir, catalog_with_layers(&["layer-1"]), fetcher.clone(), 100_000)
            .await;

        let payload = orch.fetch_image(&sample_request()).await.unwrap();
        assert_eq!(payload, jpeg());
        assert_eq!(fetcher.call_count(), 2);
    }

    #[tokio::test]
    async fn test_unsupported_product() {
        let dir = TempDir::new().unwrap();
        let fetcher = ScriptedFetcher::new(vec![("layer-1", vec![Ok(jpeg())])]);
        let orch = orchestrator(&dir, LayerCatalog::new(), fetcher.clone(), 100_000).await;

        let err = orch.fetch_image(&sample_request()).await.unwrap_err();
        assert!(matches!(err, FetchError::UnsupportedProduct(_)));
        assert_eq!(fetcher.call_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_request_makes_no_further_calls() {
        let dir = TempDir::new().unwrap();
        let fetcher = ScriptedFetcher::new(vec![("layer-1", vec![Ok(jpeg())])]);
        let orch = orchestrator(&dir, catalog_with_layers(&["layer-1"]), fetcher.clone(), 100_000)
            .await;

        let token = CancellationToken::new();
        token.cancel();

        let err = orch
            .fetch_image_with_cancellation(&sample_request(), token)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Cancelled));
        assert_eq!(fetcher.call_count(), 0);
        assert_eq!(orch.cache().entry_count(), 0);
    }

    #[tokio::test]
    async fn test_oversized_payload_still_returned() {
        let dir = TempDir::new().unwrap();
        let fetcher = ScriptedFetcher::new(vec![("layer-1", vec![Ok(jpeg())])]);
        // Cache bound smaller than the payload.
        let orch =
            orchestrator(&dir, catalog_with_layers(&["layer-1"]), fetcher.clone(), 4).await;

        let payload = orch.fetch_image(&sample_request()).await.unwrap();
        assert_eq!(payload, jpeg());
        assert_eq!(orch.cache().entry_count(), 0);
    }

    /// Fetcher that sleeps while in flight and records the
    /// concurrency peak it observed.
    struct InFlightTrackingFetcher {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl InFlightTrackingFetcher {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            })
        }
    }

    impl UpstreamFetch for InFlightTrackingFetcher {
        fn fetch<'a>(
            &'a self,
            _candidate: &'a LayerCandidate,
            _request: &'a ImageRequest,
        ) -> BoxFuture<'a, Result<Bytes, FetchFailure>> {
            Box::pin(async move {
                let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(current, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(jpeg())
            })
        }
    }

    #[tokio::test]
    async fn test_in_flight_fetches_never_exceed_concurrency_limit() {
        let dir = TempDir::new().unwrap();
        let fetcher = InFlightTrackingFetcher::new();
        let cache = Arc::new(
            DiskCacheStore::open(dir.path().to_path_buf(), 100_000)
                .await
                .unwrap(),
        );
        let config = FetchConfig::default().with_max_concurrent_fetches(2);
        let orch = Arc::new(FetchOrchestrator::new(
            catalog_with_layers(&["layer-1"]),
            cache,
            fetcher.clone(),
            &config,
        ));

        let mut handles = Vec::new();
        for day in 1..=8 {
            let orch = Arc::clone(&orch);
            handles.push(tokio::spawn(async move {
                let request = ImageRequest::new(
                    Satellite::Modis,
                    "MOD09GA",
                    NaiveDate::from_ymd_opt(2024, 8, day).unwrap(),
                    38.5,
                    -120.5,
                    50.0,
                )
                .unwrap();
                orch.fetch_image(&request).await.unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // All eight distinct requests completed, but never more than
        // two fetches ran at once.
        assert_eq!(orch.cache().entry_count(), 8);
        assert_eq!(fetcher.peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_requests() {
        let dir = TempDir::new().unwrap();
        let fetcher = ScriptedFetcher::new(vec![("layer-1", vec![Ok(jpeg())])]);
        let orch = orchestrator(&dir, catalog_with_layers(&["layer-1"]), fetcher.clone(), 100_000)
            .await;

        orch.shutdown_token().cancel();

        let err = orch.fetch_image(&sample_request()).await.unwrap_err();
        assert!(matches!(err, FetchError::Cancelled));
    }
}
