//! Upstream image fetcher.
//!
//! Performs one network fetch of one candidate layer: builds the WMS
//! `GetMap` URL for the request, enforces the per-fetch timeout, and
//! validates that the body is actually an image before handing it
//! back. Classification of everything that can go wrong lives in
//! [`FetchFailure`]; retry and fallback decisions are the
//! orchestrator's business.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;

use crate::catalog::LayerCandidate;
use crate::request::ImageRequest;

use super::error::FetchFailure;
use super::http::AsyncHttpClient;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Snapshot bbox half-extent in degrees around the request point.
const BBOX_HALF_EXTENT_DEG: f64 = 0.5;

/// Snapshot dimensions requested from upstream.
const SNAPSHOT_SIZE_PX: u32 = 512;

/// One-fetch-one-layer interface the orchestrator drives.
///
/// Dyn-compatible so the orchestrator can hold `Arc<dyn
/// UpstreamFetch>` and tests can substitute scripted fetchers without
/// any network mocking below this seam.
pub trait UpstreamFetch: Send + Sync {
    /// Fetch the image for `request` from the given candidate layer.
    fn fetch<'a>(
        &'a self,
        candidate: &'a LayerCandidate,
        request: &'a ImageRequest,
    ) -> BoxFuture<'a, Result<Bytes, FetchFailure>>;
}

/// HTTP-backed fetcher for WMS imagery layers.
pub struct HttpImageFetcher<C: AsyncHttpClient> {
    http_client: C,
    timeout: Duration,
}

impl<C: AsyncHttpClient> HttpImageFetcher<C> {
    /// Create a fetcher with the given per-fetch timeout.
    pub fn new(http_client: C, timeout: Duration) -> Self {
        Self {
            http_client,
            timeout,
        }
    }

    /// Build the WMS `GetMap` URL for one candidate layer.
    fn build_url(&self, candidate: &LayerCandidate, request: &ImageRequest) -> String {
        let lat = request.latitude();
        let lon = request.longitude();
        format!(
            "{}?service=WMS&version=1.3.0&request=GetMap&layers={}&bbox={},{},{},{}&width={}&height={}&crs=EPSG:4326&format=image/jpeg&time={}",
            candidate.endpoint,
            candidate.layer_id,
            lon - BBOX_HALF_EXTENT_DEG,
            lat - BBOX_HALF_EXTENT_DEG,
            lon + BBOX_HALF_EXTENT_DEG,
            lat + BBOX_HALF_EXTENT_DEG,
            SNAPSHOT_SIZE_PX,
            SNAPSHOT_SIZE_PX,
            request.date(),
        )
    }

    async fn fetch_inner(
        &self,
        candidate: &LayerCandidate,
        request: &ImageRequest,
    ) -> Result<Bytes, FetchFailure> {
        let url = self.build_url(candidate, request);
        tracing::debug!(layer = %candidate.layer_id, url = %url, "fetching upstream layer");

        let body = tokio::time::timeout(self.timeout, self.http_client.get(&url))
            .await
            .map_err(|_| FetchFailure::Timeout {
                timeout_secs: self.timeout.as_secs(),
            })??;

        validate_image(&body)?;
        Ok(body)
    }
}

impl<C: AsyncHttpClient> UpstreamFetch for HttpImageFetcher<C> {
    fn fetch<'a>(
        &'a self,
        candidate: &'a LayerCandidate,
        request: &'a ImageRequest,
    ) -> BoxFuture<'a, Result<Bytes, FetchFailure>> {
        Box::pin(self.fetch_inner(candidate, request))
    }
}

/// Reject responses that are not a recognisable image (e.g. an HTML
/// error page served with status 200).
fn validate_image(body: &[u8]) -> Result<(), FetchFailure> {
    if body.is_empty() {
        return Err(FetchFailure::MalformedResponse("empty body".to_string()));
    }
    image::guess_format(body)
        .map(|_| ())
        .map_err(|e| FetchFailure::MalformedResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::http::tests::MockHttpClient;
    use crate::request::Satellite;
    use chrono::NaiveDate;

    fn sample_jpeg() -> Bytes {
        // Minimal valid JPEG header
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

    fn sample_candidate() -> LayerCandidate {
        LayerCandidate {
            layer_id: "MODIS_Terra_CorrectedReflectance_TrueColor".to_string(),
            endpoint: "https://worldview.earthdata.nasa.gov/geoserver/wms".to_string(),
        }
    }

    #[test]
    fn test_url_construction() {
        let fetcher = HttpImageFetcher::new(
            MockHttpClient::new(vec![Ok(sample_jpeg())]),
            Duration::from_secs(30),
        );
        let url = fetcher.build_url(&sample_candidate(), &sample_request());

        assert_eq!(
            url,
            "https://worldview.earthdata.nasa.gov/geoserver/wms?service=WMS&version=1.3.0\
             &request=GetMap&layers=MODIS_Terra_CorrectedReflectance_TrueColor\
             &bbox=-121,38,-120,39&width=512&height=512&crs=EPSG:4326\
             &format=image/jpeg&time=2024-08-15"
        );
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let fetcher = HttpImageFetcher::new(
            MockHttpClient::new(vec![Ok(sample_jpeg())]),
            Duration::from_secs(30),
        );

        let result = fetcher.fetch(&sample_candidate(), &sample_request()).await;
        assert_eq!(result.unwrap(), sample_jpeg());
    }

    #[tokio::test]
    async fn test_fetch_non_image_body_is_malformed() {
        let fetcher = HttpImageFetcher::new(
            MockHttpClient::new(vec![Ok(Bytes::from_static(b"<html>503</html>"))]),
            Duration::from_secs(30),
        );

        let result = fetcher.fetch(&sample_candidate(), &sample_request()).await;
        assert!(matches!(result, Err(FetchFailure::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_fetch_empty_body_is_malformed() {
        let fetcher = HttpImageFetcher::new(
            MockHttpClient::new(vec![Ok(Bytes::new())]),
            Duration::from_secs(30),
        );

        let result = fetcher.fetch(&sample_candidate(), &sample_request()).await;
        assert!(matches!(result, Err(FetchFailure::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_fetch_propagates_failure_class() {
        let fetcher = HttpImageFetcher::new(
            MockHttpClient::new(vec![Err(FetchFailure::NotFound)]),
            Duration::from_secs(30),
        );

        let result = fetcher.fetch(&sample_candidate(), &sample_request()).await;
        assert_eq!(result, Err(FetchFailure::NotFound));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_timeout() {
        struct NeverResponds;
        impl AsyncHttpClient for NeverResponds {
            async fn get(&self, _url: &str) -> Result<Bytes, FetchFailure> {
                std::future::pending().await
            }
        }

        let fetcher = HttpImageFetcher::new(NeverResponds, Duration::from_secs(30));
        let result = fetcher.fetch(&sample_candidate(), &sample_request()).await;
        assert_eq!(result, Err(FetchFailure::Timeout { timeout_secs: 30 }));
    }
}
