//! Resilient retrieval of one asset.
//!
//! Two channels, tried in order, stopping at the first success:
//!
//! 1. **Network** — a cross-origin style GET with the site's Origin and
//!    Referer and no credentials. Any non-success status fails the step.
//! 2. **Re-encoding fallback** — only after step 1 failed: load the asset as a
//!    plain image resource, decode it off-screen and re-encode the pixels.
//!
//! Each step is bounded by the per-attempt timeout. [`ResilientFetcher::fetch`]
//! never returns early with a panic or an `ExtractError`; every failure ends
//! up as a typed [`RetrievalError`].

use crate::asset::{Asset, Payload, PayloadSource, RetrievalResult};
use crate::config::{ExtractionConfig, FallbackEncoding};
use crate::error::{ExtractError, FailureKind, RetrievalError};
use crate::pipeline::encode::reencode;
use crate::pipeline::render::SurfaceRenderer;
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, ORIGIN, REFERER};
use reqwest::StatusCode;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Byte retrieval over the network.
#[async_trait]
pub trait NetworkSource: Send + Sync {
    /// Fetch `url` as a cross-origin request from `origin`.
    async fn retrieve(&self, url: &Url, origin: &str) -> Result<Payload, RetrievalError>;
}

/// Shared client for both channels.
///
/// No cookie store is configured, so requests never carry credentials.
/// Timeouts are applied per attempt by [`ResilientFetcher`], not here.
pub fn http_client(config: &ExtractionConfig) -> Result<reqwest::Client, ExtractError> {
    reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .build()
        .map_err(|e| ExtractError::Internal(format!("HTTP client: {e}")))
}

/// [`NetworkSource`] over reqwest.
#[derive(Debug, Clone)]
pub struct HttpNetworkSource {
    client: reqwest::Client,
    referer: String,
}

impl HttpNetworkSource {
    pub fn new(client: reqwest::Client, referer: impl Into<String>) -> Self {
        Self {
            client,
            referer: referer.into(),
        }
    }
}

#[async_trait]
impl NetworkSource for HttpNetworkSource {
    async fn retrieve(&self, url: &Url, origin: &str) -> Result<Payload, RetrievalError> {
        let response = self
            .client
            .get(url.clone())
            .header(ORIGIN, origin)
            .header(REFERER, self.referer.as_str())
            .header("Sec-Fetch-Mode", "cors")
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(RetrievalError::cors_denied(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(RetrievalError::network(format!("HTTP {status}")));
        }

        let declared = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|v| !v.is_empty());

        let bytes = response.bytes().await.map_err(transport_error)?.to_vec();
        let mime = declared.unwrap_or_else(|| sniff_mime(&bytes).to_string());

        Ok(Payload::new(bytes, mime, PayloadSource::Network))
    }
}

fn transport_error(e: reqwest::Error) -> RetrievalError {
    if e.is_timeout() {
        RetrievalError::new(FailureKind::Timeout, e.to_string())
    } else {
        RetrievalError::network(e.to_string())
    }
}

/// MIME type from magic bytes, for responses without a Content-Type.
fn sniff_mime(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .map(|f| f.to_mime_type())
        .unwrap_or("application/octet-stream")
}

/// Retrieves one asset through the network channel, then the fallback.
#[derive(Clone)]
pub struct ResilientFetcher {
    network: Arc<dyn NetworkSource>,
    renderer: Arc<dyn SurfaceRenderer>,
    origin: String,
    attempt_timeout: Duration,
    encoding: FallbackEncoding,
    jpeg_quality: u8,
}

impl ResilientFetcher {
    /// `origin` is what the Origin header should claim, normally the
    /// page's own origin.
    pub fn new(
        network: Arc<dyn NetworkSource>,
        renderer: Arc<dyn SurfaceRenderer>,
        origin: impl Into<String>,
        config: &ExtractionConfig,
    ) -> Self {
        Self {
            network,
            renderer,
            origin: origin.into(),
            attempt_timeout: Duration::from_secs(config.fetch_timeout_secs),
            encoding: config.fallback_encoding,
            jpeg_quality: config.jpeg_quality,
        }
    }

    /// Override the per-attempt bound.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub async fn fetch(&self, asset: &Asset) -> RetrievalResult {
        let url = &asset.source_url;

        let primary = match self
            .bounded(self.network.retrieve(url, &self.origin))
            .await
        {
            Ok(payload) => {
                debug!(
                    "Image {}: {} bytes {} via network",
                    asset.ordinal,
                    payload.len(),
                    payload.mime
                );
                return Ok(payload);
            }
            Err(e) => e,
        };

        warn!(
            "Image {}: network retrieval failed ({}), trying re-encode fallback",
            asset.ordinal, primary
        );

        let surface = match self.bounded(self.renderer.render(url)).await {
            Ok(surface) => surface,
            Err(fallback) => {
                let err = settle(primary, fallback);
                warn!("Image {}: {}", asset.ordinal, err);
                return Err(err);
            }
        };

        let encoding = self.encoding;
        let quality = self.jpeg_quality;
        let payload = tokio::task::spawn_blocking(move || reencode(&surface, encoding, quality))
            .await
            .map_err(|e| RetrievalError::decode(format!("re-encode task panicked: {e}")))?
            .map_err(|e| RetrievalError::decode(format!("re-encode failed: {e}")))?;

        debug!(
            "Image {}: {} bytes {} via re-encode fallback",
            asset.ordinal,
            payload.len(),
            payload.mime
        );
        Ok(payload)
    }

    async fn bounded<T, F>(&self, attempt: F) -> Result<T, RetrievalError>
    where
        F: Future<Output = Result<T, RetrievalError>>,
    {
        match tokio::time::timeout(self.attempt_timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(RetrievalError::timeout(self.attempt_timeout)),
        }
    }
}

/// Final error once both channels failed.
///
/// If the fallback resource never loaded, the network step's reason is the
/// informative one (e.g. `cors-denied`); otherwise the fallback's reason
/// (`decode-error` for a tainted surface, `timeout`) is reported.
fn settle(primary: RetrievalError, fallback: RetrievalError) -> RetrievalError {
    let kind = if fallback.kind == FailureKind::Network {
        primary.kind
    } else {
        fallback.kind
    };
    RetrievalError::new(
        kind,
        format!("{}; fallback: {}", primary.detail, fallback.detail),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::render::{decode_surface, Surface};
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::Mutex;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    type Log = Arc<Mutex<Vec<&'static str>>>;

    struct FakeNetwork {
        log: Log,
        result: Result<Payload, RetrievalError>,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl NetworkSource for FakeNetwork {
        async fn retrieve(&self, _url: &Url, _origin: &str) -> Result<Payload, RetrievalError> {
            self.log.lock().unwrap().push("network");
            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
            self.result.clone()
        }
    }

    struct FakeRenderer {
        log: Log,
        result: Result<Vec<u8>, RetrievalError>,
    }

    #[async_trait]
    impl SurfaceRenderer for FakeRenderer {
        async fn render(&self, _url: &Url) -> Result<Surface, RetrievalError> {
            self.log.lock().unwrap().push("render");
            match &self.result {
                Ok(bytes) => decode_surface(bytes),
                Err(e) => Err(e.clone()),
            }
        }
    }

    fn jpeg_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 3, Rgb([9, 9, 9])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg).unwrap();
        buf
    }

    fn asset() -> Asset {
        Asset::new(1, Url::parse("https://cdn.example.com/a.jpg").unwrap(), "jpg")
    }

    fn fetcher(
        log: &Log,
        network: Result<Payload, RetrievalError>,
        render: Result<Vec<u8>, RetrievalError>,
    ) -> ResilientFetcher {
        let network = Arc::new(FakeNetwork {
            log: log.clone(),
            result: network,
            delay: None,
        });
        let renderer = Arc::new(FakeRenderer {
            log: log.clone(),
            result: render,
        });
        ResilientFetcher::new(
            network,
            renderer,
            "https://www.behance.net",
            &ExtractionConfig::default(),
        )
    }

    #[tokio::test]
    async fn network_success_skips_fallback() {
        let log: Log = Default::default();
        let payload = Payload::new(vec![1, 2, 3], "image/jpeg", PayloadSource::Network);
        let f = fetcher(&log, Ok(payload.clone()), Ok(jpeg_bytes()));

        assert_eq!(f.fetch(&asset()).await.unwrap(), payload);
        assert_eq!(*log.lock().unwrap(), vec!["network"]);
    }

    #[tokio::test]
    async fn fallback_runs_only_after_network_failure() {
        let log: Log = Default::default();
        let f = fetcher(
            &log,
            Err(RetrievalError::cors_denied("HTTP 403 Forbidden")),
            Ok(jpeg_bytes()),
        );

        let payload = f.fetch(&asset()).await.unwrap();
        assert_eq!(payload.source, PayloadSource::Reencoded);
        assert_eq!(payload.mime, "image/jpeg");
        assert_eq!(*log.lock().unwrap(), vec!["network", "render"]);
    }

    #[tokio::test]
    async fn denied_webp_and_gif_keep_their_extension() {
        for (ext, format) in [("webp", ImageFormat::WebP), ("gif", ImageFormat::Gif)] {
            let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(6, 4, Rgb([30, 60, 90])));
            let mut source = Vec::new();
            img.write_to(&mut Cursor::new(&mut source), format).unwrap();

            let log: Log = Default::default();
            let f = fetcher(
                &log,
                Err(RetrievalError::cors_denied("HTTP 403 Forbidden")),
                Ok(source),
            );
            let url = Url::parse(&format!("https://cdn.example.com/a.{ext}")).unwrap();
            let asset = Asset::new(1, url, ext);

            let payload = f.fetch(&asset).await.unwrap();
            assert_eq!(payload.source, PayloadSource::Reencoded);
            assert_eq!(asset.filename, format!("image_001.{ext}"));
            assert_eq!(image::guess_format(&payload.bytes).unwrap(), format);
            assert_eq!(payload.mime, format.to_mime_type());
        }
    }

    #[tokio::test]
    async fn unloadable_fallback_keeps_network_reason() {
        let log: Log = Default::default();
        let f = fetcher(
            &log,
            Err(RetrievalError::cors_denied("HTTP 403 Forbidden")),
            Err(RetrievalError::network("image load failed: HTTP 403")),
        );

        let err = f.fetch(&asset()).await.unwrap_err();
        assert_eq!(err.kind, FailureKind::CorsDenied);
        assert!(err.detail.contains("fallback"), "got: {err}");
    }

    #[tokio::test]
    async fn tainted_surface_is_decode_error() {
        let log: Log = Default::default();
        let f = fetcher(
            &log,
            Err(RetrievalError::network("connection reset")),
            Ok(b"not pixels".to_vec()),
        );

        let err = f.fetch(&asset()).await.unwrap_err();
        assert_eq!(err.kind, FailureKind::DecodeError);
    }

    #[tokio::test]
    async fn hung_network_step_times_out_then_falls_back() {
        let log: Log = Default::default();
        let network = Arc::new(FakeNetwork {
            log: log.clone(),
            result: Ok(Payload::new(vec![0], "image/jpeg", PayloadSource::Network)),
            delay: Some(Duration::from_secs(5)),
        });
        let renderer = Arc::new(FakeRenderer {
            log: log.clone(),
            result: Err(RetrievalError::network("image load failed")),
        });
        let f = ResilientFetcher::new(network, renderer, "https://x", &ExtractionConfig::default())
            .with_attempt_timeout(Duration::from_millis(50));

        let err = f.fetch(&asset()).await.unwrap_err();
        assert_eq!(err.kind, FailureKind::Timeout);
        assert!(err.detail.starts_with("no response within 50ms"), "got: {err}");
        assert_eq!(*log.lock().unwrap(), vec!["network", "render"]);
    }

    #[tokio::test]
    async fn http_source_sends_site_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok.jpg"))
            .and(header("origin", "https://www.behance.net"))
            .and(header("referer", "https://www.behance.net/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/jpeg; charset=binary")
                    .set_body_bytes(jpeg_bytes()),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/denied.jpg"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let config = ExtractionConfig::default();
        let source = HttpNetworkSource::new(http_client(&config).unwrap(), &config.referer);

        let url = Url::parse(&format!("{}/ok.jpg", server.uri())).unwrap();
        let payload = source.retrieve(&url, "https://www.behance.net").await.unwrap();
        assert_eq!(payload.mime, "image/jpeg");
        assert_eq!(payload.source, PayloadSource::Network);

        let url = Url::parse(&format!("{}/denied.jpg", server.uri())).unwrap();
        let err = source.retrieve(&url, "https://www.behance.net").await.unwrap_err();
        assert_eq!(err.kind, FailureKind::CorsDenied);
    }

    #[test]
    fn sniffs_missing_content_type() {
        assert_eq!(sniff_mime(&jpeg_bytes()), "image/jpeg");
        assert_eq!(sniff_mime(b"??"), "application/octet-stream");
    }
}
