//! Configuration types for gallery extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. The run mode (archive or document) is
//! not part of the config; it is chosen per trigger.

use crate::error::ExtractError;
use crate::progress::ProgressCallback;
use scraper::Selector;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Referer sent with network retrieval when none is configured.
pub const DEFAULT_REFERER: &str = "https://www.behance.net/";

/// Desktop browser user agent; some CDNs refuse requests without one.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Configuration for an extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use gallery2pdf::{ExtractionConfig, PageSize};
///
/// let config = ExtractionConfig::builder()
///     .page_size(PageSize::Letter)
///     .fetch_timeout_secs(15)
///     .max_concurrent_fetches(8)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Referer header supplied on network retrieval. Default: behance.net.
    pub referer: String,

    /// Origin header supplied on network retrieval.
    /// If None, the origin of the document URL is used.
    pub origin: Option<String>,

    /// User agent for every outbound request.
    pub user_agent: String,

    /// Bound on each retrieval attempt, in seconds. Default: 30.
    ///
    /// Applies separately to the network step and the re-encoding fallback,
    /// so a single asset can take up to twice this long before it is
    /// recorded as `timeout`.
    pub fetch_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Upper bound on in-flight retrievals. Default: None (all at once).
    pub max_concurrent_fetches: Option<usize>,

    /// How fallback-rendered pixels are re-encoded. Default: preserve original.
    pub fallback_encoding: FallbackEncoding,

    /// JPEG quality used whenever the fallback emits JPEG. Range 1–100. Default: 95.
    pub jpeg_quality: u8,

    /// Page geometry for document mode. Default: A4 portrait.
    pub page_size: PageSize,

    /// CSS selectors appended to the built-in matcher strategies.
    pub extra_selectors: Vec<String>,

    /// Receives phase and progress events. Default: None.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            referer: DEFAULT_REFERER.to_string(),
            origin: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            fetch_timeout_secs: 30,
            download_timeout_secs: 120,
            max_concurrent_fetches: None,
            fallback_encoding: FallbackEncoding::default(),
            jpeg_quality: 95,
            page_size: PageSize::default(),
            extra_selectors: Vec::new(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("referer", &self.referer)
            .field("origin", &self.origin)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("max_concurrent_fetches", &self.max_concurrent_fetches)
            .field("fallback_encoding", &self.fallback_encoding)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("page_size", &self.page_size)
            .field("extra_selectors", &self.extra_selectors)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn referer(mut self, referer: impl Into<String>) -> Self {
        self.config.referer = referer.into();
        self
    }

    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.config.origin = Some(origin.into());
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn max_concurrent_fetches(mut self, n: usize) -> Self {
        self.config.max_concurrent_fetches = Some(n);
        self
    }

    pub fn fallback_encoding(mut self, encoding: FallbackEncoding) -> Self {
        self.config.fallback_encoding = encoding;
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality;
        self
    }

    pub fn page_size(mut self, size: PageSize) -> Self {
        self.config.page_size = size;
        self
    }

    pub fn extra_selector(mut self, selector: impl Into<String>) -> Self {
        self.config.extra_selectors.push(selector.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if !(1..=100).contains(&c.jpeg_quality) {
            return Err(ExtractError::InvalidConfig(format!(
                "JPEG quality must be 1–100, got {}",
                c.jpeg_quality
            )));
        }
        if c.fetch_timeout_secs == 0 || c.download_timeout_secs == 0 {
            return Err(ExtractError::InvalidConfig(
                "Timeouts must be ≥ 1 second".into(),
            ));
        }
        if c.max_concurrent_fetches == Some(0) {
            return Err(ExtractError::InvalidConfig(
                "Concurrency limit must be ≥ 1".into(),
            ));
        }
        let (w, h) = c.page_size.dimensions_mm();
        if !(w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0) {
            return Err(ExtractError::InvalidConfig(format!(
                "Page size must be positive, got {w}×{h} mm"
            )));
        }
        for css in &c.extra_selectors {
            Selector::parse(css).map_err(|e| {
                ExtractError::InvalidConfig(format!("Invalid selector '{css}': {e}"))
            })?;
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Encoding used when pixels are recovered through the off-screen surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FallbackEncoding {
    /// Always JPEG at the configured quality, whatever the source was.
    Jpeg,
    /// PNG for PNG sources and anything with transparency, JPEG otherwise. (default)
    #[default]
    PreserveOriginal,
}

/// Fixed page geometry for document mode, in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum PageSize {
    /// 210 × 297 mm portrait. (default)
    #[default]
    A4,
    /// 215.9 × 279.4 mm portrait.
    Letter,
    /// Arbitrary width × height.
    Custom { width_mm: f64, height_mm: f64 },
}

impl PageSize {
    /// `(width, height)` in millimetres.
    pub fn dimensions_mm(&self) -> (f64, f64) {
        match *self {
            PageSize::A4 => (210.0, 297.0),
            PageSize::Letter => (215.9, 279.4),
            PageSize::Custom {
                width_mm,
                height_mm,
            } => (width_mm, height_mm),
        }
    }
}
