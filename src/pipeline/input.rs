//! Input resolution: turn a user-supplied path or URL into a [`PageDocument`].
//!
//! A URL is downloaded once and its markup becomes the document; a local file
//! is read as-is. Relative asset references resolve against the page URL, or
//! against the file's own `file://` URL when no base is supplied.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::pipeline::title;
use scraper::Html;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Read-only handle to a rendered page.
///
/// Holds the raw markup; parsing happens inside the synchronous locator and
/// title passes, so the handle itself is `Send` and can cross await points.
#[derive(Debug, Clone)]
pub struct PageDocument {
    url: Url,
    html: String,
    title: String,
}

impl PageDocument {
    pub fn new(url: Url, html: impl Into<String>) -> Self {
        let html = html.into();
        let title = title::document_title(&Html::parse_document(&html));
        Self { url, html, title }
    }

    /// Parse `url` and wrap `html`.
    pub fn from_html(url: &str, html: impl Into<String>) -> Result<Self, ExtractError> {
        let url = Url::parse(url).map_err(|_| ExtractError::InvalidInput {
            input: url.to_string(),
        })?;
        Ok(Self::new(url, html))
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Sanitised base name for artifacts produced from this page.
    pub fn basename(&self) -> String {
        title::sanitize_basename(&self.title)
    }

    /// `scheme://host[:port]` of the page, or `null` for opaque origins.
    pub fn origin(&self) -> String {
        self.url.origin().ascii_serialization()
    }

    /// Whether the page is a project gallery rather than a listing or profile.
    pub fn is_gallery_page(&self) -> bool {
        self.url.path().contains("/gallery/")
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a page document.
///
/// `base_url` overrides the URL that relative references resolve against;
/// it is mostly useful for pages saved to disk.
pub async fn resolve_input(
    input: &str,
    base_url: Option<&str>,
    config: &ExtractionConfig,
) -> Result<PageDocument, ExtractError> {
    let base = base_url
        .map(|b| {
            Url::parse(b).map_err(|_| ExtractError::InvalidInput {
                input: b.to_string(),
            })
        })
        .transpose()?;

    if is_url(input) {
        let (url, html) = download_page(input, config).await?;
        Ok(PageDocument::new(base.unwrap_or(url), html))
    } else {
        let (url, html) = read_local(input).await?;
        Ok(PageDocument::new(base.unwrap_or(url), html))
    }
}

/// Read a local page, mapping I/O failures onto input errors.
async fn read_local(path_str: &str) -> Result<(Url, String), ExtractError> {
    let path = PathBuf::from(path_str);

    let html = match tokio::fs::read(&path).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ExtractError::PermissionDenied { path });
        }
        Err(_) => return Err(ExtractError::FileNotFound { path }),
    };

    let url = file_url(&path)?;
    debug!("Resolved local page: {}", path.display());
    Ok((url, html))
}

fn file_url(path: &Path) -> Result<Url, ExtractError> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| ExtractError::Internal(format!("current dir: {e}")))?
            .join(path)
    };
    Url::from_file_path(&absolute).map_err(|_| ExtractError::InvalidInput {
        input: path.display().to_string(),
    })
}

/// Download a page and return its final URL and markup.
async fn download_page(url: &str, config: &ExtractionConfig) -> Result<(Url, String), ExtractError> {
    info!("Downloading page: {}", url);
    let timeout_secs = config.download_timeout_secs;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(config.user_agent.as_str())
        .build()
        .map_err(|e| ExtractError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ExtractError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ExtractError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(ExtractError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let final_url = response.url().clone();
    let html = response.text().await.map_err(|e| {
        if e.is_timeout() {
            ExtractError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ExtractError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    info!("Downloaded {} bytes from {}", html.len(), final_url);
    Ok((final_url, html))
}
