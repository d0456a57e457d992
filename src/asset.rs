//! Core data model: located assets and their retrieval outcomes.

use crate::error::RetrievalError;
use serde::{Deserialize, Serialize};
use url::Url;

/// One media item discovered on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// 1-based position in discovery order.
    pub ordinal: usize,
    /// Absolute, normalised source URL. Unique within a run.
    pub source_url: Url,
    /// `image_{ordinal:03}.{ext}`; never derived from page content.
    pub filename: String,
}

impl Asset {
    pub fn new(ordinal: usize, source_url: Url, extension: &str) -> Self {
        Self {
            ordinal,
            source_url,
            filename: format!("image_{ordinal:03}.{extension}"),
        }
    }
}

/// Which channel produced a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayloadSource {
    /// Bytes as served by the host.
    Network,
    /// Pixels recovered through the off-screen surface and re-encoded.
    Reencoded,
}

/// Raw bytes of a retrieved asset with their MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub source: PayloadSource,
}

impl Payload {
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>, source: PayloadSource) -> Self {
        Self {
            bytes,
            mime: mime.into(),
            source,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Outcome of fetching one asset. Produced once and never mutated.
pub type RetrievalResult = Result<Payload, RetrievalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_is_zero_padded() {
        let url = Url::parse("https://cdn.example.com/a.png").unwrap();
        assert_eq!(Asset::new(7, url.clone(), "png").filename, "image_007.png");
        assert_eq!(Asset::new(1234, url, "jpg").filename, "image_1234.jpg");
    }
}
