//! Error types for the gallery2pdf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ExtractError`] — **Fatal**: the run cannot produce an artifact
//!   (nothing found on the page, nothing placeable, output not writable).
//!   Returned as `Err(ExtractError)` from the top-level `extract*` functions.
//!
//! * [`RetrievalError`] — **Non-fatal**: a single asset could not be
//!   retrieved. It is recorded in the run and counted as skipped; the other
//!   assets still make it into the archive or document.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// All fatal errors returned by the gallery2pdf library.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Run-level taxonomy ────────────────────────────────────────────────
    /// The locator found no media assets on the page.
    #[error("No images found on the page.\nMake sure a project gallery is open and fully loaded.")]
    NoAssetsFound,

    /// Retrieval finished but none of the retrieved payloads could be laid out.
    #[error("None of the {attempted} retrieved images could be placed in the PDF")]
    NoPlaceableAssets { attempted: usize },

    /// Retrieval finished but the archive would have no entries.
    #[error("No images could be downloaded ({attempted} attempted); the archive would be empty")]
    ArchiveEmpty { attempted: usize },

    /// A trigger fired while another run of the same extractor was in flight.
    #[error("An export is already running; wait for it to finish")]
    RunInProgress,

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Page file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but the page download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Page download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Assembly errors ───────────────────────────────────────────────────
    /// The zip writer rejected an entry or could not finish the archive.
    #[error("Failed to write archive: {0}")]
    ArchiveWriteFailed(String),

    /// The PDF writer could not serialise the document.
    #[error("Failed to write PDF: {0}")]
    DocumentWriteFailed(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output artifact.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExtractError {
    /// Short machine-readable tag for the failure.
    pub fn reason(&self) -> &'static str {
        match self {
            ExtractError::NoAssetsFound => "no-assets-found",
            ExtractError::NoPlaceableAssets { .. } => "no-placeable-assets",
            ExtractError::ArchiveEmpty { .. } => "archive-empty",
            ExtractError::RunInProgress => "run-in-progress",
            ExtractError::FileNotFound { .. }
            | ExtractError::PermissionDenied { .. }
            | ExtractError::InvalidInput { .. } => "invalid-input",
            ExtractError::DownloadFailed { .. } | ExtractError::DownloadTimeout { .. } => {
                "download-failed"
            }
            ExtractError::ArchiveWriteFailed(_) | ExtractError::DocumentWriteFailed(_) => {
                "assembly-failed"
            }
            ExtractError::OutputWriteFailed { .. } => "output-write-failed",
            ExtractError::InvalidConfig(_) => "invalid-config",
            ExtractError::Internal(_) => "internal",
        }
    }
}

/// Why a single asset could not be retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// Transport-level failure or an unsuccessful HTTP status.
    Network,
    /// The host refused the cross-origin request (401/403).
    CorsDenied,
    /// Bytes arrived but could not be decoded or re-encoded.
    DecodeError,
    /// The attempt did not settle within the configured bound.
    Timeout,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Network => "network",
            FailureKind::CorsDenied => "cors-denied",
            FailureKind::DecodeError => "decode-error",
            FailureKind::Timeout => "timeout",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-fatal error for a single asset.
///
/// Stored in the run's result map; the run continues unless no asset at all
/// ends up in the artifact.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {detail}")]
pub struct RetrievalError {
    pub kind: FailureKind,
    pub detail: String,
}

impl RetrievalError {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn network(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::Network, detail)
    }

    pub fn cors_denied(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::CorsDenied, detail)
    }

    pub fn decode(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::DecodeError, detail)
    }

    /// No response within `limit`.
    pub fn timeout(limit: Duration) -> Self {
        Self::new(FailureKind::Timeout, format!("no response within {limit:?}"))
    }
}
