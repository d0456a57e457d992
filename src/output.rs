//! Result types returned by the extraction entry points.

use crate::asset::Asset;
use crate::error::RetrievalError;
use crate::run::RunMode;
use serde::{Deserialize, Serialize};

/// The produced artifact plus what happened along the way.
#[derive(Debug, Clone)]
pub struct ExtractionOutput {
    /// Archive or document bytes.
    pub bytes: Vec<u8>,
    /// `application/zip` or `application/pdf`.
    pub mime_type: &'static str,
    /// Suggested download name, e.g. `my_project.pdf`.
    pub filename: String,
    pub mode: RunMode,
    /// Located assets in ordinal order.
    pub assets: Vec<Asset>,
    /// Assets that no channel could retrieve, by ordinal.
    pub failures: Vec<(usize, RetrievalError)>,
    pub stats: RunStats,
}

impl ExtractionOutput {
    pub fn outcome(&self) -> RunOutcome {
        self.stats.outcome()
    }
}

/// Whether every located asset made it into the artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RunOutcome {
    Full,
    Partial { skipped: usize },
}

/// Counters and timings for a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Assets returned by the locator.
    pub located: usize,
    /// Assets with a payload from either channel.
    pub retrieved: usize,
    /// Retrieved through the re-encoding fallback.
    pub reencoded: usize,
    /// Archive entries or document pages written.
    pub packaged: usize,
    /// `located - packaged`: retrieval failures plus unplaceable payloads.
    pub skipped: usize,
    pub artifact_bytes: usize,
    pub locate_duration_ms: u64,
    pub retrieve_duration_ms: u64,
    pub assemble_duration_ms: u64,
    pub total_duration_ms: u64,
}

impl RunStats {
    pub fn outcome(&self) -> RunOutcome {
        if self.skipped == 0 {
            RunOutcome::Full
        } else {
            RunOutcome::Partial {
                skipped: self.skipped,
            }
        }
    }
}

/// Locator-only view of a page; no retrieval is performed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inspection {
    pub page_url: String,
    pub title: String,
    /// Sanitised base name used for artifacts.
    pub basename: String,
    pub is_gallery_page: bool,
    pub assets: Vec<Asset>,
}
