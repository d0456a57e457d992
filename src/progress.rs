//! Progress-callback trait for run-level and per-asset events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the pipeline moves through its phases. The pipeline only emits
//! immutable events; how they are shown (button label, progress bar, log
//! line) is up to the host.
//!
//! # Example
//!
//! ```rust
//! use gallery2pdf::{ExtractionConfig, ExtractionProgressCallback, ProgressEvent};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Percent {
//!     last: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for Percent {
//!     fn on_progress(&self, event: &ProgressEvent) {
//!         self.last.store(event.percent() as usize, Ordering::SeqCst);
//!     }
//! }
//!
//! let cb = Arc::new(Percent { last: AtomicUsize::new(0) });
//! let config = ExtractionConfig::builder()
//!     .progress_callback(cb as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::RetrievalError;
use crate::output::RunStats;
use crate::run::RunState;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A `(completed, total, phase)` progress tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub completed: usize,
    pub total: usize,
    pub phase: RunState,
}

impl ProgressEvent {
    /// Rounded completion percentage; 0 when `total` is 0.
    pub fn percent(&self) -> u32 {
        if self.total == 0 {
            0
        } else {
            ((self.completed as f64 / self.total as f64) * 100.0).round() as u32
        }
    }
}

/// Called by the pipeline as a run progresses.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Events for one run are emitted from a single task,
/// but the trait is `Send + Sync` so one callback can serve several runs.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called on every state transition, including `Failed`.
    fn on_phase(&self, phase: RunState) {
        let _ = phase;
    }

    /// Called after each asset settles during retrieval.
    fn on_progress(&self, event: &ProgressEvent) {
        let _ = event;
    }

    /// Called when an asset could not be retrieved by any channel.
    ///
    /// # Arguments
    /// * `ordinal` — 1-based asset ordinal
    /// * `total`   — number of located assets
    /// * `error`   — typed failure
    fn on_asset_error(&self, ordinal: usize, total: usize, error: &RetrievalError) {
        let _ = (ordinal, total, error);
    }

    /// Called once after the artifact has been produced.
    fn on_run_complete(&self, stats: &RunStats) {
        let _ = stats;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
