//! # gallery2pdf
//!
//! Extract the full-resolution images of a project gallery page and package
//! them as a paginated PDF or a zip archive.
//!
//! ## Why this crate?
//!
//! Gallery pages show downscaled, transcoded previews and often refuse
//! script-level downloads of the originals from another origin. This crate
//! finds every gallery image across several generations of markup, upgrades
//! each one to its highest-resolution source, retrieves the bytes (falling
//! back to decoding and re-encoding the pixels when direct retrieval is
//! denied) and assembles a single portable artifact.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Page (file or URL)
//!  │
//!  ├─ 1. Locate    matcher strategies → best source → normalise → dedup → filter
//!  ├─ 2. Retrieve  concurrent network fetch; re-encode fallback on failure
//!  ├─ 3. Assemble  zip (one entry per image) or PDF (one page per image)
//!  └─ 4. Output    artifact bytes + run stats, named after the page title
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gallery2pdf::{extract, ExtractionConfig, RunMode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::default();
//!     let output = extract(
//!         "https://www.behance.net/gallery/123456/Neon-Posters",
//!         RunMode::Document,
//!         &config,
//!     )
//!     .await?;
//!     std::fs::write(&output.filename, &output.bytes)?;
//!     eprintln!("{} pages, {} skipped", output.stats.packaged, output.stats.skipped);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `gallery2pdf` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! gallery2pdf = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod asset;
pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod run;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use asset::{Asset, Payload, PayloadSource, RetrievalResult};
pub use config::{ExtractionConfig, ExtractionConfigBuilder, FallbackEncoding, PageSize};
pub use error::{ExtractError, FailureKind, RetrievalError};
pub use extract::{extract, extract_sync, extract_to_file, inspect, write_artifact, Extractor};
pub use output::{ExtractionOutput, Inspection, RunOutcome, RunStats};
pub use pipeline::input::{resolve_input, PageDocument};
pub use progress::{
    ExtractionProgressCallback, NoopProgressCallback, ProgressCallback, ProgressEvent,
};
pub use run::{PipelineRun, RunMode, RunState};
pub use stream::{retrieve_stream, AssetStream};
