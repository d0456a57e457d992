//! Pipeline orchestrator and the eager entry points.
//!
//! An [`Extractor`] drives one [`PipelineRun`] per trigger:
//!
//! ```text
//! idle ─▶ locating ─▶ retrieving ─▶ assembling ─▶ done
//! ```
//!
//! Retrieval fans out over every located asset inside the calling task and
//! folds results into the run as they complete, so the run needs no locking.
//! Per-asset failures are recorded and counted; only run-level conditions
//! (`no-assets-found`, `archive-empty`, `no-placeable-assets`, I/O) fail the
//! run.
//!
//! Triggers are not reentrant: while one run of an `Extractor` is in flight,
//! another trigger on the same instance fails with
//! [`ExtractError::RunInProgress`] and leaves the running one untouched.

use crate::asset::PayloadSource;
use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::output::{ExtractionOutput, Inspection, RunStats};
use crate::pipeline::assemble;
use crate::pipeline::archive;
use crate::pipeline::fetch::{self, HttpNetworkSource, NetworkSource, ResilientFetcher};
use crate::pipeline::input::{self, PageDocument};
use crate::pipeline::layout::PageLayout;
use crate::pipeline::locate::Locator;
use crate::pipeline::render::{HttpSurfaceRenderer, SurfaceRenderer};
use crate::progress::ProgressEvent;
use crate::run::{PipelineRun, RunMode, RunState};
use crate::stream::{self, AssetStream};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs the extraction pipeline for one configuration.
pub struct Extractor {
    config: ExtractionConfig,
    locator: Locator,
    network: Arc<dyn NetworkSource>,
    renderer: Arc<dyn SurfaceRenderer>,
    active: AtomicBool,
}

impl Extractor {
    /// Extractor with HTTP-backed retrieval channels.
    pub fn new(config: ExtractionConfig) -> Result<Self, ExtractError> {
        let client = fetch::http_client(&config)?;
        let network = Arc::new(HttpNetworkSource::new(client.clone(), &config.referer));
        let renderer = Arc::new(HttpSurfaceRenderer::new(client));
        Self::with_sources(config, network, renderer)
    }

    /// Extractor with caller-supplied retrieval channels.
    pub fn with_sources(
        config: ExtractionConfig,
        network: Arc<dyn NetworkSource>,
        renderer: Arc<dyn SurfaceRenderer>,
    ) -> Result<Self, ExtractError> {
        let locator = Locator::from_config(&config)?;
        Ok(Self {
            config,
            locator,
            network,
            renderer,
            active: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Whether a run is currently in flight.
    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Produce a zip archive of the page's assets.
    pub async fn run_archive(&self, doc: &PageDocument) -> Result<ExtractionOutput, ExtractError> {
        self.run(doc, RunMode::Archive).await
    }

    /// Produce a PDF with one page per asset.
    pub async fn run_document(&self, doc: &PageDocument) -> Result<ExtractionOutput, ExtractError> {
        self.run(doc, RunMode::Document).await
    }

    /// Run the full pipeline in `mode`. Every call starts a fresh run.
    pub async fn run(
        &self,
        doc: &PageDocument,
        mode: RunMode,
    ) -> Result<ExtractionOutput, ExtractError> {
        let _guard = RunGuard::acquire(&self.active)?;
        let mut run = PipelineRun::new(mode);

        match self.drive(&mut run, doc).await {
            Ok(output) => Ok(output),
            Err(e) => {
                if run.advance(RunState::Failed).is_ok() {
                    self.emit_phase(RunState::Failed);
                }
                warn!("Run failed [{}]: {}", e.reason(), e);
                Err(e)
            }
        }
    }

    /// Locate assets without retrieving anything.
    pub fn inspect(&self, doc: &PageDocument) -> Inspection {
        Inspection {
            page_url: doc.url().to_string(),
            title: doc.title().to_string(),
            basename: doc.basename(),
            is_gallery_page: doc.is_gallery_page(),
            assets: self.locator.locate(doc),
        }
    }

    /// Locate assets and stream their retrieval in completion order.
    ///
    /// Not guarded by the run flag; no [`PipelineRun`] is created.
    pub fn retrieve_stream(&self, doc: &PageDocument) -> Result<AssetStream, ExtractError> {
        let assets = self.locator.locate(doc);
        if assets.is_empty() {
            return Err(ExtractError::NoAssetsFound);
        }
        let limit = self.fetch_limit(assets.len());
        Ok(stream::fetch_all(assets, self.fetcher(doc), limit))
    }

    // ── Run driver ───────────────────────────────────────────────────────

    async fn drive(
        &self,
        run: &mut PipelineRun,
        doc: &PageDocument,
    ) -> Result<ExtractionOutput, ExtractError> {
        let total_start = Instant::now();
        let mode = run.mode();
        info!("Starting {:?} run: {}", mode, doc.url());

        // ── Locating ─────────────────────────────────────────────────────
        self.transition(run, RunState::Locating)?;
        let locate_start = Instant::now();
        let assets = self.locator.locate(doc);
        let locate_duration_ms = locate_start.elapsed().as_millis() as u64;
        if assets.is_empty() {
            return Err(ExtractError::NoAssetsFound);
        }
        let total = assets.len();
        run.set_assets(assets.clone())?;

        // ── Retrieving ───────────────────────────────────────────────────
        self.transition(run, RunState::Retrieving)?;
        let retrieve_start = Instant::now();
        let limit = self.fetch_limit(total);
        debug!("Retrieving {} assets, {} in flight", total, limit);

        let mut results = stream::fetch_all(assets, self.fetcher(doc), limit);
        while let Some((asset, result)) = results.next().await {
            if let Err(ref e) = result {
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_asset_error(asset.ordinal, total, e);
                }
            }
            let completed = run.record(asset.ordinal, result);
            if let Some(ref cb) = self.config.progress_callback {
                cb.on_progress(&ProgressEvent {
                    completed,
                    total,
                    phase: RunState::Retrieving,
                });
            }
        }
        let retrieve_duration_ms = retrieve_start.elapsed().as_millis() as u64;

        let successes = run.successes();
        let retrieved = successes.len();
        let reencoded = successes
            .iter()
            .filter(|(_, p)| p.source == PayloadSource::Reencoded)
            .count();
        info!(
            "Retrieved {}/{} assets ({} via fallback) in {}ms",
            retrieved, total, reencoded, retrieve_duration_ms
        );

        // ── Assembling ───────────────────────────────────────────────────
        self.transition(run, RunState::Assembling)?;
        let assemble_start = Instant::now();
        let (bytes, packaged) = match mode {
            RunMode::Archive => {
                let bytes = archive::pack_archive(&run.successes(), total)?;
                (bytes, retrieved)
            }
            RunMode::Document => {
                let owned: Vec<_> = run
                    .successes()
                    .into_iter()
                    .map(|(a, p)| (a.clone(), p.clone()))
                    .collect();
                let layout = PageLayout::from(self.config.page_size);
                let title = doc.title().to_string();

                let assembled = tokio::task::spawn_blocking(move || {
                    let entries: Vec<_> = owned.iter().map(|(a, p)| (a, p)).collect();
                    assemble::assemble_document(&entries, layout, &title)
                })
                .await
                .map_err(|e| ExtractError::Internal(format!("Assembly task panicked: {}", e)))??;

                (assembled.bytes, assembled.pages)
            }
        };
        let assemble_duration_ms = assemble_start.elapsed().as_millis() as u64;

        self.transition(run, RunState::Done)?;

        let stats = RunStats {
            located: total,
            retrieved,
            reencoded,
            packaged,
            skipped: total - packaged,
            artifact_bytes: bytes.len(),
            locate_duration_ms,
            retrieve_duration_ms,
            assemble_duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        };

        info!(
            "Run complete: {}/{} assets packaged, {} bytes, {}ms total",
            stats.packaged, stats.located, stats.artifact_bytes, stats.total_duration_ms
        );
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_run_complete(&stats);
        }

        Ok(ExtractionOutput {
            bytes,
            mime_type: mode.mime_type(),
            filename: format!("{}.{}", doc.basename(), mode.extension()),
            mode,
            assets: run.assets().to_vec(),
            failures: run.failures(),
            stats,
        })
    }

    fn transition(&self, run: &mut PipelineRun, next: RunState) -> Result<(), ExtractError> {
        run.advance(next)?;
        debug!("Run → {}", next);
        self.emit_phase(next);
        Ok(())
    }

    fn emit_phase(&self, phase: RunState) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_phase(phase);
        }
    }

    fn fetcher(&self, doc: &PageDocument) -> ResilientFetcher {
        let origin = self.config.origin.clone().unwrap_or_else(|| doc.origin());
        ResilientFetcher::new(
            Arc::clone(&self.network),
            Arc::clone(&self.renderer),
            origin,
            &self.config,
        )
    }

    /// In-flight bound: the configured limit, else everything at once.
    fn fetch_limit(&self, total: usize) -> usize {
        self.config.max_concurrent_fetches.unwrap_or(total).max(1)
    }
}

/// Holds the extractor's run flag for the duration of one run.
struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, ExtractError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ExtractError::RunInProgress)?;
        Ok(Self { flag })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

// ── Eager entry points ───────────────────────────────────────────────────

/// Extract the assets of a page file or URL into an archive or a PDF.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input` — Local HTML file path or HTTP/HTTPS URL of the page
/// * `mode` — [`RunMode::Archive`] or [`RunMode::Document`]
/// * `config` — Extraction configuration
///
/// # Returns
/// `Ok(ExtractionOutput)` on success, even if some assets failed
/// (check `output.outcome()`).
///
/// # Errors
/// Returns `Err(ExtractError)` only for fatal errors:
/// - File not found / page download failed
/// - No assets found on the page
/// - Nothing could be packaged (`archive-empty`, `no-placeable-assets`)
pub async fn extract(
    input_str: impl AsRef<str>,
    mode: RunMode,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let doc = input::resolve_input(input_str.as_ref(), None, config).await?;
    Extractor::new(config.clone())?.run(&doc, mode).await
}

/// Extract and write the artifact to disk.
///
/// `output` may be a file path or an existing directory; in the latter case
/// the artifact is named after the page title. Returns the written path.
pub async fn extract_to_file(
    input_str: impl AsRef<str>,
    output: impl AsRef<Path>,
    mode: RunMode,
    config: &ExtractionConfig,
) -> Result<(PathBuf, RunStats), ExtractError> {
    let out = extract(input_str, mode, config).await?;
    let path = write_artifact(&out, output.as_ref()).await?;
    Ok((path, out.stats))
}

/// Write an artifact atomically (temp file + rename).
///
/// A directory destination (existing, or spelled with a trailing separator)
/// receives `output.filename`.
pub async fn write_artifact(
    output: &ExtractionOutput,
    dest: &Path,
) -> Result<PathBuf, ExtractError> {
    let is_dir = dest.is_dir() || dest.as_os_str().to_string_lossy().ends_with(['/', '\\']);
    let path = if is_dir {
        dest.join(&output.filename)
    } else {
        dest.to_path_buf()
    };

    let write_err = |e: std::io::Error| ExtractError::OutputWriteFailed {
        path: path.clone(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension(format!("{}.tmp", output.mode.extension()));
    tokio::fs::write(&tmp_path, &output.bytes)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, &path)
        .await
        .map_err(write_err)?;

    info!("Wrote {} ({} bytes)", path.display(), output.bytes.len());
    Ok(path)
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    input_str: impl AsRef<str>,
    mode: RunMode,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(input_str, mode, config))
}

/// List the assets a page would yield, without retrieving them.
pub async fn inspect(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<Inspection, ExtractError> {
    let doc = input::resolve_input(input_str.as_ref(), None, config).await?;
    Ok(Extractor::new(config.clone())?.inspect(&doc))
}
