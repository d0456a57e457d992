//! CLI binary for gallery2pdf.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig`, runs one extraction and writes the artifact.

use anyhow::{bail, Context, Result};
use clap::Parser;
use gallery2pdf::{
    resolve_input, write_artifact, ExtractionConfig, ExtractionOutput, ExtractionProgressCallback,
    Extractor, FailureKind, FallbackEncoding, PageSize, ProgressCallback, ProgressEvent,
    RetrievalError, RunMode, RunOutcome, RunState, RunStats,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner while the page is scanned, then a
/// bar that advances as each image settles (in completion order).
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening page…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    /// Images that no channel could retrieve so far.
    fn failed(&self) -> usize {
        self.errors.load(Ordering::SeqCst)
    }

    /// Switch to the full bar once the image count is known.
    fn activate_bar(&self, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} images  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Downloading");
        self.bar.set_message("");
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_phase(&self, phase: RunState) {
        match phase {
            RunState::Locating => {
                self.bar.set_prefix("Scanning");
                self.bar.set_message("Looking for images…");
            }
            RunState::Retrieving => self.bar.set_prefix("Downloading"),
            RunState::Assembling => {
                self.bar.set_prefix("Packaging");
            }
            RunState::Failed => self.bar.finish_and_clear(),
            RunState::Idle | RunState::Done => {}
        }
    }

    fn on_progress(&self, event: &ProgressEvent) {
        if self.bar.length() != Some(event.total as u64) {
            self.activate_bar(event.total);
        }
        self.bar.set_position(event.completed as u64);
    }

    fn on_asset_error(&self, ordinal: usize, total: usize, error: &RetrievalError) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = error.to_string();
        let msg = if msg.chars().count() > 80 {
            format!("{}\u{2026}", msg.chars().take(79).collect::<String>())
        } else {
            msg
        };
        self.bar.println(format!(
            "  {} Image {:>3}/{:<3}  {}",
            red("✗"),
            ordinal,
            total,
            red(&msg),
        ));
    }

    fn on_run_complete(&self, stats: &RunStats) {
        self.bar.finish_and_clear();

        match stats.outcome() {
            RunOutcome::Full => eprintln!(
                "{} {} images packaged",
                green("✔"),
                bold(&stats.packaged.to_string())
            ),
            RunOutcome::Partial { skipped } => eprintln!(
                "{} {}/{} images packaged  ({})",
                cyan("⚠"),
                bold(&stats.packaged.to_string()),
                stats.located,
                red(&skipped_note(skipped, self.failed())),
            ),
        }
        if stats.reencoded > 0 {
            eprintln!(
                "   {}",
                dim(&format!("{} recovered via re-encode fallback", stats.reencoded))
            );
        }
    }
}

/// `"3 skipped"`, split into download failures and unplaceable images when
/// both occurred.
fn skipped_note(skipped: usize, failed: usize) -> String {
    let failed = failed.min(skipped);
    let unplaceable = skipped - failed;
    if failed == 0 || unplaceable == 0 {
        format!("{skipped} skipped")
    } else {
        format!("{skipped} skipped: {failed} not downloaded, {unplaceable} unreadable")
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Gallery → PDF in the current directory (named after the project title)
  gallery2pdf https://www.behance.net/gallery/123456/Neon-Posters

  # Zip archive of the original images
  gallery2pdf --format zip https://www.behance.net/gallery/123456/Neon-Posters -o ~/Downloads/

  # Saved page, resolving relative image URLs against the original address
  gallery2pdf page.html --base-url https://www.behance.net/gallery/123456/Neon-Posters

  # List the images that would be packaged, as JSON
  gallery2pdf --list-only --json https://www.behance.net/gallery/123456/Neon-Posters

  # US Letter pages, always JPEG when recovering pixels, 8 downloads at a time
  gallery2pdf --page-size letter --reencode jpeg --concurrency 8 <URL>

  # Write the artifact to stdout
  gallery2pdf --format zip -o - <URL> > images.zip

PAGE SIZES:
  a4 (210×297 mm, default), letter (215.9×279.4 mm), or WIDTHxHEIGHT in mm (e.g. 200x300)

ENVIRONMENT VARIABLES:
  GALLERY2PDF_*    every option below can also be set through its env var
  RUST_LOG         override the log filter (e.g. gallery2pdf=debug)
"#;

/// Package the images of a project gallery page as a PDF or a zip archive.
#[derive(Parser, Debug)]
#[command(
    name = "gallery2pdf",
    version,
    about = "Package the images of a project gallery page as a PDF or a zip archive",
    long_about = "Find every image of a project gallery page (local HTML file or URL), \
upgrade each to its highest-resolution source, download them (re-encoding the pixels when a \
direct download is refused) and package them as a one-image-per-page PDF or a zip archive.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local HTML file path or HTTP/HTTPS URL of the gallery page.
    input: String,

    /// Artifact format.
    #[arg(short, long, env = "GALLERY2PDF_FORMAT", value_enum, default_value = "pdf")]
    format: FormatArg,

    /// Output file or directory (default: current directory). `-` writes to stdout.
    #[arg(short, long, env = "GALLERY2PDF_OUTPUT")]
    output: Option<PathBuf>,

    /// URL relative image references resolve against (for saved pages).
    #[arg(long, env = "GALLERY2PDF_BASE_URL")]
    base_url: Option<String>,

    /// Run even if the page is not a project gallery.
    #[arg(long, env = "GALLERY2PDF_ANY_PAGE")]
    any_page: bool,

    /// List located images only; nothing is downloaded.
    #[arg(long)]
    list_only: bool,

    /// Print a JSON summary (or the image list with --list-only) to stdout.
    #[arg(long, env = "GALLERY2PDF_JSON")]
    json: bool,

    /// PDF page size: a4, letter, or WIDTHxHEIGHT in millimetres.
    #[arg(long, env = "GALLERY2PDF_PAGE_SIZE", default_value = "a4", value_parser = parse_page_size)]
    page_size: PageSize,

    /// JPEG quality when recovered pixels are re-encoded (1–100).
    #[arg(long, env = "GALLERY2PDF_JPEG_QUALITY", default_value_t = 95,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Encoding of recovered pixels: preserve (PNG for PNG/transparent sources) or jpeg.
    #[arg(long, env = "GALLERY2PDF_REENCODE", value_enum, default_value = "preserve")]
    reencode: ReencodeArg,

    /// Maximum concurrent image downloads (default: all at once).
    #[arg(short, long, env = "GALLERY2PDF_CONCURRENCY",
          value_parser = clap::value_parser!(u64).range(1..))]
    concurrency: Option<u64>,

    /// Per-attempt image download timeout in seconds.
    #[arg(long, env = "GALLERY2PDF_FETCH_TIMEOUT", default_value_t = 30)]
    fetch_timeout: u64,

    /// Page download timeout in seconds.
    #[arg(long, env = "GALLERY2PDF_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Referer sent with image downloads.
    #[arg(long, env = "GALLERY2PDF_REFERER")]
    referer: Option<String>,

    /// Extra CSS selector for image containers (repeatable).
    #[arg(long = "selector", env = "GALLERY2PDF_SELECTORS", value_delimiter = ',')]
    selectors: Vec<String>,

    /// Disable progress bar.
    #[arg(long, env = "GALLERY2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "GALLERY2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "GALLERY2PDF_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Pdf,
    Zip,
}

impl From<FormatArg> for RunMode {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Pdf => RunMode::Document,
            FormatArg::Zip => RunMode::Archive,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ReencodeArg {
    Preserve,
    Jpeg,
}

impl From<ReencodeArg> for FallbackEncoding {
    fn from(v: ReencodeArg) -> Self {
        match v {
            ReencodeArg::Preserve => FallbackEncoding::PreserveOriginal,
            ReencodeArg::Jpeg => FallbackEncoding::Jpeg,
        }
    }
}

fn parse_page_size(s: &str) -> Result<PageSize, String> {
    match s.to_ascii_lowercase().as_str() {
        "a4" => Ok(PageSize::A4),
        "letter" => Ok(PageSize::Letter),
        other => {
            let (w, h) = other
                .split_once('x')
                .ok_or_else(|| format!("expected a4, letter or WIDTHxHEIGHT, got '{s}'"))?;
            let width_mm: f64 = w.trim().parse().map_err(|_| format!("bad width '{w}'"))?;
            let height_mm: f64 = h.trim().parse().map_err(|_| format!("bad height '{h}'"))?;
            Ok(PageSize::Custom {
                width_mm,
                height_mm,
            })
        }
    }
}

/// JSON summary of a finished run.
#[derive(Serialize)]
struct RunSummary<'a> {
    path: Option<String>,
    filename: &'a str,
    mime_type: &'a str,
    outcome: RunOutcome,
    stats: &'a RunStats,
    failures: Vec<FailureSummary<'a>>,
}

#[derive(Serialize)]
struct FailureSummary<'a> {
    ordinal: usize,
    url: &'a str,
    kind: FailureKind,
    detail: &'a str,
}

impl<'a> RunSummary<'a> {
    fn new(output: &'a ExtractionOutput, path: Option<String>) -> Self {
        let failures = output
            .failures
            .iter()
            .map(|(ordinal, e)| FailureSummary {
                ordinal: *ordinal,
                url: output
                    .assets
                    .iter()
                    .find(|a| a.ordinal == *ordinal)
                    .map(|a| a.source_url.as_str())
                    .unwrap_or(""),
                kind: e.kind,
                detail: &e.detail,
            })
            .collect();
        Self {
            path,
            filename: &output.filename,
            mime_type: output.mime_type,
            outcome: output.outcome(),
            stats: &output.stats,
            failures,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library logs drop to errors while the bar is drawn.
    let to_stdout = cli.output.as_deref() == Some(std::path::Path::new("-"));
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.list_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Resolve page ─────────────────────────────────────────────────────
    let doc = resolve_input(&cli.input, cli.base_url.as_deref(), &config)
        .await
        .with_context(|| format!("Failed to open '{}'", cli.input))?;

    if !doc.is_gallery_page() && !cli.any_page {
        bail!(
            "'{}' does not look like a project gallery page (no /gallery/ in the path).\n\
             Open a project page, or pass --any-page to scan it anyway.",
            doc.url()
        );
    }

    let extractor = Extractor::new(config).context("Invalid configuration")?;

    // ── List-only mode ───────────────────────────────────────────────────
    if cli.list_only {
        let inspection = extractor.inspect(&doc);
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&inspection).context("Failed to serialise image list")?
            );
        } else {
            println!("Page:     {}", inspection.page_url);
            println!("Title:    {}", inspection.title);
            println!("Basename: {}", inspection.basename);
            println!("Images:   {}", inspection.assets.len());
            for asset in &inspection.assets {
                println!("  {}  {}", asset.filename, asset.source_url);
            }
        }
        return Ok(());
    }

    // ── Run ──────────────────────────────────────────────────────────────
    let mode = RunMode::from(cli.format);
    let output = extractor
        .run(&doc, mode)
        .await
        .context("Extraction failed")?;

    let written = if to_stdout {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(&output.bytes)
            .context("Failed to write to stdout")?;
        handle.flush().ok();
        None
    } else {
        let dest = cli.output.clone().unwrap_or_else(|| PathBuf::from("."));
        Some(
            write_artifact(&output, &dest)
                .await
                .context("Failed to write artifact")?,
        )
    };

    // ── Summary ──────────────────────────────────────────────────────────
    if cli.json && !to_stdout {
        let summary = RunSummary::new(&output, written.as_ref().map(|p| p.display().to_string()));
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
    } else if !cli.quiet {
        let stats = &output.stats;
        if !show_progress {
            // The callback prints this line when the bar is active.
            eprintln!(
                "Packaged {}/{} images ({} skipped)",
                stats.packaged, stats.located, stats.skipped
            );
        }
        if let Some(ref path) = written {
            eprintln!(
                "{}  {} bytes  {}ms  →  {}",
                if stats.skipped == 0 { green("✔") } else { cyan("⚠") },
                stats.artifact_bytes,
                stats.total_duration_ms,
                bold(&path.display().to_string()),
            );
        }
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .page_size(cli.page_size)
        .jpeg_quality(cli.jpeg_quality)
        .fallback_encoding(cli.reencode.into())
        .fetch_timeout_secs(cli.fetch_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(n) = cli.concurrency {
        builder = builder.max_concurrent_fetches(n as usize);
    }
    if let Some(ref referer) = cli.referer {
        builder = builder.referer(referer);
    }
    for selector in cli.selectors.iter().filter(|s| !s.trim().is_empty()) {
        builder = builder.extra_selector(selector.trim());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
