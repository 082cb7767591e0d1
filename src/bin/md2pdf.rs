//! CLI binary for md2pdf-batch.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `BatchConfig`, writes the numbered PDFs and prints a summary.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use md2pdf_batch::{
    convert_file, BatchConfig, ConversionProgressCallback, DiagnosticPolicy, PageMargins,
    ProgressCallback,
};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
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

/// Terminal progress callback: a live bar plus one log line per document.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start time of the document currently rendering.
    started: Mutex<Option<Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        // Length is set in on_batch_start, once extraction has counted documents.
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Extracting archive…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Mutex::new(None),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} documents  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Rendering");
    }

    fn elapsed_secs(&self) -> f64 {
        self.started
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_documents: usize) {
        self.activate_bar(total_documents);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Rendering {total_documents} documents…"))
        ));
    }

    fn on_document_start(&self, _slot: usize, _total: usize, document: &Path) {
        if let Ok(mut s) = self.started.lock() {
            *s = Some(Instant::now());
        }
        self.bar.set_message(document.display().to_string());
    }

    fn on_document_complete(&self, slot: usize, total: usize, output_bytes: usize) {
        let secs = self.elapsed_secs();
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {:<12}  {}",
            green("✓"),
            slot,
            total,
            dim(&format!("{output_bytes:>8} bytes")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, slot: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs();
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Engine diagnostics run to many lines; the full text follows on exit.
        let first_line = error.lines().next().unwrap_or(error);
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            red("✗"),
            slot,
            total,
            red(first_line),
            dim(&format!("{secs:.1}s")),
        ));
    }

    fn on_batch_complete(&self, total_documents: usize, success_count: usize) {
        self.bar.finish_and_clear();
        if self.errors.load(Ordering::SeqCst) == 0 {
            eprintln!(
                "{} {} documents rendered",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} batch aborted after {}/{} documents; no output written",
                red("✘"),
                success_count,
                total_documents
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Render every .md in the archive into ./1.pdf, ./2.pdf, …
  md2pdf notes.zip

  # Write into a directory
  md2pdf notes.zip -o pdfs/

  # Use xelatex and narrower margins
  md2pdf --pdf-engine xelatex --margin-left 1.5cm --margin-right 1.5cm notes.zip

  # Keep PDFs pandoc produced despite a missing rsvg-convert
  md2pdf --tolerate-warnings notes.zip

  # Show which pandoc would be used
  md2pdf --check-engine

  # Machine-readable result
  md2pdf --json notes.zip > result.json

OUTPUT NAMING:
  Documents are discovered recursively and sorted by their path inside the
  archive. The n-th document becomes n.pdf. A batch is all-or-nothing: if any
  document fails, nothing is written and the failing document is reported.

ENVIRONMENT VARIABLES:
  MD2PDF_PANDOC          Path to the pandoc executable (skips the PATH search)
  MD2PDF_PDF_ENGINE      LaTeX engine passed as --pdf-engine (default: pdflatex)
  MD2PDF_OUTPUT_DIR      Output directory (default: current directory)
  MD2PDF_TIMEOUT         Per-document render timeout in seconds
  MD2PDF_WORK_DIR        Parent directory for the temporary working set
  RUST_LOG               tracing filter, overrides -v / -q
"#;

/// Convert a ZIP archive of Markdown documents into numbered PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "md2pdf",
    version,
    about = "Convert a ZIP archive of Markdown documents into numbered PDFs",
    long_about = "Unpack a ZIP archive, strip badge links and SVG images from every Markdown \
document, and render each one to PDF with pandoc. Outputs are named 1.pdf, 2.pdf, … in \
sorted path order.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// ZIP archive containing Markdown documents.
    #[arg(required_unless_present = "check_engine")]
    archive: Option<PathBuf>,

    /// Directory to write the numbered PDFs into.
    #[arg(short, long, env = "MD2PDF_OUTPUT_DIR", default_value = ".")]
    output: PathBuf,

    /// pandoc executable. Located on PATH when not set.
    #[arg(long, env = "MD2PDF_PANDOC")]
    pandoc: Option<PathBuf>,

    /// LaTeX engine for pandoc's --pdf-engine; "auto" lets pandoc choose.
    #[arg(long, env = "MD2PDF_PDF_ENGINE", default_value = "pdflatex")]
    pdf_engine: String,

    /// Top page margin (LaTeX length).
    #[arg(long, env = "MD2PDF_MARGIN_TOP")]
    margin_top: Option<String>,

    /// Bottom page margin (LaTeX length).
    #[arg(long, env = "MD2PDF_MARGIN_BOTTOM")]
    margin_bottom: Option<String>,

    /// Left page margin (LaTeX length).
    #[arg(long, env = "MD2PDF_MARGIN_LEFT")]
    margin_left: Option<String>,

    /// Right page margin (LaTeX length).
    #[arg(long, env = "MD2PDF_MARGIN_RIGHT")]
    margin_right: Option<String>,

    /// Per-document render timeout in seconds.
    #[arg(long, env = "MD2PDF_TIMEOUT", default_value_t = 120,
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Accept a PDF when pandoc exits non-zero with a known-benign warning.
    #[arg(long, env = "MD2PDF_TOLERATE_WARNINGS")]
    tolerate_warnings: bool,

    /// Parent directory for the temporary working set.
    #[arg(long, env = "MD2PDF_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Print a JSON result (written files or failure) on stdout.
    #[arg(long, env = "MD2PDF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "MD2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Print the resolved pandoc path and version, then exit.
    #[arg(long)]
    check_engine: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MD2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MD2PDF_QUIET")]
    quiet: bool,
}

/// `--json` payload for a successful batch.
#[derive(Serialize)]
struct JsonSuccess<'a> {
    outputs: Vec<JsonOutput<'a>>,
    stats: &'a md2pdf_batch::BatchStats,
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    slot: usize,
    source: &'a Path,
    path: &'a Path,
    size_bytes: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO logs would interleave with the progress bar, so the bar wins
    // unless -v is given.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Resolve engine ───────────────────────────────────────────────────
    let pandoc = match cli.pandoc.clone() {
        Some(path) => path,
        None => match pandoc_locate::locate_pandoc() {
            Ok(path) => path,
            Err(e) if cli.check_engine => return Err(e).context("pandoc is not available"),
            Err(e) => {
                // Let the render stage report EngineUnavailable against the bare name.
                tracing::warn!("{}", e);
                PathBuf::from(pandoc_locate::PANDOC_PROGRAM)
            }
        },
    };

    if cli.check_engine {
        let version = tokio::task::spawn_blocking({
            let pandoc = pandoc.clone();
            move || pandoc_locate::engine_version(&pandoc)
        })
        .await
        .context("Engine check task failed")??;
        println!("Engine:   {}", pandoc.display());
        println!("Version:  {}", version);
        return Ok(());
    }

    let archive = cli
        .archive
        .clone()
        .context("An archive path is required")?;

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, pandoc, progress_cb)?;

    // ── Run conversion ───────────────────────────────────────────────────
    let output = match convert_file(&archive, &config).await {
        Ok(output) => output,
        Err(e) if cli.json => {
            let failure = e.to_failure();
            println!(
                "{}",
                serde_json::to_string_pretty(&failure).context("Failed to serialise failure")?
            );
            std::process::exit(1);
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Conversion of {} failed", archive.display()))
        }
    };

    let written = output
        .write_to_dir(&cli.output)
        .await
        .with_context(|| format!("Failed to write outputs to {}", cli.output.display()))?;

    if cli.json {
        let outputs = output
            .documents
            .iter()
            .zip(&written)
            .map(|(doc, path)| JsonOutput {
                slot: doc.slot,
                source: &doc.source,
                path,
                size_bytes: doc.size_bytes,
            })
            .collect();
        let json = serde_json::to_string_pretty(&JsonSuccess {
            outputs,
            stats: &output.stats,
        })
        .context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        for (doc, path) in output.documents.iter().zip(&written) {
            eprintln!(
                "   {}  {}",
                bold(&path.display().to_string()),
                dim(&format!("← {}", doc.source.display()))
            );
        }
        let stats = &output.stats;
        eprintln!(
            "{}  {} documents  {}ms  →  {}",
            green("✔"),
            stats.rendered_documents,
            stats.total_duration_ms,
            bold(&cli.output.display().to_string()),
        );
        if stats.removed_badges + stats.removed_images > 0 {
            eprintln!(
                "   {}",
                dim(&format!(
                    "removed {} badge links, {} svg images",
                    stats.removed_badges, stats.removed_images
                ))
            );
        }
        if stats.tolerated_warnings > 0 {
            eprintln!(
                "   {} {} documents kept despite pandoc warnings",
                cyan("⚠"),
                stats.tolerated_warnings
            );
        }
    }

    Ok(())
}

/// Map CLI args to `BatchConfig`.
fn build_config(
    cli: &Cli,
    pandoc: PathBuf,
    progress: Option<ProgressCallback>,
) -> Result<BatchConfig> {
    let defaults = PageMargins::default();
    let margins = PageMargins {
        top: cli.margin_top.clone().unwrap_or(defaults.top),
        bottom: cli.margin_bottom.clone().unwrap_or(defaults.bottom),
        left: cli.margin_left.clone().unwrap_or(defaults.left),
        right: cli.margin_right.clone().unwrap_or(defaults.right),
    };

    let pdf_engine = if cli.pdf_engine.eq_ignore_ascii_case("auto") {
        None
    } else {
        Some(cli.pdf_engine.clone())
    };

    let policy = if cli.tolerate_warnings {
        DiagnosticPolicy::Tolerant
    } else {
        DiagnosticPolicy::Strict
    };

    let mut builder = BatchConfig::builder()
        .pandoc_path(pandoc)
        .pdf_engine(pdf_engine)
        .margins(margins)
        .render_timeout_secs(cli.timeout)
        .diagnostic_policy(policy);

    if let Some(ref dir) = cli.work_dir {
        builder = builder.work_root(dir);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
