//! Batch conversion entry points.
//!
//! A batch is all-or-nothing: documents are rendered one at a time in
//! discovery order, and the first unrecoverable failure aborts the batch
//! with no outputs. On success the caller receives every rendered file,
//! numbered densely from 1 in discovery order.
//!
//! The working set (extracted tree, scratch files, rendered outputs) is
//! removed before any entry point returns, whatever the outcome.

use crate::config::{BatchConfig, DiagnosticPolicy};
use crate::error::{Md2PdfError, RenderError};
use crate::output::{BatchOutput, BatchStats, OutputDocument};
use crate::pipeline::extract::{self, SourceDocument, WorkingSet};
use crate::pipeline::input::{self, Archive};
use crate::pipeline::{classify, render, sanitize};
use std::fmt;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Lifecycle of a batch. Transitions are logged at DEBUG.
///
/// ```text
/// Idle → Extracting → Processing(1) → … → Processing(n) → Completed
///           │               │
///           └──────┬────────┘
///                  ▼
///                Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Extracting,
    /// Rendering the document in the given 1-based slot.
    Processing(usize),
    Completed,
    Failed,
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchState::Idle => f.write_str("idle"),
            BatchState::Extracting => f.write_str("extracting"),
            BatchState::Processing(slot) => write!(f, "processing({slot})"),
            BatchState::Completed => f.write_str("completed"),
            BatchState::Failed => f.write_str("failed"),
        }
    }
}

impl BatchState {
    fn advance(&mut self, next: BatchState) {
        debug!("Batch state: {} -> {}", self, next);
        *self = next;
    }
}

/// Convert every Markdown document in `archive` to PDF.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(BatchOutput)` holding one output per source document, slots `1..=n`.
///
/// # Errors
/// - [`Md2PdfError::Extraction`]: the archive is malformed, too large, or
///   holds no documents.
/// - [`Md2PdfError::Render`]: a document failed to render; the error names it.
/// - [`Md2PdfError::Internal`]: a blocking task panicked.
pub async fn convert_archive(
    archive: Archive,
    config: &BatchConfig,
) -> Result<BatchOutput, Md2PdfError> {
    let total_start = Instant::now();
    let mut state = BatchState::Idle;
    info!(
        "Starting batch: {} ({} bytes)",
        archive.name(),
        archive.len()
    );

    // ── Step 1: Extract ──────────────────────────────────────────────────
    state.advance(BatchState::Extracting);
    let extract_start = Instant::now();
    let extract_config = config.clone();
    let extracted =
        tokio::task::spawn_blocking(move || extract::extract(&archive, &extract_config)).await;
    let working_set = match extracted {
        Ok(Ok(ws)) => ws,
        Ok(Err(e)) => {
            state.advance(BatchState::Failed);
            return Err(e.into());
        }
        Err(e) => {
            state.advance(BatchState::Failed);
            return Err(Md2PdfError::Internal(format!("Extraction task failed: {e}")));
        }
    };
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;
    info!(
        "Extracted {} documents into {} in {}ms",
        working_set.documents().len(),
        working_set.root().display(),
        extract_duration_ms
    );

    // ── Step 2: Render ───────────────────────────────────────────────────
    let result = process_documents(&working_set, config, &mut state).await;

    // ── Step 3: Tear down ────────────────────────────────────────────────
    let root = working_set.root().to_path_buf();
    match working_set.close() {
        Ok(()) => debug!("Removed working set {}", root.display()),
        Err(e) => warn!("Failed to remove working set {}: {}", root.display(), e),
    }

    let (documents, mut stats) = result?;
    stats.extract_duration_ms = extract_duration_ms;
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Batch complete: {} documents, {} badges and {} svg images removed, {} tolerated warnings, {}ms",
        stats.rendered_documents,
        stats.removed_badges,
        stats.removed_images,
        stats.tolerated_warnings,
        stats.total_duration_ms
    );

    Ok(BatchOutput { documents, stats })
}

/// Read an archive from disk and convert it.
pub async fn convert_file(
    path: impl AsRef<Path>,
    config: &BatchConfig,
) -> Result<BatchOutput, Md2PdfError> {
    let archive = input::load_archive(path.as_ref()).await?;
    convert_archive(archive, config).await
}

/// Convert an archive and write `1.pdf`, `2.pdf`, … into `out_dir`.
///
/// Nothing is written when the batch fails. Outputs are staged inside
/// `out_dir` and renamed into place together; if any of them cannot be
/// written, the ones already placed are removed again.
pub async fn convert_to_dir(
    path: impl AsRef<Path>,
    out_dir: impl AsRef<Path>,
    config: &BatchConfig,
) -> Result<BatchStats, Md2PdfError> {
    let output = convert_file(path, config).await?;
    output.write_to_dir(out_dir.as_ref()).await?;
    Ok(output.stats)
}

/// Synchronous wrapper around [`convert_file`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    path: impl AsRef<Path>,
    config: &BatchConfig,
) -> Result<BatchOutput, Md2PdfError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Md2PdfError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert_file(path, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn process_documents(
    working_set: &WorkingSet,
    config: &BatchConfig,
    state: &mut BatchState,
) -> Result<(Vec<OutputDocument>, BatchStats), Md2PdfError> {
    let documents = working_set.documents();
    let total = documents.len();
    let output_dir = working_set.output_dir();

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let mut stats = BatchStats {
        total_documents: total,
        ..BatchStats::default()
    };
    let mut outputs = Vec::with_capacity(total);

    for (idx, document) in documents.iter().enumerate() {
        let slot = idx + 1;
        state.advance(BatchState::Processing(slot));
        if let Some(ref cb) = config.progress_callback {
            cb.on_document_start(slot, total, document.relative_path());
        }

        let output_path = output_dir.join(config.output_name(slot));
        match render_document(slot, document, &output_path, config, &mut stats).await {
            Ok(out) => {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_document_complete(slot, total, out.bytes.len());
                }
                outputs.push(out);
            }
            Err(e) => {
                warn!("Document {}/{} failed: {}", slot, total, e);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_document_error(slot, total, &e.to_string());
                    cb.on_batch_complete(total, outputs.len());
                }
                state.advance(BatchState::Failed);
                return Err(e.into());
            }
        }
    }

    stats.rendered_documents = outputs.len();
    state.advance(BatchState::Completed);
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, outputs.len());
    }
    Ok((outputs, stats))
}

/// Sanitize, render, and evaluate a single document.
async fn render_document(
    slot: usize,
    document: &SourceDocument,
    output_path: &Path,
    config: &BatchConfig,
    stats: &mut BatchStats,
) -> Result<OutputDocument, RenderError> {
    let sanitized = sanitize::sanitize(document.raw_text());
    if !sanitized.is_unchanged() {
        debug!(
            "Sanitized {}: {} badges, {} svg images removed",
            document.relative_path().display(),
            sanitized.removed_badges(),
            sanitized.removed_images()
        );
    }
    stats.removed_badges += sanitized.removed_badges();
    stats.removed_images += sanitized.removed_images();

    let attempt = render::render(&sanitized, document, output_path, config).await?;
    stats.render_duration_ms += attempt.duration_ms();

    let relative = document.relative_path().to_path_buf();
    let finish = |bytes: Vec<u8>| OutputDocument {
        slot,
        name: config.output_name(slot),
        source: relative.clone(),
        size_bytes: bytes.len(),
        bytes,
    };

    if attempt.success() {
        return match attempt.into_output() {
            Some(bytes) if !bytes.is_empty() => Ok(finish(bytes)),
            _ => Err(RenderError::MissingOutput {
                document: relative.clone(),
            }),
        };
    }

    let Some(pattern) = classify::matching_pattern(attempt.diagnostic()) else {
        return Err(RenderError::Fatal {
            document: relative.clone(),
            exit_code: attempt.exit_code(),
            diagnostic: attempt.diagnostic().to_string(),
        });
    };

    if config.diagnostic_policy == DiagnosticPolicy::Tolerant {
        match tokio::fs::read(output_path).await {
            Ok(bytes) if !bytes.is_empty() => {
                warn!(
                    "Accepting {} despite known warning '{}' (exit {:?})",
                    relative.display(),
                    pattern.name,
                    attempt.exit_code()
                );
                stats.tolerated_warnings += 1;
                return Ok(finish(bytes));
            }
            Ok(_) => debug!("{}: output is empty", relative.display()),
            Err(e) => debug!("{}: no output to tolerate: {}", relative.display(), e),
        }
    }

    Err(RenderError::Benign {
        document: relative.clone(),
        exit_code: attempt.exit_code(),
        pattern: pattern.name,
        diagnostic: attempt.diagnostic().to_string(),
    })
}
