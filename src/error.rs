//! Error types for the md2pdf-batch library.
//!
//! Each pipeline stage reports its own error type, and the orchestrator folds
//! them into the single fatal type callers see:
//!
//! * [`ExtractionError`]: the archive could not be unpacked, held no
//!   documents, or exceeded the extraction limits.
//!
//! * [`RenderError`]: the engine failed on one document. Every variant
//!   names that document.
//!
//! * [`Md2PdfError`]: **Fatal** for the whole batch. Returned as
//!   `Err(Md2PdfError)` from the top-level `convert*` functions. One failed
//!   document aborts the batch; no partial output set is ever returned.
//!
//! [`BatchFailure`] is the serialisable view of an [`Md2PdfError`] handed to
//! front-ends (the CLI's `--json` mode prints it verbatim).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failures while validating and unpacking an archive.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The bytes are not a readable ZIP container.
    #[error("Archive '{archive}' is malformed: {detail}")]
    Malformed { archive: String, detail: String },

    /// The archive unpacked cleanly but contains no source documents.
    #[error("Archive '{archive}' contains no '.{suffix}' documents")]
    NoDocuments { archive: String, suffix: String },

    /// Entry count or uncompressed size exceeds the configured limits.
    #[error("Archive '{archive}' exceeds extraction limits: {detail}")]
    TooLarge { archive: String, detail: String },

    /// Writing the extracted tree failed.
    #[error("Failed to extract '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures while rendering a single document.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The engine exited non-zero with a diagnostic that matches no benign pattern.
    #[error("Rendering '{}' failed (exit {exit_code:?}):\n{diagnostic}", .document.display())]
    Fatal {
        document: PathBuf,
        exit_code: Option<i32>,
        diagnostic: String,
    },

    /// The engine exited non-zero with a known-benign diagnostic, and the
    /// active policy does not accept the result.
    #[error(
        "Rendering '{}' exited with status {exit_code:?} (known warning '{pattern}'):\n{diagnostic}",
        .document.display()
    )]
    Benign {
        document: PathBuf,
        exit_code: Option<i32>,
        pattern: &'static str,
        diagnostic: String,
    },

    /// The engine reported success but wrote no output file, or an empty one.
    #[error("Rendering '{}' reported success but produced no output", .document.display())]
    MissingOutput { document: PathBuf },

    /// The engine did not finish within the configured timeout and was killed.
    #[error("Rendering '{}' timed out after {secs}s\nIncrease --timeout.", .document.display())]
    Timeout { document: PathBuf, secs: u64 },

    /// The engine binary could not be started.
    #[error(
        "Rendering engine '{}' could not be started: {source}\nInstall pandoc or pass --pandoc <PATH>.",
        .program.display()
    )]
    EngineUnavailable {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Scratch-file or output I/O failed around the engine call.
    #[error("I/O error while rendering '{}': {source}", .document.display())]
    Io {
        document: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RenderError {
    /// The document this error refers to, if it refers to one.
    pub fn document(&self) -> Option<&Path> {
        match self {
            RenderError::Fatal { document, .. }
            | RenderError::Benign { document, .. }
            | RenderError::MissingOutput { document }
            | RenderError::Timeout { document, .. }
            | RenderError::Io { document, .. } => Some(document),
            RenderError::EngineUnavailable { .. } => None,
        }
    }
}

/// All fatal errors returned by the md2pdf-batch library.
#[derive(Debug, Error)]
pub enum Md2PdfError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Archive file was not found at the given path.
    #[error("Archive not found: '{}'\nCheck the path exists and is readable.", .path.display())]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the archive.
    #[error("Permission denied reading '{}'", .path.display())]
    PermissionDenied { path: PathBuf },

    // ── Pipeline errors ───────────────────────────────────────────────────
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Render(#[from] RenderError),

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{}': {source}", .path.display())]
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
    /// Unexpected internal error (task panics, runtime construction).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Md2PdfError {
    /// Relative path of the document that caused the failure, when known.
    pub fn document(&self) -> Option<&Path> {
        match self {
            Md2PdfError::Render(e) => e.document(),
            _ => None,
        }
    }

    /// Serialisable summary for front-ends.
    pub fn to_failure(&self) -> BatchFailure {
        BatchFailure {
            message: self.to_string(),
            document: self.document().map(Path::to_path_buf),
        }
    }
}

/// Structured failure delivered to the caller instead of output blobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailure {
    /// Human-readable description.
    pub message: String,
    /// Document path relative to the archive root, when the failure is tied to one.
    pub document: Option<PathBuf>,
}
