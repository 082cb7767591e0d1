//! Result types returned by a successful batch.

use crate::error::Md2PdfError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One rendered document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputDocument {
    /// 1-based output slot, dense within the batch.
    pub slot: usize,
    /// Output name, `<slot>.<suffix>` (e.g. `2.pdf`).
    pub name: String,
    /// Source document path relative to the archive root.
    pub source: PathBuf,
    /// Size of `bytes`, kept for JSON summaries.
    pub size_bytes: usize,
    /// Rendered file content.
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

/// Statistics for a completed batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchStats {
    /// Source documents discovered in the archive.
    pub total_documents: usize,
    /// Documents rendered successfully (equals `total_documents` on success).
    pub rendered_documents: usize,
    /// Slots accepted despite a known-benign engine diagnostic (Tolerant policy only).
    pub tolerated_warnings: usize,
    /// Badge links stripped across all documents.
    pub removed_badges: usize,
    /// SVG image references stripped across all documents.
    pub removed_images: usize,
    /// Wall-clock time for the whole batch.
    pub total_duration_ms: u64,
    /// Time spent validating and unpacking the archive.
    pub extract_duration_ms: u64,
    /// Time spent inside the rendering engine.
    pub render_duration_ms: u64,
}

/// All outputs of a successful batch, ordered by slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutput {
    pub documents: Vec<OutputDocument>,
    pub stats: BatchStats,
}

impl BatchOutput {
    /// Look up an output by name, e.g. `"2.pdf"`.
    pub fn get(&self, name: &str) -> Option<&OutputDocument> {
        self.documents.iter().find(|d| d.name == name)
    }

    /// Slot numbers in order; always `1..=len()` for a successful batch.
    pub fn slots(&self) -> Vec<usize> {
        self.documents.iter().map(|d| d.slot).collect()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Write every output into `dir` under its slot name.
    ///
    /// All outputs are first written into a hidden staging directory inside
    /// `dir`, then renamed into place. If any write or rename fails, the
    /// files already moved are removed again and the staging directory is
    /// dropped, so `dir` never holds a partial set.
    pub async fn write_to_dir(&self, dir: &Path) -> Result<Vec<PathBuf>, Md2PdfError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| write_failed(dir, e))?;

        let staging = tempfile::Builder::new()
            .prefix(".md2pdf-staging-")
            .tempdir_in(dir)
            .map_err(|e| write_failed(dir, e))?;

        for doc in &self.documents {
            tokio::fs::write(staging.path().join(&doc.name), &doc.bytes)
                .await
                .map_err(|e| write_failed(&dir.join(&doc.name), e))?;
        }

        let mut written: Vec<PathBuf> = Vec::with_capacity(self.documents.len());
        for doc in &self.documents {
            let path = dir.join(&doc.name);
            if let Err(e) = tokio::fs::rename(staging.path().join(&doc.name), &path).await {
                for done in &written {
                    if let Err(e) = tokio::fs::remove_file(done).await {
                        warn!("Failed to roll back {}: {}", done.display(), e);
                    }
                }
                return Err(write_failed(&path, e));
            }
            debug!("Wrote {} ({} bytes)", path.display(), doc.bytes.len());
            written.push(path);
        }
        Ok(written)
    }
}

fn write_failed(path: &Path, source: std::io::Error) -> Md2PdfError {
    Md2PdfError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    }
}
