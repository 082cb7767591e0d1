//! Progress-callback trait for per-document conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::BatchConfigBuilder::progress_callback`] to receive events
//! as the orchestrator renders each document of a batch.
//!
//! # Example
//!
//! ```rust
//! use md2pdf_batch::{BatchConfig, ConversionProgressCallback};
//! use std::path::Path;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_document_complete(&self, slot: usize, total: usize, output_bytes: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{}/{} done ({} bytes)", slot, total, output_bytes);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = BatchConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the orchestrator as it processes each document.
///
/// Implementations must be `Send + Sync` so a config can be shared across
/// batches running on different tasks. All methods have default no-op
/// implementations so callers only override what they care about.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once after extraction, before any document is rendered.
    fn on_batch_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called just before the engine is started for a document.
    ///
    /// # Arguments
    /// * `slot`: 1-based output slot
    /// * `total`: documents in the batch
    /// * `document`: path relative to the archive root
    fn on_document_start(&self, slot: usize, total: usize, document: &Path) {
        let _ = (slot, total, document);
    }

    /// Called when a document rendered successfully.
    fn on_document_complete(&self, slot: usize, total: usize, output_bytes: usize) {
        let _ = (slot, total, output_bytes);
    }

    /// Called when a document failed. The batch aborts right after.
    fn on_document_error(&self, slot: usize, total: usize, error: &str) {
        let _ = (slot, total, error);
    }

    /// Called once when the batch reaches a terminal state after extraction.
    ///
    /// `success_count < total_documents` means the batch failed.
    fn on_batch_complete(&self, total_documents: usize, success_count: usize) {
        let _ = (total_documents, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::BatchConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
