//! # md2pdf-batch
//!
//! Convert a ZIP archive of Markdown documents into numbered PDFs with pandoc.
//!
//! ## Pipeline Overview
//!
//! ```text
//! ZIP archive
//!  │
//!  ├─ 1. Extract   validate, unpack into a private temp dir, discover *.md (sorted)
//!  ├─ 2. Sanitize  drop badge links and SVG images
//!  ├─ 3. Render    pandoc → PDF, one document at a time
//!  ├─ 4. Classify  known-benign stderr vs. fatal
//!  └─ 5. Output    1.pdf … n.pdf, or one failure naming the document
//! ```
//!
//! A batch is all-or-nothing. The temp working set is removed before any
//! entry point returns.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use md2pdf_batch::{convert_file, BatchConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BatchConfig::default();
//!     let output = convert_file("notes.zip", &config).await?;
//!     for doc in &output.documents {
//!         println!("{} <- {}", doc.name, doc.source.display());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `md2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! md2pdf-batch = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{BatchConfig, BatchConfigBuilder, DiagnosticPolicy, PageMargins};
pub use convert::{convert_archive, convert_file, convert_sync, convert_to_dir, BatchState};
pub use error::{BatchFailure, ExtractionError, Md2PdfError, RenderError};
pub use output::{BatchOutput, BatchStats, OutputDocument};
pub use pipeline::classify::is_ignorable;
pub use pipeline::input::Archive;
pub use pipeline::sanitize::{sanitize, SanitizedText};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
