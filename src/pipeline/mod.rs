//! Pipeline stages for Markdown-archive-to-PDF conversion.
//!
//! Each submodule implements exactly one step and is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ sanitize ──▶ render ──▶ classify
//! (bytes)   (zip→tree)  (badges/svg)  (pandoc)   (stderr)
//! ```
//!
//! 1. [`input`]: load the archive bytes from disk
//! 2. [`extract`]: validate the ZIP, unpack it into a private working set,
//!    discover source documents in sorted order; blocking, so the
//!    orchestrator runs it in `spawn_blocking`
//! 3. [`sanitize`]: strip badge links and SVG images the LaTeX backend
//!    cannot handle
//! 4. [`render`]: run the external engine on a scratch copy of the text
//! 5. [`classify`]: decide whether a non-zero exit carries a known-benign
//!    diagnostic

pub mod classify;
pub mod extract;
pub mod input;
pub mod render;
pub mod sanitize;
