//! Configuration types for archive-to-PDF batch conversion.
//!
//! All batch behaviour is controlled through [`BatchConfig`], built via its
//! [`BatchConfigBuilder`]. The config is passed into every entry point
//! explicitly; nothing in the pipeline reads process-wide mutable state for
//! folder locations, margins, or engine selection.

use crate::error::Md2PdfError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Configuration for one archive conversion batch.
///
/// Built via [`BatchConfig::builder()`] or using [`BatchConfig::default()`].
///
/// # Example
/// ```rust
/// use md2pdf_batch::{BatchConfig, DiagnosticPolicy};
///
/// let config = BatchConfig::builder()
///     .pandoc_path("/usr/local/bin/pandoc")
///     .render_timeout_secs(60)
///     .diagnostic_policy(DiagnosticPolicy::Tolerant)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct BatchConfig {
    /// Program used to render each document. Default: `"pandoc"` (resolved on `PATH`).
    pub pandoc_path: PathBuf,

    /// Value passed as `--pdf-engine`. Default: `Some("pdflatex")`.
    ///
    /// `None` omits the flag and lets pandoc pick its own default.
    pub pdf_engine: Option<String>,

    /// Pandoc reader specification passed with `-f`.
    /// Default: `"markdown-implicit_figures"`.
    ///
    /// Implicit figures are disabled so an image alone in a paragraph is not
    /// turned into a floating, captioned figure.
    pub input_format: String,

    /// Page margins forwarded to the LaTeX `geometry` package.
    pub margins: PageMargins,

    /// File extension (without dot) identifying source documents. Default: `"md"`.
    ///
    /// Matched ASCII case-insensitively.
    pub document_suffix: String,

    /// Extension (without dot) of rendered outputs. Default: `"pdf"`.
    pub output_suffix: String,

    /// Per-document engine timeout in seconds. Default: 120.
    ///
    /// The child process is killed when the timeout expires.
    pub render_timeout_secs: u64,

    /// What to do when the engine exits non-zero with a known-benign diagnostic.
    /// Default: [`DiagnosticPolicy::Strict`].
    pub diagnostic_policy: DiagnosticPolicy,

    /// Directory under which per-batch working directories are created.
    /// Default: `None` (the system temp directory).
    pub work_root: Option<PathBuf>,

    /// Maximum number of entries accepted in one archive. Default: 10 000.
    pub max_entries: usize,

    /// Maximum total uncompressed size of one archive in bytes. Default: 512 MiB.
    pub max_extracted_bytes: u64,

    /// Optional progress callback, invoked once per document.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            pandoc_path: PathBuf::from("pandoc"),
            pdf_engine: Some("pdflatex".to_string()),
            input_format: "markdown-implicit_figures".to_string(),
            margins: PageMargins::default(),
            document_suffix: "md".to_string(),
            output_suffix: "pdf".to_string(),
            render_timeout_secs: 120,
            diagnostic_policy: DiagnosticPolicy::default(),
            work_root: None,
            max_entries: 10_000,
            max_extracted_bytes: 512 * 1024 * 1024,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for BatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchConfig")
            .field("pandoc_path", &self.pandoc_path)
            .field("pdf_engine", &self.pdf_engine)
            .field("input_format", &self.input_format)
            .field("margins", &self.margins)
            .field("document_suffix", &self.document_suffix)
            .field("output_suffix", &self.output_suffix)
            .field("render_timeout_secs", &self.render_timeout_secs)
            .field("diagnostic_policy", &self.diagnostic_policy)
            .field("work_root", &self.work_root)
            .field("max_entries", &self.max_entries)
            .field("max_extracted_bytes", &self.max_extracted_bytes)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl BatchConfig {
    /// Create a new builder for `BatchConfig`.
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder {
            config: Self::default(),
        }
    }

    /// Name of the output file for a 1-based slot, e.g. `3.pdf`.
    pub fn output_name(&self, slot: usize) -> String {
        format!("{}.{}", slot, self.output_suffix)
    }
}

/// Builder for [`BatchConfig`].
#[derive(Debug)]
pub struct BatchConfigBuilder {
    config: BatchConfig,
}

impl BatchConfigBuilder {
    pub fn pandoc_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pandoc_path = path.into();
        self
    }

    pub fn pdf_engine(mut self, engine: Option<String>) -> Self {
        self.config.pdf_engine = engine.filter(|e| !e.trim().is_empty());
        self
    }

    pub fn input_format(mut self, format: impl Into<String>) -> Self {
        self.config.input_format = format.into();
        self
    }

    pub fn margins(mut self, margins: PageMargins) -> Self {
        self.config.margins = margins;
        self
    }

    pub fn document_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.config.document_suffix = suffix.into().trim_start_matches('.').to_string();
        self
    }

    pub fn output_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.config.output_suffix = suffix.into().trim_start_matches('.').to_string();
        self
    }

    pub fn render_timeout_secs(mut self, secs: u64) -> Self {
        self.config.render_timeout_secs = secs.max(1);
        self
    }

    pub fn diagnostic_policy(mut self, policy: DiagnosticPolicy) -> Self {
        self.config.diagnostic_policy = policy;
        self
    }

    pub fn work_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_root = Some(dir.into());
        self
    }

    pub fn max_entries(mut self, n: usize) -> Self {
        self.config.max_entries = n.max(1);
        self
    }

    pub fn max_extracted_bytes(mut self, n: u64) -> Self {
        self.config.max_extracted_bytes = n;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BatchConfig, Md2PdfError> {
        let c = &self.config;
        if c.pandoc_path.as_os_str().is_empty() {
            return Err(Md2PdfError::InvalidConfig(
                "pandoc path must not be empty".into(),
            ));
        }
        if c.document_suffix.is_empty() || c.output_suffix.is_empty() {
            return Err(Md2PdfError::InvalidConfig(
                "document and output suffixes must not be empty".into(),
            ));
        }
        if c.input_format.trim().is_empty() {
            return Err(Md2PdfError::InvalidConfig(
                "input format must not be empty".into(),
            ));
        }
        c.margins.validate()?;
        Ok(self.config)
    }
}

// ── Page geometry ────────────────────────────────────────────────────────

/// Page margins as LaTeX lengths (`2cm`, `0.75in`, `18mm`, …).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMargins {
    pub top: String,
    pub bottom: String,
    pub left: String,
    pub right: String,
}

impl Default for PageMargins {
    fn default() -> Self {
        Self {
            top: "2cm".to_string(),
            bottom: "1.5cm".to_string(),
            left: "2cm".to_string(),
            right: "2cm".to_string(),
        }
    }
}

impl PageMargins {
    /// Render the pandoc variable assignment passed after `-V`,
    /// e.g. `geometry:top=2cm,bottom=1.5cm,left=2cm,right=2cm`.
    pub fn geometry_variable(&self) -> String {
        format!(
            "geometry:top={},bottom={},left={},right={}",
            self.top, self.bottom, self.left, self.right
        )
    }

    fn validate(&self) -> Result<(), Md2PdfError> {
        for (side, value) in [
            ("top", &self.top),
            ("bottom", &self.bottom),
            ("left", &self.left),
            ("right", &self.right),
        ] {
            // A comma or whitespace would split the geometry key list.
            if value.is_empty() || value.contains(',') || value.chars().any(char::is_whitespace)
            {
                return Err(Md2PdfError::InvalidConfig(format!(
                    "invalid {side} margin {value:?}: expected a LaTeX length such as 2cm"
                )));
            }
        }
        Ok(())
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How a non-zero engine exit with a known-benign diagnostic is treated.
///
/// | Policy | Benign diagnostic, output written | Benign diagnostic, no output |
/// |--------|-----------------------------------|------------------------------|
/// | `Strict` (default) | batch fails | batch fails |
/// | `Tolerant` | slot accepted, warning counted | batch fails |
///
/// Unknown diagnostics always fail the batch under either policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DiagnosticPolicy {
    /// Any non-zero exit aborts the batch.
    #[default]
    Strict,
    /// Keep output the engine produced despite a known-benign diagnostic.
    Tolerant,
}
