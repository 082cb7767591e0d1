//! Engine invocation: render one sanitized document to PDF with pandoc.
//!
//! The sanitized text goes to a hidden scratch file beside the original
//! document, so relative image links resolve exactly as they would for the
//! original, while the original file is never modified. The scratch file is a
//! [`tempfile::NamedTempFile`] and disappears when this function returns, on
//! every path including timeouts and spawn failures.
//!
//! pandoc runs as a child process with a discrete argument list; nothing is
//! ever passed through a shell. Only stderr is captured: it carries every
//! warning and error the classifier needs, while stdout is unused when `-o`
//! is given.

use crate::config::BatchConfig;
use crate::error::RenderError;
use crate::pipeline::extract::SourceDocument;
use crate::pipeline::sanitize::SanitizedText;
use std::ffi::OsString;
use std::io::Write;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

/// Outcome of one engine run.
#[derive(Debug, Clone)]
pub struct RenderAttempt {
    exit_code: Option<i32>,
    success: bool,
    diagnostic: String,
    duration_ms: u64,
    output: Option<Vec<u8>>,
}

impl RenderAttempt {
    /// `true` when the engine exited with status 0.
    pub fn success(&self) -> bool {
        self.success
    }

    /// Exit code, `None` when the process was terminated by a signal.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Everything the engine wrote to stderr, decoded lossily.
    pub fn diagnostic(&self) -> &str {
        &self.diagnostic
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// Rendered bytes; present only on success when the output file exists.
    pub fn output(&self) -> Option<&[u8]> {
        self.output.as_deref()
    }

    pub fn into_output(self) -> Option<Vec<u8>> {
        self.output
    }
}

/// Build the engine argument list.
///
/// ```text
/// -f <input_format> -V geometry:<margins> [--pdf-engine=<engine>]
/// --resource-path=<doc dir> -o <output> <scratch>
/// ```
pub fn build_args(
    config: &BatchConfig,
    scratch: &Path,
    output_path: &Path,
    resource_dir: &Path,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-f".into(),
        config.input_format.clone().into(),
        "-V".into(),
        config.margins.geometry_variable().into(),
    ];
    if let Some(ref engine) = config.pdf_engine {
        args.push(format!("--pdf-engine={engine}").into());
    }

    let mut resource_path = OsString::from("--resource-path=");
    resource_path.push(resource_dir);
    args.push(resource_path);

    args.push("-o".into());
    args.push(output_path.into());
    args.push(scratch.into());
    args
}

/// Render `text` (derived from `document`) to `output_path`.
///
/// A non-zero exit status is **not** an error here: it is reported through
/// [`RenderAttempt`] so the caller can classify the diagnostic.
///
/// # Errors
/// - [`RenderError::EngineUnavailable`]: the engine binary could not be spawned.
/// - [`RenderError::Timeout`]: the engine ran longer than `render_timeout_secs`.
/// - [`RenderError::Io`]: scratch file or output file I/O failed.
pub async fn render(
    text: &SanitizedText,
    document: &SourceDocument,
    output_path: &Path,
    config: &BatchConfig,
) -> Result<RenderAttempt, RenderError> {
    let io_err = |source: std::io::Error| RenderError::Io {
        document: document.relative_path().to_path_buf(),
        source,
    };

    let mut scratch = tempfile::Builder::new()
        .prefix(".md2pdf-")
        .suffix(".md")
        .tempfile_in(document.dir())
        .map_err(io_err)?;
    scratch.write_all(text.as_str().as_bytes()).map_err(io_err)?;
    scratch.flush().map_err(io_err)?;

    let args = build_args(config, scratch.path(), output_path, document.dir());
    debug!(
        "Running {} {:?} in {}",
        config.pandoc_path.display(),
        args,
        document.dir().display()
    );

    let start = Instant::now();
    let child = Command::new(&config.pandoc_path)
        .args(&args)
        .current_dir(document.dir())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RenderError::EngineUnavailable {
                    program: config.pandoc_path.clone(),
                    source: e,
                }
            } else {
                io_err(e)
            }
        })?;

    let timeout = Duration::from_secs(config.render_timeout_secs);
    // On timeout the dropped future drops the child, which kills it.
    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| RenderError::Timeout {
            document: document.relative_path().to_path_buf(),
            secs: config.render_timeout_secs,
        })?
        .map_err(io_err)?;
    let duration_ms = start.elapsed().as_millis() as u64;

    if let Err(e) = scratch.close() {
        warn!(
            "Failed to remove scratch file for {}: {}",
            document.relative_path().display(),
            e
        );
    }

    let success = output.status.success();
    let rendered = if success {
        match tokio::fs::read(output_path).await {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(io_err(e)),
        }
    } else {
        None
    };

    Ok(RenderAttempt {
        exit_code: output.status.code(),
        success,
        diagnostic: String::from_utf8_lossy(&output.stderr).into_owned(),
        duration_ms,
        output: rendered,
    })
}
