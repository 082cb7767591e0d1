//! # pandoc-locate
//!
//! Find the [pandoc](https://pandoc.org) executable so callers can spawn it
//! with an absolute path, and report which version they are about to run.
//!
//! ## How it works
//!
//! On first call to [`locate_pandoc`]:
//!
//! 1. If `MD2PDF_PANDOC` is set and points at an executable file, use it.
//! 2. Otherwise search every directory on `PATH` for `pandoc`
//!    (`pandoc.exe` on Windows).
//! 3. Cache the result for the rest of the process.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pandoc_locate::{engine_version, locate_pandoc};
//!
//! let path = locate_pandoc().expect("pandoc not installed");
//! let version = engine_version(&path).expect("pandoc --version failed");
//! println!("{} ({})", path.display(), version);
//! ```
//!
//! ## Environment variable overrides
//!
//! - `MD2PDF_PANDOC`: path to a pandoc binary; skips the `PATH` search.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::OnceLock;

use thiserror::Error;

// ── Public constants ─────────────────────────────────────────────────────────

/// Environment variable naming an explicit pandoc binary.
pub const PANDOC_ENV_OVERRIDE: &str = "MD2PDF_PANDOC";

/// Program name searched for on `PATH`.
#[cfg(windows)]
pub const PANDOC_PROGRAM: &str = "pandoc.exe";
#[cfg(not(windows))]
pub const PANDOC_PROGRAM: &str = "pandoc";

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by pandoc-locate operations.
#[derive(Error, Debug)]
pub enum LocateError {
    /// No executable with this name exists on `PATH`.
    #[error("'{program}' was not found on PATH.\nInstall pandoc or set MD2PDF_PANDOC=/path/to/pandoc.")]
    NotFound { program: String },

    /// The override variable points at something that is not an executable file.
    #[error("MD2PDF_PANDOC='{}' is not an executable file", .path.display())]
    InvalidOverride { path: PathBuf },

    /// Running `<engine> --version` failed.
    #[error("Failed to query version of '{}': {reason}", .path.display())]
    Version { path: PathBuf, reason: String },
}

// ── Thread-safe singleton path cache ─────────────────────────────────────────

static RESOLVED_PATH: OnceLock<PathBuf> = OnceLock::new();

// ── Public API ───────────────────────────────────────────────────────────────

/// Resolve the pandoc executable, honouring `MD2PDF_PANDOC` first.
///
/// Safe to call from multiple threads; the lookup result is cached once per
/// process.
pub fn locate_pandoc() -> Result<PathBuf, LocateError> {
    if let Some(path) = RESOLVED_PATH.get() {
        return Ok(path.clone());
    }

    let path = resolve_uncached()?;

    // Ignore the race; both threads resolved the same file.
    let _ = RESOLVED_PATH.set(path.clone());

    Ok(path)
}

/// Search the directories in `path_var` (same syntax as `PATH`) for `program`.
///
/// Returns the first candidate that is an executable regular file.
pub fn find_in_path(program: &str, path_var: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(path_var)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

/// Run `<path> --version` and return the first line of its output,
/// e.g. `pandoc 3.1.11`.
pub fn engine_version(path: &Path) -> Result<String, LocateError> {
    let output = Command::new(path)
        .arg("--version")
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .map_err(|e| LocateError::Version {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(LocateError::Version {
            path: path.to_path_buf(),
            reason: format!("exit status {}", output.status),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
        .ok_or_else(|| LocateError::Version {
            path: path.to_path_buf(),
            reason: "empty --version output".to_string(),
        })
}

// ── Internal helpers ─────────────────────────────────────────────────────────

fn resolve_uncached() -> Result<PathBuf, LocateError> {
    // 1. Environment variable override.
    if let Some(raw) = std::env::var_os(PANDOC_ENV_OVERRIDE) {
        if !raw.is_empty() {
            let p = PathBuf::from(raw);
            if is_executable(&p) {
                return Ok(p);
            }
            return Err(LocateError::InvalidOverride { path: p });
        }
    }

    // 2. PATH search.
    let path_var = std::env::var_os("PATH").unwrap_or_default();
    find_in_path(PANDOC_PROGRAM, &path_var).ok_or_else(|| LocateError::NotFound {
        program: PANDOC_PROGRAM.to_string(),
    })
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
