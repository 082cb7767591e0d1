//! Archive extraction: validate a ZIP blob and unpack it into a [`WorkingSet`].
//!
//! The container is parsed before any directory is created, so a malformed
//! archive leaves nothing behind. Once parsing succeeds, entries are written
//! under a uniquely named temporary directory:
//!
//! ```text
//! md2pdf-batch-XXXXXX/
//!  ├─ source/   extracted archive entries (documents + images)
//!  └─ output/   rendered files, one per slot
//! ```
//!
//! The directory lives exactly as long as the [`WorkingSet`]; dropping or
//! [closing](WorkingSet::close) it removes the whole tree.

use crate::config::BatchConfig;
use crate::error::ExtractionError;
use crate::pipeline::input::Archive;
use std::fs::{self, File};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::ZipArchive;

/// Prefix of every per-batch working directory.
pub const WORKING_SET_PREFIX: &str = "md2pdf-batch-";

/// Folder created by macOS Finder when zipping; never contains real documents.
const MACOS_RESOURCE_DIR: &str = "__MACOSX";

/// An isolated, exclusively owned extraction scope for one batch.
#[derive(Debug)]
pub struct WorkingSet {
    dir: TempDir,
    root: PathBuf,
    documents: Vec<SourceDocument>,
}

impl WorkingSet {
    /// Absolute path of the working directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the extracted archive entries.
    pub fn source_dir(&self) -> PathBuf {
        self.root.join("source")
    }

    /// Directory receiving rendered outputs.
    pub fn output_dir(&self) -> PathBuf {
        self.root.join("output")
    }

    /// Discovered documents, in slot order.
    pub fn documents(&self) -> &[SourceDocument] {
        &self.documents
    }

    /// Remove the working directory, reporting any failure.
    pub fn close(self) -> std::io::Result<()> {
        self.dir.close()
    }
}

/// A text document discovered inside a [`WorkingSet`].
#[derive(Debug, Clone)]
pub struct SourceDocument {
    relative_path: PathBuf,
    path: PathBuf,
    raw_text: String,
}

impl SourceDocument {
    pub(crate) fn new(relative_path: PathBuf, path: PathBuf, raw_text: String) -> Self {
        Self {
            relative_path,
            path,
            raw_text,
        }
    }

    /// Path relative to the archive root, e.g. `guides/setup.md`.
    pub fn relative_path(&self) -> &Path {
        &self.relative_path
    }

    /// Absolute path of the extracted file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory containing the document; relative image links resolve here.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or(&self.path)
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }
}

/// Validate `archive`, unpack it, and enumerate its source documents.
///
/// Blocking: call from `spawn_blocking` inside async code.
///
/// # Errors
/// - [`ExtractionError::Malformed`]: empty, not a ZIP, or a corrupt entry.
/// - [`ExtractionError::TooLarge`]: entry count or size over the limits.
/// - [`ExtractionError::NoDocuments`]: nothing matches the document suffix.
/// - [`ExtractionError::Io`]: the extracted tree could not be written or read.
pub fn extract(archive: &Archive, config: &BatchConfig) -> Result<WorkingSet, ExtractionError> {
    let malformed = |detail: String| ExtractionError::Malformed {
        archive: archive.name().to_string(),
        detail,
    };

    // ── Validate the container before touching the filesystem ────────────
    let bytes = archive.bytes();
    if bytes.is_empty() {
        return Err(malformed("archive is empty".into()));
    }
    if !bytes.starts_with(b"PK") {
        let head = &bytes[..bytes.len().min(4)];
        return Err(malformed(format!("missing ZIP signature, first bytes: {head:02x?}")));
    }

    let mut zip = ZipArchive::new(Cursor::new(bytes)).map_err(|e| malformed(e.to_string()))?;

    if zip.len() > config.max_entries {
        return Err(ExtractionError::TooLarge {
            archive: archive.name().to_string(),
            detail: format!("{} entries (limit {})", zip.len(), config.max_entries),
        });
    }

    // ── Create the working directory ─────────────────────────────────────
    let dir = create_working_dir(config)?;
    let root = std::path::absolute(dir.path()).map_err(|e| ExtractionError::Io {
        path: dir.path().to_path_buf(),
        source: e,
    })?;
    let source_root = root.join("source");
    for sub in [&source_root, &root.join("output")] {
        fs::create_dir_all(sub).map_err(|e| io_error(sub, e))?;
    }
    debug!("Working set created at {}", root.display());

    // ── Unpack entries ───────────────────────────────────────────────────
    let mut total_bytes: u64 = 0;
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|e| malformed(e.to_string()))?;

        let Some(relative) = entry.enclosed_name() else {
            warn!("Skipping archive entry with unsafe path: {}", entry.name());
            continue;
        };
        let target = source_root.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(|e| io_error(&target, e))?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }
        let remaining = config.max_extracted_bytes.saturating_sub(total_bytes);
        total_bytes += copy_entry(&mut entry, &target, remaining, &malformed)?;

        if total_bytes > config.max_extracted_bytes {
            return Err(ExtractionError::TooLarge {
                archive: archive.name().to_string(),
                detail: format!(
                    "more than {} uncompressed bytes",
                    config.max_extracted_bytes
                ),
            });
        }
    }

    // ── Discover documents ───────────────────────────────────────────────
    let documents = discover_documents(&source_root, &config.document_suffix)?;
    if documents.is_empty() {
        // Dropping `dir` removes the partial tree.
        return Err(ExtractionError::NoDocuments {
            archive: archive.name().to_string(),
            suffix: config.document_suffix.clone(),
        });
    }

    info!(
        "Extracted '{}': {} entries, {} bytes, {} documents",
        archive.name(),
        zip.len(),
        total_bytes,
        documents.len()
    );

    Ok(WorkingSet {
        dir,
        root,
        documents,
    })
}

/// Recursively list files under `source_root` whose extension equals
/// `suffix` (ASCII case-insensitive), sorted by relative path.
pub fn discover_documents(
    source_root: &Path,
    suffix: &str,
) -> Result<Vec<SourceDocument>, ExtractionError> {
    let mut found = Vec::new();

    let walker = WalkDir::new(source_root)
        .into_iter()
        .filter_entry(|e| e.file_name() != MACOS_RESOURCE_DIR);

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(source_root).to_path_buf();
            ExtractionError::Io {
                path,
                source: e.into(),
            }
        })?;

        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(suffix));
        if matches {
            found.push(entry.into_path());
        }
    }

    // Stable slot numbering regardless of filesystem traversal order.
    found.sort();

    found
        .into_iter()
        .map(|path| {
            let relative_path = path
                .strip_prefix(source_root)
                .unwrap_or(&path)
                .to_path_buf();
            let raw = fs::read(&path).map_err(|e| io_error(&path, e))?;
            let raw_text = match String::from_utf8(raw) {
                Ok(s) => s,
                Err(e) => {
                    warn!(
                        "{} is not valid UTF-8; invalid sequences replaced",
                        relative_path.display()
                    );
                    String::from_utf8_lossy(e.as_bytes()).into_owned()
                }
            };
            Ok(SourceDocument::new(relative_path, path, raw_text))
        })
        .collect()
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn create_working_dir(config: &BatchConfig) -> Result<TempDir, ExtractionError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(WORKING_SET_PREFIX);

    match &config.work_root {
        Some(root) => {
            fs::create_dir_all(root).map_err(|e| io_error(root, e))?;
            builder.tempdir_in(root).map_err(|e| io_error(root, e))
        }
        None => builder
            .tempdir()
            .map_err(|e| io_error(&std::env::temp_dir(), e)),
    }
}

/// Stream one entry to `target`, reading at most `limit + 1` bytes so an
/// oversized entry is detected without inflating it completely.
fn copy_entry<R: Read>(
    entry: &mut R,
    target: &Path,
    limit: u64,
    malformed: &impl Fn(String) -> ExtractionError,
) -> Result<u64, ExtractionError> {
    let mut out = File::create(target).map_err(|e| io_error(target, e))?;
    let mut reader = entry.by_ref().take(limit.saturating_add(1));
    let mut chunk = vec![0u8; 64 * 1024];
    let mut written: u64 = 0;

    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            // Read errors come from decompression or CRC checks.
            Err(e) => return Err(malformed(format!("{}: {e}", target.display()))),
        };
        out.write_all(&chunk[..n]).map_err(|e| io_error(target, e))?;
        written += n as u64;
    }

    Ok(written)
}

fn io_error(path: &Path, source: std::io::Error) -> ExtractionError {
    ExtractionError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn config_in(root: &Path) -> BatchConfig {
        BatchConfig::builder().work_root(root).build().unwrap()
    }

    fn is_empty_dir(path: &Path) -> bool {
        fs::read_dir(path).unwrap().next().is_none()
    }

    #[test]
    fn discovers_documents_sorted_and_case_insensitive() {
        let work = TempDir::new().unwrap();
        let archive = Archive::new(
            "docs.zip",
            zip_bytes(&[
                ("zeta.md", "# Z"),
                ("guides/intro.MD", "# Intro"),
                ("alpha.md", "# A"),
                ("img/logo.png", "not really a png"),
                ("notes.txt", "ignored"),
            ]),
        );

        let ws = extract(&archive, &config_in(work.path())).unwrap();
        let names: Vec<_> = ws
            .documents()
            .iter()
            .map(|d| d.relative_path().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["alpha.md", "guides/intro.MD", "zeta.md"]);
        assert_eq!(ws.documents()[0].raw_text(), "# A");
        assert!(ws.source_dir().join("img/logo.png").exists());
        assert!(ws.output_dir().is_dir());
    }

    #[test]
    fn truncated_archive_is_malformed_and_creates_nothing() {
        let work = TempDir::new().unwrap();
        let mut bytes = zip_bytes(&[("readme.md", "# Hello")]);
        bytes.truncate(bytes.len() / 2);

        let err = extract(&Archive::new("cut.zip", bytes), &config_in(work.path())).unwrap_err();
        assert!(matches!(err, ExtractionError::Malformed { .. }), "got: {err}");
        assert!(is_empty_dir(work.path()));
    }

    #[test]
    fn empty_and_non_zip_bytes_are_malformed() {
        let config = BatchConfig::default();
        for bytes in [Vec::new(), b"%PDF-1.7".to_vec()] {
            let err = extract(&Archive::new("x.zip", bytes), &config).unwrap_err();
            assert!(matches!(err, ExtractionError::Malformed { .. }), "got: {err}");
        }
    }

    #[test]
    fn archive_without_documents_is_rejected_and_cleaned() {
        let work = TempDir::new().unwrap();
        let archive = Archive::new("pics.zip", zip_bytes(&[("a.png", "x"), ("b.txt", "y")]));

        let err = extract(&archive, &config_in(work.path())).unwrap_err();
        assert!(matches!(err, ExtractionError::NoDocuments { .. }), "got: {err}");
        assert!(is_empty_dir(work.path()));
    }

    #[test]
    fn macos_resource_forks_are_not_documents() {
        let work = TempDir::new().unwrap();
        let archive = Archive::new(
            "mac.zip",
            zip_bytes(&[("readme.md", "# Real"), ("__MACOSX/._readme.md", "\0\0")]),
        );

        let ws = extract(&archive, &config_in(work.path())).unwrap();
        assert_eq!(ws.documents().len(), 1);
        assert_eq!(ws.documents()[0].relative_path(), Path::new("readme.md"));
    }

    #[test]
    fn oversized_archive_is_too_large() {
        let work = TempDir::new().unwrap();
        let body = "x".repeat(100);
        let archive = Archive::new("big.zip", zip_bytes(&[("big.md", &body)]));
        let config = BatchConfig::builder()
            .work_root(work.path())
            .max_extracted_bytes(10)
            .build()
            .unwrap();

        let err = extract(&archive, &config).unwrap_err();
        assert!(matches!(err, ExtractionError::TooLarge { .. }), "got: {err}");
        assert!(is_empty_dir(work.path()));
    }

    #[test]
    fn too_many_entries_is_too_large() {
        let archive = Archive::new("many.zip", zip_bytes(&[("a.md", "a"), ("b.md", "b")]));
        let config = BatchConfig::builder().max_entries(1).build().unwrap();
        let err = extract(&archive, &config).unwrap_err();
        assert!(matches!(err, ExtractionError::TooLarge { .. }), "got: {err}");
    }

    #[test]
    fn close_removes_working_directory() {
        let work = TempDir::new().unwrap();
        let archive = Archive::new("one.zip", zip_bytes(&[("one.md", "# One")]));
        let ws = extract(&archive, &config_in(work.path())).unwrap();
        let root = ws.root().to_path_buf();
        assert!(root.starts_with(std::path::absolute(work.path()).unwrap()));
        assert!(root
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(WORKING_SET_PREFIX));

        ws.close().unwrap();
        assert!(!root.exists());
    }
}
