//! Input resolution: load an archive blob from disk.
//!
//! The orchestrator works on an in-memory [`Archive`]; front-ends that receive
//! uploads construct one directly with [`Archive::new`]. This module covers
//! the CLI path, mapping the common "file missing / unreadable" cases to
//! specific errors instead of a bare I/O failure.

use crate::error::Md2PdfError;
use std::path::Path;
use tracing::debug;

/// An archive blob with the name it was delivered under.
#[derive(Clone)]
pub struct Archive {
    name: String,
    bytes: Vec<u8>,
}

impl Archive {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Declared name, used in error messages and logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for Archive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Read an archive from a local path.
///
/// The archive name is the path's file name. Content is not validated here;
/// [`crate::pipeline::extract`] decides whether it is a usable container.
pub async fn load_archive(path: &Path) -> Result<Archive, Md2PdfError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Md2PdfError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => Md2PdfError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => Md2PdfError::Internal(format!("Failed to read '{}': {}", path.display(), e)),
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "archive.zip".to_string());

    debug!("Loaded archive {} ({} bytes)", name, bytes.len());
    Ok(Archive::new(name, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_is_file_not_found() {
        let err = load_archive(Path::new("/definitely/not/here.zip"))
            .await
            .unwrap_err();
        assert!(matches!(err, Md2PdfError::FileNotFound { .. }), "got: {err}");
    }

    #[tokio::test]
    async fn loads_bytes_and_name() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bundle.zip");
        std::fs::write(&path, b"PK\x05\x06").unwrap();

        let archive = load_archive(&path).await.unwrap();
        assert_eq!(archive.name(), "bundle.zip");
        assert_eq!(archive.len(), 4);
    }

    #[test]
    fn debug_omits_payload() {
        let archive = Archive::new("a.zip", vec![0u8; 3]);
        assert_eq!(format!("{archive:?}"), r#"Archive { name: "a.zip", len: 3 }"#);
    }
}
