//! End-to-end integration tests for md2pdf-batch.
//!
//! These tests run the real pandoc and a LaTeX engine. They are gated behind
//! the `E2E_ENABLED` environment variable so they do not run in CI unless
//! explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture
//!
//! To restrict to a specific test:
//!   E2E_ENABLED=1 cargo test --test e2e test_readme_with_badges -- --nocapture

use md2pdf_batch::{convert_archive, Archive, BatchConfig, DiagnosticPolicy, Md2PdfError};
use std::io::{Cursor, Write};
use std::path::PathBuf;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Skip this test unless E2E_ENABLED is set and pandoc can be found.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        match pandoc_locate::locate_pandoc() {
            Ok(p) => p,
            Err(e) => {
                println!("SKIP — {e}");
                return;
            }
        }
    }};
}

fn config(pandoc: PathBuf) -> BatchConfig {
    BatchConfig::builder()
        .pandoc_path(pandoc)
        .render_timeout_secs(300)
        .build()
        .expect("valid config")
}

fn zip_archive(name: &str, entries: &[(&str, &[u8])]) -> Archive {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (path, body) in entries {
        writer.start_file(*path, SimpleFileOptions::default()).unwrap();
        writer.write_all(body).unwrap();
    }
    Archive::new(name, writer.finish().unwrap().into_inner())
}

/// Assert the blob looks like a complete PDF file.
fn assert_pdf(bytes: &[u8], context: &str) {
    assert!(bytes.starts_with(b"%PDF-"), "[{context}] missing PDF header");
    let tail = &bytes[bytes.len().saturating_sub(1024)..];
    assert!(
        tail.windows(5).any(|w| w == b"%%EOF"),
        "[{context}] missing %EOF trailer"
    );
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_engine_version() {
    let pandoc = e2e_skip_unless_ready!();
    let version = pandoc_locate::engine_version(&pandoc).expect("pandoc --version");
    println!("{} → {}", pandoc.display(), version);
    assert!(version.to_lowercase().starts_with("pandoc"));
}

#[tokio::test]
async fn test_two_documents() {
    let pandoc = e2e_skip_unless_ready!();
    let archive = zip_archive(
        "two.zip",
        &[
            (
                "b.md",
                b"# Second\n\nSome *emphasis* and a table:\n\n| a | b |\n|---|---|\n| 1 | 2 |\n"
                    .as_slice(),
            ),
            ("a.md", b"# First\n\nHello, world.\n".as_slice()),
        ],
    );

    let output = convert_archive(archive, &config(pandoc))
        .await
        .expect("batch should succeed");

    assert_eq!(output.slots(), vec![1, 2]);
    assert_eq!(output.documents[0].source, PathBuf::from("a.md"));
    for doc in &output.documents {
        assert_pdf(&doc.bytes, &doc.name);
    }
    println!("{:#?}", output.stats);
}

#[tokio::test]
async fn test_readme_with_badges_and_svg() {
    let pandoc = e2e_skip_unless_ready!();
    let readme = b"[![Open In Colab](https://colab.research.google.com/assets/colab-badge.svg)](https://colab.research.google.com/x)\n\n# Readme\n\n![diagram](diagram.svg)\n\nText after the diagram.\n";
    let archive = zip_archive(
        "repo.zip",
        &[
            ("readme.md", readme.as_slice()),
            (
                "diagram.svg",
                b"<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"10\" height=\"10\"/>"
                    .as_slice(),
            ),
        ],
    );

    let output = convert_archive(archive, &config(pandoc))
        .await
        .expect("sanitized readme should render");

    assert_eq!(output.len(), 1);
    assert_pdf(&output.get("1.pdf").unwrap().bytes, "readme");
    assert_eq!(output.stats.removed_badges, 1);
    assert_eq!(output.stats.removed_images, 1);
}

#[tokio::test]
async fn test_relative_raster_image_resolves() {
    let pandoc = e2e_skip_unless_ready!();
    // 1×1 PNG.
    const PNG: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
        0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0xDA, 0x63, 0x64,
        0x60, 0xF8, 0x5F, 0x0F, 0x00, 0x02, 0x87, 0x01, 0x80, 0xEB, 0x47, 0xBA, 0x92, 0x00, 0x00,
        0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ];
    let archive = zip_archive(
        "images.zip",
        &[
            ("chapter/one.md", b"# One\n\n![dot](img/dot.png)\n".as_slice()),
            ("chapter/img/dot.png", PNG),
        ],
    );

    let output = convert_archive(archive, &config(pandoc))
        .await
        .expect("image beside the document should resolve");

    assert_pdf(&output.get("1.pdf").unwrap().bytes, "chapter/one.md");
}

#[tokio::test]
async fn test_latex_error_aborts_batch() {
    let pandoc = e2e_skip_unless_ready!();
    let archive = zip_archive(
        "broken.zip",
        &[
            ("a.md", b"# Fine\n".as_slice()),
            ("b.md", b"# Broken\n\n\\undefinedcommandxyz\n".as_slice()),
        ],
    );

    let mut cfg = config(pandoc);
    cfg.diagnostic_policy = DiagnosticPolicy::Tolerant;
    let err = convert_archive(archive, &cfg)
        .await
        .expect_err("undefined control sequence must fail");

    println!("{err}");
    assert!(matches!(err, Md2PdfError::Render(_)));
    assert_eq!(err.document(), Some(std::path::Path::new("b.md")));
}
