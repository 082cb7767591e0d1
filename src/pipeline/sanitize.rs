//! Content sanitization: strip Markdown constructs the renderer should not see.
//!
//! Source documents collected from repositories and notebooks routinely carry
//! two things the LaTeX backend handles badly:
//!
//! - **Badge links** such as `[![Open In Colab](…/colab-badge.svg)](…)` or
//!   shields.io status badges. They are remote SVGs wrapped in a link and
//!   render as broken boxes at best.
//! - **SVG images**. Converting them needs an optional helper
//!   (`rsvg-convert`) that is frequently missing, and its absence fails the
//!   whole render.
//!
//! Both are removed outright. Images become absent, never replaced with a
//! placeholder. Every rule is a pure `&str → String` pass, so
//! [`sanitize`] is deterministic and a document without any marker comes back
//! byte-for-byte unchanged.
//!
//! ## Rule Order
//!
//! Linked images run first. A badge is an SVG image nested in a link, and
//! so is a linked diagram such as `[![arch](arch.svg)](docs/arch.md)`.
//! Stripping the image first would leave an empty `[](…)` link behind, so
//! rule 1 removes the whole link whenever the nested image is a badge or an
//! SVG.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashSet;

/// Text ready for the renderer. Never written back over the source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedText {
    text: String,
    removed_badges: usize,
    removed_images: usize,
}

impl SanitizedText {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    /// Number of badge links removed.
    pub fn removed_badges(&self) -> usize {
        self.removed_badges
    }

    /// Number of SVG image references removed (inline, HTML, and reference-style).
    pub fn removed_images(&self) -> usize {
        self.removed_images
    }

    /// `true` when no rule changed the input.
    pub fn is_unchanged(&self) -> bool {
        self.removed_badges == 0 && self.removed_images == 0
    }
}

/// Apply all sanitization rules to a document's raw text.
///
/// Rules (applied in order):
/// 1. Remove linked images whose image is a badge or an SVG (`[![alt](badge.svg)](target)`)
/// 2. Remove inline SVG image embeds (`![alt](figure.svg "title"){width=50%}`)
/// 3. Remove HTML `<img>` tags pointing at SVG files
/// 4. Remove reference-style SVG images and their `[id]: file.svg` definitions
pub fn sanitize(raw: &str) -> SanitizedText {
    let (s, removed_badges, linked) = remove_linked_images(raw);
    let (s, inline) = remove_inline_svg_images(&s);
    let (s, html) = remove_html_svg_images(&s);
    let (text, reference) = remove_reference_svg_images(&s);

    SanitizedText {
        text,
        removed_badges,
        removed_images: linked + inline + html + reference,
    }
}

// ── Shared helpers ───────────────────────────────────────────────────────────

/// Hosts and path fragments that identify a status badge.
const BADGE_MARKERS: &[&str] = &[
    "colab-badge.svg",
    "img.shields.io",
    "badge.fury.io",
    "badgen.net",
    "/badge.svg",
];

fn is_badge_url(url: &str) -> bool {
    let u = url.to_ascii_lowercase();
    BADGE_MARKERS.iter().any(|m| u.contains(m))
}

/// `true` when the link target names an `.svg` file, ignoring query and fragment.
fn is_svg_target(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.to_ascii_lowercase().ends_with(".svg")
}

// ── Rule 1: Linked badges and SVGs ──────────────────────────────────────────────────────

static RE_LINKED_IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\[!\[[^\]]*\]\(\s*<?([^)\s>]+)>?(?:\s+"[^"]*")?\s*\)\]\([^)]*\)"#).unwrap()
});

/// Returns the text plus the number of badges and of other SVG images removed.
fn remove_linked_images(input: &str) -> (String, usize, usize) {
    let mut badges = 0;
    let mut images = 0;
    let out = RE_LINKED_IMAGE.replace_all(input, |caps: &Captures<'_>| {
        if is_badge_url(&caps[1]) {
            badges += 1;
            String::new()
        } else if is_svg_target(&caps[1]) {
            images += 1;
            String::new()
        } else {
            caps[0].to_string()
        }
    });
    (out.into_owned(), badges, images)
}

// ── Rule 2: Inline SVG images ────────────────────────────────────────────────
//
// Matches the optional title and a trailing pandoc attribute block so that
// `![a](x.svg){width=40%}` does not leave `{width=40%}` behind as text.

static RE_INLINE_IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"!\[[^\]]*\]\(\s*<?([^)\s>]+)>?(?:\s+(?:"[^"]*"|'[^']*'))?\s*\)(?:\{[^}\n]*\})?"#,
    )
    .unwrap()
});

fn remove_inline_svg_images(input: &str) -> (String, usize) {
    let mut removed = 0;
    let out = RE_INLINE_IMAGE.replace_all(input, |caps: &Captures<'_>| {
        if is_svg_target(&caps[1]) {
            removed += 1;
            String::new()
        } else {
            caps[0].to_string()
        }
    });
    (out.into_owned(), removed)
}

// ── Rule 3: HTML <img> tags ──────────────────────────────────────────────────

static RE_HTML_IMG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<img\b[^>]*?\bsrc\s*=\s*["']?([^"'\s>]+)["']?[^>]*>"#).unwrap()
});

fn remove_html_svg_images(input: &str) -> (String, usize) {
    let mut removed = 0;
    let out = RE_HTML_IMG.replace_all(input, |caps: &Captures<'_>| {
        if is_svg_target(&caps[1]) {
            removed += 1;
            String::new()
        } else {
            caps[0].to_string()
        }
    });
    (out.into_owned(), removed)
}

// ── Rule 4: Reference-style images ───────────────────────────────────────────
//
// `![diagram][arch]` + `[arch]: img/arch.svg "Architecture"`. The definition
// line is dropped entirely; labels compare case-insensitively as in CommonMark.

static RE_REFERENCE_DEF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?m)^ {0,3}\[([^\]]+)\]:[ \t]*<?([^\s>]+)>?(?:[ \t]+(?:"[^"]*"|'[^']*'|\([^)]*\)))?[ \t]*(?:\r?\n|$)"#,
    )
    .unwrap()
});

static RE_REFERENCE_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\[([^\]]*)\]").unwrap());

fn remove_reference_svg_images(input: &str) -> (String, usize) {
    let svg_labels: HashSet<String> = RE_REFERENCE_DEF
        .captures_iter(input)
        .filter(|caps| is_svg_target(&caps[2]))
        .map(|caps| caps[1].trim().to_lowercase())
        .collect();

    if svg_labels.is_empty() {
        return (input.to_string(), 0);
    }

    let mut removed = 0;
    let without_defs = RE_REFERENCE_DEF.replace_all(input, |caps: &Captures<'_>| {
        if is_svg_target(&caps[2]) {
            String::new()
        } else {
            caps[0].to_string()
        }
    });
    let out = RE_REFERENCE_IMAGE.replace_all(&without_defs, |caps: &Captures<'_>| {
        // `![alt][]` is a collapsed reference: the label is the alt text.
        let label = if caps[2].trim().is_empty() {
            &caps[1]
        } else {
            &caps[2]
        };
        if svg_labels.contains(&label.trim().to_lowercase()) {
            removed += 1;
            String::new()
        } else {
            caps[0].to_string()
        }
    });
    (out.into_owned(), removed)
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_colab_badge() {
        let input = "# Notebook\n\n[![Open In Colab](https://colab.research.google.com/assets/colab-badge.svg)](https://colab.research.google.com/github/org/repo/blob/main/nb.ipynb)\n\nBody";
        let out = sanitize(input);
        assert_eq!(out.as_str(), "# Notebook\n\n\n\nBody");
        assert_eq!(out.removed_badges(), 1);
    }

    #[test]
    fn removes_shields_badge_but_keeps_linked_screenshot() {
        let input = "[![build](https://img.shields.io/badge/build-passing-green)](https://ci) [![shot](shot.png)](https://example.org)";
        let out = sanitize(input);
        assert_eq!(out.as_str(), " [![shot](shot.png)](https://example.org)");
        assert_eq!(out.removed_badges(), 1);
        assert_eq!(out.removed_images(), 0);
    }

    #[test]
    fn linked_svg_leaves_no_empty_link() {
        let input = "See [![arch](img/arch.svg)](docs/arch.md) here.";
        let out = sanitize(input);
        assert_eq!(out.as_str(), "See  here.");
        assert!(!out.as_str().contains("[]("));
        assert_eq!((out.removed_badges(), out.removed_images()), (0, 1));
    }

    #[test]
    fn removes_inline_svg_with_title_and_attributes() {
        let input = "Before ![Arch](img/arch.svg \"Architecture\"){width=50%} after";
        assert_eq!(sanitize(input).as_str(), "Before  after");
    }

    #[test]
    fn svg_detection_ignores_case_and_query() {
        assert!(is_svg_target("Diagram.SVG"));
        assert!(is_svg_target("https://host/flow.svg?raw=true"));
        assert!(is_svg_target("flow.svg#layer1"));
        assert!(!is_svg_target("photo.png"));
        assert!(!is_svg_target("svg/photo.png"));
    }

    #[test]
    fn keeps_raster_images() {
        let input = "![Photo](images/photo.png)\n![Chart](chart.jpg \"Q3\")";
        let out = sanitize(input);
        assert_eq!(out.as_str(), input);
        assert!(out.is_unchanged());
    }

    #[test]
    fn removes_html_svg_img_tags() {
        let input = r#"<p><img src="logo.svg" width="80"> and <IMG SRC='photo.png'></p>"#;
        let out = sanitize(input);
        assert_eq!(out.as_str(), r#"<p> and <IMG SRC='photo.png'></p>"#);
        assert_eq!(out.removed_images(), 1);
    }

    #[test]
    fn removes_reference_style_svg_images() {
        let input = "See ![flow][Flow] and ![photo][p].\n\n[flow]: img/flow.svg \"Flow\"\n[p]: img/p.png\n";
        let out = sanitize(input);
        assert_eq!(out.as_str(), "See  and ![photo][p].\n\n[p]: img/p.png\n");
        assert_eq!(out.removed_images(), 1);
    }

    #[test]
    fn collapsed_reference_uses_alt_as_label() {
        let input = "![logo][]\n\n[logo]: logo.svg\n";
        assert_eq!(sanitize(input).as_str(), "\n\n");
    }

    #[test]
    fn text_without_markers_is_unchanged() {
        let input = "# Title\n\nPlain *text* with a [link](https://example.org) and `code`.\n\n| a | b |\n|---|---|\n";
        let out = sanitize(input);
        assert_eq!(out.as_str(), input);
        assert!(out.is_unchanged());
    }

    #[test]
    fn sanitize_is_deterministic() {
        let input = "[![x](https://img.shields.io/x)](y)\n![d](d.svg)\n<img src=\"e.svg\">";
        assert_eq!(sanitize(input), sanitize(input));
        assert_eq!(sanitize(input).as_str(), "\n\n");
    }

    #[test]
    fn badge_and_svg_in_one_readme() {
        let input = "[![Open In Colab](https://colab.research.google.com/assets/colab-badge.svg)](https://colab.research.google.com/x)\n\n# Readme\n\n![diagram](diagram.svg)\n";
        let out = sanitize(input);
        assert!(!out.as_str().contains("colab-badge"));
        assert!(!out.as_str().contains(".svg"));
        assert!(out.as_str().contains("# Readme"));
        assert_eq!((out.removed_badges(), out.removed_images()), (1, 1));
    }
}
