//! Diagnostic classification: decide whether engine stderr is a known-benign warning.
//!
//! pandoc exits non-zero for several conditions that still leave a usable
//! PDF behind, most commonly a missing `rsvg-convert` helper or a LaTeX
//! `keyval` complaint about a geometry key. The patterns below are checked in
//! order; the first match wins. Anything unrecognised is fatal.

use once_cell::sync::Lazy;
use regex::Regex;

/// A named, known-benign diagnostic pattern.
#[derive(Debug)]
pub struct BenignPattern {
    /// Stable identifier used in logs and errors.
    pub name: &'static str,
    regex: Regex,
}

impl BenignPattern {
    fn new(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            regex: Regex::new(pattern).unwrap(),
        }
    }

    pub fn is_match(&self, diagnostic: &str) -> bool {
        self.regex.is_match(diagnostic)
    }
}

static BENIGN_PATTERNS: Lazy<Vec<BenignPattern>> = Lazy::new(|| {
    vec![
        BenignPattern::new(
            "svg-converter-missing",
            r"(?i)check that rsvg-convert is in path|rsvg-convert: (?:createProcess:.*does not exist|(?:command )?not found)",
        ),
        BenignPattern::new(
            "geometry-key-undefined",
            r"Package keyval Error: .* undefined",
        ),
        BenignPattern::new(
            "svg-conversion-skipped",
            r"(?i)Could not convert image .*\.svg",
        ),
    ]
});

/// The fixed pattern list, in match order.
pub fn benign_patterns() -> &'static [BenignPattern] {
    &BENIGN_PATTERNS
}

/// First benign pattern that matches `diagnostic`, if any.
pub fn matching_pattern(diagnostic: &str) -> Option<&'static BenignPattern> {
    BENIGN_PATTERNS.iter().find(|p| p.is_match(diagnostic))
}

/// `true` if `diagnostic` matches a known-benign pattern.
pub fn is_ignorable(diagnostic: &str) -> bool {
    matching_pattern(diagnostic).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_rsvg_convert_is_ignorable() {
        let stderr = "[WARNING] Could not convert image /tmp/x/diagram.svg: check that rsvg-convert is in path.\nrsvg-convert: createProcess: posix_spawnp: does not exist (No such file or directory)";
        assert!(is_ignorable(stderr));
        assert_eq!(matching_pattern(stderr).unwrap().name, "svg-converter-missing");
    }

    #[test]
    fn geometry_keyval_error_is_ignorable() {
        let stderr = "Error producing PDF.\n! Package keyval Error: ` bottom' undefined.\n\nSee the keyval package documentation for explanation.";
        assert_eq!(
            matching_pattern(stderr).map(|p| p.name),
            Some("geometry-key-undefined")
        );
    }

    #[test]
    fn svg_conversion_warning_is_ignorable() {
        let stderr = "[WARNING] Could not convert image 'figs/arch.svg': conversion from SVG failed";
        assert_eq!(
            matching_pattern(stderr).map(|p| p.name),
            Some("svg-conversion-skipped")
        );
    }

    #[test]
    fn unknown_diagnostics_are_fatal() {
        for stderr in [
            "",
            "Error producing PDF.\n! Undefined control sequence.\nl.42 \\foo",
            "pandoc: readme.md: openBinaryFile: does not exist",
            "pdflatex not found. Please select a different --pdf-engine or install pdflatex",
        ] {
            assert!(!is_ignorable(stderr), "should be fatal: {stderr:?}");
        }
    }

    #[test]
    fn classification_is_total_over_arbitrary_text() {
        let fragments = [
            "",
            "\0",
            "\u{feff}",
            "Überschrift fehlt: ä ö ü ß",
            "エラー: 画像を変換できません",
            "🦀 rsvg",
            "\r\n\t",
            "Could not convert image",
            "keyval Error",
            ".svg",
            "[WARNING]",
            "(((",
            "\\undefined",
        ];
        for a in fragments {
            for b in fragments {
                let text = format!("{a}{b}\n{a}");
                // Must not panic, and the two entry points agree.
                assert_eq!(is_ignorable(&text), matching_pattern(&text).is_some());
                assert_eq!(is_ignorable(&text), is_ignorable(&text));
            }
        }
        let long = "! Überfull \\hbox ".repeat(10_000);
        assert!(!is_ignorable(&long));
    }

    #[test]
    fn first_pattern_wins_when_several_match() {
        let stderr = "Could not convert image a.svg: check that rsvg-convert is in path\n! Package keyval Error: `x' undefined.";
        assert_eq!(matching_pattern(stderr).unwrap().name, "svg-converter-missing");
    }

    #[test]
    fn pattern_names_are_unique() {
        let mut names: Vec<_> = benign_patterns().iter().map(|p| p.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), benign_patterns().len());
    }
}
