//! Content-preservation checks for localized passages.
//!
//! Code spans and protected technical terms from the original must appear
//! byte-identical in the localized text. Anything else that looks off (URLs,
//! length) is only reported as a warning.

use crate::concepts::Concept;
use regex::Regex;
use std::sync::OnceLock;

/// Outcome of comparing a localized passage with its original.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PreservationReport {
    /// Protected fragments missing from the localized text
    pub errors: Vec<String>,

    /// Non-critical observations
    pub warnings: Vec<String>,
}

impl PreservationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

pub struct PreservationValidator;

static FENCED_BLOCK_REGEX: OnceLock<Regex> = OnceLock::new();
static INLINE_CODE_REGEX: OnceLock<Regex> = OnceLock::new();
static URL_REGEX: OnceLock<Regex> = OnceLock::new();

// Localized prose legitimately grows or shrinks, but not by this much
const MIN_LENGTH_RATIO: f64 = 0.3;
const MAX_LENGTH_RATIO: f64 = 4.0;

impl PreservationValidator {
    /// Check `localized` against `original`.
    ///
    /// Errors: a fenced block, inline code span, or protected concept term
    /// present in the original but not byte-identical in the localized text.
    pub fn validate(original: &str, localized: &str, concepts: &[Concept]) -> PreservationReport {
        let mut report = PreservationReport::new();

        for fragment in Self::protected_fragments(original, concepts) {
            if !localized.contains(fragment.as_str()) {
                report.errors.push(fragment);
            }
        }

        let orig_urls = Self::extract_urls(original);
        let loc_urls = Self::extract_urls(localized);
        if orig_urls.len() != loc_urls.len() {
            report.warnings.push(format!(
                "URL count mismatch: original has {}, localized has {}",
                orig_urls.len(),
                loc_urls.len()
            ));
        }

        let orig_len = original.chars().count();
        if orig_len > 0 {
            let ratio = localized.chars().count() as f64 / orig_len as f64;
            if !(MIN_LENGTH_RATIO..=MAX_LENGTH_RATIO).contains(&ratio) {
                report
                    .warnings
                    .push(format!("Suspicious length ratio {:.2}", ratio));
            }
        }

        report
    }

    /// Every fragment that must survive, deduplicated, in first-seen order.
    pub fn protected_fragments(original: &str, concepts: &[Concept]) -> Vec<String> {
        let blocks = Self::extract_fenced_blocks(original);

        // Inline spans are looked for outside fenced blocks only
        let mut outside = original.to_string();
        for block in &blocks {
            outside = outside.replace(block.as_str(), "\n");
        }
        let inline = Self::extract_inline_code(&outside);

        let terms = concepts
            .iter()
            .filter(|c| c.protected)
            .map(|c| c.text.clone());

        let mut fragments: Vec<String> = Vec::new();
        for fragment in blocks.into_iter().chain(inline).chain(terms) {
            if !fragment.is_empty() && !fragments.contains(&fragment) {
                fragments.push(fragment);
            }
        }
        fragments
    }

    fn extract_fenced_blocks(text: &str) -> Vec<String> {
        let regex = FENCED_BLOCK_REGEX
            .get_or_init(|| Regex::new(r"(?s)```.*?```").expect("fenced block regex is valid"));

        regex.find_iter(text).map(|m| m.as_str().to_string()).collect()
    }

    fn extract_inline_code(text: &str) -> Vec<String> {
        let regex = INLINE_CODE_REGEX
            .get_or_init(|| Regex::new(r"`[^`\n]+`").expect("inline code regex is valid"));

        regex.find_iter(text).map(|m| m.as_str().to_string()).collect()
    }

    fn extract_urls(text: &str) -> Vec<String> {
        let regex = URL_REGEX
            .get_or_init(|| Regex::new(r"https?://[^\s)\]]+").expect("url regex is valid"));

        regex.find_iter(text).map(|m| m.as_str().to_string()).collect()
    }
}
