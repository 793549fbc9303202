//! Keyword and pattern based detection of programming concepts.
//!
//! Detection is pure: the same text always yields the same ordered list of
//! concepts. Overlapping matches are all kept, so a sentence about a
//! "recursive function" reports both recursion and function.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::sync::OnceLock;

/// Kind of programming concept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConceptKind {
    Class,
    Function,
    Recursion,
    DataStructure,
    Algorithm,
    Concurrency,
    Loop,
    Variable,
}

impl ConceptKind {
    pub const ALL: [ConceptKind; 8] = [
        ConceptKind::Class,
        ConceptKind::Function,
        ConceptKind::Recursion,
        ConceptKind::DataStructure,
        ConceptKind::Algorithm,
        ConceptKind::Concurrency,
        ConceptKind::Loop,
        ConceptKind::Variable,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Function => "function",
            Self::Recursion => "recursion",
            Self::DataStructure => "data-structure",
            Self::Algorithm => "algorithm",
            Self::Concurrency => "concurrency",
            Self::Loop => "loop",
            Self::Variable => "variable",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Class => "Classes and objects",
            Self::Function => "Functions",
            Self::Recursion => "Recursion",
            Self::DataStructure => "Data structures",
            Self::Algorithm => "Algorithms",
            Self::Concurrency => "Concurrency",
            Self::Loop => "Loops",
            Self::Variable => "Variables",
        }
    }
}

impl fmt::Display for ConceptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Entry returned by `list_supported_concept_kinds`.
#[derive(Debug, Clone, Serialize)]
pub struct ConceptKindInfo {
    pub kind: ConceptKind,
    pub label: &'static str,
}

pub fn list_supported_concept_kinds() -> Vec<ConceptKindInfo> {
    ConceptKind::ALL
        .into_iter()
        .map(|kind| ConceptKindInfo {
            kind,
            label: kind.label(),
        })
        .collect()
}

/// A concept found in a passage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Concept {
    pub kind: ConceptKind,
    /// Byte offsets into the original text
    pub span: Range<usize>,
    pub confidence: f32,
    /// The matched text, exactly as written
    pub text: String,
    /// Whether the matched text is a technical term that must survive localization
    pub protected: bool,
}

struct Pattern {
    kind: ConceptKind,
    regex: Regex,
    confidence: f32,
    protected: bool,
}

static PATTERNS: OnceLock<Vec<Pattern>> = OnceLock::new();

fn patterns() -> &'static [Pattern] {
    PATTERNS.get_or_init(|| {
        let table: &[(ConceptKind, &str, f32, bool)] = &[
            (ConceptKind::Class, r"(?i)\bclass(?:es)?\b", 0.9, true),
            (ConceptKind::Class, r"(?i)\bobject[- ]oriented\b", 0.8, true),
            (
                ConceptKind::Class,
                r"(?i)\b(?:inheritance|subclass(?:es)?|constructors?)\b",
                0.75,
                true,
            ),
            (ConceptKind::Function, r"(?i)\bfunctions?\b", 0.85, true),
            (ConceptKind::Function, r"(?i)\b(?:methods?|subroutines?)\b", 0.7, true),
            (ConceptKind::Function, r"\b(?:def|fn|func)\s+\w+\s*\(", 0.9, false),
            (ConceptKind::Function, r"(?i)\breturn(?:s|ed)?\b", 0.5, false),
            (ConceptKind::Recursion, r"(?i)\brecursi(?:on|ve|vely)\b", 0.95, true),
            (ConceptKind::Recursion, r"(?i)\bbase case\b", 0.85, true),
            (ConceptKind::Recursion, r"(?i)\bcalls itself\b", 0.9, false),
            (ConceptKind::DataStructure, r"(?i)\bdata structures?\b", 0.95, true),
            (
                ConceptKind::DataStructure,
                r"(?i)\b(?:arrays?|linked lists?|stacks?|queues?|hash ?maps?|hash tables?|dictionar(?:y|ies)|binary trees?|heaps?)\b",
                0.8,
                true,
            ),
            (ConceptKind::DataStructure, r"(?i)\b(?:trees?|graphs?)\b", 0.6, false),
            (ConceptKind::Algorithm, r"(?i)\balgorithms?\b", 0.95, true),
            (
                ConceptKind::Algorithm,
                r"(?i)\b(?:binary search|dynamic programming|big[- ]o|time complexity|merge sort|quick ?sort)\b",
                0.85,
                true,
            ),
            (ConceptKind::Algorithm, r"(?i)\bsort(?:ing|ed)?\b", 0.6, false),
            (
                ConceptKind::Concurrency,
                r"(?i)\b(?:concurren(?:cy|t)|parallelism|multithreading|mutex(?:es)?|race conditions?|deadlocks?)\b",
                0.9,
                true,
            ),
            (
                ConceptKind::Concurrency,
                r"(?i)\b(?:threads?|async|await|locks?)\b",
                0.7,
                false,
            ),
            (ConceptKind::Loop, r"(?i)\b(?:for|while) loops?\b", 0.9, true),
            (ConceptKind::Loop, r"(?i)\bloops?\b", 0.8, true),
            (ConceptKind::Loop, r"(?i)\biterat(?:e|es|ion|ions|ing)\b", 0.7, false),
            (ConceptKind::Variable, r"(?i)\bvariables?\b", 0.85, true),
            (ConceptKind::Variable, r"(?i)\b(?:assignment|constants?)\b", 0.6, false),
        ];

        table
            .iter()
            .map(|(kind, pattern, confidence, protected)| Pattern {
                kind: *kind,
                regex: Regex::new(pattern).expect("concept patterns are valid regexes"),
                confidence: *confidence,
                protected: *protected,
            })
            .collect()
    })
}

/// Stateless concept detector.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConceptDetector;

impl ConceptDetector {
    pub fn new() -> Self {
        Self
    }

    /// Detect concepts ordered by position. An empty result is not an error.
    pub fn detect(&self, text: &str) -> Vec<Concept> {
        let mut concepts: Vec<Concept> = patterns()
            .iter()
            .flat_map(|pattern| {
                pattern.regex.find_iter(text).map(move |m| Concept {
                    kind: pattern.kind,
                    span: m.start()..m.end(),
                    confidence: pattern.confidence,
                    text: m.as_str().to_string(),
                    protected: pattern.protected,
                })
            })
            .collect();

        // Two patterns of the same kind may hit the same span ("for loop" and
        // "loop" do not, but "for loops" and "loops" overlap); keep both.
        concepts.sort_by(|a, b| {
            a.span
                .start
                .cmp(&b.span.start)
                .then(a.span.end.cmp(&b.span.end))
                .then(a.kind.cmp(&b.kind))
        });
        concepts
    }

    /// Concept that drives the metaphor: highest confidence, earliest on ties.
    pub fn primary<'a>(&self, concepts: &'a [Concept]) -> Option<&'a Concept> {
        concepts.iter().fold(None, |best: Option<&Concept>, c| match best {
            Some(b) if b.confidence >= c.confidence => Some(b),
            _ => Some(c),
        })
    }

    /// Distinct kinds in order of first appearance.
    pub fn kinds(&self, concepts: &[Concept]) -> Vec<ConceptKind> {
        let mut kinds = Vec::new();
        for concept in concepts {
            if !kinds.contains(&concept.kind) {
                kinds.push(concept.kind);
            }
        }
        kinds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn detect(text: &str) -> Vec<Concept> {
        ConceptDetector::new().detect(text)
    }

    // ==================== Detection ====================

    #[test]
    fn test_detects_recursion() {
        let concepts = detect("Recursion is when a function calls itself.");
        let kinds = ConceptDetector.kinds(&concepts);
        assert_eq!(kinds, vec![ConceptKind::Recursion, ConceptKind::Function]);
    }

    #[test]
    fn test_spans_point_at_matched_text() {
        let text = "A class bundles data.";
        let concepts = detect(text);
        assert_eq!(concepts.len(), 1);
        assert_eq!(&text[concepts[0].span.clone()], "class");
        assert_eq!(concepts[0].text, "class");
        assert!(concepts[0].protected);
    }

    #[test]
    fn test_overlapping_concepts_are_kept() {
        let concepts = detect("Use a recursive function");
        assert!(concepts.iter().any(|c| c.kind == ConceptKind::Recursion));
        assert!(concepts.iter().any(|c| c.kind == ConceptKind::Function));
    }

    #[test]
    fn test_same_span_from_two_patterns() {
        let concepts = detect("Write a for loop");
        let loops: Vec<_> = concepts
            .iter()
            .filter(|c| c.kind == ConceptKind::Loop)
            .collect();
        assert_eq!(loops.len(), 2);
        assert_eq!(loops[0].text, "for loop");
        assert_eq!(loops[1].text, "loop");
    }

    #[test]
    fn test_no_concepts_in_plain_prose() {
        assert!(detect("The weather in Chennai is warm today.").is_empty());
        assert!(detect("").is_empty());
    }

    #[test]
    fn test_ordered_by_position() {
        let concepts = detect("A variable inside a loop inside a class");
        let starts: Vec<usize> = concepts.iter().map(|c| c.span.start).collect();
        let mut sorted = starts.clone();
        sorted.sort();
        assert_eq!(starts, sorted);
        assert_eq!(concepts[0].kind, ConceptKind::Variable);
    }

    #[test]
    fn test_code_signature_detected() {
        let concepts = detect("```python\ndef fact(n):\n    return 1\n```");
        assert!(concepts.iter().any(|c| c.kind == ConceptKind::Function && !c.protected));
    }

    // ==================== Primary concept ====================

    #[test]
    fn test_primary_prefers_confidence() {
        let concepts = detect("This function uses recursion");
        let primary = ConceptDetector.primary(&concepts).unwrap();
        assert_eq!(primary.kind, ConceptKind::Recursion);
    }

    #[test]
    fn test_primary_breaks_ties_by_position() {
        let concepts = detect("data structure and algorithm");
        let primary = ConceptDetector.primary(&concepts).unwrap();
        assert_eq!(primary.kind, ConceptKind::DataStructure);
    }

    #[test]
    fn test_primary_of_empty_is_none() {
        assert!(ConceptDetector.primary(&[]).is_none());
    }

    #[test]
    fn test_list_supported_concept_kinds() {
        let kinds = list_supported_concept_kinds();
        assert_eq!(kinds.len(), 8);
        assert_eq!(kinds[3].kind.slug(), "data-structure");
        let json = serde_json::to_string(&kinds[3]).unwrap();
        assert!(json.contains("\"data-structure\""));
    }

    proptest! {
        #[test]
        fn prop_detection_is_deterministic(text in "[a-zA-Z ,.]{0,200}") {
            let first = detect(&text);
            let second = detect(&text);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_spans_are_in_bounds(text in "(class|loop|array|thread|[a-z ]){0,40}") {
            for concept in detect(&text) {
                prop_assert!(concept.span.end <= text.len());
                prop_assert_eq!(&text[concept.span.clone()], concept.text.as_str());
            }
        }
    }
}
