//! Prompt assembly: preservation directive, category seed, exemplars and the passage.

use crate::concepts::{Concept, ConceptKind};
use crate::culture::templates::{self, TEMPLATE_VERSION};
use crate::culture::{CategoryRegistry, CulturalCategory};
use crate::error::LocalizeError;
use crate::i18n::Language;

/// Which exemplar set a prompt was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateSource {
    /// Exemplars written for this (concept, category) pair
    Exact,
    /// Category-neutral exemplars, used when the pair has none
    Generic,
}

/// Provider-agnostic prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPayload {
    pub system: String,
    pub user: String,
    pub concept: ConceptKind,
    pub category: CulturalCategory,
    pub source: TemplateSource,
    pub template_version: &'static str,
}

impl PromptPayload {
    /// Rough size of the prompt in characters, for token estimates.
    pub fn char_len(&self) -> usize {
        self.system.chars().count() + self.user.chars().count()
    }
}

const PRESERVATION_DIRECTIVE: &str = r#"## Preservation Rules

### NEVER change:
- Anything inside ``` fenced code blocks, character for character
- Anything inside `inline code`
- Technical terms (function, class, recursion, algorithm, ...) - keep them in English, spelled exactly as in the original
- Identifiers, numbers, URLs

### DO adapt:
- Examples, analogies and metaphors
- Connecting sentences that explain the concept

### Formatting:
- Preserve markdown structure (headers, lists, code fences)
- Do not add a preamble or closing remarks; return only the rewritten passage"#;

/// Builds prompts from the static template table. Never calls out.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build a prompt from the exemplars for `(concept.kind, category)`.
    ///
    /// Fails with `TemplateMissing` when the table has no entry for the pair.
    pub fn build(
        &self,
        concept: &Concept,
        category: CulturalCategory,
        language: Language,
        passage: &str,
    ) -> Result<PromptPayload, LocalizeError> {
        let template = templates::lookup(concept.kind, category).ok_or_else(|| {
            LocalizeError::TemplateMissing {
                concept: concept.kind.slug().to_string(),
                category: category.slug().to_string(),
            }
        })?;

        Ok(self.assemble(
            concept,
            category,
            language,
            passage,
            template.exemplars,
            TemplateSource::Exact,
        ))
    }

    /// Build a prompt from the category-neutral exemplars for the concept.
    pub fn build_generic(
        &self,
        concept: &Concept,
        category: CulturalCategory,
        language: Language,
        passage: &str,
    ) -> PromptPayload {
        self.assemble(
            concept,
            category,
            language,
            passage,
            templates::generic(concept.kind),
            TemplateSource::Generic,
        )
    }

    fn assemble(
        &self,
        concept: &Concept,
        category: CulturalCategory,
        language: Language,
        passage: &str,
        exemplars: &[&str],
        source: TemplateSource,
    ) -> PromptPayload {
        let seed = CategoryRegistry::get().seed(category);
        let examples = exemplars
            .iter()
            .enumerate()
            .map(|(i, e)| format!("{}. {}", i + 1, e))
            .collect::<Vec<_>>()
            .join("\n");

        let system = format!(
            r#"You are a computer science teacher who explains programming to learners in India using analogies from their own culture.

Rewrite the passage so that the concept of {concept} ("{term}") is explained through {category}.

{directive}

## Cultural framing
{seed}

## Example analogies
{examples}

## Language
Write the passage in {language}. {hint}"#,
            concept = concept.kind.label().to_lowercase(),
            term = concept.text,
            category = category,
            directive = PRESERVATION_DIRECTIVE,
            seed = seed,
            examples = examples,
            language = language.name(),
            hint = language.writing_hint(),
        );

        let user = format!(
            "Please rewrite the following technical passage using {} analogies:\n\n{}",
            category, passage
        );

        PromptPayload {
            system,
            user,
            concept: concept.kind,
            category,
            source,
            template_version: TEMPLATE_VERSION,
        }
    }
}
