//! Language registry: Single source of truth for all output languages.
//!
//! Localized passages are written in the profile's language. The registry is
//! initialised once with `OnceLock` and is immutable afterwards.

use serde::Serialize;
use std::sync::OnceLock;

/// Configuration for a supported output language.
#[derive(Debug, Clone, Serialize)]
pub struct LanguageConfig {
    /// BCP 47 primary language subtag (e.g., "en", "hi", "ta")
    pub code: &'static str,

    /// English name of the language (e.g., "Hindi")
    pub name: &'static str,

    /// Native name of the language (e.g., "हिन्दी")
    pub native_name: &'static str,

    /// Extra instruction given to the provider about script and register
    #[serde(skip)]
    pub writing_hint: &'static str,

    /// Whether this is the language technical passages arrive in
    pub is_canonical: bool,

    /// Whether this language may be requested by profiles
    pub enabled: bool,
}

/// Global language registry singleton.
pub struct LanguageRegistry {
    languages: Vec<LanguageConfig>,
}

static REGISTRY: OnceLock<LanguageRegistry> = OnceLock::new();

impl LanguageRegistry {
    /// Get the global language registry instance.
    pub fn get() -> &'static LanguageRegistry {
        REGISTRY.get_or_init(|| LanguageRegistry {
            languages: default_languages(),
        })
    }

    /// Get a language configuration by its code (case-insensitive).
    pub fn get_by_code(&self, code: &str) -> Option<&LanguageConfig> {
        let code = code.trim();
        self.languages
            .iter()
            .find(|lang| lang.code.eq_ignore_ascii_case(code))
    }

    /// Get all enabled languages.
    pub fn list_enabled(&self) -> Vec<&LanguageConfig> {
        self.languages.iter().filter(|lang| lang.enabled).collect()
    }

    /// Get all languages (including disabled ones).
    pub fn list_all(&self) -> Vec<&LanguageConfig> {
        self.languages.iter().collect()
    }

    /// The language incoming passages are written in.
    pub fn canonical(&self) -> Option<&LanguageConfig> {
        self.languages.iter().find(|lang| lang.is_canonical)
    }

    /// Check if a language code is supported and enabled.
    pub fn is_enabled(&self, code: &str) -> bool {
        self.get_by_code(code)
            .map(|lang| lang.enabled)
            .unwrap_or(false)
    }
}

fn default_languages() -> Vec<LanguageConfig> {
    vec![
        LanguageConfig {
            code: "en",
            name: "English",
            native_name: "English",
            writing_hint: "Use simple Indian English.",
            is_canonical: true,
            enabled: true,
        },
        LanguageConfig {
            code: "hi",
            name: "Hindi",
            native_name: "हिन्दी",
            writing_hint: "Write in Devanagari script; keep English technical words in Latin script.",
            is_canonical: false,
            enabled: true,
        },
        LanguageConfig {
            code: "ta",
            name: "Tamil",
            native_name: "தமிழ்",
            writing_hint: "Write in Tamil script; keep English technical words in Latin script.",
            is_canonical: false,
            enabled: true,
        },
        LanguageConfig {
            code: "te",
            name: "Telugu",
            native_name: "తెలుగు",
            writing_hint: "Write in Telugu script; keep English technical words in Latin script.",
            is_canonical: false,
            enabled: true,
        },
        LanguageConfig {
            code: "bn",
            name: "Bengali",
            native_name: "বাংলা",
            writing_hint: "Write in Bengali script; keep English technical words in Latin script.",
            is_canonical: false,
            enabled: true,
        },
        LanguageConfig {
            code: "es",
            name: "Spanish",
            native_name: "Español",
            writing_hint: "Use neutral Latin American Spanish.",
            is_canonical: false,
            enabled: false,
        },
    ]
}
