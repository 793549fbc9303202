//! Language type: validated output language for a profile.

use crate::i18n::{LanguageConfig, LanguageRegistry};
use anyhow::{bail, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A language that has been validated against the registry.
///
/// Only supported, enabled languages can be constructed, so every accessor is
/// infallible.
#[derive(Clone, Copy)]
pub struct Language {
    config: &'static LanguageConfig,
}

impl Language {
    /// Create a Language from a language code string.
    ///
    /// # Returns
    /// * `Ok(Language)` if the code is valid and the language is enabled
    /// * `Err` if the code is not found or the language is disabled
    pub fn from_code(code: &str) -> Result<Language> {
        match LanguageRegistry::get().get_by_code(code) {
            Some(config) if config.enabled => Ok(Language { config }),
            Some(_) => bail!("Language '{}' is not enabled", code),
            None => bail!("Unknown language code: '{}'", code),
        }
    }

    /// The language incoming passages are written in (English).
    pub fn canonical() -> Result<Language> {
        match LanguageRegistry::get().canonical() {
            Some(config) => Ok(Language { config }),
            None => bail!("No canonical language registered"),
        }
    }

    pub fn code(&self) -> &'static str {
        self.config.code
    }

    pub fn name(&self) -> &'static str {
        self.config.name
    }

    pub fn native_name(&self) -> &'static str {
        self.config.native_name
    }

    pub fn writing_hint(&self) -> &'static str {
        self.config.writing_hint
    }

    pub fn is_canonical(&self) -> bool {
        self.config.is_canonical
    }
}

impl PartialEq for Language {
    fn eq(&self, other: &Self) -> bool {
        self.code() == other.code()
    }
}

impl Eq for Language {}

impl fmt::Debug for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Language").field(&self.code()).finish()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for Language {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for Language {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Language::from_code(&code).map_err(serde::de::Error::custom)
    }
}
