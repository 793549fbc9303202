//! User cultural-preference profiles and the read-only store they come from.

use crate::culture::CulturalCategory;
use crate::error::LocalizeError;
use crate::i18n::Language;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// A validated profile: non-empty, duplicate-free, ordered categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    id: String,
    categories: Vec<CulturalCategory>,
    language: Language,
}

impl Profile {
    pub fn new(
        id: impl Into<String>,
        categories: Vec<CulturalCategory>,
        language: Language,
    ) -> Result<Self, LocalizeError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(LocalizeError::InvalidProfile("profile id is empty".to_string()));
        }
        if categories.is_empty() {
            return Err(LocalizeError::InvalidProfile(format!(
                "profile '{}' has no categories",
                id
            )));
        }
        for (i, category) in categories.iter().enumerate() {
            if categories[..i].contains(category) {
                return Err(LocalizeError::InvalidProfile(format!(
                    "profile '{}' lists {} twice",
                    id, category
                )));
            }
        }

        Ok(Self {
            id,
            categories,
            language,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn categories(&self) -> &[CulturalCategory] {
        &self.categories
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Categories in canonical order, independent of preference order.
    pub fn sorted_categories(&self) -> Vec<CulturalCategory> {
        let mut sorted = self.categories.clone();
        sorted.sort();
        sorted
    }
}

impl<'de> Deserialize<'de> for Profile {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            id: String,
            categories: Vec<CulturalCategory>,
            language: Language,
        }

        let raw = Raw::deserialize(deserializer)?;
        Profile::new(raw.id, raw.categories, raw.language).map_err(serde::de::Error::custom)
    }
}

/// Read-only source of profiles. Creating and editing profiles happens elsewhere.
pub trait ProfileStore: Send + Sync {
    fn get(&self, id: &str) -> Option<Profile>;
}

#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    profiles: HashMap<String, Profile>,
}

impl InMemoryProfileStore {
    pub fn new(profiles: impl IntoIterator<Item = Profile>) -> Self {
        Self {
            profiles: profiles
                .into_iter()
                .map(|p| (p.id().to_string(), p))
                .collect(),
        }
    }

    /// Load profiles from a JSON array file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read profiles file {}", path.display()))?;
        let profiles: Vec<Profile> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse profiles file {}", path.display()))?;
        Ok(Self::new(profiles))
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl ProfileStore for InMemoryProfileStore {
    fn get(&self, id: &str) -> Option<Profile> {
        self.profiles.get(id).cloned()
    }
}
