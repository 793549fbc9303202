//! Culturally-aware localization of technical passages.
//!
//! The crate detects programming concepts in a passage, frames the main one
//! through one of a learner's cultural categories, asks a generative provider
//! to rewrite the passage, and refuses any rewrite that alters code or
//! technical terms.

pub mod admission;
pub mod cache;
pub mod concepts;
pub mod config;
pub mod culture;
pub mod error;
pub mod fallback;
pub mod i18n;
pub mod localizer;
pub mod metrics;
pub mod preservation;
pub mod profile;
pub mod prompt;
pub mod provider;
pub mod retry;
pub mod security;
pub mod server;

pub use concepts::list_supported_concept_kinds;
pub use culture::list_supported_categories;
pub use error::LocalizeError;
pub use i18n::list_supported_languages;
pub use localizer::{LocalizationRequest, LocalizedResult, Localizer};
