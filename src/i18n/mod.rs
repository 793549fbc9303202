//! Output languages for localized passages.
//!
//! - `registry`: Single source of truth for supported languages and their metadata
//! - `language`: Validated `Language` type carried by every profile

mod language;
mod registry;

pub use language::Language;
pub use registry::{LanguageConfig, LanguageRegistry};

pub fn list_supported_languages() -> Vec<&'static LanguageConfig> {
    LanguageRegistry::get().list_enabled()
}
