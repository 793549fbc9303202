//! Cultural framing: categories, their registry, the per-profile rotation, and
//! the versioned exemplar table used by the prompt builder.

mod category;
mod registry;
mod selector;
pub mod templates;

pub use category::CulturalCategory;
pub use registry::{CategoryConfig, CategoryRegistry};
pub use selector::MetaphorSelector;

pub fn list_supported_categories() -> Vec<&'static CategoryConfig> {
    CategoryRegistry::get().list_enabled()
}
