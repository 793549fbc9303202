//! Category registry: display metadata and prompt seeds per cultural category.

use crate::culture::CulturalCategory;
use serde::Serialize;
use std::sync::OnceLock;

/// Metadata for one cultural category.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryConfig {
    pub category: CulturalCategory,

    /// Human readable name for profile-setup screens
    pub name: &'static str,

    /// Short description handed to the provider as the framing seed
    pub seed: &'static str,

    pub enabled: bool,
}

pub struct CategoryRegistry {
    categories: Vec<CategoryConfig>,
}

static REGISTRY: OnceLock<CategoryRegistry> = OnceLock::new();

impl CategoryRegistry {
    pub fn get() -> &'static CategoryRegistry {
        REGISTRY.get_or_init(|| CategoryRegistry {
            categories: default_categories(),
        })
    }

    pub fn config(&self, category: CulturalCategory) -> Option<&CategoryConfig> {
        self.categories.iter().find(|c| c.category == category)
    }

    pub fn list_enabled(&self) -> Vec<&CategoryConfig> {
        self.categories.iter().filter(|c| c.enabled).collect()
    }

    /// Seed text for a category; every variant is registered.
    pub fn seed(&self, category: CulturalCategory) -> &'static str {
        self.config(category)
            .map(|c| c.seed)
            .unwrap_or("everyday life in India")
    }
}

fn default_categories() -> Vec<CategoryConfig> {
    vec![
        CategoryConfig {
            category: CulturalCategory::Cricket,
            name: "Cricket",
            seed: "Cricket matches: batting order, overs, the scoreboard, fielding positions, \
                   the third umpire and the IPL auction.",
            enabled: true,
        },
        CategoryConfig {
            category: CulturalCategory::Bollywood,
            name: "Bollywood",
            seed: "Hindi cinema: scripts and scenes, directors and actors, song-and-dance \
                   sequences, sequels, remakes and film sets.",
            enabled: true,
        },
        CategoryConfig {
            category: CulturalCategory::Festivals,
            name: "Festivals",
            seed: "Indian festivals: Diwali lamps and rangoli, Holi colours, Ganesh Chaturthi \
                   processions, wedding preparations and shared sweets.",
            enabled: true,
        },
        CategoryConfig {
            category: CulturalCategory::Food,
            name: "Food",
            seed: "Indian kitchens: thali plates, tiffin boxes, dosa batter, recipes handed down \
                   by grandmothers, street chaat stalls.",
            enabled: true,
        },
        CategoryConfig {
            category: CulturalCategory::Traffic,
            name: "Traffic",
            seed: "City roads: auto-rickshaws, traffic signals, roundabouts, toll booths, \
                   Mumbai local trains and bus depots.",
            enabled: true,
        },
        CategoryConfig {
            category: CulturalCategory::Family,
            name: "Family",
            seed: "Joint families: family trees, household roles, inheritance of traits and \
                   property, relatives sharing one home.",
            enabled: true,
        },
    ]
}
