//! Per-profile rotation over a profile's cultural categories.
//!
//! Each profile identity owns one atomic cursor. The Nth selection for a
//! profile with categories `[A, B, C]` returns `categories[(N - 1) % 3]`.

use crate::concepts::Concept;
use crate::culture::CulturalCategory;
use crate::profile::Profile;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::debug;

#[derive(Debug, Default)]
pub struct MetaphorSelector {
    cursors: RwLock<HashMap<String, Arc<AtomicU64>>>,
}

impl MetaphorSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick the category framing `concept` and advance the profile's cursor.
    pub fn select(&self, concept: &Concept, profile: &Profile) -> CulturalCategory {
        let categories = profile.categories();
        let sequence = self.cursor(profile.id()).fetch_add(1, Ordering::SeqCst);
        let category = categories[(sequence % categories.len() as u64) as usize];

        debug!(
            "Profile {}: selection #{} for {} -> {}",
            profile.id(),
            sequence + 1,
            concept.kind,
            category
        );
        category
    }

    /// Number of selections made so far for a profile.
    pub fn selections(&self, profile_id: &str) -> u64 {
        let cursors = self.cursors.read().unwrap_or_else(|e| e.into_inner());
        cursors
            .get(profile_id)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    fn cursor(&self, profile_id: &str) -> Arc<AtomicU64> {
        {
            let cursors = self.cursors.read().unwrap_or_else(|e| e.into_inner());
            if let Some(cursor) = cursors.get(profile_id) {
                return Arc::clone(cursor);
            }
        }

        let mut cursors = self.cursors.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            cursors
                .entry(profile_id.to_string())
                .or_insert_with(|| Arc::new(AtomicU64::new(0))),
        )
    }
}
