// ============================================
// Preference Model (偏好模型)
// ============================================
//
// Derives category/brand affinities from interaction history.
//
// score(key) = SUM(action_weight) over events matching key
// affinity(key) = score(key) / max(|max score in dimension|, 1)
//
// Action weights:
// - Like: 1.0
// - Save: 1.5
// - Share: 1.3
// - Comment: 1.2
// - Pass: -0.5
// - Report: -2.0
//
// The profile is always rebuilt from the full history, never patched.

use crate::models::{InteractionEvent, PreferenceProfile};
use crate::utils::normalize_by_max_magnitude;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct PreferenceModel;

impl PreferenceModel {
    pub fn new() -> Self {
        Self
    }

    /// Build a normalized profile from the complete interaction history
    pub fn compute<'a, I>(&self, history: I) -> PreferenceProfile
    where
        I: IntoIterator<Item = &'a InteractionEvent>,
    {
        let mut categories: HashMap<String, f64> = HashMap::new();
        let mut brands: HashMap<String, f64> = HashMap::new();
        let mut event_count = 0usize;

        for event in history {
            let weight = event.action_kind.weight();
            *categories.entry(event.category.clone()).or_insert(0.0) += weight;
            *brands.entry(event.brand.clone()).or_insert(0.0) += weight;
            event_count += 1;
        }

        normalize_by_max_magnitude(&mut categories);
        normalize_by_max_magnitude(&mut brands);

        debug!(
            event_count = event_count,
            category_count = categories.len(),
            brand_count = brands.len(),
            "Preference profile rebuilt"
        );

        PreferenceProfile { categories, brands }
    }
}
