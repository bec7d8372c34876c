/// Candidate Scoring Module
///
/// Scores content items against a preference profile with a linear blend of
/// affinity, popularity and recency, then applies the following boost and
/// diversity jitter.
use super::signals::{popularity_score, recency_score};
use crate::config::RankingConfig;
use crate::models::{ContentItem, PreferenceProfile};
use crate::utils::{age_hours, cmp_score_desc};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::collections::HashSet;
use tracing::debug;

/// Scored content item
#[derive(Debug, Clone)]
pub struct ScoredItem {
    pub item: ContentItem,
    pub score: f64,
    pub features: ScoreFeatures,
}

/// Intermediate signals for one item
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreFeatures {
    pub category_affinity: f64,
    pub brand_affinity: f64,
    pub popularity: f64,
    pub recency: f64,
    pub author_is_following: bool,
    /// Weighted blend before boost and jitter
    pub base_score: f64,
    /// Base score after the following boost
    pub boosted_score: f64,
}

/// Ranking Engine
pub struct RankingEngine {
    config: RankingConfig,
}

impl RankingEngine {
    pub fn new(config: RankingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    /// Deterministic part of the score (everything except jitter)
    pub fn features(
        &self,
        item: &ContentItem,
        profile: &PreferenceProfile,
        following: &HashSet<String>,
        now: DateTime<Utc>,
    ) -> ScoreFeatures {
        let category_affinity = profile.category_affinity(&item.category);
        let brand_affinity = profile.brand_affinity(&item.brand);
        let popularity = popularity_score(item.engagement.total_engagement());
        let recency = recency_score(age_hours(item.created_at, now));
        let author_is_following = following.contains(&item.author_id);

        let base_score = category_affinity * self.config.category_preference
            + brand_affinity * self.config.brand_preference
            + popularity * self.config.popularity_score
            + recency * self.config.recency_boost;

        let boost = if author_is_following {
            self.config.following_boost_multiplier
        } else {
            1.0
        };

        ScoreFeatures {
            category_affinity,
            brand_affinity,
            popularity,
            recency,
            author_is_following,
            base_score,
            boosted_score: base_score * boost,
        }
    }

    /// Final score: boosted base score plus jitter in `[0, diversity_factor)`.
    /// The jitter is added after boosting so it is never itself boosted.
    pub fn score<R: Rng + ?Sized>(
        &self,
        item: &ContentItem,
        profile: &PreferenceProfile,
        following: &HashSet<String>,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> f64 {
        self.features(item, profile, following, now).boosted_score + self.jitter(rng)
    }

    /// Score a batch and sort by score descending
    pub fn score_batch<R: Rng + ?Sized>(
        &self,
        items: Vec<ContentItem>,
        profile: &PreferenceProfile,
        following: &HashSet<String>,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Vec<ScoredItem> {
        let mut scored: Vec<ScoredItem> = items
            .into_iter()
            .map(|item| {
                let features = self.features(&item, profile, following, now);
                let score = features.boosted_score + self.jitter(rng);
                ScoredItem {
                    item,
                    score,
                    features,
                }
            })
            .collect();

        // Note: NaN scores are treated as less than any valid score
        scored.sort_by(|a, b| cmp_score_desc(a.score, b.score));

        debug!(
            scored_count = scored.len(),
            top_score = scored.first().map(|s| s.score),
            "Scoring complete"
        );

        scored
    }

    fn jitter<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if self.config.diversity_factor > 0.0 {
            rng.gen_range(0.0..self.config.diversity_factor)
        } else {
            0.0
        }
    }
}
