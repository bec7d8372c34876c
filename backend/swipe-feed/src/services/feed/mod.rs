//! Feed assembly for the two feed modes.
//!
//! - **Followed**: only items by followed authors, ordered by
//!   `0.7 * popularity + 0.3 * recency`, ties broken by content id. No
//!   truncation beyond what the content store supplied.
//! - **Recommended**: every item scored by the [`RankingEngine`], top
//!   `candidate_pool_size` kept, uniformly shuffled (Fisher–Yates), first
//!   `feed_size` served.
//!
//! Records that fail validation are dropped here and never reach scoring.

pub mod fence;

pub use fence::{FetchTicket, RequestFence};

use crate::config::FeedConfig;
use crate::error::ValidationError;
use crate::models::{ContentItem, ContentRecord, FeedMode, PreferenceProfile};
use crate::services::ranking::{popularity_score, recency_score, RankingEngine};
use crate::utils::{age_hours, cmp_score_desc};
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use tracing::{debug, info, warn};

const FOLLOWED_POPULARITY_WEIGHT: f64 = 0.7;
const FOLLOWED_RECENCY_WEIGHT: f64 = 0.3;

/// Records split into scorable items and rejected ones
#[derive(Debug, Default)]
pub struct AdmittedBatch {
    pub items: Vec<ContentItem>,
    pub rejected: Vec<ValidationError>,
}

pub struct FeedAssembler {
    engine: RankingEngine,
    config: FeedConfig,
}

impl FeedAssembler {
    pub fn new(engine: RankingEngine, config: FeedConfig) -> Self {
        Self { engine, config }
    }

    pub fn engine(&self) -> &RankingEngine {
        &self.engine
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Validate raw records, dropping any that are missing category, brand or timestamp
    pub fn admit(records: Vec<ContentRecord>) -> AdmittedBatch {
        let mut batch = AdmittedBatch::default();

        for record in records {
            match ContentItem::try_from(record) {
                Ok(item) => batch.items.push(item),
                Err(err) => {
                    warn!(error = %err, "Dropping invalid content record");
                    batch.rejected.push(err);
                }
            }
        }

        batch
    }

    pub fn assemble<R: Rng + ?Sized>(
        &self,
        mode: FeedMode,
        items: Vec<ContentItem>,
        profile: &PreferenceProfile,
        following: &HashSet<String>,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Vec<ContentItem> {
        match mode {
            FeedMode::Followed => self.assemble_followed(items, following, now),
            FeedMode::Recommended => {
                self.assemble_recommended(items, profile, following, now, rng)
            }
        }
    }

    /// Items by followed authors, most popular and freshest first
    pub fn assemble_followed(
        &self,
        items: Vec<ContentItem>,
        following: &HashSet<String>,
        now: DateTime<Utc>,
    ) -> Vec<ContentItem> {
        let input_count = items.len();

        let mut scored: Vec<(ContentItem, f64)> = items
            .into_iter()
            .filter(|item| following.contains(&item.author_id))
            .map(|item| {
                let score = Self::followed_score(&item, now);
                (item, score)
            })
            .collect();

        scored.sort_by(|a, b| cmp_score_desc(a.1, b.1).then_with(|| a.0.id.cmp(&b.0.id)));

        info!(
            mode = FeedMode::Followed.as_str(),
            input_count = input_count,
            output_count = scored.len(),
            "Feed assembled"
        );

        scored.into_iter().map(|(item, _)| item).collect()
    }

    /// Top candidates by ranking score, shuffled, then cut to the feed size
    pub fn assemble_recommended<R: Rng + ?Sized>(
        &self,
        items: Vec<ContentItem>,
        profile: &PreferenceProfile,
        following: &HashSet<String>,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Vec<ContentItem> {
        let input_count = items.len();

        let mut candidates: Vec<ContentItem> = self
            .engine
            .score_batch(items, profile, following, now, rng)
            .into_iter()
            .take(self.config.candidate_pool_size)
            .map(|scored| scored.item)
            .collect();

        let pool_size = candidates.len();
        candidates.shuffle(rng);
        candidates.truncate(self.config.feed_size);

        debug!(pool_size = pool_size, "Diversity shuffle applied");
        info!(
            mode = FeedMode::Recommended.as_str(),
            input_count = input_count,
            output_count = candidates.len(),
            "Feed assembled"
        );

        candidates
    }

    /// Ordering score for the followed feed
    pub fn followed_score(item: &ContentItem, now: DateTime<Utc>) -> f64 {
        FOLLOWED_POPULARITY_WEIGHT * popularity_score(item.engagement.total_engagement())
            + FOLLOWED_RECENCY_WEIGHT * recency_score(age_hours(item.created_at, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RankingConfig;
    use crate::models::EngagementCounts;
    use chrono::Duration;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn assembler(diversity_factor: f64) -> FeedAssembler {
        let engine = RankingEngine::new(RankingConfig {
            category_preference: 0.4,
            brand_preference: 0.2,
            popularity_score: 0.2,
            recency_boost: 0.2,
            following_boost_multiplier: 1.5,
            diversity_factor,
        });
        FeedAssembler::new(engine, FeedConfig::default())
    }

    fn item(id: &str, author: &str, likes: u64, hours_old: i64, now: DateTime<Utc>) -> ContentItem {
        ContentItem::new(id, author, "sport", "acme", now - Duration::hours(hours_old))
            .with_engagement(EngagementCounts {
                like_count: likes,
                ..Default::default()
            })
    }

    fn following(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn test_admit_drops_invalid_records() {
        let now = Utc::now();
        let valid: ContentRecord = item("ok", "a1", 0, 1, now).into();
        let mut no_category = valid.clone();
        no_category.id = "bad".to_string();
        no_category.category = None;

        let batch = FeedAssembler::admit(vec![valid, no_category]);

        assert_eq!(batch.items.len(), 1);
        assert_eq!(batch.items[0].id, "ok");
        assert_eq!(
            batch.rejected,
            vec![ValidationError::MissingField {
                content_id: "bad".to_string(),
                field: "category",
            }]
        );
    }

    #[test]
    fn test_followed_feed_only_contains_followed_authors() {
        let now = Utc::now();
        let items = vec![
            item("c1", "a1", 100, 1, now),
            item("c2", "stranger", 90_000, 1, now),
            item("c3", "a2", 10, 200, now),
        ];

        let feed = assembler(0.0).assemble_followed(items, &following(&["a1", "a2"]), now);

        let ids: Vec<_> = feed.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c3"]);
    }

    #[test]
    fn test_followed_feed_orders_by_popularity_and_recency() {
        let now = Utc::now();
        let items = vec![
            item("fresh", "a1", 0, 1, now),       // 0.7*0.3 + 0.3*1.0 = 0.51
            item("viral", "a1", 60_000, 200, now), // 0.7*1.0 + 0.3*0.2 = 0.76
            item("steady", "a1", 2_000, 30, now),  // 0.7*0.6 + 0.3*0.6 = 0.60
        ];

        let feed = assembler(0.0).assemble_followed(items, &following(&["a1"]), now);

        let ids: Vec<_> = feed.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["viral", "steady", "fresh"]);
    }

    #[test]
    fn test_followed_ties_broken_by_content_id() {
        let now = Utc::now();
        let items = vec![
            item("c3", "a1", 0, 1, now),
            item("c1", "a1", 0, 1, now),
            item("c2", "a1", 0, 1, now),
        ];

        let feed = assembler(0.0).assemble_followed(items, &following(&["a1"]), now);

        let ids: Vec<_> = feed.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
    }

    #[test]
    fn test_followed_membership_for_random_inputs() {
        let now = Utc::now();
        let mut rng = StdRng::seed_from_u64(5);
        let authors = ["a0", "a1", "a2", "a3", "a4", "a5"];

        for round in 0..100 {
            let items: Vec<ContentItem> = (0..rng.gen_range(0..60))
                .map(|i| {
                    item(
                        &format!("r{}-c{}", round, i),
                        authors[rng.gen_range(0..authors.len())],
                        rng.gen_range(0..60_000),
                        rng.gen_range(0..400),
                        now,
                    )
                })
                .collect();
            let follow_set: HashSet<String> = authors
                .iter()
                .filter(|_| rng.gen_bool(0.5))
                .map(|a| a.to_string())
                .collect();

            let feed = assembler(0.0).assemble_followed(items, &follow_set, now);

            assert!(feed.iter().all(|i| follow_set.contains(&i.author_id)));
        }
    }

    /// 80 items whose base scores are strictly ordered by index
    fn graded_batch(now: DateTime<Utc>) -> (Vec<ContentItem>, PreferenceProfile) {
        let mut profile = PreferenceProfile::default();
        let items = (0..80)
            .map(|i| {
                let category = format!("cat{}", i);
                profile
                    .categories
                    .insert(category.clone(), i as f64 / 80.0);
                ContentItem::new(format!("c{}", i), "a1", category, "acme", now)
            })
            .collect();
        (items, profile)
    }

    #[test]
    fn test_recommended_feed_is_drawn_from_top_candidates() {
        let now = Utc::now();
        let assembler = assembler(0.0);

        for seed in 0..20 {
            let (items, profile) = graded_batch(now);
            let mut rng = StdRng::seed_from_u64(seed);

            let feed =
                assembler.assemble_recommended(items, &profile, &HashSet::new(), now, &mut rng);

            assert_eq!(feed.len(), 20);
            for item in &feed {
                let index: usize = item.id[1..].parse().unwrap();
                assert!(index >= 30, "{} is outside the top 50", item.id);
            }
        }
    }

    #[test]
    fn test_recommended_shuffle_reaches_whole_pool() {
        let now = Utc::now();
        let assembler = assembler(0.0);
        let mut seen: HashSet<String> = HashSet::new();
        let mut rng = StdRng::seed_from_u64(2024);

        for _ in 0..200 {
            let (items, profile) = graded_batch(now);
            let feed =
                assembler.assemble_recommended(items, &profile, &HashSet::new(), now, &mut rng);
            seen.extend(feed.into_iter().map(|i| i.id));
        }

        // 均勻洗牌下前 50 名都應出現過
        assert_eq!(seen.len(), 50);
    }

    #[test]
    fn test_recommended_small_batch() {
        let now = Utc::now();
        let items = vec![item("c1", "a1", 0, 1, now), item("c2", "a2", 0, 1, now)];
        let mut rng = StdRng::seed_from_u64(1);

        let feed = assembler(0.1).assemble_recommended(
            items,
            &PreferenceProfile::default(),
            &HashSet::new(),
            now,
            &mut rng,
        );

        assert_eq!(feed.len(), 2);
    }

    #[test]
    fn test_assemble_dispatches_on_mode() {
        let now = Utc::now();
        let items = vec![item("c1", "a1", 0, 1, now), item("c2", "stranger", 0, 1, now)];
        let mut rng = StdRng::seed_from_u64(1);
        let assembler = assembler(0.0);
        let profile = PreferenceProfile::default();

        let followed = assembler.assemble(
            FeedMode::Followed,
            items.clone(),
            &profile,
            &following(&["a1"]),
            now,
            &mut rng,
        );
        let recommended = assembler.assemble(
            FeedMode::Recommended,
            items,
            &profile,
            &following(&["a1"]),
            now,
            &mut rng,
        );

        assert_eq!(followed.len(), 1);
        assert_eq!(recommended.len(), 2);
    }
}
