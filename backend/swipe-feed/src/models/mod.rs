use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Affinity used for any category or brand the profile has never seen.
/// Never zero, so unseen categories stay reachable.
pub const DEFAULT_AFFINITY: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Like,
    Save,
    Share,
    Comment,
    Pass,
    Report,
}

impl ActionKind {
    /// Weight of one event of this kind in the preference tally
    pub fn weight(&self) -> f64 {
        match self {
            ActionKind::Like => 1.0,
            ActionKind::Save => 1.5,
            ActionKind::Share => 1.3,
            ActionKind::Comment => 1.2,
            ActionKind::Pass => -0.5,
            ActionKind::Report => -2.0, // Strong negative
        }
    }

    /// Like and save count at most once per (actor, content).
    pub fn is_idempotent(&self) -> bool {
        matches!(self, ActionKind::Like | ActionKind::Save)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Like => "like",
            ActionKind::Save => "save",
            ActionKind::Share => "share",
            ActionKind::Comment => "comment",
            ActionKind::Pass => "pass",
            ActionKind::Report => "report",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedMode {
    Followed,    // authors the viewer follows, popularity/recency order
    Recommended, // personalized ranking with diversity shuffle
}

impl FeedMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedMode::Followed => "followed",
            FeedMode::Recommended => "recommended",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementCounts {
    pub like_count: u64,
    pub comment_count: u64,
    pub save_count: u64,
    pub share_count: u64,
}

impl EngagementCounts {
    /// likes + comments*3 + saves*5 + shares*4, saturating at `u64::MAX`
    pub fn total_engagement(&self) -> u64 {
        self.like_count
            .saturating_add(self.comment_count.saturating_mul(3))
            .saturating_add(self.save_count.saturating_mul(5))
            .saturating_add(self.share_count.saturating_mul(4))
    }

    /// Returns false when the action has no counter (pass, report).
    pub(crate) fn increment(&mut self, action: ActionKind) -> bool {
        match self.counter_mut(action) {
            Some(counter) => {
                *counter += 1;
                true
            }
            None => false,
        }
    }

    pub(crate) fn decrement(&mut self, action: ActionKind) {
        if let Some(counter) = self.counter_mut(action) {
            *counter = counter.saturating_sub(1);
        }
    }

    fn counter_mut(&mut self, action: ActionKind) -> Option<&mut u64> {
        match action {
            ActionKind::Like => Some(&mut self.like_count),
            ActionKind::Comment => Some(&mut self.comment_count),
            ActionKind::Save => Some(&mut self.save_count),
            ActionKind::Share => Some(&mut self.share_count),
            ActionKind::Pass | ActionKind::Report => None,
        }
    }
}

/// Content as supplied by the content store, before validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: String,
    pub author_id: String,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub engagement: EngagementCounts,
}

/// Validated content eligible for ranking and display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub author_id: String,
    pub category: String,
    pub brand: String,
    pub created_at: DateTime<Utc>,
    pub engagement: EngagementCounts,
}

impl ContentItem {
    pub fn new(
        id: impl Into<String>,
        author_id: impl Into<String>,
        category: impl Into<String>,
        brand: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            author_id: author_id.into(),
            category: category.into(),
            brand: brand.into(),
            created_at,
            engagement: EngagementCounts::default(),
        }
    }

    pub fn with_engagement(mut self, engagement: EngagementCounts) -> Self {
        self.engagement = engagement;
        self
    }
}

impl TryFrom<ContentRecord> for ContentItem {
    type Error = ValidationError;

    fn try_from(record: ContentRecord) -> Result<Self, Self::Error> {
        let missing = |field: &'static str| ValidationError::MissingField {
            content_id: record.id.clone(),
            field,
        };

        let category = record
            .category
            .clone()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| missing("category"))?;
        let brand = record
            .brand
            .clone()
            .filter(|b| !b.trim().is_empty())
            .ok_or_else(|| missing("brand"))?;
        let created_at = record.created_at.ok_or_else(|| missing("created_at"))?;

        Ok(ContentItem {
            id: record.id,
            author_id: record.author_id,
            category,
            brand,
            created_at,
            engagement: record.engagement,
        })
    }
}

impl From<ContentItem> for ContentRecord {
    fn from(item: ContentItem) -> Self {
        Self {
            id: item.id,
            author_id: item.author_id,
            category: Some(item.category),
            brand: Some(item.brand),
            created_at: Some(item.created_at),
            engagement: item.engagement,
        }
    }
}

/// Author as known to the social graph. Followers are referenced by id only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub follower_ids: HashSet<String>,
}

impl Author {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            follower_ids: HashSet::new(),
        }
    }
}

/// One user action on one content item.
///
/// Category and brand are copied from the item at event time so the
/// preference tally survives content deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub content_id: String,
    pub actor_id: String,
    pub action_kind: ActionKind,
    pub category: String,
    pub brand: String,
    pub timestamp: DateTime<Utc>,
}

impl InteractionEvent {
    pub fn for_item(
        item: &ContentItem,
        actor_id: impl Into<String>,
        action_kind: ActionKind,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            content_id: item.id.clone(),
            actor_id: actor_id.into(),
            action_kind,
            category: item.category.clone(),
            brand: item.brand.clone(),
            timestamp,
        }
    }
}

/// Normalized category and brand affinities.
///
/// In each mapping the largest magnitude is 1.0 (or the mapping is empty);
/// negative affinities are kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreferenceProfile {
    pub categories: HashMap<String, f64>,
    pub brands: HashMap<String, f64>,
}

impl PreferenceProfile {
    pub fn category_affinity(&self, category: &str) -> f64 {
        self.categories
            .get(category)
            .copied()
            .unwrap_or(DEFAULT_AFFINITY)
    }

    pub fn brand_affinity(&self, brand: &str) -> f64 {
        self.brands.get(brand).copied().unwrap_or(DEFAULT_AFFINITY)
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() && self.brands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ContentRecord {
        ContentRecord {
            id: "c1".to_string(),
            author_id: "a1".to_string(),
            category: Some("sport".to_string()),
            brand: Some("acme".to_string()),
            created_at: Some(Utc::now()),
            engagement: EngagementCounts::default(),
        }
    }

    #[test]
    fn test_total_engagement_weights() {
        let counts = EngagementCounts {
            like_count: 10,
            comment_count: 2,
            save_count: 1,
            share_count: 3,
        };
        assert_eq!(counts.total_engagement(), 10 + 6 + 5 + 12);
    }

    #[test]
    fn test_total_engagement_saturates_on_huge_counters() {
        let counts = EngagementCounts {
            like_count: u64::MAX,
            comment_count: u64::MAX / 2,
            save_count: u64::MAX,
            share_count: 1,
        };
        assert_eq!(counts.total_engagement(), u64::MAX);

        let shares_only = EngagementCounts {
            share_count: u64::MAX / 3,
            ..Default::default()
        };
        assert_eq!(shares_only.total_engagement(), u64::MAX);
    }

    #[test]
    fn test_pass_and_report_have_no_counter() {
        let mut counts = EngagementCounts::default();
        assert!(!counts.increment(ActionKind::Pass));
        assert!(!counts.increment(ActionKind::Report));
        assert_eq!(counts, EngagementCounts::default());

        assert!(counts.increment(ActionKind::Share));
        counts.decrement(ActionKind::Share);
        counts.decrement(ActionKind::Share);
        assert_eq!(counts.share_count, 0);
    }

    #[test]
    fn test_record_validation() {
        assert!(ContentItem::try_from(record()).is_ok());

        let mut missing_brand = record();
        missing_brand.brand = Some("  ".to_string());
        assert_eq!(
            ContentItem::try_from(missing_brand),
            Err(ValidationError::MissingField {
                content_id: "c1".to_string(),
                field: "brand",
            })
        );

        let mut missing_time = record();
        missing_time.created_at = None;
        assert!(matches!(
            ContentItem::try_from(missing_time),
            Err(ValidationError::MissingField {
                field: "created_at",
                ..
            })
        ));
    }

    #[test]
    fn test_profile_default_affinity() {
        let mut profile = PreferenceProfile::default();
        profile.categories.insert("sport".to_string(), 1.0);

        assert_eq!(profile.category_affinity("sport"), 1.0);
        assert_eq!(profile.category_affinity("music"), DEFAULT_AFFINITY);
        assert_eq!(profile.brand_affinity("acme"), DEFAULT_AFFINITY);
    }

    #[test]
    fn test_event_wire_shape() {
        let item = ContentItem::try_from(record()).unwrap();
        let event = InteractionEvent::for_item(&item, "u1", ActionKind::Save, item.created_at);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["content_id"], "c1");
        assert_eq!(json["actor_id"], "u1");
        assert_eq!(json["action_kind"], "save");
        assert_eq!(json["category"], "sport");
        assert_eq!(json["brand"], "acme");
    }
}
