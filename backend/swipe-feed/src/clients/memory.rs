//! In-memory collaborators.
//!
//! Stub implementations for tests and local runs. Each one can be switched
//! to "unavailable" to exercise the recoverable failure paths.

use super::{
    ContentQuery, ContentStore, ContentSubscription, InteractionStore, SocialGraph,
    CONTENT_STORE, INTERACTION_STORE, SOCIAL_GRAPH,
};
use crate::error::ClientError;
use crate::models::{Author, ContentRecord, InteractionEvent};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tracing::debug;

#[derive(Default)]
struct ContentState {
    records: Vec<ContentRecord>,
    /// Records already handed out, per query key
    offsets: HashMap<String, usize>,
    subscribers: HashMap<u64, (ContentQuery, watch::Sender<Vec<ContentRecord>>)>,
    next_subscriber_id: u64,
}

impl ContentState {
    fn snapshot(&self, query: &ContentQuery) -> Vec<ContentRecord> {
        let limit = match query {
            ContentQuery::Followed { limit, .. } | ContentQuery::Recommendable { limit, .. } => {
                *limit
            }
        };
        self.records
            .iter()
            .filter(|record| matches_query(record, query))
            .take(limit)
            .cloned()
            .collect()
    }

    fn publish(&self) {
        for (query, sender) in self.subscribers.values() {
            sender.send_replace(self.snapshot(query));
        }
    }

    fn next_page(&mut self, query: &ContentQuery, key: String, limit: usize) -> Vec<ContentRecord> {
        let offset = self.offsets.get(&key).copied().unwrap_or(0);
        let page: Vec<ContentRecord> = self
            .records
            .iter()
            .filter(|record| matches_query(record, query))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        self.offsets.insert(key, offset + page.len());
        page
    }
}

fn matches_query(record: &ContentRecord, query: &ContentQuery) -> bool {
    match query {
        ContentQuery::Followed { author_ids, .. } => author_ids.contains(&record.author_id),
        ContentQuery::Recommendable { user_id, .. } => &record.author_id != user_id,
    }
}

fn followed_key(author_ids: &HashSet<String>) -> String {
    let mut ids: Vec<&str> = author_ids.iter().map(String::as_str).collect();
    ids.sort_unstable();
    format!("followed:{}", ids.join(","))
}

/// Content store backed by a vector. Successive fetches for the same query
/// page through the matching records.
#[derive(Clone, Default)]
pub struct InMemoryContentStore {
    state: Arc<Mutex<ContentState>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<ContentRecord>) -> Self {
        let store = Self::new();
        store.state.lock().records = records;
        store
    }

    /// Add a record and push fresh snapshots to subscribers
    pub fn insert(&self, record: ContentRecord) {
        let mut state = self.state.lock();
        state.records.push(record);
        state.publish();
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    fn check_available(&self) -> Result<(), ClientError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ClientError::unavailable(CONTENT_STORE, "store offline"));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn fetch_followed(
        &self,
        followed_author_ids: &HashSet<String>,
        limit: usize,
    ) -> Result<Vec<ContentRecord>, ClientError> {
        self.check_available()?;

        let query = ContentQuery::Followed {
            author_ids: followed_author_ids.clone(),
            limit,
        };
        let key = followed_key(followed_author_ids);
        Ok(self.state.lock().next_page(&query, key, limit))
    }

    async fn fetch_recommendable(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<ContentRecord>, ClientError> {
        self.check_available()?;

        let query = ContentQuery::Recommendable {
            user_id: user_id.to_string(),
            limit,
        };
        let key = format!("recommendable:{}", user_id);
        Ok(self.state.lock().next_page(&query, key, limit))
    }

    fn subscribe(&self, query: ContentQuery) -> Result<ContentSubscription, ClientError> {
        self.check_available()?;

        let mut state = self.state.lock();
        let (sender, receiver) = watch::channel(state.snapshot(&query));
        let id = state.next_subscriber_id;
        state.next_subscriber_id += 1;
        state.subscribers.insert(id, (query, sender));

        let weak: Weak<Mutex<ContentState>> = Arc::downgrade(&self.state);
        Ok(ContentSubscription::new(receiver, move || {
            if let Some(state) = weak.upgrade() {
                state.lock().subscribers.remove(&id);
                debug!(subscriber_id = id, "Content subscription closed");
            }
        }))
    }
}

/// Interaction store that keeps acknowledged events in memory
#[derive(Default)]
pub struct InMemoryInteractionStore {
    events: Mutex<Vec<InteractionEvent>>,
    unavailable: AtomicBool,
}

impl InMemoryInteractionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<InteractionEvent> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl InteractionStore for InMemoryInteractionStore {
    async fn record(&self, event: &InteractionEvent) -> Result<(), ClientError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ClientError::unavailable(INTERACTION_STORE, "write failed"));
        }
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// Social graph keyed by author, each author holding its follower ids
#[derive(Default)]
pub struct InMemorySocialGraph {
    authors: Mutex<HashMap<String, Author>>,
    unavailable: AtomicBool,
}

impl InMemorySocialGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Authors `actor_id` currently follows
    pub fn following(&self, actor_id: &str) -> HashSet<String> {
        Self::following_of(&self.authors.lock(), actor_id)
    }

    pub fn author(&self, author_id: &str) -> Option<Author> {
        self.authors.lock().get(author_id).cloned()
    }

    fn following_of(authors: &HashMap<String, Author>, actor_id: &str) -> HashSet<String> {
        authors
            .values()
            .filter(|author| author.follower_ids.contains(actor_id))
            .map(|author| author.id.clone())
            .collect()
    }

    fn check_available(&self) -> Result<(), ClientError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ClientError::unavailable(SOCIAL_GRAPH, "graph offline"));
        }
        Ok(())
    }
}

#[async_trait]
impl SocialGraph for InMemorySocialGraph {
    async fn follow(
        &self,
        actor_id: &str,
        target_id: &str,
    ) -> Result<HashSet<String>, ClientError> {
        self.check_available()?;
        if actor_id == target_id {
            return Err(ClientError::rejected(SOCIAL_GRAPH, "cannot follow self"));
        }

        let mut authors = self.authors.lock();
        authors
            .entry(target_id.to_string())
            .or_insert_with(|| Author::new(target_id))
            .follower_ids
            .insert(actor_id.to_string());

        Ok(Self::following_of(&authors, actor_id))
    }

    async fn unfollow(
        &self,
        actor_id: &str,
        target_id: &str,
    ) -> Result<HashSet<String>, ClientError> {
        self.check_available()?;

        let mut authors = self.authors.lock();
        if let Some(author) = authors.get_mut(target_id) {
            author.follower_ids.remove(actor_id);
        }

        Ok(Self::following_of(&authors, actor_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use futures::StreamExt;

    fn record(id: &str, author_id: &str) -> ContentRecord {
        ContentRecord {
            id: id.to_string(),
            author_id: author_id.to_string(),
            category: Some("sport".to_string()),
            brand: Some("acme".to_string()),
            created_at: Some(Utc::now()),
            engagement: Default::default(),
        }
    }

    fn authors(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[tokio::test]
    async fn test_fetch_followed_pages_through_matches() {
        let store = InMemoryContentStore::with_records(vec![
            record("c1", "a1"),
            record("c2", "a2"),
            record("c3", "a1"),
            record("c4", "a1"),
        ]);
        let follow_set = authors(&["a1"]);

        let first = store.fetch_followed(&follow_set, 2).await.unwrap();
        let second = store.fetch_followed(&follow_set, 2).await.unwrap();

        let ids: Vec<_> = first.iter().chain(&second).map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c3", "c4"]);
    }

    #[tokio::test]
    async fn test_fetch_recommendable_excludes_own_content() {
        let store = InMemoryContentStore::with_records(vec![record("c1", "u1"), record("c2", "a1")]);

        let page = store.fetch_recommendable("u1", 10).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, "c2");
    }

    #[tokio::test]
    async fn test_unavailable_store_fails() {
        let store = InMemoryContentStore::new();
        store.set_unavailable(true);

        let result = store.fetch_recommendable("u1", 10).await;
        assert!(matches!(result, Err(ClientError::Unavailable { .. })));
    }

    #[tokio::test]
    async fn test_subscription_receives_inserts_until_unsubscribed() {
        let store = InMemoryContentStore::new();
        let mut subscription = store
            .subscribe(ContentQuery::Followed {
                author_ids: authors(&["a1"]),
                limit: 10,
            })
            .unwrap();

        assert_eq!(subscription.next().await, Some(Vec::new()));
        assert_eq!(store.subscriber_count(), 1);

        store.insert(record("c1", "a1"));
        let snapshot = subscription.next().await.unwrap();
        assert_eq!(snapshot.len(), 1);

        subscription.unsubscribe();
        assert_eq!(store.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_follow_and_unfollow_return_updated_set() {
        let graph = InMemorySocialGraph::new();

        graph.follow("u1", "a1").await.unwrap();
        let after_follow = graph.follow("u1", "a2").await.unwrap();
        assert_eq!(after_follow, authors(&["a1", "a2"]));
        assert!(graph.author("a1").unwrap().follower_ids.contains("u1"));

        let after_unfollow = graph.unfollow("u1", "a1").await.unwrap();
        assert_eq!(after_unfollow, authors(&["a2"]));
        assert_eq!(graph.following("u1"), authors(&["a2"]));
    }

    #[tokio::test]
    async fn test_cannot_follow_self() {
        let graph = InMemorySocialGraph::new();
        let result = graph.follow("u1", "u1").await;
        assert!(matches!(result, Err(ClientError::Rejected { .. })));
    }
}
