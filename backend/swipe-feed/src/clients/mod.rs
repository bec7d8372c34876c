//! External collaborators consumed by the feed core.
//!
//! Only the shapes are fixed here; transport, persistence and timeouts
//! belong to the implementations. Every implementation reports failure as a
//! [`ClientError`], which the core turns into a recoverable `FeedError::Fetch`.

pub mod memory;
pub mod subscription;

pub use memory::{InMemoryContentStore, InMemoryInteractionStore, InMemorySocialGraph};
pub use subscription::ContentSubscription;

use crate::error::ClientError;
use crate::models::{ContentRecord, InteractionEvent};
use async_trait::async_trait;
use std::collections::HashSet;

pub const CONTENT_STORE: &str = "content-store";
pub const INTERACTION_STORE: &str = "interaction-store";
pub const SOCIAL_GRAPH: &str = "social-graph";

/// Query a subscription is bound to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentQuery {
    Followed {
        author_ids: HashSet<String>,
        limit: usize,
    },
    Recommendable {
        user_id: String,
        limit: usize,
    },
}

/// Supplies content items
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Next batch of content by the given authors
    async fn fetch_followed(
        &self,
        followed_author_ids: &HashSet<String>,
        limit: usize,
    ) -> Result<Vec<ContentRecord>, ClientError>;

    /// Next batch of content eligible for recommendation to `user_id`
    async fn fetch_recommendable(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<ContentRecord>, ClientError>;

    /// Live snapshots of the records matching `query`, until unsubscribed
    fn subscribe(&self, query: ContentQuery) -> Result<ContentSubscription, ClientError>;
}

/// Durable record of interaction events
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InteractionStore: Send + Sync {
    async fn record(&self, event: &InteractionEvent) -> Result<(), ClientError>;
}

/// Owner of follow relationships
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SocialGraph: Send + Sync {
    /// Returns the actor's updated follow set
    async fn follow(&self, actor_id: &str, target_id: &str)
        -> Result<HashSet<String>, ClientError>;

    /// Returns the actor's updated follow set
    async fn unfollow(
        &self,
        actor_id: &str,
        target_id: &str,
    ) -> Result<HashSet<String>, ClientError>;
}
