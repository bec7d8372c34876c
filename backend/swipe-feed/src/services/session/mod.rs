// ============================================
// Feed Session (會話)
// ============================================
//
// One session = one user with one active feed mode. The session owns the
// interaction ledger (and with it the preference profile), the cursor over
// the assembled feed and the follow set, and drives the collaborators.
//
// State transitions happen under a short lock that is never held across a
// collaborator call, so several calls can be in flight at once:
// - load / replenish: fetch tagged with a fence ticket; applied only if the
//   ticket is still the latest for its mode and that mode is still wanted
// - consume: counters + ledger + advance applied in one step, then the
//   durable write; a failed write rolls back counters and ledger
// - follow / unfollow: follow set replaced by the graph's answer
//
// Every failure leaves the last-known-good feed, position and profile.

use crate::clients::{
    ContentQuery, ContentStore, ContentSubscription, InteractionStore, SocialGraph,
};
use crate::config::{FeedConfig, SessionConfig};
use crate::error::{ClientError, FeedError, Result};
use crate::models::{ActionKind, ContentItem, ContentRecord, FeedMode, InteractionEvent, PreferenceProfile};
use crate::services::cursor::{Card, PaginationCursor};
use crate::services::feed::{FeedAssembler, FetchTicket, RequestFence};
use crate::services::ledger::InteractionLedger;
use crate::services::ranking::RankingEngine;
use chrono::Utc;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// External services a session talks to
#[derive(Clone)]
pub struct Collaborators {
    pub content_store: Arc<dyn ContentStore>,
    pub interaction_store: Arc<dyn InteractionStore>,
    pub social_graph: Arc<dyn SocialGraph>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Response applied; `items` is the feed length (load) or the number appended
    Applied { items: usize },
    /// A newer request superseded this one; nothing changed
    Stale,
    /// Buffer still full or content exhausted; nothing fetched
    NotNeeded,
    /// Fetch failed; see `last_error`
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumeOutcome {
    /// False when a repeated like/save was ignored
    pub recorded: bool,
    pub replenishment: FetchOutcome,
}

struct SessionState {
    /// Mode of the feed behind the cursor
    active_mode: FeedMode,
    /// Most recently requested mode
    requested_mode: FeedMode,
    /// Ticket generation of the load that produced the current feed
    feed_generation: u64,
    /// Generation of the load currently in flight, if any
    pending_load: Option<u64>,
    cursor: PaginationCursor,
    ledger: InteractionLedger,
    following: HashSet<String>,
    fence: RequestFence,
    rng: StdRng,
    last_error: Option<FeedError>,
}

impl SessionState {
    fn accepts(&self, ticket: &FetchTicket) -> bool {
        self.fence.is_current(ticket) && self.requested_mode == ticket.mode
    }

    fn finish_load(&mut self, ticket: &FetchTicket) {
        if self.pending_load == Some(ticket.generation) {
            self.pending_load = None;
        }
    }

    fn record_failure(&mut self, err: impl Into<FeedError>) -> FeedError {
        let err = err.into();
        self.last_error = Some(err.clone());
        err
    }
}

/// Clears the in-flight load marker when a load finishes or is cancelled
struct PendingLoad<'a> {
    state: &'a Mutex<SessionState>,
    ticket: FetchTicket,
}

impl Drop for PendingLoad<'_> {
    fn drop(&mut self) {
        self.state.lock().finish_load(&self.ticket);
    }
}

pub struct FeedSession {
    session_id: Uuid,
    user_id: String,
    collaborators: Collaborators,
    assembler: FeedAssembler,
    feed_config: FeedConfig,
    state: Mutex<SessionState>,
}

impl FeedSession {
    pub fn new(
        user_id: impl Into<String>,
        config: SessionConfig,
        collaborators: Collaborators,
    ) -> Result<Self> {
        Self::build(user_id.into(), config, collaborators, StdRng::from_entropy())
    }

    /// Session with a fixed random seed (reproducible jitter and shuffles)
    pub fn with_seed(
        user_id: impl Into<String>,
        config: SessionConfig,
        collaborators: Collaborators,
        seed: u64,
    ) -> Result<Self> {
        Self::build(user_id.into(), config, collaborators, StdRng::seed_from_u64(seed))
    }

    fn build(
        user_id: String,
        config: SessionConfig,
        collaborators: Collaborators,
        rng: StdRng,
    ) -> Result<Self> {
        config.ranking.validate()?;
        config.feed.validate()?;

        let SessionConfig { ranking, feed } = config;
        let state = SessionState {
            active_mode: FeedMode::Recommended,
            requested_mode: FeedMode::Recommended,
            feed_generation: 0,
            pending_load: None,
            cursor: PaginationCursor::empty(feed.replenish_threshold),
            ledger: InteractionLedger::new(),
            following: HashSet::new(),
            fence: RequestFence::new(),
            rng,
            last_error: None,
        };

        Ok(Self {
            session_id: Uuid::new_v4(),
            user_id,
            collaborators,
            assembler: FeedAssembler::new(RankingEngine::new(ranking), feed.clone()),
            feed_config: feed,
            state: Mutex::new(state),
        })
    }

    /// Seed the follow set (e.g. from the social graph at sign-in)
    pub fn with_following(self, following: HashSet<String>) -> Self {
        self.state.lock().following = following;
        self
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn mode(&self) -> FeedMode {
        self.state.lock().active_mode
    }

    pub fn position(&self) -> usize {
        self.state.lock().cursor.position()
    }

    pub fn len(&self) -> usize {
        self.state.lock().cursor.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().cursor.is_empty()
    }

    pub fn has_more(&self) -> bool {
        self.state.lock().cursor.has_more()
    }

    pub fn items(&self) -> Vec<ContentItem> {
        self.state.lock().cursor.items().to_vec()
    }

    pub fn following(&self) -> HashSet<String> {
        self.state.lock().following.clone()
    }

    pub fn profile(&self) -> PreferenceProfile {
        self.state.lock().ledger.profile().clone()
    }

    pub fn history(&self) -> Vec<InteractionEvent> {
        self.state.lock().ledger.history().cloned().collect()
    }

    /// Most recent surfaced failure, cleared by the next successful load
    pub fn last_error(&self) -> Option<FeedError> {
        self.state.lock().last_error.clone()
    }

    /// Card at the cursor position
    pub fn current(&self) -> Option<ContentItem> {
        self.state.lock().cursor.current().cloned()
    }

    pub fn peek(&self, n: usize) -> Vec<Card> {
        self.state.lock().cursor.peek(n)
    }

    /// Default card stack
    pub fn stack(&self) -> Vec<Card> {
        self.peek(self.feed_config.stack_depth)
    }

    pub fn advance(&self) {
        self.state.lock().cursor.advance();
    }

    /// Fetch and assemble a fresh feed for `mode`, replacing the current one
    pub async fn load(&self, mode: FeedMode) -> Result<FetchOutcome> {
        let limit = self.feed_config.candidate_pool_size;
        let (ticket, following) = {
            let mut state = self.state.lock();
            state.requested_mode = mode;
            let ticket = state.fence.issue(mode);
            state.pending_load = Some(ticket.generation);
            (ticket, state.following.clone())
        };
        let _pending = PendingLoad {
            state: &self.state,
            ticket,
        };

        debug!(
            session_id = %self.session_id,
            mode = mode.as_str(),
            generation = ticket.generation,
            "Feed load issued"
        );

        let result = self.fetch(mode, &following, limit).await;

        let mut state = self.state.lock();
        if !state.accepts(&ticket) {
            debug!(
                session_id = %self.session_id,
                mode = mode.as_str(),
                generation = ticket.generation,
                "Discarding stale feed response"
            );
            return Ok(FetchOutcome::Stale);
        }

        let records = match result {
            Ok(records) => records,
            Err(err) => {
                warn!(
                    session_id = %self.session_id,
                    mode = mode.as_str(),
                    error = %err,
                    "Feed load failed, keeping previous feed"
                );
                let active_mode = state.active_mode;
                state.requested_mode = active_mode;
                return Err(state.record_failure(err));
            }
        };

        let fetched = records.len();
        let batch = FeedAssembler::admit(records);
        let now = Utc::now();

        let SessionState {
            ledger,
            following,
            rng,
            ..
        } = &mut *state;
        let feed = self
            .assembler
            .assemble(mode, batch.items, ledger.profile(), following, now, rng);

        let mut cursor = PaginationCursor::new(feed, self.feed_config.replenish_threshold);
        if fetched < limit {
            cursor.mark_exhausted();
        }
        let items = cursor.len();

        state.cursor = cursor;
        state.active_mode = mode;
        state.feed_generation = ticket.generation;
        state.last_error = None;

        info!(
            session_id = %self.session_id,
            user_id = %self.user_id,
            mode = mode.as_str(),
            fetched = fetched,
            rejected = batch.rejected.len(),
            items = items,
            "Feed loaded"
        );

        Ok(FetchOutcome::Applied { items })
    }

    /// Fetch the next batch when the cursor is running low.
    ///
    /// Never runs while a load is in flight: the load replaces the feed, and
    /// a replenishment ticket would otherwise supersede it.
    pub async fn replenish(&self) -> Result<FetchOutcome> {
        let limit = self.feed_config.batch_size;
        let (ticket, following) = {
            let mut state = self.state.lock();
            if !state.cursor.needs_replenishment()
                || state.requested_mode != state.active_mode
                || state.pending_load.is_some()
            {
                return Ok(FetchOutcome::NotNeeded);
            }
            let mode = state.active_mode;
            (state.fence.issue(mode), state.following.clone())
        };

        let result = self.fetch(ticket.mode, &following, limit).await;

        let mut state = self.state.lock();
        if !state.accepts(&ticket) {
            debug!(
                session_id = %self.session_id,
                generation = ticket.generation,
                "Discarding stale replenishment"
            );
            return Ok(FetchOutcome::Stale);
        }

        let records = match result {
            Ok(records) => records,
            Err(err) => {
                warn!(
                    session_id = %self.session_id,
                    error = %err,
                    "Replenishment failed"
                );
                return Err(state.record_failure(err));
            }
        };

        let fetched = records.len();
        let batch = FeedAssembler::admit(records);
        let now = Utc::now();

        let SessionState {
            ledger,
            following,
            rng,
            cursor,
            ..
        } = &mut *state;
        let assembled =
            self.assembler
                .assemble(ticket.mode, batch.items, ledger.profile(), following, now, rng);
        let appended = cursor.append(assembled);
        if fetched < limit {
            cursor.mark_exhausted();
        }

        info!(
            session_id = %self.session_id,
            fetched = fetched,
            appended = appended,
            has_more = cursor.has_more(),
            "Feed replenished"
        );

        Ok(FetchOutcome::Applied { items: appended })
    }

    /// Swipe a card: record the interaction, advance, then replenish if low.
    ///
    /// Local state (counter, ledger, profile, position) is updated before the
    /// durable write starts. If the write fails, the counter and ledger entry
    /// are rolled back; the position is not.
    pub async fn consume(&self, action: ActionKind, content_id: &str) -> Result<ConsumeOutcome> {
        let (consumed, feed_generation) = {
            let mut state = self.state.lock();
            let SessionState {
                cursor,
                ledger,
                feed_generation,
                ..
            } = &mut *state;
            let consumed = cursor.consume(action, content_id, &self.user_id, ledger, Utc::now())?;
            (consumed, *feed_generation)
        };

        let recorded = match consumed.receipt {
            None => false,
            Some(receipt) => {
                let write = self
                    .collaborators
                    .interaction_store
                    .record(&receipt.event)
                    .await;

                if let Err(err) = write {
                    let mut state = self.state.lock();
                    let mut receipt = receipt;
                    // A reloaded feed carries the store's counters, not ours
                    if state.feed_generation != feed_generation {
                        receipt.counter_incremented = false;
                    }
                    let SessionState { cursor, ledger, .. } = &mut *state;
                    cursor.rollback(&receipt, ledger);

                    warn!(
                        session_id = %self.session_id,
                        content_id = %content_id,
                        action = action.as_str(),
                        error = %err,
                        "Interaction write failed, rolled back"
                    );
                    return Err(state.record_failure(err));
                }
                true
            }
        };

        let replenishment = match self.replenish().await {
            Ok(outcome) => outcome,
            Err(_) => FetchOutcome::Failed,
        };

        Ok(ConsumeOutcome {
            recorded,
            replenishment,
        })
    }

    pub async fn follow(&self, target_id: &str) -> Result<HashSet<String>> {
        let result = self
            .collaborators
            .social_graph
            .follow(&self.user_id, target_id)
            .await;
        self.apply_follow_set(result, "follow", target_id)
    }

    pub async fn unfollow(&self, target_id: &str) -> Result<HashSet<String>> {
        let result = self
            .collaborators
            .social_graph
            .unfollow(&self.user_id, target_id)
            .await;
        self.apply_follow_set(result, "unfollow", target_id)
    }

    fn apply_follow_set(
        &self,
        result: std::result::Result<HashSet<String>, ClientError>,
        operation: &'static str,
        target_id: &str,
    ) -> Result<HashSet<String>> {
        let mut state = self.state.lock();
        match result {
            Ok(following) => {
                info!(
                    session_id = %self.session_id,
                    operation = operation,
                    target_id = %target_id,
                    following_count = following.len(),
                    "Follow set updated"
                );
                state.following = following.clone();
                Ok(following)
            }
            Err(err) => {
                warn!(
                    session_id = %self.session_id,
                    operation = operation,
                    error = %err,
                    "Social graph update failed"
                );
                Err(state.record_failure(err))
            }
        }
    }

    /// Live content snapshots for `mode`; feed them back with [`FeedSession::apply_snapshot`]
    pub fn subscribe(&self, mode: FeedMode) -> Result<ContentSubscription> {
        let limit = self.feed_config.candidate_pool_size;
        let query = match mode {
            FeedMode::Followed => ContentQuery::Followed {
                author_ids: self.state.lock().following.clone(),
                limit,
            },
            FeedMode::Recommended => ContentQuery::Recommendable {
                user_id: self.user_id.clone(),
                limit,
            },
        };

        self.collaborators
            .content_store
            .subscribe(query)
            .map_err(|err| self.state.lock().record_failure(err))
    }

    /// Apply a subscription snapshot.
    ///
    /// For the mode already on screen, unseen items are appended behind the
    /// cursor. Otherwise the snapshot becomes the new feed for `mode`.
    pub fn apply_snapshot(&self, mode: FeedMode, records: Vec<ContentRecord>) -> FetchOutcome {
        let fetched = records.len();
        let batch = FeedAssembler::admit(records);
        let now = Utc::now();

        let mut state = self.state.lock();
        let appending = state.active_mode == mode
            && state.requested_mode == mode
            && !state.cursor.is_empty();

        let ticket = if appending {
            None
        } else {
            state.requested_mode = mode;
            Some(state.fence.issue(mode))
        };

        let SessionState {
            ledger,
            following,
            rng,
            ..
        } = &mut *state;
        let assembled = self
            .assembler
            .assemble(mode, batch.items, ledger.profile(), following, now, rng);

        let items = match ticket {
            None => state.cursor.append(assembled),
            Some(ticket) => {
                let mut cursor =
                    PaginationCursor::new(assembled, self.feed_config.replenish_threshold);
                if fetched < self.feed_config.candidate_pool_size {
                    cursor.mark_exhausted();
                }
                let items = cursor.len();
                state.cursor = cursor;
                state.active_mode = mode;
                state.feed_generation = ticket.generation;
                items
            }
        };

        debug!(
            session_id = %self.session_id,
            mode = mode.as_str(),
            appending = appending,
            items = items,
            "Snapshot applied"
        );

        FetchOutcome::Applied { items }
    }

    async fn fetch(
        &self,
        mode: FeedMode,
        following: &HashSet<String>,
        limit: usize,
    ) -> std::result::Result<Vec<ContentRecord>, ClientError> {
        match mode {
            FeedMode::Followed => {
                self.collaborators
                    .content_store
                    .fetch_followed(following, limit)
                    .await
            }
            FeedMode::Recommended => {
                self.collaborators
                    .content_store
                    .fetch_recommendable(&self.user_id, limit)
                    .await
            }
        }
    }
}
