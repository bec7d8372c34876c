// ============================================
// Pagination Cursor (卡片游標)
// ============================================
//
// Windows over an assembled feed for one-at-a-time consumption:
// - peek(n): card stack starting at the cursor, wrapping modulo length
// - advance(): position + 1 modulo length (replays the same order)
// - consume(): local half of a swipe (counters, ledger append, advance)
// - replenishment bookkeeping: served ids, has_more flag, low-buffer check

use crate::error::{FeedError, Result};
use crate::models::{ActionKind, ContentItem, InteractionEvent};
use crate::services::ledger::InteractionLedger;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::debug;

/// Where a card sits in the stacked presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackSlot {
    Front,
    BackLeft,
    BackRight,
    /// Deeper cards, by offset from the front
    Hidden(usize),
}

impl StackSlot {
    pub fn from_offset(offset: usize) -> Self {
        match offset {
            0 => StackSlot::Front,
            1 => StackSlot::BackLeft,
            2 => StackSlot::BackRight,
            n => StackSlot::Hidden(n),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub slot: StackSlot,
    pub item: ContentItem,
}

/// Local result of consuming a card
#[derive(Debug, Clone, PartialEq)]
pub struct Consumed {
    /// None when the action was a repeated like/save and nothing was recorded
    pub receipt: Option<ConsumeReceipt>,
}

/// What a consume changed, so it can be reverted if the durable write fails
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumeReceipt {
    pub sequence: u64,
    pub event: InteractionEvent,
    pub counter_incremented: bool,
}

#[derive(Debug, Clone)]
pub struct PaginationCursor {
    feed: Vec<ContentItem>,
    position: usize,
    served: HashSet<String>,
    has_more: bool,
    replenish_threshold: usize,
}

impl PaginationCursor {
    pub fn new(feed: Vec<ContentItem>, replenish_threshold: usize) -> Self {
        let served = feed.iter().map(|item| item.id.clone()).collect();
        Self {
            feed,
            position: 0,
            served,
            has_more: true,
            replenish_threshold,
        }
    }

    pub fn empty(replenish_threshold: usize) -> Self {
        Self::new(Vec::new(), replenish_threshold)
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.feed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feed.is_empty()
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn items(&self) -> &[ContentItem] {
        &self.feed
    }

    pub fn current(&self) -> Option<&ContentItem> {
        self.feed.get(self.position)
    }

    /// Up to `n` cards from the current position, wrapping at the end.
    /// A card never appears twice in one stack.
    pub fn peek(&self, n: usize) -> Vec<Card> {
        let len = self.feed.len();
        (0..n.min(len))
            .map(|offset| Card {
                slot: StackSlot::from_offset(offset),
                item: self.feed[(self.position + offset) % len].clone(),
            })
            .collect()
    }

    pub fn advance(&mut self) {
        if self.feed.is_empty() {
            return;
        }
        self.position = (self.position + 1) % self.feed.len();
    }

    /// Apply a swipe locally: bump the engagement counter, append to the
    /// ledger and advance. A repeated like/save only advances.
    pub fn consume(
        &mut self,
        action: ActionKind,
        content_id: &str,
        actor_id: &str,
        ledger: &mut InteractionLedger,
        now: DateTime<Utc>,
    ) -> Result<Consumed> {
        let item = self
            .feed
            .iter_mut()
            .find(|item| item.id == content_id)
            .ok_or_else(|| FeedError::UnknownContent(content_id.to_string()))?;

        if ledger.has_applied(actor_id, content_id, action) {
            debug!(
                content_id = %content_id,
                action = action.as_str(),
                "Repeated action ignored"
            );
            self.advance();
            return Ok(Consumed { receipt: None });
        }

        let counter_incremented = item.engagement.increment(action);
        let event = InteractionEvent::for_item(item, actor_id, action, now);
        let sequence = ledger.record(event.clone());
        self.advance();

        Ok(Consumed {
            receipt: Some(ConsumeReceipt {
                sequence,
                event,
                counter_incremented,
            }),
        })
    }

    /// Undo the counter and ledger changes of a consume. The position is kept.
    pub fn rollback(&mut self, receipt: &ConsumeReceipt, ledger: &mut InteractionLedger) {
        if receipt.counter_incremented {
            if let Some(item) = self.item_mut(&receipt.event.content_id) {
                item.engagement.decrement(receipt.event.action_kind);
            }
        }
        ledger.retract(receipt.sequence);
    }

    /// True once fewer than `replenish_threshold` cards remain ahead and
    /// the store may have more
    pub fn needs_replenishment(&self) -> bool {
        self.has_more && self.position + self.replenish_threshold >= self.feed.len()
    }

    /// Append items not served before; returns how many were appended
    pub fn append(&mut self, items: Vec<ContentItem>) -> usize {
        let before = self.feed.len();
        for item in items {
            if self.served.insert(item.id.clone()) {
                self.feed.push(item);
            }
        }
        self.feed.len() - before
    }

    pub fn mark_exhausted(&mut self) {
        self.has_more = false;
    }

    fn item_mut(&mut self, content_id: &str) -> Option<&mut ContentItem> {
        self.feed.iter_mut().find(|item| item.id == content_id)
    }
}
