// ============================================
// Interaction Ledger (互動記錄)
// ============================================
//
// Append-only record of interaction events for one session.
// Every append rebuilds the preference profile from the full history.
//
// The only removal path is `retract`, used when the durable write of an
// event fails and the optimistic local state is rolled back.

use crate::models::{ActionKind, InteractionEvent, PreferenceProfile};
use crate::services::preference::PreferenceModel;
use std::collections::HashSet;
use tracing::debug;

/// An event together with its position in the ledger
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub sequence: u64,
    pub event: InteractionEvent,
}

#[derive(Debug, Clone, Default)]
pub struct InteractionLedger {
    entries: Vec<LedgerEntry>,
    next_sequence: u64,
    /// (actor, content, action) for idempotent actions already recorded
    applied: HashSet<(String, String, ActionKind)>,
    model: PreferenceModel,
    profile: PreferenceProfile,
}

impl InteractionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event and rebuild the profile. Returns the entry sequence.
    pub fn record(&mut self, event: InteractionEvent) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        if event.action_kind.is_idempotent() {
            self.applied.insert(Self::applied_key(&event));
        }

        debug!(
            sequence = sequence,
            content_id = %event.content_id,
            action = event.action_kind.as_str(),
            "Interaction recorded"
        );

        self.entries.push(LedgerEntry { sequence, event });
        self.rebuild_profile();
        sequence
    }

    /// Full ordered history
    pub fn history(&self) -> impl Iterator<Item = &InteractionEvent> + '_ {
        self.entries.iter().map(|entry| &entry.event)
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn profile(&self) -> &PreferenceProfile {
        &self.profile
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether an idempotent action was already applied by this actor to this content
    pub fn has_applied(&self, actor_id: &str, content_id: &str, action: ActionKind) -> bool {
        action.is_idempotent()
            && self.applied.contains(&(
                actor_id.to_string(),
                content_id.to_string(),
                action,
            ))
    }

    /// Remove an unacknowledged entry and rebuild the profile
    pub(crate) fn retract(&mut self, sequence: u64) -> Option<InteractionEvent> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.sequence == sequence)?;
        let entry = self.entries.remove(index);

        if entry.event.action_kind.is_idempotent() {
            self.applied.remove(&Self::applied_key(&entry.event));
        }

        debug!(
            sequence = sequence,
            content_id = %entry.event.content_id,
            "Interaction retracted"
        );

        self.rebuild_profile();
        Some(entry.event)
    }

    fn rebuild_profile(&mut self) {
        self.profile = self.model.compute(self.history());
    }

    fn applied_key(event: &InteractionEvent) -> (String, String, ActionKind) {
        (
            event.actor_id.clone(),
            event.content_id.clone(),
            event.action_kind,
        )
    }
}
