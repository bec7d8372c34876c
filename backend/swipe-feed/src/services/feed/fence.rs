// Request fencing for content fetches.
//
// Every fetch is tagged with a generation at issue time. Generations are
// monotonically increasing across all modes; a response may only be applied
// while its generation is still the latest one issued for its mode.

use crate::models::FeedMode;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub mode: FeedMode,
    pub generation: u64,
}

#[derive(Debug, Default)]
pub struct RequestFence {
    last_generation: u64,
    latest: HashMap<FeedMode, u64>,
}

impl RequestFence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new ticket, superseding every earlier ticket for the same mode
    pub fn issue(&mut self, mode: FeedMode) -> FetchTicket {
        self.last_generation += 1;
        self.latest.insert(mode, self.last_generation);
        FetchTicket {
            mode,
            generation: self.last_generation,
        }
    }

    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        self.latest.get(&ticket.mode) == Some(&ticket.generation)
    }
}
