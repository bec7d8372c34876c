pub mod cursor;
pub mod feed;
pub mod ledger;
pub mod preference;
pub mod ranking;
pub mod session;

pub use cursor::{Card, ConsumeReceipt, PaginationCursor, StackSlot};
pub use feed::{FeedAssembler, FetchTicket, RequestFence};
pub use ledger::InteractionLedger;
pub use preference::PreferenceModel;
pub use ranking::{RankingEngine, ScoredItem};
pub use session::{Collaborators, ConsumeOutcome, FeedSession, FetchOutcome};
