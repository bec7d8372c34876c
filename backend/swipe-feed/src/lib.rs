//! Swipe feed core: interaction ledger, preference model, ranking,
//! feed assembly and card pagination for one user session.

pub mod clients;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use config::{FeedConfig, RankingConfig, SessionConfig};
pub use error::{FeedError, Result};
pub use models::{ActionKind, ContentItem, ContentRecord, FeedMode, InteractionEvent};
pub use services::{
    Collaborators, ConsumeOutcome, FeedAssembler, FeedSession, FetchOutcome, InteractionLedger,
    PaginationCursor, PreferenceModel, RankingEngine,
};
