/// Ranking Module
///
/// Scores content items for the recommended feed.
///
/// # Workflow
/// 1. Look up category/brand affinity in the preference profile (default 0.1)
/// 2. Compute popularity and recency step signals
/// 3. Blend with the configured coefficients → base score
/// 4. Multiply by the following boost when the author is followed
/// 5. Add diversity jitter
pub mod scorer;
pub mod signals;

pub use scorer::{RankingEngine, ScoreFeatures, ScoredItem};
pub use signals::{popularity_score, recency_score};
