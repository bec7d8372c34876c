//! Step-function signals used by both feed modes.
//!
//! Bracket boundaries are strict: an item exactly on a boundary falls into
//! the lower bracket (1000 total engagement scores 0.5, not 0.6).

/// Recency score from content age in hours
///
/// | age        | score |
/// |------------|-------|
/// | < 6h       | 1.0   |
/// | < 24h      | 0.8   |
/// | < 72h      | 0.6   |
/// | < 168h     | 0.4   |
/// | otherwise  | 0.2   |
pub fn recency_score(age_hours: f64) -> f64 {
    if age_hours < 6.0 {
        1.0
    } else if age_hours < 24.0 {
        0.8
    } else if age_hours < 72.0 {
        0.6
    } else if age_hours < 168.0 {
        0.4
    } else {
        0.2
    }
}

/// Popularity score from weighted total engagement
pub fn popularity_score(total_engagement: u64) -> f64 {
    match total_engagement {
        e if e > 50_000 => 1.0,
        e if e > 20_000 => 0.9,
        e if e > 10_000 => 0.8,
        e if e > 5_000 => 0.7,
        e if e > 1_000 => 0.6,
        e if e > 500 => 0.5,
        _ => 0.3,
    }
}
