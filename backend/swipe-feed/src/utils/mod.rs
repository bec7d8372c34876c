// Utility functions for swipe-feed

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Scale every score by the largest magnitude in the map.
///
/// The divisor is floored at 1, so an empty or all-small map is left as is.
pub fn normalize_by_max_magnitude(scores: &mut HashMap<String, f64>) {
    let max_magnitude = scores.values().fold(0.0_f64, |acc, s| acc.max(s.abs()));
    let divisor = max_magnitude.max(1.0);

    for score in scores.values_mut() {
        *score /= divisor;
    }
}

/// Hours elapsed since `created_at`; future timestamps count as zero.
pub fn age_hours(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let seconds = (now - created_at).num_seconds().max(0);
    seconds as f64 / 3600.0
}

/// Descending order for scores. NaN is treated as less than any valid score.
pub fn cmp_score_desc(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}
