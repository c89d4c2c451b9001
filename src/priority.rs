use crate::clock::days_between;

/// Days assumed since last sighting when an item has never been timestamped
pub const UNSEEN_DAYS_AGO: i64 = 999;
/// Distinct practice days at which persistence saturates
pub const PERSISTENCE_DAYS: f64 = 5.0;
pub const RECENCY_FLOOR: f64 = 0.3;
pub const RECENCY_DECAY_DAYS: f64 = 14.0;

/// Fraction of the score missing from a perfect 100, clamped to [0, 1].
pub fn error_rate(avg: f64) -> f64 {
    if !avg.is_finite() {
        return 0.0;
    }
    ((100.0 - avg) / 100.0).clamp(0.0, 1.0)
}

/// Log-damped occurrence count.
pub fn exposure(count: f64) -> f64 {
    if !count.is_finite() {
        return 0.0;
    }
    count.max(0.0).ln_1p()
}

pub fn persistence(days_seen: usize) -> f64 {
    (days_seen as f64 / PERSISTENCE_DAYS).min(1.0)
}

/// Decay weight in [0.3, 1.0]; old sightings fade toward the floor instead of zero.
///
/// In `f64` the decay term underflows below the floor's precision after a few
/// hundred days, so very stale items (including never-seen ones at 999 days)
/// land exactly on 0.3.
pub fn recency(days_ago: i64) -> f64 {
    RECENCY_FLOOR + (1.0 - RECENCY_FLOOR) * (-(days_ago.max(0) as f64) / RECENCY_DECAY_DAYS).exp()
}

pub fn days_ago(last_seen_ms: Option<i64>, now_ms: i64) -> i64 {
    last_seen_ms.map_or(UNSEEN_DAYS_AGO, |seen| days_between(seen, now_ms))
}

/// Ranking value for a trouble item. Always finite and non-negative.
pub fn priority(
    avg: f64,
    count: u64,
    days_seen: usize,
    last_seen_ms: Option<i64>,
    now_ms: i64,
) -> f64 {
    error_rate(avg)
        * exposure(count as f64)
        * persistence(days_seen)
        * recency(days_ago(last_seen_ms, now_ms))
}
