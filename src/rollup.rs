//! The rollup engine: one pure pass from attempt history to coaching signals.
//!
//! ```text
//! attempts + options -> accumulate -> { snapshot, trouble, trends, sessions } -> RollupResult
//! ```
//!
//! The only input besides the attempts is the [`Clock`], which supplies "now"
//! (recency decay, trailing window anchor) and the local calendar. With a
//! [`FixedClock`](crate::clock::FixedClock) the result is fully deterministic.

use crate::aggregate::{accumulate, Accumulator};
use crate::attempt::MetricKey;
use crate::clock::{Clock, SystemClock};
use crate::error::{ElocuteError, Result};
use crate::session::{build_sessions, SessionSummary};
use crate::snapshot::build_snapshot;
use crate::time_series::{build_trends, DayPoint, MetricTrend};
use crate::trouble::{phoneme_trouble, word_trouble, Trouble};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

pub const DEFAULT_WINDOW_DAYS: usize = 30;
pub const DEFAULT_MIN_WORD_COUNT: u64 = 2;
pub const DEFAULT_MIN_PHON_COUNT: u64 = 3;
/// Roughly ten years of daily buckets
pub const MAX_WINDOW_DAYS: usize = 3660;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RollupOptions {
    /// Length of every trend series
    pub window_days: usize,
    /// Occurrences a word needs before it can be listed as trouble
    pub min_word_count: u64,
    /// Occurrences a phoneme needs before it can be listed as trouble
    pub min_phon_count: u64,
}

impl Default for RollupOptions {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
            min_word_count: DEFAULT_MIN_WORD_COUNT,
            min_phon_count: DEFAULT_MIN_PHON_COUNT,
        }
    }
}

impl RollupOptions {
    pub fn validate(&self) -> Result<()> {
        if self.window_days == 0 {
            return Err(ElocuteError::InvalidOptions(
                "window_days must be at least 1".to_string(),
            ));
        }
        if self.window_days > MAX_WINDOW_DAYS {
            return Err(ElocuteError::InvalidOptions(format!(
                "window_days must be at most {MAX_WINDOW_DAYS}, got {}",
                self.window_days
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub attempts: u64,
    pub sessions: usize,
    #[serde(rename = "lastTS")]
    pub last_ts: Option<i64>,
    pub avg_score: Option<f64>,
    #[serde(rename = "bestDayTS")]
    pub best_day_ts: Option<i64>,
    pub best_day_score: Option<f64>,
    pub top_passage_key: Option<String>,
    pub top_passage_count: u64,
    pub top_passage_avg: Option<f64>,
    #[serde(rename = "topPassageLastTS")]
    pub top_passage_last_ts: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollupResult {
    pub totals: Totals,
    pub trouble: Trouble,
    /// Overall score per day, exactly `window_days` long
    pub trend: Vec<DayPoint>,
    pub metrics: BTreeMap<MetricKey, MetricTrend>,
    pub sessions: Vec<SessionSummary>,
}

/// Configured rollup engine
#[derive(Debug, Clone)]
pub struct Rollup<C: Clock = SystemClock> {
    options: RollupOptions,
    clock: C,
}

impl Rollup<SystemClock> {
    pub fn new(options: RollupOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            clock: SystemClock,
        })
    }
}

impl<C: Clock> Rollup<C> {
    pub fn with_clock<D: Clock>(self, clock: D) -> Rollup<D> {
        Rollup {
            options: self.options,
            clock,
        }
    }

    pub fn options(&self) -> &RollupOptions {
        &self.options
    }

    pub fn run(&self, attempts: &[Value]) -> RollupResult {
        let acc = accumulate(attempts, &self.clock);
        let result = self.assemble(&acc);

        debug!(
            attempts = acc.attempts,
            rich = acc.rich_attempts,
            compact = acc.compact_attempts,
            sessions = result.sessions.len(),
            phonemes = acc.phonemes.len(),
            words = acc.words.len(),
            "rollup complete"
        );

        result
    }

    fn assemble(&self, acc: &Accumulator) -> RollupResult {
        let now_ms = self.clock.now_ms();
        let snapshot = build_snapshot(&acc.days, &acc.passages, &self.clock);
        let (trend, metrics) = build_trends(acc, &self.clock, self.options.window_days);
        let sessions = build_sessions(&acc.sessions);

        let totals = Totals {
            attempts: acc.attempts,
            sessions: sessions.len(),
            last_ts: acc.last_ts,
            avg_score: (acc.attempts > 0).then(|| acc.score_sum / acc.attempts as f64),
            best_day_ts: snapshot.best_day_ts,
            best_day_score: snapshot.best_day_score,
            top_passage_key: snapshot.top_passage_key,
            top_passage_count: snapshot.top_passage_count,
            top_passage_avg: snapshot.top_passage_avg,
            top_passage_last_ts: snapshot.top_passage_last_ts,
        };

        let trouble = Trouble {
            phonemes_all: phoneme_trouble(&acc.phonemes, self.options.min_phon_count, now_ms),
            words_all: word_trouble(&acc.words, self.options.min_word_count, now_ms),
        };

        RollupResult {
            totals,
            trouble,
            trend,
            metrics,
            sessions,
        }
    }
}

/// Roll up `attempts` against the wall clock in the local timezone.
pub fn rollup(attempts: &[Value], options: RollupOptions) -> Result<RollupResult> {
    Ok(Rollup::new(options)?.run(attempts))
}
