use crate::attempt::{AttemptView, CompactDetail, CompactPhonemes, Detail, MetricKey, RichWord};
use crate::clock::Clock;
use crate::session::NO_SESSION_PREFIX;
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::Hash;
use tracing::trace;

/// Scores below this count as a "low" (struggling) observation
pub const LOW_SCORE: f64 = 80.0;
/// Example words kept per phoneme
pub const MAX_EXAMPLES: usize = 4;

/// Insertion-ordered map; iteration follows first-seen order so ties resolve
/// to whatever the scan met first.
#[derive(Debug, Clone)]
pub struct Keyed<K, V> {
    index: HashMap<K, usize>,
    items: Vec<(K, V)>,
}

impl<K: Eq + Hash + Clone, V> Keyed<K, V> {
    pub fn new() -> Self {
        Self {
            index: HashMap::new(),
            items: Vec::new(),
        }
    }

    pub fn entry_or_insert_with(&mut self, key: K, default: impl FnOnce() -> V) -> &mut V {
        let idx = match self.index.get(&key) {
            Some(&idx) => idx,
            None => {
                self.items.push((key.clone(), default()));
                self.index.insert(key, self.items.len() - 1);
                self.items.len() - 1
            }
        };
        &mut self.items[idx].1
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.index.get(key).map(|&idx| &self.items[idx].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.items.iter().map(|(k, v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<K: Eq + Hash + Clone, V> Default for Keyed<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

fn average(sum: f64, count: u64) -> Option<f64> {
    (count > 0).then(|| sum / count as f64)
}

/// Saturating count increase; returns how many occurrences were actually added
/// so sums stay consistent with the capped count.
fn absorb(total: &mut u64, count: u64) -> u64 {
    let added = count.min(u64::MAX - *total);
    *total += added;
    added
}

fn widen_last_seen(last_seen: &mut Option<i64>, ts: i64) {
    *last_seen = Some(last_seen.map_or(ts, |seen| seen.max(ts)));
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhonemeAggregate {
    pub count: u64,
    pub sum: f64,
    pub days: HashSet<NaiveDate>,
    pub examples: Vec<String>,
    pub last_seen: Option<i64>,
    pub low: u64,
}

impl PhonemeAggregate {
    /// Fold `count` occurrences averaging `score`, `low` of them sub-threshold.
    pub fn observe(&mut self, score: f64, count: u64, low: u64, day: NaiveDate, ts: i64) {
        let added = absorb(&mut self.count, count);
        self.sum += score * added as f64;
        self.low = self.low.saturating_add(low.min(added));
        self.days.insert(day);
        widen_last_seen(&mut self.last_seen, ts);
    }

    pub fn add_example(&mut self, word: &str) {
        if word.is_empty() || self.examples.len() >= MAX_EXAMPLES {
            return;
        }
        if !self.examples.iter().any(|w| w == word) {
            self.examples.push(word.to_string());
        }
    }

    pub fn avg(&self) -> Option<f64> {
        average(self.sum, self.count)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WordAggregate {
    pub count: u64,
    pub sum: f64,
    pub days: HashSet<NaiveDate>,
    pub last_seen: Option<i64>,
}

impl WordAggregate {
    /// Weighted merge: `count` occurrences averaging `score`.
    pub fn observe(&mut self, score: f64, count: u64, day: NaiveDate, ts: i64) {
        let added = absorb(&mut self.count, count);
        self.sum += score * added as f64;
        self.days.insert(day);
        widen_last_seen(&mut self.last_seen, ts);
    }

    pub fn avg(&self) -> Option<f64> {
        average(self.sum, self.count)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DayAggregate {
    pub count: u64,
    pub sum: f64,
}

impl DayAggregate {
    pub fn observe(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
    }

    pub fn avg(&self) -> Option<f64> {
        average(self.sum, self.count)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionAggregate {
    /// First non-empty passage key seen in the session
    pub passage_key: String,
    pub count: u64,
    pub sum: f64,
    pub ts_min: i64,
    pub ts_max: i64,
    pub has_ai: bool,
}

impl SessionAggregate {
    fn starting_at(ts: i64) -> Self {
        Self {
            passage_key: String::new(),
            count: 0,
            sum: 0.0,
            ts_min: ts,
            ts_max: ts,
            has_ai: false,
        }
    }

    pub fn observe(&mut self, view: &AttemptView, ts: i64) {
        if self.passage_key.is_empty() {
            self.passage_key.clone_from(&view.passage_key);
        }
        self.count += 1;
        self.sum += view.score;
        self.ts_min = self.ts_min.min(ts);
        self.ts_max = self.ts_max.max(ts);
        self.has_ai |= view.has_ai;
    }

    pub fn avg(&self) -> Option<f64> {
        average(self.sum, self.count)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassageAggregate {
    pub count: u64,
    pub sum: f64,
    pub last_seen: Option<i64>,
}

impl PassageAggregate {
    pub fn avg(&self) -> Option<f64> {
        average(self.sum, self.count)
    }
}

/// A timestamped metric reading, kept unbucketed for "most recent" lookups
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub ts: i64,
    pub value: f64,
}

#[derive(Debug, Clone, Default)]
pub struct MetricAggregate {
    pub days: HashMap<NaiveDate, DayAggregate>,
    pub samples: Vec<Sample>,
}

impl MetricAggregate {
    pub fn observe(&mut self, day: NaiveDate, ts: i64, value: f64) {
        self.days.entry(day).or_default().observe(value);
        self.samples.push(Sample { ts, value });
    }
}

/// Every intermediate aggregate of one rollup, built in a single scan
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    pub attempts: u64,
    pub score_sum: f64,
    pub last_ts: Option<i64>,
    pub days: Keyed<NaiveDate, DayAggregate>,
    pub sessions: Keyed<String, SessionAggregate>,
    pub passages: Keyed<String, PassageAggregate>,
    pub phonemes: Keyed<String, PhonemeAggregate>,
    pub words: Keyed<String, WordAggregate>,
    pub metrics: BTreeMap<MetricKey, MetricAggregate>,
    pub rich_attempts: u64,
    pub compact_attempts: u64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self {
            metrics: MetricKey::ALL
                .into_iter()
                .map(|key| (key, MetricAggregate::default()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn add<C: Clock>(&mut self, view: &AttemptView, clock: &C) {
        let ts = view.ts_or(clock.now_ms());
        let day = clock.local_day(ts);

        self.attempts += 1;
        self.score_sum += view.score;
        if let Some(real_ts) = view.ts {
            widen_last_seen(&mut self.last_ts, real_ts);
        }

        self.days
            .entry_or_insert_with(day, DayAggregate::default)
            .observe(view.score);

        // Undated attempts join no session.
        if let Some(real_ts) = view.ts {
            let session_id = if view.session_id.is_empty() {
                format!("{NO_SESSION_PREFIX}{day}")
            } else {
                view.session_id.clone()
            };
            self.sessions
                .entry_or_insert_with(session_id, || SessionAggregate::starting_at(real_ts))
                .observe(view, real_ts);
        }

        if !view.passage_key.is_empty() {
            let passage = self
                .passages
                .entry_or_insert_with(view.passage_key.clone(), PassageAggregate::default);
            passage.count += 1;
            passage.sum += view.score;
            widen_last_seen(&mut passage.last_seen, ts);
        }

        for key in MetricKey::ALL {
            if let Some(value) = view.metric(key) {
                self.metrics.entry(key).or_default().observe(day, ts, value);
            }
        }

        match &view.detail {
            Detail::Rich(words) => {
                self.rich_attempts += 1;
                self.merge_rich(words, day, ts);
            }
            Detail::Compact(compact) => {
                self.compact_attempts += 1;
                self.merge_compact(compact, day, ts);
            }
        }
    }

    fn merge_rich(&mut self, words: &[RichWord], day: NaiveDate, ts: i64) {
        for word in words {
            if let (Some(score), false) = (word.score, word.word.is_empty()) {
                self.words
                    .entry_or_insert_with(word.word.clone(), WordAggregate::default)
                    .observe(score, 1, day, ts);
            }

            for phoneme in &word.phonemes {
                let low = phoneme.score < LOW_SCORE;
                let agg = self
                    .phonemes
                    .entry_or_insert_with(phoneme.ipa.clone(), PhonemeAggregate::default);
                agg.observe(phoneme.score, 1, low as u64, day, ts);
                if low {
                    agg.add_example(&word.word);
                }
            }
        }
    }

    fn merge_compact(&mut self, compact: &CompactDetail, day: NaiveDate, ts: i64) {
        if compact.words.is_empty()
            && matches!(&compact.phonemes, CompactPhonemes::Lows(lows) if lows.is_empty())
        {
            trace!(ts, "attempt carried no word or phoneme detail");
        }

        for tuple in &compact.words {
            self.words
                .entry_or_insert_with(tuple.word.clone(), WordAggregate::default)
                .observe(tuple.avg, tuple.count, day, ts);
        }

        match &compact.phonemes {
            CompactPhonemes::Keyed(stats) => {
                for stat in stats {
                    self.phonemes
                        .entry_or_insert_with(stat.ipa.clone(), PhonemeAggregate::default)
                        .observe(stat.avg, stat.occ, stat.low, day, ts);
                }
            }
            CompactPhonemes::Lows(lows) => {
                for obs in lows {
                    let low = obs.score < LOW_SCORE;
                    let agg = self
                        .phonemes
                        .entry_or_insert_with(obs.ipa.clone(), PhonemeAggregate::default);
                    agg.observe(obs.score, 1, low as u64, day, ts);
                    if let Some(word) = obs.word.as_deref().filter(|_| low) {
                        agg.add_example(word);
                    }
                }
            }
        }
    }
}

/// The accumulation pass: one scan over every attempt.
pub fn accumulate<C: Clock>(attempts: &[Value], clock: &C) -> Accumulator {
    let mut acc = Accumulator::new();
    for attempt in attempts {
        acc.add(&AttemptView::from_value(attempt), clock);
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{FixedClock, DAY_MS};
    use serde_json::json;

    const NOW: i64 = 1_700_000_000_000;

    fn clock() -> FixedClock {
        FixedClock::utc(NOW)
    }

    #[test]
    fn keyed_preserves_first_seen_order() {
        let mut keyed: Keyed<&str, u32> = Keyed::new();
        *keyed.entry_or_insert_with("b", || 0) += 1;
        *keyed.entry_or_insert_with("a", || 0) += 1;
        *keyed.entry_or_insert_with("b", || 0) += 1;
        let items: Vec<_> = keyed.iter().map(|(k, v)| (*k, *v)).collect();
        assert_eq!(items, vec![("b", 2), ("a", 1)]);
        assert_eq!(keyed.get(&"a"), Some(&1));
        assert_eq!(keyed.len(), 2);
    }

    #[test]
    fn examples_are_capped_and_distinct() {
        let mut agg = PhonemeAggregate::default();
        for word in ["a", "b", "a", "c", "d", "e", ""] {
            agg.add_example(word);
        }
        assert_eq!(agg.examples, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn counts_days_sessions_and_passages() {
        let attempts = vec![
            json!({"ts": NOW - DAY_MS, "summary": {"pron": 90}, "passageKey": "p1"}),
            json!({"ts": NOW - DAY_MS + 1000, "summary": {"pron": 70}, "passageKey": "p1"}),
            json!({"ts": NOW, "summary": {"pron": 80}, "passageKey": "p2", "sessionId": "s9"}),
        ];
        let acc = accumulate(&attempts, &clock());
        assert_eq!(acc.attempts, 3);
        assert_eq!(acc.score_sum, 240.0);
        assert_eq!(acc.last_ts, Some(NOW));
        assert_eq!(acc.days.len(), 2);
        assert_eq!(acc.sessions.len(), 2);
        assert!(acc.sessions.get(&"s9".to_string()).is_some());
        let p1 = acc.passages.get(&"p1".to_string()).unwrap();
        assert_eq!(p1.count, 2);
        assert_eq!(p1.avg(), Some(80.0));
    }

    #[test]
    fn undated_attempts_skip_sessions_but_count() {
        let attempts = vec![json!({"summary": {"pron": 60}})];
        let acc = accumulate(&attempts, &clock());
        assert_eq!(acc.attempts, 1);
        assert!(acc.sessions.is_empty());
        assert_eq!(acc.last_ts, None);
        let today = clock().today();
        assert_eq!(acc.days.get(&today).unwrap().count, 1);
    }

    #[test]
    fn session_keeps_first_passage_and_widens_range() {
        let attempts = vec![
            json!({"ts": NOW - 5000, "sessionId": "s", "summary": {"pron": 50}}),
            json!({"ts": NOW - 9000, "sessionId": "s", "passageKey": "first", "summary": {"pron": 70}}),
            json!({"ts": NOW, "sessionId": "s", "passageKey": "second", "ai": "nice", "summary": {"pron": 90}}),
        ];
        let acc = accumulate(&attempts, &clock());
        let session = acc.sessions.get(&"s".to_string()).unwrap();
        assert_eq!(session.passage_key, "first");
        assert_eq!(session.count, 3);
        assert_eq!(session.ts_min, NOW - 9000);
        assert_eq!(session.ts_max, NOW);
        assert!(session.has_ai);
        assert_eq!(session.avg(), Some(70.0));
    }

    #[test]
    fn metrics_only_record_present_values() {
        let attempts = vec![
            json!({"ts": NOW, "summary": {"acc": 80, "flu": "oops"}}),
            json!({"ts": NOW, "summary": {"acc": 60}}),
        ];
        let acc = accumulate(&attempts, &clock());
        let accuracy = &acc.metrics[&MetricKey::Accuracy];
        assert_eq!(accuracy.samples.len(), 2);
        assert_eq!(accuracy.days[&clock().today()].avg(), Some(70.0));
        assert!(acc.metrics[&MetricKey::Fluency].samples.is_empty());
    }

    #[test]
    fn rich_path_counts_low_phonemes_and_examples() {
        let attempt = json!({
            "ts": NOW,
            "azureResult": {"NBest": [{"Words": [
                {"Word": "Think", "AccuracyScore": 60, "Phonemes": [
                    {"Phoneme": "th", "AccuracyScore": 30},
                    {"Phoneme": "ih", "AccuracyScore": 95}
                ]},
                {"Word": "thin", "AccuracyScore": 70, "Phonemes": [
                    {"Phoneme": "th", "AccuracyScore": 50}
                ]},
                {"Word": "um", "Phonemes": []}
            ]}]}
        });
        let acc = accumulate(&[attempt], &clock());
        assert_eq!(acc.rich_attempts, 1);
        let th = acc.phonemes.get(&"θ".to_string()).unwrap();
        assert_eq!(th.count, 2);
        assert_eq!(th.low, 2);
        assert_eq!(th.avg(), Some(40.0));
        assert_eq!(th.examples, vec!["think", "thin"]);
        let ih = acc.phonemes.get(&"ɪ".to_string()).unwrap();
        assert_eq!(ih.low, 0);
        assert!(ih.examples.is_empty());
        assert!(acc.words.get(&"um".to_string()).is_none());
        assert_eq!(acc.words.len(), 2);
    }

    #[test]
    fn compact_words_use_weighted_merge() {
        let attempts = vec![
            json!({"ts": NOW, "summary": {"words": [["cat", 50, 2]]}}),
            json!({"ts": NOW, "summary": {"words": [["cat", 80, 1]]}}),
        ];
        let acc = accumulate(&attempts, &clock());
        let cat = acc.words.get(&"cat".to_string()).unwrap();
        assert_eq!(cat.count, 3);
        assert_eq!(cat.sum, 180.0);
        assert_eq!(cat.avg(), Some(60.0));
        assert_eq!(acc.compact_attempts, 2);
    }

    #[test]
    fn huge_compact_counts_saturate() {
        let attempts = vec![
            json!({"ts": NOW, "summary": {"words": [["cat", 50, 1e300]], "phonStats": {"t": {"occ": 1e300, "avg": 40, "low": 1e300}}}}),
            json!({"ts": NOW, "summary": {"words": [["cat", 50, 1e300]], "phonStats": {"t": {"occ": 1e300, "avg": 40, "low": 1e300}}}}),
        ];
        let acc = accumulate(&attempts, &clock());
        let cat = acc.words.get(&"cat".to_string()).unwrap();
        assert_eq!(cat.count, u64::MAX);
        assert_eq!(cat.avg(), Some(50.0));
        let t = acc.phonemes.get(&"t".to_string()).unwrap();
        assert_eq!(t.count, u64::MAX);
        assert_eq!(t.low, u64::MAX);
        assert_eq!(t.avg(), Some(40.0));
    }

    #[test]
    fn compact_keyed_and_lows_paths() {
        let attempts = vec![
            json!({"ts": NOW, "summary": {"phonStats": {"θ": {"occ": 4, "avg": 60, "low": 9}}}}),
            json!({"ts": NOW - 2 * DAY_MS, "summary": {"lows": [["th", 40, "bath"], ["r", 70]]}}),
        ];
        let acc = accumulate(&attempts, &clock());
        let th = acc.phonemes.get(&"θ".to_string()).unwrap();
        assert_eq!(th.count, 5);
        assert_eq!(th.low, 5);
        assert_eq!(th.sum, 280.0);
        assert_eq!(th.days.len(), 2);
        assert_eq!(th.last_seen, Some(NOW));
        assert_eq!(th.examples, vec!["bath"]);
        assert_eq!(acc.phonemes.get(&"ɹ".to_string()).unwrap().count, 1);
    }

    #[test]
    fn rich_and_compact_never_both_run() {
        let attempt = json!({
            "ts": NOW,
            "summary": {"words": [["cat", 10, 5]], "lows": [["t", 10]]},
            "azureResult": {"NBest": [{"Words": [{"Word": "cat", "AccuracyScore": 90}]}]}
        });
        let acc = accumulate(&[attempt], &clock());
        let cat = acc.words.get(&"cat".to_string()).unwrap();
        assert_eq!(cat.count, 1);
        assert_eq!(cat.avg(), Some(90.0));
        assert!(acc.phonemes.is_empty());
        assert_eq!(acc.compact_attempts, 0);
    }
}
