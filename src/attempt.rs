//! Normalization of heterogeneous practice-attempt records.
//!
//! Attempts come from a store that has held several record shapes over time:
//! fresh records carry the assessment provider's full n-best payload, older
//! ones were compacted down to a `summary` of pre-aggregated numbers. Every
//! shape difference is absorbed here; the rest of the crate only sees
//! [`AttemptView`].

use crate::clock::instant;
use crate::phoneme;
use crate::util::{finite, probe, probe_finite, text};
use chrono::DateTime;
use serde::Serialize;
use serde_json::Value;
use std::borrow::Cow;

const TIMESTAMP_KEYS: &[&str] = &["ts", "timestamp", "createdAt", "created_at", "time"];
const PASSAGE_KEYS: &[&str] = &[
    "passageKey",
    "passage_key",
    "passageId",
    "passage_id",
    "activityKey",
    "activity",
];
const SESSION_KEYS: &[&str] = &["sessionId", "session_id", "session"];
const SUMMARY_KEYS: &[&str] = &["summary", "sum", "scores"];
const RAW_RESULT_KEYS: &[&str] = &["azureResult", "azure", "result", "raw", "assessment"];
const FEEDBACK_KEYS: &[&str] = &["ai", "aiFeedback", "feedback", "coaching"];

const NBEST_KEYS: &[&str] = &["NBest", "nBest", "nbest"];
const ASSESSMENT_KEYS: &[&str] = &["PronunciationAssessment", "pronunciationAssessment"];
const WORDS_KEYS: &[&str] = &["Words", "words"];
const PHONEMES_KEYS: &[&str] = &["Phonemes", "phonemes"];

/// Per-category score carried in an attempt summary
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    strum_macros::Display,
    strum_macros::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MetricKey {
    Accuracy,
    Fluency,
    Completeness,
    Pronunciation,
}

impl MetricKey {
    pub const ALL: [MetricKey; 4] = [
        MetricKey::Accuracy,
        MetricKey::Fluency,
        MetricKey::Completeness,
        MetricKey::Pronunciation,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MetricKey::Accuracy => "Accuracy",
            MetricKey::Fluency => "Fluency",
            MetricKey::Completeness => "Completeness",
            MetricKey::Pronunciation => "Pronunciation",
        }
    }

    fn summary_keys(self) -> &'static [&'static str] {
        match self {
            MetricKey::Accuracy => &["acc", "accuracy"],
            MetricKey::Fluency => &["flu", "fluency"],
            MetricKey::Completeness => &["comp", "completeness"],
            MetricKey::Pronunciation => &["pron", "pronunciation"],
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// One phoneme occurrence from a full assessment payload
#[derive(Debug, Clone, PartialEq)]
pub struct RichPhoneme {
    pub ipa: String,
    pub score: f64,
}

/// One word occurrence from a full assessment payload
#[derive(Debug, Clone, PartialEq)]
pub struct RichWord {
    /// Lower-cased word text, possibly empty
    pub word: String,
    pub score: Option<f64>,
    pub phonemes: Vec<RichPhoneme>,
}

/// `[word, avgScore, occurrenceCount]` from a compacted summary
#[derive(Debug, Clone, PartialEq)]
pub struct WordTuple {
    pub word: String,
    pub avg: f64,
    pub count: u64,
}

/// `{ipa: {occ, avg, low}}` entry from a compacted summary
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedPhonemeStat {
    pub ipa: String,
    pub occ: u64,
    pub avg: f64,
    pub low: u64,
}

/// `[phoneme, score, word?]` low-score observation from a compacted summary
#[derive(Debug, Clone, PartialEq)]
pub struct LowObservation {
    pub ipa: String,
    pub score: f64,
    pub word: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompactPhonemes {
    /// Keyed stats object; preferred whenever present
    Keyed(Vec<KeyedPhonemeStat>),
    /// Flat list of sub-threshold observations, one occurrence each
    Lows(Vec<LowObservation>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompactDetail {
    pub words: Vec<WordTuple>,
    pub phonemes: CompactPhonemes,
}

impl Default for CompactDetail {
    fn default() -> Self {
        Self {
            words: Vec::new(),
            phonemes: CompactPhonemes::Lows(Vec::new()),
        }
    }
}

/// Word/phoneme detail of one attempt; exactly one variant per attempt
#[derive(Debug, Clone, PartialEq)]
pub enum Detail {
    Rich(Vec<RichWord>),
    Compact(CompactDetail),
}

/// Normalized, shape-independent view of one attempt
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptView {
    /// Epoch ms; `None` when the record carries no usable timestamp
    pub ts: Option<i64>,
    pub passage_key: String,
    pub session_id: String,
    pub score: f64,
    pub has_ai: bool,
    pub metrics: [Option<f64>; 4],
    pub detail: Detail,
}

impl AttemptView {
    pub fn from_value(attempt: &Value) -> Self {
        let summary = extract_summary(attempt);
        let raw = extract_raw_result(attempt);
        let top = raw.as_ref().and_then(|r| top_nbest(r));

        let mut metrics = [None; 4];
        if let Some(summary) = summary {
            for key in MetricKey::ALL {
                metrics[key.index()] = probe_finite(summary, key.summary_keys());
            }
        }

        let rich_words = top
            .and_then(|t| probe(t, WORDS_KEYS))
            .and_then(Value::as_array)
            .filter(|words| !words.is_empty());

        let detail = match rich_words {
            Some(words) => Detail::Rich(words.iter().map(rich_word).collect()),
            None => Detail::Compact(summary.map(compact_detail).unwrap_or_default()),
        };

        Self {
            ts: extract_timestamp(attempt),
            passage_key: extract_passage_key(attempt),
            session_id: extract_session_id(attempt),
            score: resolve_score(summary, raw.as_deref()),
            has_ai: probe(attempt, FEEDBACK_KEYS).is_some_and(truthy),
            metrics,
            detail,
        }
    }

    pub fn metric(&self, key: MetricKey) -> Option<f64> {
        self.metrics[key.index()]
    }

    /// Timestamp, falling back to `now_ms` for records without one
    pub fn ts_or(&self, now_ms: i64) -> i64 {
        self.ts.unwrap_or(now_ms)
    }
}

/// Epoch milliseconds from numbers, numeric strings, or RFC 3339 strings.
pub fn extract_timestamp(attempt: &Value) -> Option<i64> {
    let value = probe(attempt, TIMESTAMP_KEYS)?;
    let ms = match value {
        Value::String(s) => match DateTime::parse_from_rfc3339(s.trim()) {
            Ok(dt) => dt.timestamp_millis(),
            Err(_) => finite(value)? as i64,
        },
        _ => finite(value)? as i64,
    };
    instant(ms).map(|_| ms)
}

pub fn extract_passage_key(attempt: &Value) -> String {
    probe(attempt, PASSAGE_KEYS)
        .and_then(text)
        .unwrap_or_default()
}

pub fn extract_session_id(attempt: &Value) -> String {
    probe(attempt, SESSION_KEYS)
        .and_then(text)
        .unwrap_or_default()
}

pub fn extract_summary(attempt: &Value) -> Option<&Value> {
    probe(attempt, SUMMARY_KEYS).filter(|v| v.is_object())
}

/// The provider payload, unwrapping a `json` envelope (object or serialized string).
pub fn extract_raw_result(attempt: &Value) -> Option<Cow<'_, Value>> {
    let raw = probe(attempt, RAW_RESULT_KEYS).filter(|v| v.is_object())?;
    if probe(raw, NBEST_KEYS).is_some() {
        return Some(Cow::Borrowed(raw));
    }
    match raw.get("json") {
        Some(inner) if inner.is_object() => Some(Cow::Borrowed(inner)),
        Some(Value::String(s)) => serde_json::from_str::<Value>(s)
            .ok()
            .filter(Value::is_object)
            .map(Cow::Owned),
        _ => Some(Cow::Borrowed(raw)),
    }
}

/// Representative 0-100 score: summary pronunciation, then the top n-best
/// pronunciation score, then 0.
pub fn resolve_score(summary: Option<&Value>, raw: Option<&Value>) -> f64 {
    summary
        .and_then(|s| probe_finite(s, MetricKey::Pronunciation.summary_keys()))
        .or_else(|| {
            raw.and_then(top_nbest)
                .and_then(|top| assessment_score(top, "PronScore"))
        })
        .unwrap_or(0.0)
}

fn top_nbest(raw: &Value) -> Option<&Value> {
    probe(raw, NBEST_KEYS)?.as_array()?.first()
}

/// Score read flat or nested under the `PronunciationAssessment` block.
fn assessment_score(node: &Value, field: &str) -> Option<f64> {
    probe_finite(node, &[field]).or_else(|| {
        probe(node, ASSESSMENT_KEYS).and_then(|pa| probe_finite(pa, &[field]))
    })
}

fn rich_word(node: &Value) -> RichWord {
    let word = probe(node, &["Word", "word"])
        .and_then(text)
        .map(|w| w.trim().to_lowercase())
        .unwrap_or_default();

    let phonemes = probe(node, PHONEMES_KEYS)
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|p| {
                    let ipa = phoneme::normalize(&probe(p, &["Phoneme", "phoneme"]).and_then(text)?);
                    let score = assessment_score(p, "AccuracyScore")?;
                    (!ipa.is_empty()).then_some(RichPhoneme { ipa, score })
                })
                .collect()
        })
        .unwrap_or_default();

    RichWord {
        word,
        score: assessment_score(node, "AccuracyScore"),
        phonemes,
    }
}

fn compact_detail(summary: &Value) -> CompactDetail {
    let words = probe(summary, &["words"])
        .and_then(Value::as_array)
        .map(|list| list.iter().filter_map(word_tuple).collect())
        .unwrap_or_default();

    let keyed = probe(summary, &["phonStats", "phonemeStats", "phonemes"]).and_then(Value::as_object);
    let phonemes = match keyed {
        Some(stats) => CompactPhonemes::Keyed(
            stats
                .iter()
                .filter_map(|(ipa, stat)| keyed_stat(ipa, stat))
                .collect(),
        ),
        None => CompactPhonemes::Lows(
            probe(summary, &["lows", "lowPhonemes"])
                .and_then(Value::as_array)
                .map(|list| list.iter().filter_map(low_observation).collect())
                .unwrap_or_default(),
        ),
    };

    CompactDetail { words, phonemes }
}

fn occurrences(value: Option<&Value>) -> Option<u64> {
    let n = finite(value?)?.round();
    (n >= 1.0).then_some(n as u64)
}

fn word_tuple(node: &Value) -> Option<WordTuple> {
    let (word, avg, count) = match node {
        Value::Array(items) => (items.first(), items.get(1), items.get(2)),
        Value::Object(_) => (
            probe(node, &["w", "word"]),
            probe(node, &["avg", "score"]),
            probe(node, &["n", "count", "occ"]),
        ),
        _ => return None,
    };
    let word = text(word?)?.trim().to_lowercase();
    if word.is_empty() {
        return None;
    }
    Some(WordTuple {
        word,
        avg: finite(avg?)?,
        count: occurrences(count)?,
    })
}

fn keyed_stat(ipa: &str, stat: &Value) -> Option<KeyedPhonemeStat> {
    let ipa = phoneme::normalize(ipa);
    if ipa.is_empty() {
        return None;
    }
    Some(KeyedPhonemeStat {
        ipa,
        occ: occurrences(probe(stat, &["occ", "count", "n"]))?,
        avg: probe_finite(stat, &["avg"])?,
        low: probe_finite(stat, &["low"]).map_or(0, |l| l.max(0.0).round() as u64),
    })
}

fn low_observation(node: &Value) -> Option<LowObservation> {
    let (ipa, score, word) = match node {
        Value::Array(items) => (items.first(), items.get(1), items.get(2)),
        Value::Object(_) => (
            probe(node, &["ipa", "phoneme", "p"]),
            probe(node, &["score", "s"]),
            probe(node, &["word", "w"]),
        ),
        _ => return None,
    };
    let ipa = phoneme::normalize(&text(ipa?)?);
    if ipa.is_empty() {
        return None;
    }
    Some(LowObservation {
        ipa,
        score: finite(score?)?,
        word: word
            .and_then(text)
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty()),
    })
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
