use crate::aggregate::{Keyed, PhonemeAggregate, WordAggregate};
use crate::priority::priority;
use itertools::Itertools;
use serde::Serialize;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhonemeTrouble {
    pub ipa: String,
    pub count: u64,
    pub avg: f64,
    pub days: usize,
    pub priority: f64,
    /// Sub-threshold observations among `count`
    pub low: u64,
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordTrouble {
    pub word: String,
    pub count: u64,
    pub avg: f64,
    pub days: usize,
    pub priority: f64,
}

/// Ranked lists of everything the learner has struggled with
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trouble {
    pub phonemes_all: Vec<PhonemeTrouble>,
    pub words_all: Vec<WordTrouble>,
}

/// Highest priority first, then lowest average, then most occurrences.
fn rank(a: (f64, f64, u64), b: (f64, f64, u64)) -> Ordering {
    b.0.total_cmp(&a.0)
        .then_with(|| a.1.total_cmp(&b.1))
        .then_with(|| b.2.cmp(&a.2))
}

pub fn phoneme_trouble(
    phonemes: &Keyed<String, PhonemeAggregate>,
    min_count: u64,
    now_ms: i64,
) -> Vec<PhonemeTrouble> {
    phonemes
        .iter()
        .filter(|(_, agg)| agg.count >= min_count)
        .filter_map(|(ipa, agg)| {
            let avg = agg.avg()?;
            Some(PhonemeTrouble {
                ipa: ipa.clone(),
                count: agg.count,
                avg,
                days: agg.days.len(),
                priority: priority(avg, agg.count, agg.days.len(), agg.last_seen, now_ms),
                low: agg.low,
                examples: agg.examples.clone(),
            })
        })
        .sorted_by(|a, b| rank((a.priority, a.avg, a.count), (b.priority, b.avg, b.count)))
        .collect()
}

pub fn word_trouble(
    words: &Keyed<String, WordAggregate>,
    min_count: u64,
    now_ms: i64,
) -> Vec<WordTrouble> {
    words
        .iter()
        .filter(|(_, agg)| agg.count >= min_count)
        .filter_map(|(word, agg)| {
            let avg = agg.avg()?;
            Some(WordTrouble {
                word: word.clone(),
                count: agg.count,
                avg,
                days: agg.days.len(),
                priority: priority(avg, agg.count, agg.days.len(), agg.last_seen, now_ms),
            })
        })
        .sorted_by(|a, b| rank((a.priority, a.avg, a.count), (b.priority, b.avg, b.count)))
        .collect()
}
