use crate::aggregate::{Keyed, SessionAggregate};
use itertools::Itertools;
use serde::Serialize;

/// Prefix of synthesized ids for attempts recorded without a session
pub const NO_SESSION_PREFIX: &str = "no-session:";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub passage_key: String,
    pub count: u64,
    pub avg_score: Option<f64>,
    pub ts_min: i64,
    pub ts_max: i64,
    #[serde(rename = "hasAI")]
    pub has_ai: bool,
}

impl SessionSummary {
    /// True for sessions inferred from the attempt's local day
    pub fn is_synthesized(&self) -> bool {
        self.session_id.starts_with(NO_SESSION_PREFIX)
    }

    pub fn duration_ms(&self) -> i64 {
        self.ts_max - self.ts_min
    }
}

/// Most recently active session first.
pub fn build_sessions(sessions: &Keyed<String, SessionAggregate>) -> Vec<SessionSummary> {
    sessions
        .iter()
        .map(|(id, agg)| SessionSummary {
            session_id: id.clone(),
            passage_key: agg.passage_key.clone(),
            count: agg.count,
            avg_score: agg.avg(),
            ts_min: agg.ts_min,
            ts_max: agg.ts_max,
            has_ai: agg.has_ai,
        })
        .sorted_by(|a, b| b.ts_max.cmp(&a.ts_max))
        .collect()
}
