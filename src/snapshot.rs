use crate::aggregate::{DayAggregate, Keyed, PassageAggregate};
use crate::clock::Clock;
use chrono::NaiveDate;

/// Best-day and favourite-passage facts drawn from the aggregates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub best_day_ts: Option<i64>,
    pub best_day_score: Option<f64>,
    pub top_passage_key: Option<String>,
    pub top_passage_count: u64,
    pub top_passage_avg: Option<f64>,
    pub top_passage_last_ts: Option<i64>,
}

/// Day with the highest average, anchored at its local midnight. First seen wins ties.
pub fn best_day<C: Clock>(days: &Keyed<NaiveDate, DayAggregate>, clock: &C) -> Option<(i64, f64)> {
    let mut best: Option<(NaiveDate, f64)> = None;
    for (day, agg) in days.iter() {
        let Some(avg) = agg.avg() else { continue };
        if best.map_or(true, |(_, top)| avg > top) {
            best = Some((*day, avg));
        }
    }
    best.map(|(day, avg)| (clock.local_midnight_ms(day), avg))
}

/// Most practised passage. First seen wins ties.
pub fn top_passage(
    passages: &Keyed<String, PassageAggregate>,
) -> Option<(&str, &PassageAggregate)> {
    let mut top: Option<(&str, &PassageAggregate)> = None;
    for (key, agg) in passages.iter() {
        if top.map_or(true, |(_, best)| agg.count > best.count) {
            top = Some((key.as_str(), agg));
        }
    }
    top
}

pub fn build_snapshot<C: Clock>(
    days: &Keyed<NaiveDate, DayAggregate>,
    passages: &Keyed<String, PassageAggregate>,
    clock: &C,
) -> Snapshot {
    let best = best_day(days, clock);
    let top = top_passage(passages);
    Snapshot {
        best_day_ts: best.map(|(ts, _)| ts),
        best_day_score: best.map(|(_, avg)| avg),
        top_passage_key: top.map(|(key, _)| key.to_string()),
        top_passage_count: top.map_or(0, |(_, agg)| agg.count),
        top_passage_avg: top.and_then(|(_, agg)| agg.avg()),
        top_passage_last_ts: top.and_then(|(_, agg)| agg.last_seen),
    }
}
