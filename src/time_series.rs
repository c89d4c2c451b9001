use crate::aggregate::{Accumulator, DayAggregate, Sample};
use crate::attempt::MetricKey;
use crate::clock::Clock;
use crate::util::mean;
use chrono::{Days, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Trailing days averaged for the short rolling average
pub const SHORT_WINDOW_DAYS: usize = 7;

/// One day of a trend; `avg` is `None` on days without practice
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DayPoint {
    pub day: NaiveDate,
    pub avg: Option<f64>,
}

impl DayPoint {
    pub fn new(day: NaiveDate, avg: Option<f64>) -> Self {
        Self { day, avg }
    }
}

impl From<(NaiveDate, Option<f64>)> for DayPoint {
    fn from(v: (NaiveDate, Option<f64>)) -> Self {
        DayPoint { day: v.0, avg: v.1 }
    }
}

/// The best single day of a trend
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BestDay {
    pub day: NaiveDate,
    pub avg: f64,
}

/// Windowed series and rolling figures for one metric
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricTrend {
    pub label: String,
    pub trend: Vec<DayPoint>,
    pub avg7: Option<f64>,
    pub avg30: Option<f64>,
    pub last: Option<f64>,
    pub best_day: Option<BestDay>,
}

/// The `window_days` calendar days ending today, oldest first.
pub fn window(today: NaiveDate, window_days: usize) -> Vec<NaiveDate> {
    (0..window_days as u64)
        .rev()
        .filter_map(|back| today.checked_sub_days(Days::new(back)))
        .collect()
}

/// Gap-preserving day series over the trailing window.
pub fn day_series<'a, F>(today: NaiveDate, window_days: usize, lookup: F) -> Vec<DayPoint>
where
    F: Fn(&NaiveDate) -> Option<&'a DayAggregate>,
{
    window(today, window_days)
        .into_iter()
        .map(|day| DayPoint::new(day, lookup(&day).and_then(DayAggregate::avg)))
        .collect()
}

fn present(points: &[DayPoint]) -> Vec<f64> {
    points.iter().filter_map(|p| p.avg).collect()
}

/// Mean of non-empty days across the whole series.
pub fn window_avg(points: &[DayPoint]) -> Option<f64> {
    mean(&present(points))
}

/// Mean of non-empty days among the last `days` entries.
pub fn trailing_avg(points: &[DayPoint], days: usize) -> Option<f64> {
    let start = points.len().saturating_sub(days);
    mean(&present(&points[start..]))
}

/// Highest day average; the earliest day wins ties.
pub fn best_day(points: &[DayPoint]) -> Option<BestDay> {
    points
        .iter()
        .filter_map(|p| p.avg.map(|avg| BestDay { day: p.day, avg }))
        .fold(None, |best: Option<BestDay>, candidate| match best {
            Some(b) if b.avg >= candidate.avg => Some(b),
            _ => Some(candidate),
        })
}

/// Value of the most recent sample; later samples win equal timestamps.
pub fn last_sample(samples: &[Sample]) -> Option<f64> {
    samples
        .iter()
        .fold(None, |latest: Option<&Sample>, s| match latest {
            Some(l) if l.ts > s.ts => Some(l),
            _ => Some(s),
        })
        .map(|s| s.value)
}

pub fn metric_trend(
    key: MetricKey,
    days: &HashMap<NaiveDate, DayAggregate>,
    samples: &[Sample],
    today: NaiveDate,
    window_days: usize,
) -> MetricTrend {
    let trend = day_series(today, window_days, |day| days.get(day));
    MetricTrend {
        label: key.label().to_string(),
        avg7: trailing_avg(&trend, SHORT_WINDOW_DAYS),
        avg30: window_avg(&trend),
        last: last_sample(samples),
        best_day: best_day(&trend),
        trend,
    }
}

/// Overall score trend plus one trend per sub-metric.
pub fn build_trends<C: Clock>(
    acc: &Accumulator,
    clock: &C,
    window_days: usize,
) -> (Vec<DayPoint>, BTreeMap<MetricKey, MetricTrend>) {
    let today = clock.today();
    let overall = day_series(today, window_days, |day| acc.days.get(day));
    let metrics = acc
        .metrics
        .iter()
        .map(|(key, agg)| {
            (
                *key,
                metric_trend(*key, &agg.days, &agg.samples, today, window_days),
            )
        })
        .collect();
    (overall, metrics)
}
