// End-to-end rollups over mixed attempt histories, driven through the public
// library surface with a fixed clock.

use elocute::clock::DAY_MS;
use elocute::{FixedClock, Rollup, RollupOptions, RollupResult};
use serde_json::{json, Value};

const NOW: i64 = 1_700_000_000_000;

fn run(attempts: &[Value], options: RollupOptions) -> RollupResult {
    Rollup::new(options)
        .unwrap()
        .with_clock(FixedClock::utc(NOW))
        .run(attempts)
}

fn loose() -> RollupOptions {
    RollupOptions {
        min_word_count: 1,
        min_phon_count: 1,
        ..RollupOptions::default()
    }
}

#[test]
fn two_days_without_session_ids() {
    let day1 = NOW - DAY_MS;
    let day2 = NOW;
    let attempts = vec![
        json!({"ts": day1, "summary": {"pron": 90}, "passageKey": "p1"}),
        json!({"ts": day1, "summary": {"pron": 70}, "passageKey": "p1"}),
        json!({"ts": day2, "summary": {"pron": 80}, "passageKey": "p2"}),
    ];
    let result = run(&attempts, RollupOptions::default());

    assert_eq!(result.totals.attempts, 3);
    assert_eq!(result.totals.avg_score, Some(80.0));
    assert_eq!(result.totals.sessions, 2);
    assert_eq!(result.sessions.len(), 2);
    assert!(result.sessions.iter().all(|s| s.is_synthesized()));
    assert_eq!(result.sessions[0].passage_key, "p2");
    assert_eq!(result.sessions[1].count, 2);
    assert_eq!(result.totals.top_passage_key.as_deref(), Some("p1"));
    assert_eq!(result.totals.top_passage_count, 2);

    let n = result.trend.len();
    assert_eq!(result.trend[n - 1].avg, Some(80.0));
    assert_eq!(result.trend[n - 2].avg, Some(80.0));
    assert!(result.trend[..n - 2].iter().all(|p| p.avg.is_none()));
}

#[test]
fn single_rich_attempt_surfaces_word_and_phoneme() {
    let attempt = json!({
        "ts": NOW,
        "azureResult": {"NBest": [{
            "PronScore": 61,
            "Words": [{
                "Word": "cat",
                "AccuracyScore": 55,
                "Phonemes": [{"Phoneme": "t", "AccuracyScore": 40}]
            }]
        }]}
    });
    let result = run(&[attempt], loose());

    let words = &result.trouble.words_all;
    assert_eq!(words.len(), 1);
    assert_eq!(words[0].word, "cat");
    assert_eq!(words[0].count, 1);
    assert_eq!(words[0].avg, 55.0);

    let t = result
        .trouble
        .phonemes_all
        .iter()
        .find(|p| p.ipa == "t")
        .unwrap();
    assert_eq!(t.avg, 40.0);
    assert_eq!(t.count, 1);
    assert_eq!(t.low, 1);
    assert_eq!(t.examples, vec!["cat"]);

    assert_eq!(result.totals.avg_score, Some(61.0));
}

#[test]
fn empty_history_is_a_valid_rollup() {
    let result = run(&[], RollupOptions::default());

    assert_eq!(result.totals.attempts, 0);
    assert_eq!(result.totals.avg_score, None);
    assert_eq!(result.totals.last_ts, None);
    assert_eq!(result.totals.best_day_ts, None);
    assert_eq!(result.totals.top_passage_key, None);
    assert!(result.trouble.phonemes_all.is_empty());
    assert!(result.trouble.words_all.is_empty());
    assert_eq!(result.trend.len(), 30);
    assert!(result.trend.iter().all(|p| p.avg.is_none()));
    assert!(result.sessions.is_empty());
    for metric in result.metrics.values() {
        assert_eq!(metric.trend.len(), 30);
        assert_eq!(metric.avg7, None);
        assert_eq!(metric.avg30, None);
        assert_eq!(metric.last, None);
        assert_eq!(metric.best_day, None);
    }

    let value = serde_json::to_value(&result).unwrap();
    assert!(value["trend"][0]["avg"].is_null());
}

#[test]
fn malformed_attempts_never_fail() {
    let attempts = vec![
        json!(null),
        json!(42),
        json!("attempt"),
        json!([1, 2, 3]),
        json!({"ts": "not a date", "summary": {"pron": "NaN", "words": "oops"}}),
        json!({"summary": {"pron": 75}, "azureResult": {"NBest": "broken"}}),
    ];
    let result = run(&attempts, RollupOptions::default());

    assert_eq!(result.totals.attempts, 6);
    assert_eq!(result.totals.last_ts, None);
    assert!(result.sessions.is_empty());
    assert_eq!(result.trend.len(), 30);
    let today = result.trend.last().unwrap();
    assert_eq!(today.avg, Some(75.0 / 6.0));
}

#[test]
fn compact_and_rich_histories_agree() {
    let rich = vec![json!({
        "ts": NOW,
        "azureResult": {"NBest": [{"Words": [
            {"Word": "ship", "AccuracyScore": 40},
            {"Word": "ship", "AccuracyScore": 60},
            {"Word": "ship", "AccuracyScore": 80}
        ]}]}
    })];
    let compact = vec![json!({"ts": NOW, "summary": {"words": [["ship", 60, 3]]}})];

    let a = run(&rich, RollupOptions::default());
    let b = run(&compact, RollupOptions::default());
    let (wa, wb) = (&a.trouble.words_all[0], &b.trouble.words_all[0]);
    assert_eq!(wa.count, wb.count);
    assert!((wa.avg - wb.avg).abs() < 1e-9);
    assert!((wa.priority - wb.priority).abs() < 1e-9);
}

#[test]
fn recent_trouble_outranks_stale_trouble() {
    let mut attempts = Vec::new();
    for back in 0..5 {
        attempts.push(json!({
            "ts": NOW - back * DAY_MS,
            "summary": {"words": [["fresh", 50, 1]]}
        }));
        attempts.push(json!({
            "ts": NOW - (60 + back) * DAY_MS,
            "summary": {"words": [["stale", 50, 1]]}
        }));
    }
    let result = run(&attempts, RollupOptions::default());
    let order: Vec<_> = result
        .trouble
        .words_all
        .iter()
        .map(|w| w.word.as_str())
        .collect();
    assert_eq!(order, vec!["fresh", "stale"]);
    assert!(result.trouble.words_all[1].priority > 0.0);
}

#[test]
fn explicit_sessions_span_days() {
    let attempts = vec![
        json!({"ts": NOW - 3 * DAY_MS, "sessionId": "course-1", "passageKey": "intro", "summary": {"pron": 50}}),
        json!({"ts": NOW, "session_id": "course-1", "passageKey": "outro", "summary": {"pron": 70}, "aiFeedback": "ok"}),
    ];
    let result = run(&attempts, RollupOptions::default());
    assert_eq!(result.sessions.len(), 1);
    let session = &result.sessions[0];
    assert_eq!(session.session_id, "course-1");
    assert_eq!(session.passage_key, "intro");
    assert_eq!(session.avg_score, Some(60.0));
    assert_eq!(session.duration_ms(), 3 * DAY_MS);
    assert!(session.has_ai);
}

#[test]
fn metric_trends_track_last_sample_and_rolling_means() {
    let attempts = vec![
        json!({"ts": NOW - 20 * DAY_MS, "summary": {"flu": 40}}),
        json!({"ts": NOW - DAY_MS, "summary": {"fluency": 70}}),
        json!({"ts": NOW - 1000, "summary": {"flu": 90}}),
        json!({"ts": NOW - 2000, "summary": {"flu": 80}}),
    ];
    let result = run(&attempts, RollupOptions::default());
    let fluency = result
        .metrics
        .get(&elocute::attempt::MetricKey::Fluency)
        .unwrap();
    assert_eq!(fluency.last, Some(90.0));
    assert_eq!(fluency.avg7, Some(77.5));
    assert!((fluency.avg30.unwrap() - (40.0 + 70.0 + 85.0) / 3.0).abs() < 1e-9);
    assert_eq!(fluency.best_day.unwrap().avg, 85.0);
}

#[test]
fn short_window_still_has_fixed_length() {
    let options = RollupOptions {
        window_days: 3,
        ..RollupOptions::default()
    };
    let attempts = vec![json!({"ts": NOW - 10 * DAY_MS, "summary": {"pron": 90}})];
    let result = run(&attempts, options);
    assert_eq!(result.trend.len(), 3);
    assert!(result.trend.iter().all(|p| p.avg.is_none()));
    assert_eq!(result.totals.best_day_score, Some(90.0));
}
