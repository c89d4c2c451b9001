use crate::clock::instant;
use crate::error::Result;
use crate::rollup::RollupResult;
use crate::session::SessionSummary;
use crate::time_series::DayPoint;
use chrono::Local;
use std::fmt::Write as _;
use std::io::Write;
use unicode_width::UnicodeWidthStr;

const BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
/// Sessions listed in the text report
const RECENT_SESSIONS: usize = 5;

/// One glyph per day, scaled over 0..=100; days without practice are blank.
pub fn sparkline(points: &[DayPoint]) -> String {
    points
        .iter()
        .map(|p| match p.avg {
            Some(avg) => {
                let level = (avg.clamp(0.0, 100.0) / 100.0 * (BARS.len() - 1) as f64).round();
                BARS[level as usize]
            }
            None => ' ',
        })
        .collect()
}

fn pad(cell: &str, width: usize) -> String {
    let fill = width.saturating_sub(cell.width());
    format!("{cell}{}", " ".repeat(fill))
}

/// Left-aligned columns sized by display width so IPA symbols line up.
fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.width()).collect();
    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(cell.width());
        }
    }

    let line = |cells: Vec<String>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| pad(cell, w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = line(headers.iter().map(|h| h.to_string()).collect());
    out.push('\n');
    for row in rows {
        out.push_str(&line(row.clone()));
        out.push('\n');
    }
    out
}

fn score(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.1}"))
}

fn local_time(ts_ms: i64) -> String {
    instant(ts_ms)
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn render_text(result: &RollupResult, top: usize) -> String {
    let mut out = String::new();
    let totals = &result.totals;

    let _ = writeln!(
        out,
        "{} attempts in {} sessions, average {}",
        totals.attempts,
        totals.sessions,
        score(totals.avg_score)
    );
    if let (Some(ts), Some(best)) = (totals.best_day_ts, totals.best_day_score) {
        let day = instant(ts)
            .map(|t| t.with_timezone(&Local).date_naive().to_string())
            .unwrap_or_default();
        let _ = writeln!(out, "best day {day} ({best:.1})");
    }
    if let Some(key) = &totals.top_passage_key {
        let _ = write!(out, "most practised passage {key} ({}x", totals.top_passage_count);
        if let Some(avg) = totals.top_passage_avg {
            let _ = write!(out, ", avg {avg:.1}");
        }
        if let Some(ts) = totals.top_passage_last_ts {
            let _ = write!(out, ", last {}", local_time(ts));
        }
        let _ = writeln!(out, ")");
    }

    let phonemes: Vec<Vec<String>> = result
        .trouble
        .phonemes_all
        .iter()
        .take(top)
        .map(|p| {
            vec![
                format!("/{}/", p.ipa),
                format!("{:.1}", p.avg),
                p.count.to_string(),
                p.low.to_string(),
                p.days.to_string(),
                format!("{:.2}", p.priority),
                p.examples.join(", "),
            ]
        })
        .collect();
    if !phonemes.is_empty() {
        out.push_str("\ntrouble sounds\n");
        out.push_str(&table(
            &["sound", "avg", "seen", "low", "days", "priority", "examples"],
            &phonemes,
        ));
    }

    let words: Vec<Vec<String>> = result
        .trouble
        .words_all
        .iter()
        .take(top)
        .map(|w| {
            vec![
                w.word.clone(),
                format!("{:.1}", w.avg),
                w.count.to_string(),
                w.days.to_string(),
                format!("{:.2}", w.priority),
            ]
        })
        .collect();
    if !words.is_empty() {
        out.push_str("\ntrouble words\n");
        out.push_str(&table(&["word", "avg", "seen", "days", "priority"], &words));
    }

    let _ = writeln!(
        out,
        "\nlast {} days\n|{}|",
        result.trend.len(),
        sparkline(&result.trend)
    );

    let metrics: Vec<Vec<String>> = result
        .metrics
        .values()
        .map(|m| {
            vec![
                m.label.clone(),
                score(m.avg7),
                score(m.avg30),
                score(m.last),
            ]
        })
        .collect();
    out.push('\n');
    out.push_str(&table(&["metric", "7d", "window", "last"], &metrics));

    let sessions: Vec<Vec<String>> = result
        .sessions
        .iter()
        .take(RECENT_SESSIONS)
        .map(|s| {
            vec![
                local_time(s.ts_max),
                s.passage_key.clone(),
                s.count.to_string(),
                score(s.avg_score),
                if s.has_ai { "yes" } else { "" }.to_string(),
            ]
        })
        .collect();
    if !sessions.is_empty() {
        out.push_str("\nrecent sessions\n");
        out.push_str(&table(
            &["when", "passage", "attempts", "avg", "feedback"],
            &sessions,
        ));
    }

    out
}

pub fn render_json(result: &RollupResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}

pub fn write_sessions_csv<W: Write>(sessions: &[SessionSummary], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for session in sessions {
        wtr.serialize(session)?;
    }
    wtr.flush()?;
    Ok(())
}
