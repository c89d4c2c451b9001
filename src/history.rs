//! Attempt history files.
//!
//! Accepted layouts: a JSON array of attempts, an object carrying an
//! `attempts` array, or JSON Lines with one attempt per line. Attempts are
//! handed to the engine untouched.

use crate::error::Result;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

pub fn load_attempts<P: AsRef<Path>>(path: P) -> Result<Vec<Value>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let attempts = parse_attempts(&text);
    debug!(path = %path.display(), attempts = attempts.len(), "loaded attempt history");
    Ok(attempts)
}

pub fn parse_attempts(text: &str) -> Vec<Value> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(items)) => items,
        Ok(Value::Object(mut map)) => match map.remove("attempts") {
            Some(Value::Array(items)) => items,
            Some(other) => {
                map.insert("attempts".to_string(), other);
                vec![Value::Object(map)]
            }
            None => vec![Value::Object(map)],
        },
        Ok(other) => vec![other],
        Err(_) => parse_lines(text),
    }
}

fn parse_lines(text: &str) -> Vec<Value> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(idx, line)| match serde_json::from_str(line) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(line = idx + 1, %err, "skipping malformed history line");
                None
            }
        })
        .collect()
}
