//! Lenient reader for WhisperX-shaped transcript JSON.
//!
//! Accepted shape (every field optional):
//!
//! ```json
//! {
//!   "duration": 42.0,
//!   "segments": [
//!     { "start": 0.0, "end": 2.1, "score": 0.91,
//!       "words": [ { "start": 0.0, "end": 0.4, "score": 0.88 } ] }
//!   ]
//! }
//! ```
//!
//! Word-level points win over their segment when present. Anything missing
//! or mistyped is skipped, so a broken transcript simply scores low.

use crate::escalation::metrics::{StageOutput, TimedPoint};
use serde_json::Value;

const CONFIDENCE_KEYS: &[&str] = &["score", "confidence", "probability"];

impl StageOutput {
    /// Build a stage output from transcript JSON, keeping the JSON as payload.
    pub fn from_json(value: &Value) -> Self {
        let segments = value
            .get("segments")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        let mut points = Vec::new();
        let mut last_end: f64 = 0.0;

        for segment in segments {
            let seg_start = number(segment, "start");
            let seg_end = number(segment, "end");
            if let Some(end) = seg_end {
                last_end = last_end.max(end);
            }

            let words: Vec<TimedPoint> = segment
                .get("words")
                .and_then(Value::as_array)
                .map(|words| words.iter().filter_map(word_point).collect())
                .unwrap_or_default();

            if !words.is_empty() {
                for w in &words {
                    last_end = last_end.max(w.end);
                }
                points.extend(words);
                continue;
            }

            if let (Some(start), Some(end)) = (seg_start, seg_end) {
                points.push(TimedPoint::new(start, end, confidence(segment)));
            }
        }

        let total_duration = number(value, "duration")
            .filter(|d| *d > 0.0)
            .unwrap_or(last_end);

        StageOutput {
            points,
            total_duration,
            payload: value.clone(),
        }
    }
}

fn word_point(word: &Value) -> Option<TimedPoint> {
    let start = number(word, "start")?;
    let end = number(word, "end")?;
    Some(TimedPoint::new(start, end, confidence(word)))
}

fn confidence(value: &Value) -> Option<f64> {
    CONFIDENCE_KEYS.iter().find_map(|key| number(value, key))
}

fn number(value: &Value, key: &str) -> Option<f64> {
    value
        .get(key)
        .and_then(Value::as_f64)
        .filter(|n| n.is_finite())
}
