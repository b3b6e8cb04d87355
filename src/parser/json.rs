//! JSON segment parser.
//!
//! Recognized envelopes:
//!
//! - YouTube `json3`: `{"events": [{"tStartMs", "dDurationMs", "segs": [{"utf8"}]}]}`
//! - transcript list: `{"transcript": [{"start", "duration", "text"}]}` or a bare array
//! - our own export: `{"metadata": {...}, "lines": [{"start", "end", "text", "speaker"}]}`
//! - generic segments: `{"segments": [{"start", "end" | "duration", "text" | "runs"}]}`
//!
//! Text runs within a segment are concatenated into one line.

use serde_json::Value;
use tracing::{debug, warn};

use super::text;
use super::{finish, CaptionParser, ParseError};
use crate::domain::{Caption, CaptionLine, CaptionMetadata, SubtitleFormat};

/// Parser for JSON caption envelopes
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Envelope {
    Json3,
    Transcript,
    Export,
    Segments,
    Array,
}

fn classify(value: &Value) -> Option<(Envelope, &[Value])> {
    match value {
        Value::Object(map) => {
            let list = |key: &str| map.get(key).and_then(Value::as_array).map(Vec::as_slice);

            if let Some(items) = list("events") {
                Some((Envelope::Json3, items))
            } else if let Some(items) = list("transcript") {
                Some((Envelope::Transcript, items))
            } else if let Some(items) = list("lines") {
                Some((Envelope::Export, items))
            } else {
                list("segments").map(|items| (Envelope::Segments, items))
            }
        }
        Value::Array(items) => items
            .first()
            .filter(|first| first.get("text").is_some())
            .map(|_| (Envelope::Array, items.as_slice())),
        _ => None,
    }
}

/// Read a number of seconds (or milliseconds), tolerating numeric strings
fn number(item: &Value, key: &str) -> Option<f64> {
    match item.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn clean_multiline(raw: &str) -> String {
    raw.lines()
        .map(text::clean_text)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn json3_event(event: &Value) -> Result<Option<CaptionLine>, String> {
    // Window and style events carry no segments
    let Some(segs) = event.get("segs").and_then(Value::as_array) else {
        return Ok(None);
    };

    let start_ms = number(event, "tStartMs").ok_or("missing tStartMs")?;
    let duration_ms = number(event, "dDurationMs").unwrap_or(0.0);

    let raw: String = segs
        .iter()
        .filter_map(|seg| seg.get("utf8").and_then(Value::as_str))
        .collect();
    let text = clean_multiline(&raw);
    if text.is_empty() {
        return Ok(None);
    }

    let start = start_ms / 1000.0;
    CaptionLine::new(start, start + duration_ms / 1000.0, text)
        .map(Some)
        .map_err(|e| e.to_string())
}

fn timed_item(item: &Value) -> Result<Option<CaptionLine>, String> {
    let start = number(item, "start").ok_or("missing start")?;
    let end = match (number(item, "end"), number(item, "duration")) {
        (Some(end), _) => end,
        (None, Some(duration)) => start + duration,
        (None, None) => return Err("missing end or duration".to_string()),
    };

    let raw = match item.get("text") {
        Some(Value::String(s)) => s.clone(),
        _ => item
            .get("runs")
            .and_then(Value::as_array)
            .map(|runs| {
                runs.iter()
                    .filter_map(|run| run.get("text").and_then(Value::as_str))
                    .collect::<String>()
            })
            .ok_or("missing text")?,
    };
    let text = clean_multiline(&raw);
    if text.is_empty() {
        return Ok(None);
    }

    let line = CaptionLine::new(start, end, text).map_err(|e| e.to_string())?;
    Ok(Some(match item.get("speaker").and_then(Value::as_str) {
        Some(speaker) => line.with_speaker(speaker),
        None => line,
    }))
}

impl CaptionParser for JsonParser {
    fn format(&self) -> SubtitleFormat {
        SubtitleFormat::Json
    }

    fn detect(&self, content: &str) -> f32 {
        let trimmed = content.trim_start_matches('\u{feff}').trim();
        if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
            return 0.0;
        }

        match serde_json::from_str::<Value>(trimmed) {
            Ok(value) if classify(&value).is_some() => 1.0,
            Ok(_) => 0.3,
            Err(_) => 0.0,
        }
    }

    fn parse(&self, content: &str, metadata: CaptionMetadata) -> Result<Caption, ParseError> {
        let content = text::normalize(content);

        let value: Value = serde_json::from_str(&content).map_err(|e| {
            ParseError::malformed(SubtitleFormat::Json, format!("Invalid JSON: {}", e))
                .at_line(Some(e.line()))
        })?;

        let (envelope, items) = classify(&value).ok_or_else(|| {
            ParseError::malformed(SubtitleFormat::Json, "Unrecognized JSON caption envelope")
        })?;
        debug!(?envelope, segments = items.len(), "Parsing JSON captions");

        let mut lines = Vec::with_capacity(items.len());
        let mut skipped = 0usize;

        for (i, item) in items.iter().enumerate() {
            let result = match envelope {
                Envelope::Json3 => json3_event(item),
                _ => timed_item(item),
            };

            match result {
                Ok(Some(line)) => lines.push(line),
                Ok(None) => {}
                Err(reason) => {
                    warn!(segment = i + 1, "Skipping JSON segment: {}", reason);
                    skipped += 1;
                }
            }
        }

        if lines.is_empty() {
            return Err(ParseError::malformed(
                SubtitleFormat::Json,
                format!("No valid segments found ({} skipped)", skipped),
            ));
        }

        Ok(finish(SubtitleFormat::Json, metadata, lines))
    }
}
