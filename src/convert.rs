//! Output renderers and line-level transforms for parsed captions.
//!
//! `Caption` itself provides plain text and SubRip output. WebVTT and the JSON
//! export live here, together with the helpers that rewrite a caption's lines.

use serde_json::{json, Value};

use crate::domain::caption::format_timestamp;
use crate::domain::{Caption, CaptionLine, LineError};

/// Render as WebVTT. Speakers are written back as `<v Name>` voice tags.
pub fn to_vtt(caption: &Caption) -> String {
    let mut out = String::from("WEBVTT\n");

    for line in caption.lines() {
        out.push('\n');
        out.push_str(&format!(
            "{} --> {}\n",
            format_timestamp(line.start(), '.'),
            format_timestamp(line.end(), '.')
        ));
        match line.speaker() {
            Some(speaker) => out.push_str(&format!("<v {}>{}\n", speaker, line.text())),
            None => {
                out.push_str(line.text());
                out.push('\n');
            }
        }
    }

    out
}

/// Render as the JSON export envelope (`{"metadata": ..., "lines": [...]}`)
pub fn to_json(caption: &Caption) -> String {
    let meta = caption.metadata();

    let lines: Vec<Value> = caption
        .lines()
        .iter()
        .map(|line| {
            let mut value = json!({
                "start": line.start(),
                "end": line.end(),
                "text": line.text(),
            });
            if let Some(speaker) = line.speaker() {
                value["speaker"] = json!(speaker);
            }
            value
        })
        .collect();

    let envelope = json!({
        "metadata": {
            "video_id": meta.video_id,
            "language_code": meta.language_code,
            "language_name": meta.language_name,
            "caption_type": meta.caption_type,
            "is_auto_generated": meta.is_auto_generated,
            "has_speaker_identification": meta.has_speaker_identification,
            "provider": meta.provider,
            "format": meta.format,
        },
        "lines": lines,
    });

    format!("{:#}", envelope)
}

/// Move every line by `offset_secs`, clamping at zero.
///
/// The caption is left untouched if the offset produces invalid timing.
pub fn shift(caption: &mut Caption, offset_secs: f64) -> Result<(), LineError> {
    if !offset_secs.is_finite() {
        return Err(LineError::InvalidTiming {
            start: offset_secs,
            end: offset_secs,
        });
    }

    let shifted = caption
        .lines()
        .iter()
        .map(|line| {
            let start = (line.start() + offset_secs).max(0.0);
            let end = (line.end() + offset_secs).max(0.0);
            let moved = CaptionLine::new(start, end, line.text())?;
            Ok(match line.speaker() {
                Some(speaker) => moved.with_speaker(speaker),
                None => moved,
            })
        })
        .collect::<Result<Vec<_>, LineError>>()?;

    caption.replace_lines(shifted);
    Ok(())
}

/// Collapse runs of consecutive lines with the same text and speaker.
///
/// Returns the number of lines removed.
pub fn merge_duplicates(caption: &mut Caption) -> usize {
    let before = caption.len();
    let mut merged: Vec<CaptionLine> = Vec::with_capacity(before);

    for line in caption.lines() {
        match merged.last_mut() {
            Some(last) if last.text() == line.text() && last.speaker() == line.speaker() => {
                last.extend_to(line.end());
            }
            _ => merged.push(line.clone()),
        }
    }

    let removed = before - merged.len();
    if removed > 0 {
        caption.replace_lines(merged);
    }
    removed
}
