//! Caption tracks and their timed lines.
//!
//! A `Caption` is produced once by a parser (or read back from the cache) and
//! is read-only afterwards. The only mutation is `replace_lines`, which is
//! reserved for the conversion helpers in `crate::convert`.

use thiserror::Error;

use super::metadata::CaptionMetadata;

/// Reasons a caption line can be rejected at construction
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LineError {
    #[error("Caption text is empty")]
    EmptyText,

    #[error("Invalid timing: start={start}, end={end}")]
    InvalidTiming { start: f64, end: f64 },
}

/// A single timed subtitle entry.
///
/// Times are in seconds. `end >= start` and the text is non-empty after
/// trimming; both are enforced by [`CaptionLine::new`].
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionLine {
    start: f64,
    end: f64,
    text: String,
    speaker: Option<String>,
}

impl CaptionLine {
    /// Create a new line, trimming the text
    pub fn new(start: f64, end: f64, text: impl AsRef<str>) -> Result<Self, LineError> {
        if !start.is_finite() || !end.is_finite() || start < 0.0 || end < start {
            return Err(LineError::InvalidTiming { start, end });
        }

        let text = text.as_ref().trim();
        if text.is_empty() {
            return Err(LineError::EmptyText);
        }

        Ok(Self {
            start,
            end,
            text: text.to_string(),
            speaker: None,
        })
    }

    /// Attach a speaker label (blank labels are ignored)
    pub fn with_speaker(mut self, speaker: impl AsRef<str>) -> Self {
        let speaker = speaker.as_ref().trim();
        self.speaker = if speaker.is_empty() {
            None
        } else {
            Some(speaker.to_string())
        };
        self
    }

    /// Start time in seconds
    pub fn start(&self) -> f64 {
        self.start
    }

    /// End time in seconds
    pub fn end(&self) -> f64 {
        self.end
    }

    /// Line text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Speaker label, if one was identified
    pub fn speaker(&self) -> Option<&str> {
        self.speaker.as_deref()
    }

    /// Push the end time out to `end` (never pulls it in)
    pub(crate) fn extend_to(&mut self, end: f64) {
        if end.is_finite() && end > self.end {
            self.end = end;
        }
    }

    /// Length of the line in seconds
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// A full caption track: ordered lines plus metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Caption {
    metadata: CaptionMetadata,
    lines: Vec<CaptionLine>,
}

impl Caption {
    /// Create a caption from metadata and lines (source order is kept)
    pub fn new(metadata: CaptionMetadata, lines: Vec<CaptionLine>) -> Self {
        Self { metadata, lines }
    }

    /// Track metadata
    pub fn metadata(&self) -> &CaptionMetadata {
        &self.metadata
    }

    /// Caption lines in source order
    pub fn lines(&self) -> &[CaptionLine] {
        &self.lines
    }

    /// Number of lines
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Check if the caption has no lines
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Split into metadata and lines
    pub fn into_parts(self) -> (CaptionMetadata, Vec<CaptionLine>) {
        (self.metadata, self.lines)
    }

    /// Swap out the line list. Only the conversion helpers use this.
    pub(crate) fn replace_lines(&mut self, lines: Vec<CaptionLine>) {
        self.lines = lines;
    }

    /// End time of the last line, or 0 for an empty track
    pub fn duration(&self) -> f64 {
        self.lines.last().map(|l| l.end).unwrap_or(0.0)
    }

    /// Distinct speakers in order of first appearance
    pub fn speakers(&self) -> Vec<&str> {
        let mut speakers: Vec<&str> = Vec::new();
        for speaker in self.lines.iter().filter_map(|l| l.speaker()) {
            if !speakers.contains(&speaker) {
                speakers.push(speaker);
            }
        }
        speakers
    }

    /// Line texts joined by a single newline, without timing
    pub fn to_plain_text(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Render as SubRip: sequential cue numbers from 1, `HH:MM:SS,mmm` timecodes
    pub fn to_srt(&self) -> String {
        self.lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                format!(
                    "{}\n{} --> {}\n{}\n",
                    i + 1,
                    format_timestamp(line.start, ','),
                    format_timestamp(line.end, ','),
                    line.text
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Short human-readable preview of the first `max_lines` lines
    pub fn preview(&self, max_lines: usize) -> String {
        if self.lines.is_empty() {
            return "No caption lines available".to_string();
        }

        let mut preview = self
            .lines
            .iter()
            .take(max_lines)
            .map(|l| format!("[{:.1}-{:.1}] {}", l.start, l.end, l.text))
            .collect::<Vec<_>>()
            .join("\n");

        if self.lines.len() > max_lines {
            preview.push_str(&format!(
                "\n... and {} more lines",
                self.lines.len() - max_lines
            ));
        }

        preview
    }
}

/// Format seconds as `HH:MM:SS<sep>mmm`, rounding to the nearest millisecond
pub(crate) fn format_timestamp(seconds: f64, millis_separator: char) -> String {
    let ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = ms / 3_600_000;
    let mins = (ms % 3_600_000) / 60_000;
    let secs = (ms % 60_000) / 1_000;
    let millis = ms % 1_000;
    format!(
        "{:02}:{:02}:{:02}{}{:03}",
        hours, mins, secs, millis_separator, millis
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Caption {
        let metadata = CaptionMetadata::new("abc123", "en");
        Caption::new(
            metadata,
            vec![
                CaptionLine::new(1.0, 2.5, "Hello").unwrap(),
                CaptionLine::new(3661.042, 3662.0, "World")
                    .unwrap()
                    .with_speaker("Ann"),
            ],
        )
    }

    #[test]
    fn test_line_rejects_empty_text() {
        assert_eq!(CaptionLine::new(0.0, 1.0, "   "), Err(LineError::EmptyText));
    }

    #[test]
    fn test_line_rejects_inverted_timing() {
        assert!(matches!(
            CaptionLine::new(2.0, 1.0, "text"),
            Err(LineError::InvalidTiming { .. })
        ));
        assert!(CaptionLine::new(f64::NAN, 1.0, "text").is_err());
    }

    #[test]
    fn test_line_trims_text_and_blank_speaker() {
        let line = CaptionLine::new(0.0, 0.0, "  hi  ").unwrap().with_speaker(" ");
        assert_eq!(line.text(), "hi");
        assert_eq!(line.speaker(), None);
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(sample().to_plain_text(), "Hello\nWorld");
    }

    #[test]
    fn test_srt_rendering() {
        let expected = "1\n00:00:01,000 --> 00:00:02,500\nHello\n\n\
                        2\n01:01:01,042 --> 01:01:02,000\nWorld\n";
        assert_eq!(sample().to_srt(), expected);
    }

    #[test]
    fn test_empty_caption_renders_nothing() {
        let caption = Caption::new(CaptionMetadata::new("v", "en"), Vec::new());
        assert_eq!(caption.to_srt(), "");
        assert_eq!(caption.to_plain_text(), "");
        assert_eq!(caption.preview(3), "No caption lines available");
    }

    #[test]
    fn test_preview_truncates() {
        let preview = sample().preview(1);
        assert_eq!(preview, "[1.0-2.5] Hello\n... and 1 more lines");
    }

    #[test]
    fn test_speakers_and_duration() {
        let caption = sample();
        assert_eq!(caption.speakers(), vec!["Ann"]);
        assert_eq!(caption.duration(), 3662.0);
        assert_eq!(caption.lines()[0].duration(), 1.5);
    }

    #[test]
    fn test_format_timestamp_rounds_to_millis() {
        assert_eq!(format_timestamp(0.0015, ','), "00:00:00,002");
        assert_eq!(format_timestamp(59.9999, '.'), "00:01:00.000");
    }
}
