//! SubRip (SRT) parser.
//!
//! ```text
//! 1
//! 00:00:01,000 --> 00:00:04,000
//! First caption text
//!
//! 2
//! 00:00:05,500 --> 00:00:08,000
//! Second caption text
//! with multiple lines
//! ```
//!
//! A block whose timecode cannot be read is skipped with a warning. Parsing
//! fails only when no valid block remains.

use tracing::warn;

use super::text::{self, Block};
use super::{finish, CaptionParser, ParseError};
use crate::domain::{Caption, CaptionLine, CaptionMetadata, SubtitleFormat};

/// Parser for SubRip text
#[derive(Debug, Clone, Copy, Default)]
pub struct SrtParser;

impl SrtParser {
    fn parse_block(block: &Block<'_>) -> Result<CaptionLine, String> {
        let mut rows = block.lines.iter().copied();

        let mut timing = rows.next().ok_or("empty block")?;
        if timing.trim().chars().all(|c| c.is_ascii_digit()) {
            timing = rows.next().ok_or("missing timecode line")?;
        }

        let (start, end) = text::parse_srt_timing(timing)?;

        let body = rows
            .map(text::clean_text)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        CaptionLine::new(start, end, body).map_err(|e| e.to_string())
    }
}

impl CaptionParser for SrtParser {
    fn format(&self) -> SubtitleFormat {
        SubtitleFormat::Srt
    }

    fn detect(&self, content: &str) -> f32 {
        let content = text::normalize(content);

        if regex!(r"(?m)^\s*\d+\s*\n\s*\d{1,3}:\d{2}:\d{2},\d{3}\s*-->\s*\d{1,3}:\d{2}:\d{2},\d{3}")
            .is_match(&content)
        {
            0.9
        } else if regex!(r"\d{1,3}:\d{2}:\d{2},\d{3}\s*-->\s*\d{1,3}:\d{2}:\d{2},\d{3}")
            .is_match(&content)
        {
            0.6
        } else {
            0.0
        }
    }

    fn parse(&self, content: &str, metadata: CaptionMetadata) -> Result<Caption, ParseError> {
        let content = text::normalize(content);
        if content.trim().is_empty() {
            return Err(ParseError::malformed(SubtitleFormat::Srt, "Empty SRT content"));
        }

        let blocks = text::split_blocks(&content);
        let mut lines = Vec::with_capacity(blocks.len());
        let mut first_bad: Option<usize> = None;

        for (i, block) in blocks.iter().enumerate() {
            match Self::parse_block(block) {
                Ok(line) => lines.push(line),
                Err(reason) => {
                    warn!(block = i + 1, line = block.line, "Skipping SRT block: {}", reason);
                    first_bad.get_or_insert(block.line);
                }
            }
        }

        if lines.is_empty() {
            return Err(ParseError::malformed(
                SubtitleFormat::Srt,
                format!(
                    "No valid caption blocks found ({} blocks skipped)",
                    blocks.len()
                ),
            )
            .at_line(first_bad));
        }

        Ok(finish(SubtitleFormat::Srt, metadata, lines))
    }
}
