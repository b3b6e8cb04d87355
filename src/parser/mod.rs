//! Subtitle parsers.
//!
//! Each supported wire format has a unit-struct parser implementing
//! [`CaptionParser`]. The set is closed: [`parser_for`] maps a
//! [`SubtitleFormat`] tag to its parser, and the dispatcher walks
//! [`SubtitleFormat::ALL`] when it has to guess.
//!
//! Parsing is tolerant. Malformed blocks are logged and skipped; a parse only
//! fails when nothing usable is left.

pub mod dispatcher;
pub mod json;
pub mod srt;
pub mod text;
pub mod vtt;

use thiserror::Error;

use crate::domain::{Caption, CaptionLine, CaptionMetadata, SubtitleFormat};

// Re-export the parsers and dispatcher entry points
pub use dispatcher::{detect_format, parse_subtitle};
pub use json::JsonParser;
pub use srt::SrtParser;
pub use vtt::VttParser;

/// Minimum detection score treated as a confident match
pub const CONFIDENT: f32 = 0.5;

/// Errors that can occur while parsing subtitle content
#[derive(Debug, Error)]
pub enum ParseError {
    /// No hint was given and the content matched no known format
    #[error("Could not detect subtitle format")]
    FormatDetection,

    /// The format is known but the content is unrecoverably malformed
    #[error("Failed to parse {format} content: {message}")]
    Parse {
        format: SubtitleFormat,
        /// 1-based line number in the input, when known
        line: Option<usize>,
        message: String,
    },
}

impl ParseError {
    pub(crate) fn malformed(format: SubtitleFormat, message: impl Into<String>) -> Self {
        ParseError::Parse {
            format,
            line: None,
            message: message.into(),
        }
    }

    pub(crate) fn at_line(mut self, at: Option<usize>) -> Self {
        if let ParseError::Parse { ref mut line, .. } = self {
            *line = at;
        }
        self
    }

    /// Input line the error points at, if any
    pub fn line(&self) -> Option<usize> {
        match self {
            ParseError::Parse { line, .. } => *line,
            ParseError::FormatDetection => None,
        }
    }
}

/// Shared capability of every format parser
pub trait CaptionParser: Send + Sync {
    /// The format this parser handles
    fn format(&self) -> SubtitleFormat;

    /// Score in [0, 1] for how likely `content` is in this format
    fn detect(&self, content: &str) -> f32;

    /// Parse `content` into a caption carrying `metadata`
    fn parse(&self, content: &str, metadata: CaptionMetadata) -> Result<Caption, ParseError>;
}

/// Get the parser for a format
pub fn parser_for(format: SubtitleFormat) -> &'static dyn CaptionParser {
    match format {
        SubtitleFormat::Vtt => &VttParser,
        SubtitleFormat::Srt => &SrtParser,
        SubtitleFormat::Json => &JsonParser,
    }
}

/// Assemble the final caption, filling in format and speaker flags
fn finish(
    format: SubtitleFormat,
    mut metadata: CaptionMetadata,
    lines: Vec<CaptionLine>,
) -> Caption {
    if metadata.format.is_empty() {
        metadata.format = format.to_string();
    }
    if lines.iter().any(|l| l.speaker().is_some()) {
        metadata.has_speaker_identification = true;
    }
    Caption::new(metadata, lines)
}
