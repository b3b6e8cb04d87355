//! Format detection and parser selection.

use tracing::{debug, warn};

use super::{parser_for, ParseError, CONFIDENT};
use crate::domain::{Caption, CaptionMetadata, SubtitleFormat};

/// Formats whose detection score clears [`CONFIDENT`], in priority order
fn confident_formats(content: &str) -> Vec<SubtitleFormat> {
    SubtitleFormat::ALL
        .into_iter()
        .filter(|format| parser_for(*format).detect(content) >= CONFIDENT)
        .collect()
}

/// Guess the format of `content`.
///
/// Returns the highest-scoring format; ties go to the earlier format in
/// [`SubtitleFormat::ALL`]. `None` when nothing scores at least [`CONFIDENT`].
pub fn detect_format(content: &str) -> Option<SubtitleFormat> {
    let mut best: Option<(SubtitleFormat, f32)> = None;

    for format in SubtitleFormat::ALL {
        let score = parser_for(format).detect(content);
        if score >= CONFIDENT && best.map_or(true, |(_, top)| score > top) {
            best = Some((format, score));
        }
    }

    best.map(|(format, _)| format)
}

/// Parse subtitle content into a [`Caption`].
///
/// With a `hint` the matching parser is used directly and its error is
/// returned as-is. Without one, a single confident detection decides the
/// parser; when several formats look plausible they are tried in priority
/// order until one succeeds.
pub fn parse_subtitle(
    content: &str,
    metadata: CaptionMetadata,
    hint: Option<SubtitleFormat>,
) -> Result<Caption, ParseError> {
    if let Some(format) = hint {
        debug!(%format, "Parsing with format hint");
        return parser_for(format).parse(content, metadata);
    }

    let candidates = confident_formats(content);
    match candidates.as_slice() {
        [] => Err(ParseError::FormatDetection),
        [format] => {
            debug!(%format, "Detected subtitle format");
            parser_for(*format).parse(content, metadata)
        }
        _ => {
            debug!(?candidates, "Ambiguous subtitle format, trying in order");
            for format in &candidates {
                match parser_for(*format).parse(content, metadata.clone()) {
                    Ok(caption) => return Ok(caption),
                    Err(e) => warn!(%format, "Candidate parser failed: {}", e),
                }
            }
            Err(ParseError::FormatDetection)
        }
    }
}
