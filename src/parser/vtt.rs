//! WebVTT parser.
//!
//! Header, `NOTE`, `STYLE` and `REGION` blocks are dropped. Cue identifiers
//! and cue settings are ignored. Markup is stripped from the text, but
//! speaker information is kept. Each text line is checked against exactly
//! one speaker pattern, in this order:
//!
//! 1. `<v Name>text</v>` wrapping the whole line
//! 2. `[LABEL]: text` with an all-caps label
//! 3. `[Name] text`
//!
//! Bracketed sound cues like `[Music]` never count as speakers.

use tracing::warn;

use super::text::{self, Block};
use super::{finish, CaptionParser, ParseError};
use crate::domain::{Caption, CaptionLine, CaptionMetadata, SubtitleFormat};

/// Parser for WebVTT text
#[derive(Debug, Clone, Copy, Default)]
pub struct VttParser;

/// Split a cue text line into an optional speaker and the remaining text
pub fn extract_speaker(line: &str) -> (Option<String>, String) {
    if let Some(caps) = regex!(r"^\s*<v(?:\.[^\s>]+)*\s+([^>]+)>(.*?)(?:</v>)?\s*$").captures(line) {
        let name = caps[1].trim();
        if !name.is_empty() {
            return (Some(name.to_string()), caps[2].to_string());
        }
    }

    // Bracket labels may sit inside styling tags like `<i>..</i>`
    let line = &text::strip_tags(line);

    if let Some(caps) = regex!(r"^\s*\[([^\[\]]+)\]\s*:\s*(.*)$").captures(line) {
        let label = caps[1].trim();
        let all_caps = label.chars().any(|c| c.is_uppercase())
            && !label.chars().any(|c| c.is_lowercase());
        if all_caps && !text::is_sound_cue(label) {
            return (Some(label.to_string()), caps[2].to_string());
        }
    }

    if let Some(caps) = regex!(r"^\s*\[([^\[\]]+)\]:?\s+(\S.*)$").captures(line) {
        let name = caps[1].trim();
        if !name.is_empty() && !text::is_sound_cue(name) {
            return (Some(name.to_string()), caps[2].to_string());
        }
    }

    (None, line.to_string())
}

fn is_keyword_block(first_line: &str, keyword: &str) -> bool {
    first_line
        .strip_prefix(keyword)
        .map(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
        .unwrap_or(false)
}

impl VttParser {
    /// Lines from the timing line onward, or `None` for non-cue blocks
    fn cue_lines<'a>(block: &'a Block<'a>, is_first: bool) -> Option<&'a [&'a str]> {
        let first = block.lines.first()?.trim_start();

        if is_first && first.starts_with("WEBVTT") {
            // Header; a cue glued to it without a blank line still counts
            let timing = block.lines.iter().position(|l| l.contains("-->"))?;
            return Some(&block.lines[timing..]);
        }

        if ["NOTE", "STYLE", "REGION"]
            .iter()
            .any(|k| is_keyword_block(first, k))
        {
            return None;
        }

        // Anything before the timing line is a cue identifier
        let timing = block.lines.iter().position(|l| l.contains("-->"));
        Some(timing.map(|t| &block.lines[t..]).unwrap_or(&block.lines[..]))
    }

    fn parse_cue(rows: &[&str]) -> Result<CaptionLine, String> {
        let (timing, body) = rows.split_first().ok_or("empty cue")?;
        if !timing.contains("-->") {
            return Err(format!("no timing line in block starting '{}'", timing.trim()));
        }
        let (start, end) = text::parse_vtt_timing(timing)?;

        let mut speaker: Option<String> = None;
        let mut text_lines = Vec::new();

        for raw in body {
            let (line_speaker, line_text) = extract_speaker(raw);
            let cleaned = text::clean_text(&line_text);
            if cleaned.is_empty() {
                continue;
            }

            // Only a leading line may name the speaker for the whole cue
            match line_speaker {
                Some(name) if speaker.is_none() && text_lines.is_empty() => {
                    speaker = Some(name);
                    text_lines.push(cleaned);
                }
                Some(name) if speaker.as_deref() != Some(name.as_str()) => {
                    text_lines.push(format!("{}: {}", name, cleaned));
                }
                _ => text_lines.push(cleaned),
            }
        }

        let line = CaptionLine::new(start, end, text_lines.join("\n")).map_err(|e| e.to_string())?;
        Ok(match speaker {
            Some(name) => line.with_speaker(name),
            None => line,
        })
    }
}

impl CaptionParser for VttParser {
    fn format(&self) -> SubtitleFormat {
        SubtitleFormat::Vtt
    }

    fn detect(&self, content: &str) -> f32 {
        let content = text::normalize(content);

        if content.trim_start().starts_with("WEBVTT") {
            1.0
        } else if regex!(r"(?:\d{1,3}:)?\d{2}:\d{2}\.\d{3}\s*-->\s*(?:\d{1,3}:)?\d{2}:\d{2}\.\d{3}")
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
            return Err(ParseError::malformed(SubtitleFormat::Vtt, "Empty WebVTT content"));
        }

        let blocks = text::split_blocks(&content);
        let mut lines = Vec::with_capacity(blocks.len());
        let mut first_bad: Option<usize> = None;

        for (i, block) in blocks.iter().enumerate() {
            let Some(rows) = Self::cue_lines(block, i == 0) else {
                continue;
            };

            match Self::parse_cue(rows) {
                Ok(line) => lines.push(line),
                Err(reason) => {
                    warn!(block = i + 1, line = block.line, "Skipping WebVTT cue: {}", reason);
                    first_bad.get_or_insert(block.line);
                }
            }
        }

        if lines.is_empty() {
            return Err(ParseError::malformed(
                SubtitleFormat::Vtt,
                "No valid cues found in WebVTT content",
            )
            .at_line(first_bad));
        }

        Ok(finish(SubtitleFormat::Vtt, metadata, lines))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> CaptionMetadata {
        CaptionMetadata::new("abc123", "en")
    }

    #[test]
    fn test_voice_tag_speaker() {
        let (speaker, text) = extract_speaker("<v Speaker 1>Hello there</v>");
        assert_eq!(speaker.as_deref(), Some("Speaker 1"));
        assert_eq!(text, "Hello there");

        // Closing tag is optional, classes are allowed
        let (speaker, text) = extract_speaker("<v.loud Bob>Hey");
        assert_eq!(speaker.as_deref(), Some("Bob"));
        assert_eq!(text, "Hey");
    }

    #[test]
    fn test_caps_label_speaker() {
        let (speaker, text) = extract_speaker("[SPEAKER 2]: Hi");
        assert_eq!(speaker.as_deref(), Some("SPEAKER 2"));
        assert_eq!(text, "Hi");
    }

    #[test]
    fn test_bracketed_name_speaker() {
        let (speaker, text) = extract_speaker("[Alice] Good morning");
        assert_eq!(speaker.as_deref(), Some("Alice"));
        assert_eq!(text, "Good morning");
    }

    #[test]
    fn test_sound_cues_are_not_speakers() {
        assert_eq!(extract_speaker("[Music] la la").0, None);
        assert_eq!(extract_speaker("[APPLAUSE]: yes").0, None);
        assert_eq!(extract_speaker("[Music]").1, "[Music]");
    }

    #[test]
    fn test_only_first_pattern_applies() {
        // The voice tag wins; the bracket inside is left as text
        let (speaker, text) = extract_speaker("<v Ann>[BOB]: hi</v>");
        assert_eq!(speaker.as_deref(), Some("Ann"));
        assert_eq!(text, "[BOB]: hi");
    }

    #[test]
    fn test_parse_full_document() {
        let content = "WEBVTT\nKind: captions\nLanguage: en\n\n\
                       NOTE this is a comment\nspanning lines\n\n\
                       STYLE\n::cue { color: yellow }\n\n\
                       intro\n00:00:01.000 --> 00:00:03.000 align:start position:0%\n<v Speaker 1>Hello there</v>\n\n\
                       00:00:03.500 --> 00:00:05.000\n[SPEAKER 2]: Hi\n\n\
                       00:00:05.000 --> 00:00:06.000\n<c.colorE5E5E5>plain</c> <i>text</i>\n";

        let caption = VttParser.parse(content, meta()).unwrap();
        assert_eq!(caption.len(), 3);

        let first = &caption.lines()[0];
        assert_eq!(first.text(), "Hello there");
        assert_eq!(first.speaker(), Some("Speaker 1"));
        assert_eq!(first.start(), 1.0);

        let second = &caption.lines()[1];
        assert_eq!(second.text(), "Hi");
        assert_eq!(second.speaker(), Some("SPEAKER 2"));

        assert_eq!(caption.lines()[2].text(), "plain text");
        assert_eq!(caption.lines()[2].speaker(), None);
        assert!(caption.metadata().has_speaker_identification);
        assert_eq!(caption.metadata().format, "vtt");
    }

    #[test]
    fn test_second_speaker_in_cue_stays_inline() {
        let content = "WEBVTT\n\n00:00:01.000 --> 00:00:02.000\n<v Ann>Hi Bob</v>\n<v Bob>Hi Ann</v>\n";
        let caption = VttParser.parse(content, meta()).unwrap();
        let line = &caption.lines()[0];
        assert_eq!(line.speaker(), Some("Ann"));
        assert_eq!(line.text(), "Hi Bob\nBob: Hi Ann");
    }

    #[test]
    fn test_speaker_after_unlabeled_line_stays_inline() {
        let content = "WEBVTT\n\n00:00:01.000 --> 00:00:02.000\nNarration\n[Bob] hi\n";
        let caption = VttParser.parse(content, meta()).unwrap();
        let line = &caption.lines()[0];
        assert_eq!(line.speaker(), None);
        assert_eq!(line.text(), "Narration\nBob: hi");
        assert!(!caption.metadata().has_speaker_identification);
    }

    #[test]
    fn test_label_inside_markup() {
        let (speaker, text) = extract_speaker("<i>[SPEAKER 2]: Hi</i>");
        assert_eq!(speaker.as_deref(), Some("SPEAKER 2"));
        assert_eq!(text, "Hi");

        let (speaker, text) = extract_speaker("<b>[Alice]</b> Good morning");
        assert_eq!(speaker.as_deref(), Some("Alice"));
        assert_eq!(text, "Good morning");
    }

    #[test]
    fn test_cue_glued_to_header() {
        let content = "WEBVTT\n00:00:01.000 --> 00:00:02.000\nGlued\n";
        let caption = VttParser.parse(content, meta()).unwrap();
        assert_eq!(caption.to_plain_text(), "Glued");
    }

    #[test]
    fn test_bad_cue_is_skipped() {
        let content = "WEBVTT\n\n00:00:01.000 --> 00:00:02.000\nGood\n\n\
                       00:00:0X.000 --> 00:00:04.000\nBad\n";
        let caption = VttParser.parse(content, meta()).unwrap();
        assert_eq!(caption.len(), 1);
        assert!(!caption.metadata().has_speaker_identification);
    }

    #[test]
    fn test_header_only_fails() {
        let err = VttParser.parse("WEBVTT\n\nNOTE nothing here\n", meta()).unwrap_err();
        assert!(matches!(err, ParseError::Parse { format: SubtitleFormat::Vtt, .. }));
    }

    #[test]
    fn test_detect() {
        assert_eq!(VttParser.detect("\u{feff}WEBVTT\n\n"), 1.0);
        assert!(VttParser.detect("00:01.000 --> 00:02.000\nhi") >= 0.5);
        assert_eq!(VttParser.detect("1\n00:00:01,000 --> 00:00:02,000\nHi"), 0.0);
    }
}
