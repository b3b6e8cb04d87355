//! Stateless helpers shared by the format parsers: newline normalization,
//! block splitting, timecode parsing and markup cleanup.

/// A run of non-blank lines
#[derive(Debug, Clone, PartialEq)]
pub struct Block<'a> {
    /// 1-based line number of the first line in the block
    pub line: usize,
    pub lines: Vec<&'a str>,
}

/// Strip a UTF-8 BOM and normalize line endings to `\n`
pub fn normalize(content: &str) -> String {
    content
        .trim_start_matches('\u{feff}')
        .replace("\r\n", "\n")
        .replace('\r', "\n")
}

/// Split normalized content into blocks separated by blank lines
pub fn split_blocks(content: &str) -> Vec<Block<'_>> {
    let mut blocks = Vec::new();
    let mut current: Option<Block<'_>> = None;

    for (i, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            if let Some(block) = current.take() {
                blocks.push(block);
            }
            continue;
        }

        current
            .get_or_insert_with(|| Block {
                line: i + 1,
                lines: Vec::new(),
            })
            .lines
            .push(line);
    }

    if let Some(block) = current {
        blocks.push(block);
    }

    blocks
}

fn to_seconds(hours: &str, minutes: &str, seconds: &str, millis: &str) -> Result<f64, String> {
    let parse = |s: &str| s.parse::<u64>().map_err(|_| format!("invalid number '{}'", s));
    let (h, m, s, ms) = (parse(hours)?, parse(minutes)?, parse(seconds)?, parse(millis)?);

    if m >= 60 || s >= 60 {
        return Err(format!("out of range {}:{}:{}", hours, minutes, seconds));
    }

    Ok((h * 3600 + m * 60 + s) as f64 + ms as f64 / 1000.0)
}

/// Parse a SubRip timing line (`HH:MM:SS,mmm --> HH:MM:SS,mmm`).
///
/// A `.` millisecond separator and trailing coordinates are tolerated.
pub fn parse_srt_timing(line: &str) -> Result<(f64, f64), String> {
    let caps = regex!(
        r"^\s*(\d{1,3}):(\d{2}):(\d{2})[,.](\d{3})\s*-->\s*(\d{1,3}):(\d{2}):(\d{2})[,.](\d{3})(?:\s.*)?$"
    )
    .captures(line)
    .ok_or_else(|| format!("malformed timecode '{}'", line.trim()))?;

    let start = to_seconds(&caps[1], &caps[2], &caps[3], &caps[4])?;
    let end = to_seconds(&caps[5], &caps[6], &caps[7], &caps[8])?;
    Ok((start, end))
}

/// Parse a WebVTT timing line (`[HH:]MM:SS.mmm --> [HH:]MM:SS.mmm [settings]`).
///
/// Cue settings after the end timestamp are ignored.
pub fn parse_vtt_timing(line: &str) -> Result<(f64, f64), String> {
    let caps = regex!(
        r"^\s*(?:(\d{1,3}):)?(\d{2}):(\d{2})\.(\d{3})\s*-->\s*(?:(\d{1,3}):)?(\d{2}):(\d{2})\.(\d{3})(?:\s.*)?$"
    )
    .captures(line)
    .ok_or_else(|| format!("malformed timecode '{}'", line.trim()))?;

    let hours = |i: usize| caps.get(i).map(|m| m.as_str()).unwrap_or("0");
    let start = to_seconds(hours(1), &caps[2], &caps[3], &caps[4])?;
    let end = to_seconds(hours(5), &caps[6], &caps[7], &caps[8])?;
    Ok((start, end))
}

/// Remove inline markup: HTML-style tags, VTT timestamp tags and `{\...}` overrides
pub fn strip_tags(text: &str) -> String {
    let without_tags = regex!(r"<(?:/?[A-Za-z][^<>]*|\d[\d:.]*)>").replace_all(text, "");
    regex!(r"\{\\[^{}]*\}")
        .replace_all(&without_tags, "")
        .into_owned()
}

/// Decode the handful of character references subtitle files use
pub fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Full cleanup for one line of cue text
pub fn clean_text(text: &str) -> String {
    let stripped = strip_tags(text);
    let decoded = decode_entities(&stripped);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Bracketed labels that describe sound rather than a speaker
pub fn is_sound_cue(label: &str) -> bool {
    matches!(
        label.trim().to_lowercase().as_str(),
        "music"
            | "applause"
            | "laughter"
            | "laughs"
            | "sound"
            | "silence"
            | "noise"
            | "cheering"
            | "inaudible"
            | "crosstalk"
    )
}
