//! Supported subtitle wire formats.

use serde::{Deserialize, Serialize};

/// A subtitle text format with a dedicated parser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtitleFormat {
    /// WebVTT
    Vtt,

    /// SubRip
    Srt,

    /// JSON timed-segment envelopes (YouTube json3 and similar)
    Json,
}

impl SubtitleFormat {
    /// Every format, in fallback priority order
    pub const ALL: [SubtitleFormat; 3] = [
        SubtitleFormat::Vtt,
        SubtitleFormat::Srt,
        SubtitleFormat::Json,
    ];

    /// Conventional file extension
    pub fn extension(&self) -> &'static str {
        match self {
            SubtitleFormat::Vtt => "vtt",
            SubtitleFormat::Srt => "srt",
            SubtitleFormat::Json => "json",
        }
    }
}

impl std::fmt::Display for SubtitleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl std::str::FromStr for SubtitleFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim_start_matches('.').to_lowercase().as_str() {
            "vtt" | "webvtt" => Ok(SubtitleFormat::Vtt),
            "srt" | "subrip" => Ok(SubtitleFormat::Srt),
            "json" | "json3" => Ok(SubtitleFormat::Json),
            _ => anyhow::bail!("Unsupported subtitle format: {}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_str() {
        assert_eq!("vtt".parse::<SubtitleFormat>().unwrap(), SubtitleFormat::Vtt);
        assert_eq!(
            "WebVTT".parse::<SubtitleFormat>().unwrap(),
            SubtitleFormat::Vtt
        );
        assert_eq!(".srt".parse::<SubtitleFormat>().unwrap(), SubtitleFormat::Srt);
        assert_eq!(
            "json3".parse::<SubtitleFormat>().unwrap(),
            SubtitleFormat::Json
        );
        assert!("ttml".parse::<SubtitleFormat>().is_err());
    }

    #[test]
    fn test_priority_order() {
        assert_eq!(
            SubtitleFormat::ALL,
            [SubtitleFormat::Vtt, SubtitleFormat::Srt, SubtitleFormat::Json]
        );
    }
}
