//! Caption track metadata.

use serde::{Deserialize, Serialize};

/// How a caption track was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptionType {
    /// Uploaded by the video author
    #[default]
    Manual,

    /// Produced by speech recognition
    AutoGenerated,

    /// Machine translation of another track
    Translated,
}

impl CaptionType {
    /// Source token used in cache keys.
    ///
    /// Cache keys use `_` as their separator, so `AutoGenerated` maps to
    /// `automatic`.
    pub fn cache_source(&self) -> &'static str {
        match self {
            CaptionType::Manual => "manual",
            CaptionType::AutoGenerated => "automatic",
            CaptionType::Translated => "translated",
        }
    }
}

impl std::fmt::Display for CaptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptionType::Manual => write!(f, "manual"),
            CaptionType::AutoGenerated => write!(f, "auto_generated"),
            CaptionType::Translated => write!(f, "translated"),
        }
    }
}

impl std::str::FromStr for CaptionType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "manual" => Ok(CaptionType::Manual),
            "auto_generated" | "automatic" | "auto" => Ok(CaptionType::AutoGenerated),
            "translated" => Ok(CaptionType::Translated),
            _ => anyhow::bail!("Unknown caption type: {}", s),
        }
    }
}

/// Metadata for a caption track
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionMetadata {
    /// Language code (e.g. "en", "pt-BR")
    pub language_code: String,

    /// Human-readable language name
    pub language_name: String,

    /// Whether the track was produced by speech recognition
    pub is_auto_generated: bool,

    /// How the track was produced
    pub caption_type: CaptionType,

    /// Whether any line carries a speaker label
    pub has_speaker_identification: bool,

    /// Whether this is the video's default track
    pub is_default: bool,

    /// Estimated quality in [0, 1]
    pub quality_score: Option<f64>,

    /// Source system name
    pub provider: String,

    /// Originating text format (e.g. "vtt")
    pub format: String,

    /// URL the track was fetched from
    pub source_url: String,

    /// Stable external video identifier
    pub video_id: String,
}

impl CaptionMetadata {
    /// Create metadata for a video/language pair with defaults for the rest
    pub fn new(video_id: impl Into<String>, language_code: impl Into<String>) -> Self {
        let language_code = language_code.into();
        Self {
            language_name: language_code.clone(),
            language_code,
            is_auto_generated: false,
            caption_type: CaptionType::Manual,
            has_speaker_identification: false,
            is_default: false,
            quality_score: None,
            provider: "youtube".to_string(),
            format: String::new(),
            source_url: String::new(),
            video_id: video_id.into(),
        }
    }

    /// Set the language name
    pub fn with_language_name(mut self, name: impl Into<String>) -> Self {
        self.language_name = name.into();
        self
    }

    /// Set the caption type (keeps `is_auto_generated` in step)
    pub fn with_caption_type(mut self, caption_type: CaptionType) -> Self {
        self.caption_type = caption_type;
        self.is_auto_generated = caption_type == CaptionType::AutoGenerated;
        self
    }

    /// Set the originating format
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    /// Set the source URL
    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = url.into();
        self
    }

    /// Set the provider name
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    /// Mark as the default track
    pub fn with_default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }

    /// Set the quality score, clamped to [0, 1]; NaN clears it
    pub fn with_quality_score(mut self, score: f64) -> Self {
        self.quality_score = if score.is_nan() {
            None
        } else {
            Some(score.clamp(0.0, 1.0))
        };
        self
    }
}
