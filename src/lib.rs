//! captionkit - Subtitle parsing and caption caching
//!
//! Turns raw subtitle text (SRT, WebVTT, JSON segment envelopes) into a
//! uniform, read-only [`Caption`] model, and keeps parsed captions in an
//! expiring, size-bounded on-disk cache.
//!
//! # Modules
//!
//! - `domain`: Data structures (Caption, CaptionLine, CaptionMetadata)
//! - `parser`: Format parsers and the detecting dispatcher
//! - `convert`: WebVTT/JSON output and line-level transforms
//! - `cache`: Cache key codec, entry encodings and the cache store
//! - `config`: Config file and environment resolution
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Parse and preview a subtitle file
//! captionkit parse talk.vtt
//!
//! # Convert SRT to WebVTT, shifted by two seconds
//! captionkit convert talk.srt --to vtt --shift 2
//!
//! # Cache a parsed track, then read it back
//! captionkit cache store talk.srt --video-id dQw4w9WgXcQ --language en
//! captionkit cache get --video-id dQw4w9WgXcQ --language en --output text
//! ```

/// Lazily compiled, process-wide regex for a string literal
macro_rules! regex {
    ($re:literal $(,)?) => {{
        static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
        RE.get_or_init(|| regex::Regex::new($re).expect("valid regex"))
    }};
}

pub mod cache;
pub mod cli;
pub mod config;
pub mod convert;
pub mod domain;
pub mod parser;

// Re-export main types at crate root for convenience
pub use cache::{CacheConfig, CacheError, CacheKey, CacheStats, CacheStore, StorageFormat};
pub use domain::{Caption, CaptionLine, CaptionMetadata, CaptionType, SubtitleFormat, VideoId};
pub use parser::{detect_format, parse_subtitle, CaptionParser, ParseError};
