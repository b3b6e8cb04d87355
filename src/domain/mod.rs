//! Domain types for captionkit.
//!
//! This module contains the core data structures:
//! - Caption: An ordered caption track plus its metadata
//! - CaptionLine: One timed subtitle entry
//! - CaptionMetadata: Track identity and provenance
//! - SubtitleFormat: The wire formats the parsers understand

pub mod caption;
pub mod format;
pub mod metadata;
pub mod video;

// Re-export commonly used types
pub use caption::{Caption, CaptionLine, LineError};
pub use format::SubtitleFormat;
pub use metadata::{CaptionMetadata, CaptionType};
pub use video::VideoId;
