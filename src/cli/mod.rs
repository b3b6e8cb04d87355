//! Command-line interface for captionkit.
//!
//! Provides commands for parsing and converting subtitle files, and for
//! inspecting and managing the caption cache.

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use crate::convert;
use crate::domain::{Caption, CaptionMetadata, SubtitleFormat, VideoId};
use crate::parser::parse_subtitle;

pub mod cache;

/// captionkit - Subtitle parsing and caption caching
#[derive(Parser, Debug)]
#[command(name = "captionkit")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Parse a subtitle file and print the result
    Parse {
        /// Subtitle file ("-" reads stdin)
        file: PathBuf,

        /// Input format (detected if not specified)
        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,

        /// What to print
        #[arg(short, long, value_enum, default_value = "preview")]
        output: OutputArg,

        /// Video ID or URL the captions belong to
        #[arg(long, default_value = "unknown")]
        video_id: String,

        /// Language code
        #[arg(short, long, default_value = "en")]
        language: String,
    },

    /// Convert a subtitle file to another format
    Convert {
        /// Subtitle file ("-" reads stdin)
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum)]
        to: OutputArg,

        /// Input format (detected if not specified)
        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,

        /// Shift all timings by this many seconds (may be negative)
        #[arg(long, allow_hyphen_values = true)]
        shift: Option<f64>,

        /// Collapse consecutive identical lines
        #[arg(long)]
        merge_duplicates: bool,
    },

    /// Manage the caption cache
    Cache {
        #[command(subcommand)]
        command: cache::CacheCommands,
    },

    /// Show resolved configuration (debug)
    Config,
}

/// Subtitle format for CLI (maps to SubtitleFormat)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FormatArg {
    Srt,
    Vtt,
    Json,
}

impl From<FormatArg> for SubtitleFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Srt => SubtitleFormat::Srt,
            FormatArg::Vtt => SubtitleFormat::Vtt,
            FormatArg::Json => SubtitleFormat::Json,
        }
    }
}

/// Rendering for parsed captions
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputArg {
    /// Plain text, one line per cue
    Text,
    Srt,
    Vtt,
    Json,
    /// Timed summary of the first lines
    Preview,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Parse {
                file,
                format,
                output,
                video_id,
                language,
            } => parse_file(&file, format, output, &video_id, &language).await,
            Commands::Convert {
                file,
                to,
                format,
                shift,
                merge_duplicates,
            } => convert_file(&file, to, format, shift, merge_duplicates).await,
            Commands::Cache { command } => cache::execute(command).await,
            Commands::Config => show_config().await,
        }
    }
}

/// Render a caption in the requested output form
pub(crate) fn render(caption: &Caption, output: OutputArg) -> String {
    match output {
        OutputArg::Text => caption.to_plain_text(),
        OutputArg::Srt => caption.to_srt(),
        OutputArg::Vtt => convert::to_vtt(caption),
        OutputArg::Json => convert::to_json(caption),
        OutputArg::Preview => caption.preview(10),
    }
}

/// Read a subtitle file, or stdin for "-"
pub(crate) async fn read_input(file: &Path) -> Result<String> {
    if file == Path::new("-") {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        return Ok(buffer);
    }

    tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read subtitle file: {}", file.display()))
}

/// Bare video ID for a URL, or the input unchanged when it is not a video URL
pub(crate) fn resolve_video_id(video: &str) -> String {
    VideoId::from_url(video)
        .map(|id| id.to_string())
        .unwrap_or_else(|| video.to_string())
}

/// Parse a file with metadata for `video` (ID or URL) and `language`
pub(crate) async fn load_caption(
    file: &Path,
    format: Option<FormatArg>,
    video: &str,
    language: &str,
) -> Result<Caption> {
    let content = read_input(file).await?;

    let metadata = CaptionMetadata::new(resolve_video_id(video), language);

    parse_subtitle(&content, metadata, format.map(Into::into))
        .with_context(|| format!("Failed to parse {}", file.display()))
}

async fn parse_file(
    file: &Path,
    format: Option<FormatArg>,
    output: OutputArg,
    video: &str,
    language: &str,
) -> Result<()> {
    let caption = load_caption(file, format, video, language).await?;

    println!("{}", render(&caption, output));

    let speakers = caption.speakers();
    eprintln!(
        "\n[Parsed {} lines as {}, {:.1}s{}]",
        caption.len(),
        caption.metadata().format,
        caption.duration(),
        if speakers.is_empty() {
            String::new()
        } else {
            format!(", speakers: {}", speakers.join(", "))
        }
    );

    Ok(())
}

async fn convert_file(
    file: &Path,
    to: OutputArg,
    format: Option<FormatArg>,
    shift: Option<f64>,
    merge_duplicates: bool,
) -> Result<()> {
    let mut caption = load_caption(file, format, "unknown", "en").await?;

    if merge_duplicates {
        let removed = convert::merge_duplicates(&mut caption);
        tracing::info!(removed, "Merged duplicate lines");
    }
    if let Some(offset) = shift {
        convert::shift(&mut caption, offset)
            .with_context(|| format!("Cannot shift captions by {}s", offset))?;
    }

    println!("{}", render(&caption, to));
    Ok(())
}

async fn show_config() -> Result<()> {
    let cfg = crate::config::config()?;

    println!("captionkit configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:  {}", cfg.home.display());
    println!("  Cache: {}", cfg.cache_dir.display());
    println!();
    println!("Cache:");
    println!("  Enabled:           {}", cfg.cache.enabled);
    println!(
        "  Max age:           {}",
        match cfg.cache.max_age_secs {
            0 => "unlimited".to_string(),
            secs => format!("{}s", secs),
        }
    );
    println!(
        "  Max size:          {}",
        match cfg.cache.max_size_bytes {
            0 => "unlimited".to_string(),
            bytes => format!("{} bytes", bytes),
        }
    );
    println!("  Auto clean:        {}", cfg.cache.auto_clean);
    println!("  Min entries:       {}", cfg.cache.min_entries);
    println!("  Refresh on access: {}", cfg.cache.refresh_on_access);
    println!("  Storage format:    {}", cfg.cache.format);

    Ok(())
}
