//! Cache CLI subcommands.
//!
//! Every command opens the cache directory from the resolved configuration,
//! so the index is rebuilt from disk on each invocation.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::Subcommand;

use super::{load_caption, render, resolve_video_id, FormatArg, OutputArg};
use crate::cache::CacheStore;
use crate::domain::{Caption, CaptionMetadata, CaptionType};

/// Cache-related subcommands
#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Parse a subtitle file and store it in the cache
    Store {
        /// Subtitle file ("-" reads stdin)
        file: PathBuf,

        /// Video ID or URL
        #[arg(long)]
        video_id: String,

        /// Language code
        #[arg(short, long, default_value = "en")]
        language: String,

        /// Caption source (manual, automatic, translated)
        #[arg(short, long, default_value = "manual")]
        source: String,

        /// Input format (detected if not specified)
        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,

        /// Expire the entry this many seconds from now instead of using the TTL
        #[arg(long)]
        expires_in: Option<u64>,

        /// Extra key parameter (name=value), repeatable
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
    },

    /// Print a cached caption
    Get {
        /// Video ID or URL
        #[arg(long)]
        video_id: String,

        /// Language code
        #[arg(short, long, default_value = "en")]
        language: String,

        /// Caption source
        #[arg(short, long, default_value = "manual")]
        source: String,

        /// Extra key parameter (name=value), repeatable
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,

        /// What to print
        #[arg(short, long, value_enum, default_value = "preview")]
        output: OutputArg,
    },

    /// Remove cached captions for a video
    Invalidate {
        /// Video ID or URL
        #[arg(long)]
        video_id: String,

        /// Only this language
        #[arg(short, long)]
        language: Option<String>,

        /// Only this source
        #[arg(short, long)]
        source: Option<String>,
    },

    /// Remove every cached caption
    Clear,

    /// Remove expired entries
    Purge,

    /// Show hit/miss counters and disk usage
    Stats,

    /// List cached keys
    Keys,
}

/// Parse a `name=value` pair
fn parse_param(s: &str) -> std::result::Result<(String, String), String> {
    s.split_once('=')
        .filter(|(name, _)| !name.is_empty())
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected name=value, got '{}'", s))
}

async fn open_store() -> Result<CacheStore> {
    let cfg = crate::config::config()?;
    CacheStore::open(&cfg.cache_dir, cfg.cache.clone())
        .await
        .with_context(|| format!("Failed to open cache at {}", cfg.cache_dir.display()))
}

/// Execute cache subcommands
pub async fn execute(command: CacheCommands) -> Result<()> {
    let store = open_store().await?;

    match command {
        CacheCommands::Store {
            file,
            video_id,
            language,
            source,
            format,
            expires_in,
            params,
        } => {
            let parsed = load_caption(&file, format, &video_id, &language).await?;
            let caption = with_caption_type(parsed, &source);

            let expires_at = expires_in
                .map(|secs| {
                    i64::try_from(secs)
                        .ok()
                        .and_then(Duration::try_seconds)
                        .map(|d| Utc::now() + d)
                        .context("--expires-in is out of range")
                })
                .transpose()?;
            let extra: BTreeMap<String, String> = params.into_iter().collect();

            store
                .store(&caption, &source, expires_at, &extra)
                .await
                .context("Failed to store caption")?;

            println!(
                "Stored {} lines for {} ({}, {})",
                caption.len(),
                caption.metadata().video_id,
                language,
                source
            );
        }

        CacheCommands::Get {
            video_id,
            language,
            source,
            params,
            output,
        } => {
            let video_id = resolve_video_id(&video_id);
            let extra: BTreeMap<String, String> = params.into_iter().collect();
            match store.get(&video_id, &language, &source, &extra).await? {
                Some(caption) => println!("{}", render(&caption, output)),
                None => {
                    eprintln!("Not cached (or expired)");
                    std::process::exit(1);
                }
            }
        }

        CacheCommands::Invalidate {
            video_id,
            language,
            source,
        } => {
            let video_id = resolve_video_id(&video_id);
            let removed = store
                .invalidate(&video_id, language.as_deref(), source.as_deref())
                .await?;
            println!("Removed {} entries", removed);
        }

        CacheCommands::Clear => {
            store.clear().await?;
            println!("Cache cleared");
        }

        CacheCommands::Purge => {
            let removed = store.purge_expired().await?;
            println!("Purged {} expired entries", removed);
        }

        CacheCommands::Stats => {
            let stats = store.stats().await;
            println!("Cache: {}", store.dir().display());
            println!("  Enabled:    {}", stats.enabled);
            println!("  Entries:    {}", stats.entry_count);
            println!(
                "  Size:       {:.2} MB ({} bytes)",
                stats.size_mb, stats.total_size_bytes
            );
            println!("  Format:     {}", store.config().format);
        }

        CacheCommands::Keys => {
            let keys = store.keys().await;
            if keys.is_empty() {
                println!("Cache is empty");
            }
            for key in keys {
                println!("{}", key);
            }
        }
    }

    Ok(())
}

/// Tag the caption with the type implied by its cache source
fn with_caption_type(caption: Caption, source: &str) -> Caption {
    match source.parse::<CaptionType>() {
        Ok(caption_type) => {
            let (metadata, lines) = caption.into_parts();
            let metadata: CaptionMetadata = metadata.with_caption_type(caption_type);
            Caption::new(metadata, lines)
        }
        Err(_) => caption,
    }
}
