//! Configuration for captionkit paths and cache behavior.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (CAPTIONKIT_HOME, CAPTIONKIT_CACHE_DIR)
//! 2. Config file (.captionkit/config.yaml)
//! 3. Defaults (~/.captionkit, ~/.captionkit/cache)
//!
//! Config file discovery:
//! - Searches current directory and parents for .captionkit/config.yaml
//! - `paths.home` is relative to the .captionkit/ directory
//! - `paths.cache_dir` is relative to home

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cache::CacheConfig;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const CONFIG_DIR: &str = ".captionkit";
const ENV_HOME: &str = "CAPTIONKIT_HOME";
const ENV_CACHE_DIR: &str = "CAPTIONKIT_CACHE_DIR";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub cache: Option<CacheConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to .captionkit/)
    pub home: Option<String>,
    /// Cache directory (relative to home)
    pub cache_dir: Option<String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    /// captionkit home
    pub home: PathBuf,
    /// Directory holding cache entry files
    pub cache_dir: PathBuf,
    /// Cache behavior
    pub cache: CacheConfig,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

/// Find config file by searching `start` and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_DIR).join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Combine a config file (if any), environment lookups and defaults
fn resolve(
    config_file: Option<PathBuf>,
    default_home: PathBuf,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig> {
    let parsed = config_file
        .as_deref()
        .map(|path| load_config_file(path).map(|cfg| (path, cfg)))
        .transpose()?;

    let (home, cache_dir, cache) = match parsed {
        Some((config_path, config)) => {
            let config_dir = config_path.parent().unwrap_or(Path::new("."));

            let home = if let Some(env_home) = env(ENV_HOME) {
                PathBuf::from(env_home)
            } else if let Some(ref home_path) = config.paths.home {
                resolve_path(config_dir, home_path)
            } else {
                default_home
            };

            let cache_dir = if let Some(env_cache) = env(ENV_CACHE_DIR) {
                PathBuf::from(env_cache)
            } else if let Some(ref cache_path) = config.paths.cache_dir {
                resolve_path(&home, cache_path)
            } else {
                home.join("cache")
            };

            (home, cache_dir, config.cache.unwrap_or_default())
        }
        None => {
            let home = env(ENV_HOME).map(PathBuf::from).unwrap_or(default_home);
            let cache_dir = env(ENV_CACHE_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|| home.join("cache"));
            (home, cache_dir, CacheConfig::default())
        }
    };

    Ok(ResolvedConfig {
        home,
        cache_dir,
        cache,
        config_file,
    })
}

/// Load configuration from all sources
pub fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(CONFIG_DIR);

    let config_file = std::env::current_dir()
        .ok()
        .and_then(|cwd| find_config_file(&cwd));

    resolve(config_file, default_home, |name| std::env::var(name).ok())
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}
