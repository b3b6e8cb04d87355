//! Directory-backed cache store.
//!
//! One file per entry. The directory is scanned once on open to rebuild an
//! in-memory index (key, store time, expiry, size), which then serves expiry
//! checks, stats and eviction without touching the disk. Every write goes
//! through a sibling temp file that is renamed into place, so a reader either
//! sees the old entry or the new one.
//!
//! Writers (store, refresh, invalidate, clear, eviction) hold the index write
//! lock for the whole operation. Plain reads only hold the read lock long
//! enough to find the entry's file.

use std::collections::{BTreeMap, HashMap};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::codec::{self, Entry, StorageFormat};
use super::key::{normalize_source, CacheKey};
use super::CacheError;
use crate::domain::Caption;

/// Cache behavior settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// When false, gets always miss and stores do nothing
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// TTL in seconds from store time; 0 disables the TTL
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,

    /// Total size budget in bytes; 0 means unbounded
    #[serde(default = "default_max_size_bytes")]
    pub max_size_bytes: u64,

    /// Evict inside `store` when over budget
    #[serde(default = "default_true")]
    pub auto_clean: bool,

    /// Eviction never goes below this many entries
    #[serde(default = "default_min_entries")]
    pub min_entries: usize,

    /// Reset an entry's store time when it is read
    #[serde(default)]
    pub refresh_on_access: bool,

    /// Entry file encoding
    #[serde(default)]
    pub format: StorageFormat,
}

fn default_true() -> bool {
    true
}

fn default_max_age_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_max_size_bytes() -> u64 {
    100 * 1024 * 1024
}

fn default_min_entries() -> usize {
    10
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_age_secs: default_max_age_secs(),
            max_size_bytes: default_max_size_bytes(),
            auto_clean: true,
            min_entries: default_min_entries(),
            refresh_on_access: false,
            format: StorageFormat::default(),
        }
    }
}

impl CacheConfig {
    fn max_age(&self) -> Option<Duration> {
        match self.max_age_secs {
            0 => None,
            secs => Duration::try_seconds(i64::try_from(secs).unwrap_or(i64::MAX)),
        }
    }

    fn is_expired(
        &self,
        stored_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> bool {
        match expires_at {
            // An explicit expiry replaces the TTL entirely
            Some(at) => now >= at,
            None => self
                .max_age()
                .map(|age| now - stored_at >= age)
                .unwrap_or(false),
        }
    }
}

/// Snapshot of cache counters and usage
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stores: u64,
    /// hits / (hits + misses), or 0 before any lookup
    pub hit_ratio: f64,
    pub entry_count: usize,
    pub total_size_bytes: u64,
    pub size_mb: f64,
    pub enabled: bool,
    pub config: CacheConfig,
}

#[derive(Debug, Clone)]
struct IndexEntry {
    stored_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    size_bytes: u64,
    path: PathBuf,
}

type Index = HashMap<String, IndexEntry>;

/// File name for a key.
///
/// Keys made only of `[A-Za-z0-9=._-]` are used as-is. Anything else is
/// sanitized and suffixed with a short SHA-256 so distinct keys never collide.
pub fn file_name(key: &str, format: StorageFormat) -> String {
    let is_safe = |c: char| c.is_ascii_alphanumeric() || matches!(c, '=' | '.' | '_' | '-');

    let usable = !key.is_empty()
        && !key.starts_with('.')
        && key.len() <= 200
        && key.chars().all(is_safe);

    let stem = if usable {
        key.to_string()
    } else {
        let sanitized: String = key
            .chars()
            .take(100)
            .map(|c| if is_safe(c) { c } else { '-' })
            .collect();
        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        format!("{}-{}", sanitized.trim_start_matches('.'), &digest[..16])
    };

    format!("{}.{}", stem, format.extension())
}

fn now() -> DateTime<Utc> {
    // Both encodings keep microseconds
    Utc::now().trunc_subsecs(6)
}

/// Write `bytes` to `path` via a temp file in `dir` and an atomic rename
async fn write_atomic(dir: &Path, path: &Path, bytes: Vec<u8>) -> Result<(), CacheError> {
    let dir = dir.to_path_buf();
    let target = path.to_path_buf();

    let result = tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| std::io::Error::new(ErrorKind::Other, e))
    .and_then(|r| r);

    result.map_err(|e| CacheError::io(path, e))
}

/// Remove a file, treating "already gone" as success
async fn remove_entry_file(path: &Path) -> Result<(), CacheError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CacheError::io(path, e)),
    }
}

/// Expiring, size-bounded caption cache in a directory
pub struct CacheStore {
    dir: PathBuf,
    config: CacheConfig,
    index: RwLock<Index>,
    hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
}

impl CacheStore {
    /// Open (creating if needed) a cache directory and index its entries
    pub async fn open(dir: impl Into<PathBuf>, config: CacheConfig) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| CacheError::io(&dir, e))?;

        let index = Self::scan(&dir, config.format).await?;
        info!(
            dir = %dir.display(),
            entries = index.len(),
            format = %config.format,
            "Opened caption cache"
        );

        let store = Self {
            dir,
            config,
            index: RwLock::new(index),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            stores: AtomicU64::new(0),
        };

        if store.config.enabled && store.config.auto_clean {
            let mut index = store.index.write().await;
            store.evict(&mut index).await?;
        }

        Ok(store)
    }

    /// Rebuild the index from entry files of the given format.
    ///
    /// Files with the entry extension that fail to decode are deleted.
    async fn scan(dir: &Path, format: StorageFormat) -> Result<Index, CacheError> {
        let mut index = Index::new();
        let mut entries = fs::read_dir(dir).await.map_err(|e| CacheError::io(dir, e))?;

        while let Some(dir_entry) = entries
            .next_entry()
            .await
            .map_err(|e| CacheError::io(dir, e))?
        {
            let path = dir_entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(format.extension()) {
                continue;
            }

            let bytes = match fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(CacheError::io(&path, e)),
            };

            match codec::decode(&bytes, format) {
                Ok(entry) => {
                    index.insert(
                        entry.key,
                        IndexEntry {
                            stored_at: entry.stored_at,
                            expires_at: entry.expires_at,
                            size_bytes: bytes.len() as u64,
                            path,
                        },
                    );
                }
                Err(message) => {
                    // Every file with the entry extension is either indexed or gone
                    warn!(path = %path.display(), "Removing unreadable cache entry: {}", message);
                    remove_entry_file(&path).await?;
                }
            }
        }

        Ok(index)
    }

    /// Directory holding the entry files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Active configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn miss(&self, key: &str, reason: &str) -> Option<Caption> {
        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key, reason, "Cache miss");
        None
    }

    /// Look up a caption.
    ///
    /// Missing, expired and unreadable entries all come back as `None`. Every
    /// call counts as exactly one hit or one miss, including calls that fail
    /// with an invalid key or an IO error.
    pub async fn get(
        &self,
        video_id: &str,
        language: &str,
        source: &str,
        extra: &BTreeMap<String, String>,
    ) -> Result<Option<Caption>, CacheError> {
        if !self.config.enabled {
            return Ok(self.miss(video_id, "disabled"));
        }

        let key = match CacheKey::generate(video_id, language, source, extra) {
            Ok(key) => key,
            Err(e) => {
                self.miss(video_id, "invalid key");
                return Err(e);
            }
        };

        let path = {
            let index = self.index.read().await;
            index.get(&key).map(|e| e.path.clone())
        };
        let Some(path) = path else {
            return Ok(self.miss(&key, "not found"));
        };

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(self.miss(&key, "file missing"));
            }
            Err(e) => {
                self.miss(&key, "read error");
                return Err(CacheError::io(&path, e));
            }
        };

        let mut entry = match codec::decode(&bytes, self.config.format) {
            Ok(entry) if entry.key == key => entry,
            Ok(entry) => {
                warn!(key = %key, found = %entry.key, path = %path.display(), "Cache entry key mismatch");
                return Ok(self.miss(&key, "key mismatch"));
            }
            Err(message) => {
                let err = CacheError::Decode {
                    path: path.clone(),
                    message,
                };
                warn!(key = %key, "{}", err);
                return Ok(self.miss(&key, "corrupt"));
            }
        };

        let now = now();
        if self.config.is_expired(entry.stored_at, entry.expires_at, now) {
            return Ok(self.miss(&key, "expired"));
        }

        self.hits.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, "Cache hit");

        if self.config.refresh_on_access {
            let previous = entry.stored_at;
            entry.stored_at = now;
            if let Err(e) = self.refresh(&entry, previous, &path).await {
                warn!(key = %key, "Failed to refresh cache entry: {}", e);
            }
        }

        Ok(Some(entry.caption))
    }

    /// Rewrite an entry with a new store time, unless it changed underneath us
    async fn refresh(
        &self,
        entry: &Entry,
        previous: DateTime<Utc>,
        path: &Path,
    ) -> Result<(), CacheError> {
        let mut index = self.index.write().await;
        let Some(current) = index.get_mut(&entry.key) else {
            return Ok(());
        };
        if current.stored_at != previous || current.path != path {
            return Ok(());
        }

        let bytes = codec::encode(entry, self.config.format)?;
        let size = bytes.len() as u64;
        write_atomic(&self.dir, path, bytes).await?;

        current.stored_at = entry.stored_at;
        current.size_bytes = size;
        Ok(())
    }

    /// Store a caption under the key built from its metadata, `source` and `extra`.
    ///
    /// Overwrites any existing entry. `expires_at` sets an explicit expiry that
    /// takes the place of the TTL. Eviction runs before this returns when the
    /// cache is over budget and `auto_clean` is set.
    pub async fn store(
        &self,
        caption: &Caption,
        source: &str,
        expires_at: Option<DateTime<Utc>>,
        extra: &BTreeMap<String, String>,
    ) -> Result<(), CacheError> {
        if !self.config.enabled {
            debug!("Cache disabled, not storing");
            return Ok(());
        }

        let metadata = caption.metadata();
        let key = CacheKey::generate(&metadata.video_id, &metadata.language_code, source, extra)?;
        let entry = Entry {
            key,
            stored_at: now(),
            expires_at: expires_at.map(|at| at.trunc_subsecs(6)),
            caption: caption.clone(),
        };
        let bytes = codec::encode(&entry, self.config.format)?;
        let size = bytes.len() as u64;
        let path = self.dir.join(file_name(&entry.key, self.config.format));

        let mut index = self.index.write().await;
        write_atomic(&self.dir, &path, bytes).await?;
        index.insert(
            entry.key.clone(),
            IndexEntry {
                stored_at: entry.stored_at,
                expires_at: entry.expires_at,
                size_bytes: size,
                path,
            },
        );
        self.stores.fetch_add(1, Ordering::Relaxed);
        debug!(key = %entry.key, size, "Stored caption");

        if self.config.auto_clean {
            self.evict(&mut index).await?;
        }

        Ok(())
    }

    /// Drop oldest entries until within the size budget or at the minimum count
    async fn evict(&self, index: &mut Index) -> Result<usize, CacheError> {
        let budget = self.config.max_size_bytes;
        if budget == 0 {
            return Ok(0);
        }

        let mut total: u64 = index.values().map(|e| e.size_bytes).sum();
        if total <= budget {
            return Ok(0);
        }

        let mut oldest_first: Vec<(DateTime<Utc>, String)> = index
            .iter()
            .map(|(key, e)| (e.stored_at, key.clone()))
            .collect();
        oldest_first.sort();

        let mut removed = 0usize;
        let mut freed = 0u64;
        for (_, key) in oldest_first {
            if total <= budget || index.len() <= self.config.min_entries {
                break;
            }
            if let Some(entry) = index.get(&key) {
                remove_entry_file(&entry.path).await?;
                total -= entry.size_bytes;
                freed += entry.size_bytes;
                index.remove(&key);
                removed += 1;
            }
        }

        if removed > 0 {
            info!(
                removed,
                freed_bytes = freed,
                remaining = index.len(),
                "Evicted cache entries"
            );
        }
        Ok(removed)
    }

    /// Remove every entry for `video_id`, optionally narrowed by language and source.
    ///
    /// Returns the number of entries removed.
    pub async fn invalidate(
        &self,
        video_id: &str,
        language: Option<&str>,
        source: Option<&str>,
    ) -> Result<usize, CacheError> {
        if !self.config.enabled {
            return Ok(0);
        }

        let source = source.map(normalize_source);
        let mut index = self.index.write().await;

        let matching: Vec<String> = index
            .keys()
            .filter(|key| match CacheKey::parse(key) {
                Ok(k) => {
                    k.video_id == video_id
                        && language.map_or(true, |l| k.language == l)
                        && source.map_or(true, |s| k.source == s)
                }
                Err(_) => false,
            })
            .cloned()
            .collect();

        for key in &matching {
            if let Some(entry) = index.get(key) {
                remove_entry_file(&entry.path).await?;
                index.remove(key);
            }
        }

        info!(video_id, removed = matching.len(), "Invalidated cache entries");
        Ok(matching.len())
    }

    /// Remove every entry. Hit and miss counters are kept.
    pub async fn clear(&self) -> Result<(), CacheError> {
        let mut index = self.index.write().await;

        for entry in index.values() {
            remove_entry_file(&entry.path).await?;
        }
        let cleared = index.len();
        index.clear();

        // Unreadable files never made it into the index
        let extension = self.config.format.extension();
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| CacheError::io(&self.dir, e))?;
        while let Some(dir_entry) = entries
            .next_entry()
            .await
            .map_err(|e| CacheError::io(&self.dir, e))?
        {
            let path = dir_entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(extension) {
                remove_entry_file(&path).await?;
            }
        }

        info!(cleared, "Cleared caption cache");
        Ok(())
    }

    /// Remove every entry that is currently expired
    pub async fn purge_expired(&self) -> Result<usize, CacheError> {
        let now = now();
        let mut index = self.index.write().await;

        let expired: Vec<String> = index
            .iter()
            .filter(|(_, e)| self.config.is_expired(e.stored_at, e.expires_at, now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            if let Some(entry) = index.get(key) {
                remove_entry_file(&entry.path).await?;
                index.remove(key);
            }
        }

        if !expired.is_empty() {
            info!(removed = expired.len(), "Purged expired cache entries");
        }
        Ok(expired.len())
    }

    /// All cached keys, sorted
    pub async fn keys(&self) -> Vec<String> {
        let index = self.index.read().await;
        let mut keys: Vec<String> = index.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Current counters and usage
    pub async fn stats(&self) -> CacheStats {
        let (entry_count, total_size_bytes) = {
            let index = self.index.read().await;
            (index.len(), index.values().map(|e| e.size_bytes).sum::<u64>())
        };

        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;

        CacheStats {
            hits,
            misses,
            stores: self.stores.load(Ordering::Relaxed),
            hit_ratio: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
            entry_count,
            total_size_bytes,
            size_mb: total_size_bytes as f64 / (1024.0 * 1024.0),
            enabled: self.config.enabled,
            config: self.config.clone(),
        }
    }
}
