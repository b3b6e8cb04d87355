//! On-disk caption cache.
//!
//! Entries live one per file in a cache directory, named after their
//! [`CacheKey`]. Expiry is either a TTL measured from the store time or an
//! explicit timestamp given at store time. Size is bounded by evicting the
//! oldest entries, but never below a minimum entry count.

pub mod codec;
pub mod key;
pub mod store;

use std::path::PathBuf;

use thiserror::Error;

pub use codec::{Entry, StorageFormat};
pub use key::CacheKey;
pub use store::{CacheConfig, CacheStats, CacheStore};

/// Errors raised by the cache layer.
///
/// A missing or expired entry is not an error; `get` just returns `None`.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Malformed cache key: {0}")]
    KeyFormat(String),

    #[error("Cache key field '{field}' is not allowed to be '{value}'")]
    InvalidKeyField { field: String, value: String },

    #[error("Cache IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode cache entry: {0}")]
    Encode(String),

    #[error("Corrupt cache entry {}: {message}", .path.display())]
    Decode { path: PathBuf, message: String },
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}
