//! Durable key/value storage for the serialized cart.
//!
//! # Backends
//!
//! - [`MemoryKv`] - In-process map, lost when the process exits
//! - [`FileKv`] - One file per key under a directory, written atomically
//!
//! Keys are restricted to `[A-Za-z0-9._-]` so every backend can map them to
//! file names without escaping.

mod file;
mod memory;

pub use file::FileKv;
pub use memory::MemoryKv;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur when reading or writing storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The key contains characters outside `[A-Za-z0-9._-]` or is empty.
    #[error("Invalid storage key: {0:?}")]
    InvalidKey(String),

    /// Filesystem operation failed.
    #[error("I/O error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// The stored bytes are not valid UTF-8.
    #[error("Stored value for {0} is not valid UTF-8")]
    NotUtf8(String),
}

/// A string blob store keyed by name.
#[async_trait]
pub trait PersistentKv: Send + Sync {
    /// Read the value stored under `key`, or `None` if nothing is stored.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: String) -> Result<(), StorageError>;
}

/// Check that a key is usable by every backend.
///
/// # Errors
///
/// Returns `StorageError::InvalidKey` for empty keys, keys made only of
/// dots, or keys with characters outside `[A-Za-z0-9._-]`.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-');
    if key.is_empty() || key.chars().all(|c| c == '.') || !key.chars().all(allowed) {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}
