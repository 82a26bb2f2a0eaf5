//! File-backed storage.
//!
//! Each key maps to a file of the same name under the storage directory.
//! Writes go to a sibling temp file that is then renamed over the target, so
//! a reader never observes a half-written cart.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{PersistentKv, StorageError, validate_key};

/// Storage persisted as files under a directory.
#[derive(Debug, Clone)]
pub struct FileKv {
    dir: PathBuf,
}

impl FileKv {
    /// Create a store rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Directory holding the stored files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.dir.join(key))
    }
}

fn io_error(key: &str, source: std::io::Error) -> StorageError {
    StorageError::Io {
        key: key.to_string(),
        source,
    }
}

#[async_trait]
impl PersistentKv for FileKv {
    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| StorageError::NotUtf8(key.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(key, e)),
        }
    }

    #[instrument(skip(self, value), fields(dir = %self.dir.display(), bytes = value.len()))]
    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error(key, e))?;

        let tmp = self.dir.join(format!(".{key}.tmp"));
        tokio::fs::write(&tmp, value.as_bytes())
            .await
            .map_err(|e| io_error(key, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| io_error(key, e))?;

        debug!(path = %path.display(), "Stored value");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("cart-filekv-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_missing_key_reads_as_none() {
        let kv = FileKv::new(scratch_dir());
        assert_eq!(kv.get("cart-store-v1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_creates_directory_and_round_trips() {
        let dir = scratch_dir();
        let kv = FileKv::new(&dir);

        kv.set("cart-store-v1", "[]".to_string()).await.unwrap();
        assert!(dir.join("cart-store-v1").exists());
        assert!(!dir.join(".cart-store-v1.tmp").exists());
        assert_eq!(kv.get("cart-store-v1").await.unwrap().as_deref(), Some("[]"));

        // A second handle on the same directory sees the value.
        let reopened = FileKv::new(&dir);
        assert_eq!(
            reopened.get("cart-store-v1").await.unwrap().as_deref(),
            Some("[]")
        );

        assert_eq!(kv.dir(), dir.as_path());

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let kv = FileKv::new(scratch_dir());
        let err = kv.get("../etc/passwd").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn test_non_utf8_value() {
        let dir = scratch_dir();
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("cart"), [0xff, 0xfe, 0xfd])
            .await
            .unwrap();

        let err = FileKv::new(&dir).get("cart").await.unwrap_err();
        assert!(matches!(err, StorageError::NotUtf8(_)));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
