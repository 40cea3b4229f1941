use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::{CacheResult, CacheStore, prefixed_key};
use crate::io::bounded_blocking;

#[derive(Debug, Serialize, Deserialize)]
struct FileEntry {
    /// Unix timestamp in milliseconds.
    #[serde(default)]
    expires_at: Option<i64>,
    value: Value,
}

/// One JSON file per key under a sharded directory tree.
///
/// Every file operation runs on the blocking pool and is bounded by the
/// store's i/o timeout.
#[derive(Debug, Clone)]
pub struct FileCache {
    root: PathBuf,
    prefix: String,
    io_timeout: Duration,
}

impl FileCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            prefix: String::new(),
            io_timeout: Duration::from_secs(1),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// `<root>/<h[0..2]>/<h[2..4]>/<h>.json` where `h` is the hex SHA-256 of the prefixed key.
    fn entry_path(&self, key: &str) -> CacheResult<PathBuf> {
        let key = prefixed_key(&self.prefix, key)?;
        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        Ok(self
            .root
            .join(&digest[0..2])
            .join(&digest[2..4])
            .join(format!("{digest}.json")))
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn read_entry(path: &Path) -> CacheResult<Option<Value>> {
    let contents = match fs::read(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let entry: FileEntry = match serde_json::from_slice(&contents) {
        Ok(entry) => entry,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Discarding malformed cache entry");
            let _ = fs::remove_file(path);
            return Ok(None);
        }
    };
    if entry.expires_at.is_some_and(|at| at <= now_millis()) {
        let _ = fs::remove_file(path);
        return Ok(None);
    }
    Ok(Some(entry.value))
}

fn write_entry(path: &Path, entry: &FileEntry) -> CacheResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec(entry)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[async_trait]
impl CacheStore for FileCache {
    async fn get(&self, key: &str) -> CacheResult<Option<Value>> {
        let path = self.entry_path(key)?;
        bounded_blocking(self.io_timeout, move || read_entry(&path)).await?
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> CacheResult<()> {
        let path = self.entry_path(key)?;
        let entry = FileEntry {
            expires_at: ttl.map(|ttl| now_millis() + ttl.as_millis() as i64),
            value,
        };
        bounded_blocking(self.io_timeout, move || write_entry(&path, &entry)).await?
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let path = self.entry_path(key)?;
        bounded_blocking(self.io_timeout, move || match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        })
        .await?
    }

    async fn clear(&self) -> CacheResult<()> {
        let root = self.root.clone();
        bounded_blocking(self.io_timeout, move || match fs::remove_dir_all(&root) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path()).with_prefix("sy:");
        cache.set("user:1", json!({"name": "ada"}), None).await.unwrap();

        let path = cache.entry_path("user:1").unwrap();
        assert!(path.starts_with(dir.path()));
        assert!(path.exists());

        assert_eq!(cache.get("user:1").await.unwrap(), Some(json!({"name": "ada"})));
        assert!(cache.delete("user:1").await.unwrap());
        assert_eq!(cache.get("user:1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_entries_are_removed() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        cache
            .set("k", json!(1), Some(Duration::from_millis(5)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(!cache.entry_path("k").unwrap().exists());
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("cache");
        let cache = FileCache::new(&root);
        cache.set("a", json!(1), None).await.unwrap();
        cache.clear().await.unwrap();
        assert!(!root.exists());
        assert_eq!(cache.get("a").await.unwrap(), None);
    }
}
