//! Key/value cache stores offered to application code.
//!
//! Routing itself does not cache through these stores; the route table has
//! its own artifact (see [`RouteCache`](crate::compiler::RouteCache)).

mod file;
mod memory;
mod noop;

pub use file::FileCache;
pub use memory::MemoryCache;
pub use noop::NoopCache;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::io::IoJoinError;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("invalid cache key `{0}`")]
    InvalidKey(String),

    #[error("cache i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache entry is malformed: {0}")]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Join(#[from] IoJoinError),
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;

#[async_trait]
pub trait CacheStore: Send + Sync + 'static {
    async fn get(&self, key: &str) -> CacheResult<Option<Value>>;

    /// Stores `value`; `None` ttl keeps it until deleted.
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> CacheResult<()>;

    /// Returns whether an entry was removed.
    async fn delete(&self, key: &str) -> CacheResult<bool>;

    async fn clear(&self) -> CacheResult<()>;

    async fn has(&self, key: &str) -> CacheResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn get_or(&self, key: &str, default: Value) -> CacheResult<Value> {
        Ok(self.get(key).await?.unwrap_or(default))
    }

    async fn get_many(&self, keys: &[&str]) -> CacheResult<Vec<Option<Value>>> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push(self.get(key).await?);
        }
        Ok(values)
    }

    async fn set_many(&self, items: Vec<(String, Value)>, ttl: Option<Duration>) -> CacheResult<()> {
        for (key, value) in items {
            self.set(&key, value, ttl).await?;
        }
        Ok(())
    }

    async fn delete_many(&self, keys: &[&str]) -> CacheResult<usize> {
        let mut removed = 0;
        for key in keys {
            if self.delete(key).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Applies the store prefix, rejecting empty keys.
pub(crate) fn prefixed_key(prefix: &str, key: &str) -> CacheResult<String> {
    if key.trim().is_empty() {
        return Err(CacheError::InvalidKey(key.to_string()));
    }
    Ok(format!("{prefix}{key}"))
}
