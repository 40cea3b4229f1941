use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use switchyard_meta::RouteRule;
use tracing::{debug, warn};

use super::CompileError;
use crate::io::{IoJoinError, bounded_blocking};

/// Version written into every artifact; anything else is treated as absent.
pub const CACHE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Artifact {
    version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    generated_at: Option<DateTime<Utc>>,
    rules: Vec<RouteRule>,
}

/// The route cache artifact: one JSON file holding the full rule list.
pub struct RouteCache;

impl RouteCache {
    /// Reads the rule list at `path`.
    ///
    /// A missing, unreadable or malformed file yields an empty list; a cache
    /// miss only means no routes are known yet.
    pub fn load(path: &Path) -> Vec<RouteRule> {
        let contents = match fs::read(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "Route cache absent");
                return Vec::new();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Route cache unreadable");
                return Vec::new();
            }
        };

        match serde_json::from_slice::<Artifact>(&contents) {
            Ok(artifact) if artifact.version == CACHE_FORMAT_VERSION => {
                debug!(path = %path.display(), rules = artifact.rules.len(), "Route cache loaded");
                artifact.rules
            }
            Ok(artifact) => {
                warn!(
                    path = %path.display(),
                    version = artifact.version,
                    expected = CACHE_FORMAT_VERSION,
                    "Route cache version mismatch"
                );
                Vec::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Route cache malformed");
                Vec::new()
            }
        }
    }

    /// [`load`](Self::load) on the blocking pool, waiting at most `timeout`.
    pub async fn load_bounded(path: &Path, timeout: Duration) -> Result<Vec<RouteRule>, IoJoinError> {
        let path = path.to_path_buf();
        bounded_blocking(timeout, move || Self::load(&path)).await
    }

    /// Writes `rules` to `path` so that readers see either the old file or
    /// the complete new one.
    ///
    /// Writers serialize on an exclusive lock of `<path>.lock`; the content
    /// goes to a temporary sibling which is synced and renamed over `path`.
    pub fn store(path: &Path, rules: &[RouteRule]) -> Result<(), CompileError> {
        let artifact = Artifact {
            version: CACHE_FORMAT_VERSION,
            generated_at: Some(Utc::now()),
            rules: rules.to_vec(),
        };
        let bytes = serde_json::to_vec_pretty(&artifact)?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| CompileError::io(&dir, e))?;

        let lock_path = sibling(path, "lock");
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| CompileError::io(&lock_path, e))?;
        lock.lock().map_err(|e| CompileError::io(&lock_path, e))?;

        let tmp_path = sibling(path, &format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        let written = write_synced(&tmp_path, &bytes)
            .and_then(|()| fs::rename(&tmp_path, path))
            .map_err(|e| CompileError::io(path, e));
        if written.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }

        if let Err(e) = lock.unlock() {
            warn!(path = %lock_path.display(), error = %e, "Failed to release route cache lock");
        }
        written
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// `routes.json` + `lock` -> `routes.json.lock`, in the same directory.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}
