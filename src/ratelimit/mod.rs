//! Fixed-window request quotas.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

/// State of a quota window after one acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitInfo {
    pub total: u32,
    /// Negative once the window is over quota.
    pub remaining: i64,
    pub retry_after: u64,
}

#[derive(Debug, Error)]
#[error("rate limiter backend unavailable: {0}")]
pub struct RateLimiterError(pub String);

/// Counter service behind `#[rate_limit]`.
#[async_trait]
pub trait RateLimiter: Send + Sync + 'static {
    /// Counts one hit against `id` and reports what is left in the window.
    async fn acquire(
        &self,
        id: &str,
        total: u32,
        window: Duration,
    ) -> Result<LimitInfo, RateLimiterError>;
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    length: Duration,
    hits: u32,
}

impl Window {
    fn fresh(now: Instant, length: Duration) -> Self {
        Self {
            started: now,
            length,
            hits: 0,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.started) >= self.length
    }
}

const DEFAULT_SWEEP_INTERVAL: u64 = 1024;

/// In-process fixed-window counter, one window per limiter id.
///
/// Every `sweep_interval` acquisitions the limiter drops windows that have
/// fully elapsed, so ids that stop calling do not accumulate.
#[derive(Debug)]
pub struct MemoryRateLimiter {
    windows: DashMap<String, Window>,
    acquisitions: AtomicU64,
    sweep_interval: u64,
}

impl Default for MemoryRateLimiter {
    fn default() -> Self {
        Self {
            windows: DashMap::new(),
            acquisitions: AtomicU64::new(0),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl MemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sweep_interval(mut self, acquisitions: u64) -> Self {
        self.sweep_interval = acquisitions.max(1);
        self
    }

    /// Drops windows that have fully elapsed.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.windows.retain(|_, w| !w.is_expired(now));
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[async_trait]
impl RateLimiter for MemoryRateLimiter {
    async fn acquire(
        &self,
        id: &str,
        total: u32,
        window: Duration,
    ) -> Result<LimitInfo, RateLimiterError> {
        // Must run before an entry guard is held.
        let seen = self.acquisitions.fetch_add(1, Ordering::Relaxed) + 1;
        if seen % self.sweep_interval == 0 {
            self.purge_expired();
        }

        let now = Instant::now();
        let mut entry = self
            .windows
            .entry(id.to_string())
            .or_insert_with(|| Window::fresh(now, window));
        if entry.length != window || entry.is_expired(now) {
            *entry = Window::fresh(now, window);
        }
        entry.hits = entry.hits.saturating_add(1);

        let elapsed = now.duration_since(entry.started);
        let retry_after = window.saturating_sub(elapsed).as_secs().max(1);
        Ok(LimitInfo {
            total,
            remaining: i64::from(total) - i64::from(entry.hits),
            retry_after,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_window_counts_down() {
        let limiter = MemoryRateLimiter::new();
        let window = Duration::from_secs(60);
        for expected in (0..10).rev() {
            let info = limiter.acquire("Users@list", 10, window).await.unwrap();
            assert_eq!(info.remaining, expected);
        }
        let info = limiter.acquire("Users@list", 10, window).await.unwrap();
        assert_eq!(info.remaining, -1);
        assert!(info.retry_after <= 60);

        let other = limiter.acquire("Users@show", 10, window).await.unwrap();
        assert_eq!(other.remaining, 9);
    }

    #[tokio::test]
    async fn test_window_resets() {
        let limiter = MemoryRateLimiter::new();
        let window = Duration::from_millis(20);
        limiter.acquire("id", 1, window).await.unwrap();
        assert_eq!(limiter.acquire("id", 1, window).await.unwrap().remaining, -1);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(limiter.acquire("id", 1, window).await.unwrap().remaining, 0);

        tokio::time::sleep(Duration::from_millis(30)).await;
        limiter.purge_expired();
        assert!(limiter.is_empty());
    }

    #[tokio::test]
    async fn test_idle_windows_are_swept_during_acquire() {
        let limiter = MemoryRateLimiter::new().with_sweep_interval(2);
        let short = Duration::from_millis(20);
        limiter.acquire("10.0.0.1", 5, short).await.unwrap();
        limiter.acquire("10.0.0.2", 5, Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        limiter.acquire("10.0.0.3", 5, short).await.unwrap();
        assert_eq!(limiter.len(), 3);
        limiter.acquire("10.0.0.3", 5, short).await.unwrap();
        assert_eq!(limiter.len(), 2);
        assert!(!limiter.windows.contains_key("10.0.0.1"));
        assert!(limiter.windows.contains_key("10.0.0.2"));
    }
}
