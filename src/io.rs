//! Bounded joins for blocking file work.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoJoinError {
    #[error("blocking i/o did not finish within {0:?}")]
    TimedOut(Duration),

    #[error("blocking i/o task failed: {0}")]
    Join(String),
}

/// Runs `f` on the blocking pool and waits at most `timeout` for it.
///
/// On timeout the task keeps running to completion in the background; only
/// the wait is abandoned.
pub async fn bounded_blocking<F, T>(timeout: Duration, f: F) -> Result<T, IoJoinError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(f)).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(join)) => Err(IoJoinError::Join(join.to_string())),
        Err(_) => Err(IoJoinError::TimedOut(timeout)),
    }
}
