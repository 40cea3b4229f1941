use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::error::{DispatchError, RateLimitExceeded};
use crate::http::{Request, Response};
use crate::middleware::{Middleware, Phase};
use crate::ratelimit::RateLimiter;

/// Enforces a route's `#[rate_limit]` quota.
///
/// The counter is keyed by handler id, and additionally by client address
/// when the policy limits per IP. An unreachable counter backend lets the
/// request through.
#[derive(Clone)]
pub struct RateLimit {
    limiter: Arc<dyn RateLimiter>,
}

impl RateLimit {
    pub fn new(limiter: Arc<dyn RateLimiter>) -> Self {
        Self { limiter }
    }
}

#[async_trait]
impl Middleware for RateLimit {
    fn phase(&self) -> Phase {
        Phase::Pre
    }

    async fn handle(&self, request: &Request, _response: &mut Response) -> Result<(), DispatchError> {
        let Some(route) = request.route() else {
            return Ok(());
        };
        let Some(policy) = route.rate_limit_policy.filter(|p| p.is_effective()) else {
            return Ok(());
        };

        let id = if policy.limit_by_client_ip {
            format!("{}@{}", route.handler_id, request.client_ip())
        } else {
            route.handler_id.clone()
        };
        let window = Duration::from_secs(policy.window_seconds);

        let info = match self.limiter.acquire(&id, policy.total, window).await {
            Ok(info) => info,
            Err(err) => {
                warn!(limiter = %id, error = %err, "rate limiter failed, request allowed");
                return Ok(());
            }
        };
        if info.remaining < 0 {
            return Err(RateLimitExceeded {
                total: info.total,
                remaining: 0,
                retry_after: info.retry_after,
            }
            .into());
        }
        Ok(())
    }
}
