use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::DispatchError;
use crate::http::{Request, Response};
use crate::middleware::{Middleware, Phase};

/// Logs every routed request before any other middleware runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLog;

#[async_trait]
impl Middleware for RequestLog {
    fn phase(&self) -> Phase {
        Phase::Pre
    }

    async fn handle(&self, request: &Request, _response: &mut Response) -> Result<(), DispatchError> {
        info!(
            request_id = %request.request_id(),
            "{} {} from {}",
            request.method(),
            request.request_url(true),
            request.client_ip()
        );
        if !request.body().is_empty() {
            debug!(request_id = %request.request_id(), body = %request.body_text(), "request body");
        }
        Ok(())
    }
}
