use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::error::DispatchError;
use crate::http::{Request, Response};
use crate::middleware::{Middleware, Phase};

pub const RESPONSE_TIME_HEADER: &str = "X-Response-Time";

/// Records how long the request took and exposes it as a response header.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecuteTimeLog;

#[async_trait]
impl Middleware for ExecuteTimeLog {
    fn phase(&self) -> Phase {
        Phase::Post
    }

    fn order(&self) -> u8 {
        u8::MAX
    }

    async fn handle(&self, request: &Request, response: &mut Response) -> Result<(), DispatchError> {
        let elapsed = format_elapsed(request.elapsed());
        let handler = request.route().map(|r| r.handler_id.as_str()).unwrap_or("-");
        info!(handler = %handler, elapsed = %elapsed, "{} {}", request.method(), request.path());
        response.add_header(RESPONSE_TIME_HEADER, elapsed);
        Ok(())
    }
}

/// `"{n}ms"` under one second with a 1ms floor, `"{x}s"` otherwise.
fn format_elapsed(elapsed: Duration) -> String {
    let millis = elapsed.as_millis();
    if millis < 1000 {
        return format!("{}ms", millis.max(1));
    }
    let secs = format!("{:.3}", elapsed.as_secs_f64());
    let secs = secs.trim_end_matches('0').trim_end_matches('.');
    format!("{secs}s")
}
