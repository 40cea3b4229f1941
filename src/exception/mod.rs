//! Conversion of dispatch errors into response payloads.

use std::error::Error as StdError;
use std::sync::Arc;

use axum::http::StatusCode;
use tracing::error;

use crate::common::ApiResponse;
use crate::config::ExceptionMatch;
use crate::error::{AuthenticationError, DispatchError, ValidationError};
use crate::http::{IntoPayload, Payload, Response};

/// Turns one error type into a payload.
///
/// Returning `None` means the handler declined; the dispatch then ends with
/// an internal error.
pub trait ExceptionHandler: Send + Sync + 'static {
    /// Type name of the error this handler claims, as reported by
    /// [`DispatchError::type_name`].
    fn target_type_name(&self) -> &str;

    fn handle(&self, err: &DispatchError) -> Option<Payload>;
}

/// Maps token failures to `{"code": 1001|1002|1003, "msg": ..}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthenticationHandler;

impl ExceptionHandler for AuthenticationHandler {
    fn target_type_name(&self) -> &str {
        std::any::type_name::<AuthenticationError>()
    }

    fn handle(&self, err: &DispatchError) -> Option<Payload> {
        let DispatchError::Authentication(auth) = err else {
            return None;
        };
        ApiResponse::error(i64::from(auth.code()), auth.to_string())
            .into_payload()
            .ok()
    }
}

/// Maps validation failures to `{"code": 1999|1006, "msg": ..}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationHandler;

impl ExceptionHandler for ValidationHandler {
    fn target_type_name(&self) -> &str {
        std::any::type_name::<ValidationError>()
    }

    fn handle(&self, err: &DispatchError) -> Option<Payload> {
        let DispatchError::Validation(validation) = err else {
            return None;
        };
        ApiResponse::error(i64::from(validation.code()), validation.to_string())
            .into_payload()
            .ok()
    }
}

/// The registered exception handlers, built-ins included.
#[derive(Clone)]
pub struct ExceptionHandlers {
    handlers: Vec<Arc<dyn ExceptionHandler>>,
    matching: ExceptionMatch,
}

impl Default for ExceptionHandlers {
    fn default() -> Self {
        Self::new(ExceptionMatch::default())
    }
}

impl ExceptionHandlers {
    pub fn new(matching: ExceptionMatch) -> Self {
        let mut handlers = Self {
            handlers: Vec::new(),
            matching,
        };
        handlers.register(AuthenticationHandler).register(ValidationHandler);
        handlers
    }

    /// Adds a handler. One registered earlier for the same target is
    /// replaced in place, built-ins included.
    pub fn register<H: ExceptionHandler>(&mut self, handler: H) -> &mut Self {
        self.register_arc(Arc::new(handler))
    }

    pub fn register_arc(&mut self, handler: Arc<dyn ExceptionHandler>) -> &mut Self {
        match self
            .handlers
            .iter_mut()
            .find(|h| h.target_type_name() == handler.target_type_name())
        {
            Some(slot) => *slot = handler,
            None => self.handlers.push(handler),
        }
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// First handler whose target matches `type_name`.
    pub fn find(&self, type_name: &str) -> Option<&Arc<dyn ExceptionHandler>> {
        self.handlers.iter().find(|h| match self.matching {
            ExceptionMatch::Exact => h.target_type_name() == type_name,
            ExceptionMatch::Substring => h.target_type_name().contains(type_name),
        })
    }

    /// Writes the outcome of a failed dispatch into `response`.
    pub fn resolve(&self, err: &DispatchError, response: &mut Response) {
        if let DispatchError::RateLimited(limit) = err {
            response.add_header("X-Ratelimit-Limit", limit.total.to_string());
            response.add_header("X-Ratelimit-Remaining", limit.remaining.to_string());
            response.add_header("Retry-After", limit.retry_after.to_string());
        }
        if let DispatchError::MethodNotAllowed { allowed, .. } = err {
            response.add_header("Allow", allowed.join(", "));
        }

        if let Some(handler) = self.find(err.type_name()) {
            match handler.handle(err) {
                Some(payload) => response.set_payload(payload),
                None => {
                    error!(
                        error_type = %err.type_name(),
                        handler = %handler.target_type_name(),
                        "exception handler returned no payload"
                    );
                    response.set_payload(internal_error());
                }
            }
            return;
        }

        let payload = match err {
            DispatchError::NoRouteMatch { .. } => Payload::Status(StatusCode::NOT_FOUND.as_u16()),
            DispatchError::MethodNotAllowed { .. } => {
                Payload::Status(StatusCode::METHOD_NOT_ALLOWED.as_u16())
            }
            DispatchError::RateLimited(_) => {
                Payload::Status(StatusCode::TOO_MANY_REQUESTS.as_u16())
            }
            other => {
                error!(
                    error_type = %other.type_name(),
                    error = %error_chain(other),
                    "unhandled dispatch error"
                );
                internal_error()
            }
        };
        response.set_payload(payload);
    }
}

fn internal_error() -> Payload {
    Payload::Status(StatusCode::INTERNAL_SERVER_ERROR.as_u16())
}

/// The error followed by every `source()` below it, joined with `: `.
fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut chain = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push_str(": ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    chain
}
