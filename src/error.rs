use std::error::Error as StdError;

use indexmap::IndexMap;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SwitchyardError>;

/// Errors raised while wiring controllers and services together.
#[derive(Debug, Error)]
pub enum SwitchyardError {
    #[error("Dependency not found: {type_name}")]
    DependencyNotFound { type_name: String },

    #[error("Failed to downcast type: {type_name}")]
    DowncastFailed { type_name: String },

    #[error("Controller registration failed: {message}")]
    ControllerRegistrationFailed { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Every way a dispatch can end before a handler payload is produced.
///
/// Each variant maps to one exception-handler target through [`DispatchError::type_name`].
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no route matches {method} {path}")]
    NoRouteMatch { method: String, path: String },

    #[error("method {method} is not allowed for {path}")]
    MethodNotAllowed {
        method: String,
        path: String,
        allowed: Vec<&'static str>,
    },

    #[error(transparent)]
    Configuration(#[from] HandlerConfigurationError),

    #[error(transparent)]
    Authentication(#[from] AuthenticationError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    RateLimited(#[from] RateLimitExceeded),

    #[error(transparent)]
    Handler(#[from] HandlerError),
}

impl DispatchError {
    /// Stable name of the error type, used to select an exception handler.
    pub fn type_name(&self) -> &str {
        match self {
            DispatchError::NoRouteMatch { .. } => concat!(module_path!(), "::NoRouteMatch"),
            DispatchError::MethodNotAllowed { .. } => {
                concat!(module_path!(), "::MethodNotAllowed")
            }
            DispatchError::Configuration(_) => std::any::type_name::<HandlerConfigurationError>(),
            DispatchError::Authentication(_) => std::any::type_name::<AuthenticationError>(),
            DispatchError::Validation(_) => std::any::type_name::<ValidationError>(),
            DispatchError::RateLimited(_) => std::any::type_name::<RateLimitExceeded>(),
            DispatchError::Handler(err) => err.type_name(),
        }
    }

    /// Lifts an error raised by handler code, keeping framework errors intact.
    pub fn from_handler<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        let type_name = std::any::type_name::<E>();
        let boxed: Box<dyn StdError + Send + Sync> = Box::new(err);
        let boxed = match boxed.downcast::<DispatchError>() {
            Ok(err) => return *err,
            Err(other) => other,
        };
        let boxed = match boxed.downcast::<AuthenticationError>() {
            Ok(err) => return DispatchError::Authentication(*err),
            Err(other) => other,
        };
        match boxed.downcast::<ValidationError>() {
            Ok(err) => DispatchError::Validation(*err),
            Err(other) => DispatchError::Handler(HandlerError {
                type_name,
                source: other,
            }),
        }
    }
}

/// The route resolved but its handler cannot be invoked as declared.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HandlerConfigurationError {
    #[error("controller {controller} is not registered")]
    ControllerNotRegistered { controller: String },

    #[error("controller {controller} is unavailable: {reason}")]
    ControllerUnavailable { controller: String, reason: String },

    #[error("handler {handler} not found")]
    HandlerNotFound { handler: String },

    #[error("fail to inject arg{index} [{name}] for handler {handler}")]
    UnboundArgument {
        handler: String,
        index: usize,
        name: String,
    },

    #[error("unsupported type {type_hint} for arg{index} [{name}] of handler {handler}")]
    UnsupportedArgumentType {
        handler: String,
        index: usize,
        name: String,
        type_hint: String,
    },

    #[error("arg{index} of handler {handler} expects {expected}, bound value is {found}")]
    ArgumentMismatch {
        handler: String,
        index: usize,
        expected: &'static str,
        found: &'static str,
    },

    #[error("arg{index} of handler {handler} was not bound")]
    ArgumentMissing { handler: String, index: usize },
}

/// Token authentication failures, each carrying its public numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthenticationError {
    #[error("jwt not found")]
    Missing,

    #[error("jwt invalid")]
    Invalid,

    #[error("jwt expired")]
    Expired,
}

impl AuthenticationError {
    pub fn code(&self) -> u16 {
        match self {
            AuthenticationError::Missing => 1001,
            AuthenticationError::Invalid => 1002,
            AuthenticationError::Expired => 1003,
        }
    }
}

/// Request data failed its validation rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// First failing rule of a fail-fast run.
    #[error("{0}")]
    FailFast(String),

    /// First failure of every failing field, in rule order.
    #[error("{}", serde_json::to_string(.0).unwrap_or_default())]
    Fields(IndexMap<String, String>),
}

impl ValidationError {
    pub fn code(&self) -> u16 {
        match self {
            ValidationError::FailFast(_) => 1999,
            ValidationError::Fields(_) => 1006,
        }
    }
}

/// A fixed-window quota has been used up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("rate limit of {total} exceeded, retry after {retry_after}s")]
pub struct RateLimitExceeded {
    pub total: u32,
    pub remaining: u32,
    pub retry_after: u64,
}

/// An error returned by handler code.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct HandlerError {
    type_name: &'static str,
    #[source]
    source: Box<dyn StdError + Send + Sync>,
}

impl HandlerError {
    pub fn new<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            type_name: std::any::type_name::<E>(),
            source: Box::new(err),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn inner(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.source.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("order {0} not found")]
    struct OrderNotFound(u64);

    #[test]
    fn test_handler_error_records_raise_type() {
        let err = DispatchError::from_handler(OrderNotFound(7));
        assert!(err.type_name().ends_with("OrderNotFound"));
        assert_eq!(err.to_string(), "order 7 not found");
    }

    #[test]
    fn test_framework_errors_survive_handler_lift() {
        let err = DispatchError::from_handler(AuthenticationError::Expired);
        assert!(matches!(
            err,
            DispatchError::Authentication(AuthenticationError::Expired)
        ));

        let err = DispatchError::from_handler(DispatchError::from(ValidationError::FailFast(
            "name is required".into(),
        )));
        assert_eq!(err.type_name(), std::any::type_name::<ValidationError>());
    }

    #[test]
    fn test_codes() {
        assert_eq!(AuthenticationError::Missing.code(), 1001);
        assert_eq!(AuthenticationError::Invalid.code(), 1002);
        assert_eq!(AuthenticationError::Expired.code(), 1003);
        assert_eq!(ValidationError::FailFast(String::new()).code(), 1999);
        assert_eq!(ValidationError::Fields(IndexMap::new()).code(), 1006);
    }

    #[test]
    fn test_fields_display_as_json() {
        let mut fields = IndexMap::new();
        fields.insert("name".to_string(), "name is required".to_string());
        assert_eq!(
            ValidationError::Fields(fields).to_string(),
            r#"{"name":"name is required"}"#
        );
    }
}
