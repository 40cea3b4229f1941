use thiserror::Error;

/// Errors raised while reading routing directives from a controller method.
///
/// An extraction error never aborts the controller as a whole: the offending
/// method is reported as skipped and the remaining methods are still routed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetaError {
    #[error("malformed directive #[{directive}]: {message}")]
    MalformedDirective { directive: String, message: String },

    #[error("parameter `{param}` carries more than one binding directive")]
    ConflictingBindings { param: String },

    #[error("invalid duration `{0}`")]
    InvalidDuration(String),

    #[error("unsupported parameter pattern at position {0}")]
    UnsupportedPattern(usize),
}

impl MetaError {
    pub(crate) fn malformed(directive: &str, err: impl std::fmt::Display) -> Self {
        MetaError::MalformedDirective {
            directive: directive.to_string(),
            message: err.to_string(),
        }
    }
}
