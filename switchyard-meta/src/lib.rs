//! # Switchyard Meta
//!
//! Route metadata shared by the `#[routes]` macro, the source-scanning route
//! compiler and the runtime dispatcher.
//!
//! A [`RouteRule`] is the unit of compiled routing metadata: one per routable
//! controller method, carrying the verb, the full path pattern, one argument
//! binding per handler parameter and the optional rate limit, authentication
//! and validation policies. Rules are plain serde data so they can be embedded
//! into generated code and persisted into the route cache.

pub mod directive;
pub mod duration;
pub mod error;
pub mod extract;
pub mod path;
pub mod rule;

pub use error::MetaError;
pub use extract::{
    ControllerDecl, Extraction, SkippedMethod, controller_decl, extract_controller, extract_method,
};
pub use path::join_mapping;
pub use rule::{
    ARG_NAME_PLACEHOLDER, ArgumentBinding, HandlerArg, HttpMethod, RateLimitPolicy, RouteRule,
    SanitizeMode, ScalarType, ValidationPolicy,
};
