//! # Switchyard
//!
//! Declarative routing and request dispatch.
//!
//! Controllers describe their routes with attributes: verb, path, argument
//! bindings, rate limit, token authentication and validation rules. That
//! metadata is compiled into a table of [`RouteRule`]s, either by the
//! `#[routes]` macro at build time or by [`RouteCompiler`] scanning sources
//! on disk, and can be persisted to a route cache file. At runtime a
//! [`WorkerRegistry`] holds the table, the controller singletons, the
//! middleware chain and the exception handlers, and a [`Dispatcher`] runs
//! each request through them.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use switchyard::prelude::*;
//!
//! #[derive(Injectable)]
//! pub struct UserService;
//!
//! #[controller(path = "/users")]
//! pub struct UserController {
//!     users: Arc<UserService>,
//! }
//!
//! #[routes]
//! impl UserController {
//!     #[get("/{id}")]
//!     pub fn show(&self, #[path_variable] id: i64) -> Json<serde_json::Value> {
//!         Json(serde_json::json!({ "id": id }))
//!     }
//!
//!     #[post]
//!     #[rate_limit(total = 10, duration = "1m", limit_by_ip = true)]
//!     #[validate(rules = ["name@Required", "age@IntGe:18@msg:must be adult"])]
//!     pub fn create(&self, #[map_bind("name, age:int")] data: Map<String, Value>) -> ApiResponse<Map<String, Value>> {
//!         ApiResponse::success(data)
//!     }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     let settings = Settings::from_config(&ConfigService::new());
//!     let listener = std::net::TcpListener::bind("0.0.0.0:8080")?;
//!     WorkerGroup::new(move || {
//!         let mut container = Container::new();
//!         container.register(UserService);
//!         WorkerRegistry::builder()
//!             .with_settings(settings.clone())
//!             .with_container(container)
//!             .with_controller::<UserController>()
//!     })
//!     .run(listener)
//! }
//! ```

extern crate self as switchyard;

pub mod binder;
pub mod cache;
pub mod common;
pub mod compiler;
pub mod config;
pub mod controller;
pub mod di;
pub mod dispatch;
pub mod error;
pub mod exception;
pub mod http;
pub mod io;
pub mod middleware;
pub mod ratelimit;
pub mod registry;
pub mod security;
pub mod server;
pub mod validation;
pub mod worker;

// Re-export core types
pub use common::ApiResponse;
pub use compiler::{CompileOutcome, RouteCache, RouteCompiler};
pub use config::{ConfigService, ExceptionMatch, Settings};
pub use di::{Container, Injectable};
pub use dispatch::Dispatcher;
pub use error::{DispatchError, Result, SwitchyardError};
pub use registry::{WorkerRegistry, WorkerRegistryBuilder};
pub use switchyard_meta::{
    ArgumentBinding, HandlerArg, HttpMethod, RateLimitPolicy, RouteRule, SanitizeMode, ScalarType,
    ValidationPolicy,
};
pub use worker::WorkerGroup;

// Re-export macros
pub use switchyard_macro::{
    Injectable as DeriveInjectable, controller, delete, extra, get, jwt_auth, patch, post, put,
    rate_limit, request_mapping, routes, validate,
};

pub use async_trait::async_trait;
pub use axum;

/// Prelude module for convenient imports
///
/// ```
/// use switchyard::prelude::*;
/// ```
pub mod prelude {
    pub use crate::common::ApiResponse;
    pub use crate::config::{ConfigService, ExceptionMatch, Settings};
    pub use crate::di::{Container, Injectable};
    pub use crate::dispatch::Dispatcher;
    pub use crate::error::{DispatchError, Result, SwitchyardError};
    pub use crate::exception::ExceptionHandler;
    pub use crate::http::{Html, Json, Payload, Request, Response, Token, UploadedFile, Xml};
    pub use crate::middleware::{Middleware, Phase};
    pub use crate::registry::{WorkerRegistry, WorkerRegistryBuilder};
    pub use crate::security::JwtSettings;
    pub use crate::validation::RuleChecker;
    pub use crate::worker::WorkerGroup;
    pub use crate::{
        DeriveInjectable as Injectable, controller, delete, extra, get, jwt_auth, patch, post,
        put, rate_limit, request_mapping, routes, validate,
    };
    pub use async_trait::async_trait;
    pub use serde_json::{Map, Value};
    pub use std::sync::Arc;
}
