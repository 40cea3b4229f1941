//! Ordered pre/post middleware around handler invocation.

mod execute_time;
mod jwt_auth;
mod rate_limit;
mod request_log;
mod validate;

pub use execute_time::ExecuteTimeLog;
pub use jwt_auth::JwtAuth;
pub use rate_limit::RateLimit;
pub use request_log::RequestLog;
pub use validate::Validate;

use std::any::TypeId;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::DispatchError;
use crate::http::{Request, Response};

/// When a middleware runs relative to the handler call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Pre,
    Post,
}

/// A step run before or after the handler.
///
/// # Example
/// ```ignore
/// struct Cors;
///
/// #[async_trait]
/// impl Middleware for Cors {
///     fn phase(&self) -> Phase {
///         Phase::Post
///     }
///
///     async fn handle(&self, _req: &Request, res: &mut Response) -> Result<(), DispatchError> {
///         res.add_header("Access-Control-Allow-Origin", "*");
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    fn phase(&self) -> Phase;

    /// Position within the phase, 1 to 255. Lower runs first.
    fn order(&self) -> u8 {
        1
    }

    async fn handle(&self, request: &Request, response: &mut Response) -> Result<(), DispatchError>;
}

#[derive(Clone)]
struct Entry {
    type_id: TypeId,
    instance: Arc<dyn Middleware>,
}

/// Registered middleware, kept in registration order.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    entries: Vec<Entry>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a middleware. A second instance of the same type takes the
    /// place of the first.
    pub fn register<M: Middleware>(&mut self, middleware: M) -> &mut Self {
        self.insert(Entry {
            type_id: TypeId::of::<M>(),
            instance: Arc::new(middleware),
        });
        self
    }

    fn insert(&mut self, entry: Entry) {
        match self.entries.iter_mut().find(|e| e.type_id == entry.type_id) {
            Some(slot) => *slot = entry,
            None => self.entries.push(entry),
        }
    }

    /// Registers every entry of `other`, in its order, with the same
    /// replacement rule as [`register`](Self::register).
    pub fn extend(&mut self, other: MiddlewareChain) -> &mut Self {
        for entry in other.entries {
            self.insert(entry);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains<M: Middleware>(&self) -> bool {
        self.entries.iter().any(|e| e.type_id == TypeId::of::<M>())
    }

    /// Middleware of one phase in execution order. Equal orders keep their
    /// registration order.
    pub fn ordered(&self, phase: Phase) -> Vec<Arc<dyn Middleware>> {
        let mut selected: Vec<&Entry> = self
            .entries
            .iter()
            .filter(|e| e.instance.phase() == phase)
            .collect();
        selected.sort_by_key(|e| e.instance.order().max(1));
        selected.into_iter().map(|e| e.instance.clone()).collect()
    }

    pub async fn run_pre(&self, request: &Request, response: &mut Response) -> Result<(), DispatchError> {
        self.run(Phase::Pre, request, response).await
    }

    pub async fn run_post(&self, request: &Request, response: &mut Response) -> Result<(), DispatchError> {
        self.run(Phase::Post, request, response).await
    }

    async fn run(&self, phase: Phase, request: &Request, response: &mut Response) -> Result<(), DispatchError> {
        for middleware in self.ordered(phase) {
            middleware.handle(request, response).await?;
        }
        Ok(())
    }
}
