//! Per-worker routing state.
//!
//! A [`WorkerRegistry`] is assembled once through [`WorkerRegistryBuilder`]
//! and then shared read-only behind an `Arc`. The only state that changes
//! while serving is the lazily filled controller singleton map.

mod matcher;

pub use matcher::PathMatcher;

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use switchyard_meta::RouteRule;
use tracing::{debug, info, warn};

use crate::compiler::RouteCache;
use crate::config::Settings;
use crate::controller::{Controller, ControllerDescriptor, ErasedHandler, Instance};
use crate::di::Container;
use crate::error::{DispatchError, Result, SwitchyardError};
use crate::exception::{ExceptionHandler, ExceptionHandlers};
use crate::middleware::{ExecuteTimeLog, JwtAuth, Middleware, MiddlewareChain, RateLimit, RequestLog, Validate};
use crate::ratelimit::{MemoryRateLimiter, RateLimiter};
use crate::security::{JwtRegistry, JwtSettings, JwtVerifier, TokenVerifier};
use crate::validation::{DataValidator, RuleChecker};

/// One route of the table with its compiled path matcher.
#[derive(Debug, Clone)]
pub struct CompiledRoute {
    pub rule: Arc<RouteRule>,
    pub matcher: PathMatcher,
}

/// Outcome of looking up a controller singleton.
#[derive(Clone)]
pub enum ControllerSlot {
    Ready(Instance),
    /// Construction failed; the reason is kept so every later request
    /// fails the same way without retrying.
    Unavailable(String),
}

/// A route resolved for one request.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub rule: Arc<RouteRule>,
    pub variables: HashMap<String, String>,
}

pub struct WorkerRegistry {
    worker_id: usize,
    settings: Settings,
    routes: Vec<CompiledRoute>,
    controllers: HashMap<&'static str, ControllerDescriptor>,
    controller_order: Vec<&'static str>,
    instances: DashMap<&'static str, ControllerSlot>,
    container: Container,
    middleware: MiddlewareChain,
    exception_handlers: ExceptionHandlers,
}

impl WorkerRegistry {
    pub fn builder() -> WorkerRegistryBuilder {
        WorkerRegistryBuilder::new()
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn route_table(&self) -> Vec<&RouteRule> {
        self.routes.iter().map(|r| r.rule.as_ref()).collect()
    }

    pub fn routes(&self) -> &[CompiledRoute] {
        &self.routes
    }

    pub fn middleware(&self) -> &MiddlewareChain {
        &self.middleware
    }

    pub fn exception_handlers(&self) -> &ExceptionHandlers {
        &self.exception_handlers
    }

    /// Finds the route for `method` and `path`, scanning in table order.
    ///
    /// The first rule whose pattern matches and whose verb accepts the
    /// request wins. Pattern matches that all reject the verb end in
    /// `MethodNotAllowed`.
    pub fn match_route(&self, method: &str, path: &str) -> std::result::Result<RouteMatch, DispatchError> {
        let mut allowed: Vec<&'static str> = Vec::new();

        for route in &self.routes {
            let Some(variables) = route.matcher.matches(path) else {
                continue;
            };
            if route.rule.http_method.accepts(method) {
                return Ok(RouteMatch {
                    rule: route.rule.clone(),
                    variables,
                });
            }
            for verb in route.rule.http_method.allowed_verbs() {
                if !allowed.contains(verb) {
                    allowed.push(verb);
                }
            }
        }

        if allowed.is_empty() {
            Err(DispatchError::NoRouteMatch {
                method: method.to_string(),
                path: path.to_string(),
            })
        } else {
            Err(DispatchError::MethodNotAllowed {
                method: method.to_string(),
                path: path.to_string(),
                allowed,
            })
        }
    }

    pub fn controller(&self, name: &str) -> Option<&ControllerDescriptor> {
        self.controllers.get(name)
    }

    /// The handler a rule points at.
    pub fn handler(&self, rule: &RouteRule) -> Option<&ErasedHandler> {
        self.controllers
            .get(rule.controller_name())
            .and_then(|c| c.handler(rule.method_name()))
    }

    /// The singleton for controller `name`, constructed on first use.
    ///
    /// Returns `None` when no such controller is registered.
    pub fn controller_instance(&self, name: &str) -> Option<ControllerSlot> {
        let (key, descriptor) = self.controllers.get_key_value(name)?;
        let slot = self
            .instances
            .entry(*key)
            .or_insert_with(|| match descriptor.construct(&self.container) {
                Ok(instance) => {
                    debug!(worker = self.worker_id, controller = %key, "Controller constructed");
                    ControllerSlot::Ready(instance)
                }
                Err(e) => {
                    warn!(
                        worker = self.worker_id,
                        controller = %key,
                        error = %e,
                        "Controller construction failed"
                    );
                    ControllerSlot::Unavailable(e.to_string())
                }
            })
            .clone();
        Some(slot)
    }

    /// Constructs every registered controller up front.
    pub fn warm_controllers(&self) -> usize {
        self.controller_order
            .iter()
            .filter_map(|name| self.controller_instance(name))
            .filter(|slot| matches!(slot, ControllerSlot::Ready(_)))
            .count()
    }

    /// Rules contributed by the registered controllers, in registration order.
    pub fn controller_rules(&self) -> Vec<RouteRule> {
        self.controller_order
            .iter()
            .filter_map(|name| self.controllers.get(name))
            .flat_map(|d| d.rules().iter().cloned())
            .collect()
    }
}

/// Collects everything a worker needs before it starts serving.
pub struct WorkerRegistryBuilder {
    worker_id: usize,
    settings: Settings,
    container: Container,
    controllers: Vec<ControllerDescriptor>,
    route_table: Option<Vec<RouteRule>>,
    middleware: MiddlewareChain,
    exception_handlers: Vec<Arc<dyn ExceptionHandler>>,
    jwt: JwtRegistry,
    rate_limiter: Option<Arc<dyn RateLimiter>>,
    token_verifier: Option<Arc<dyn TokenVerifier>>,
    validator: DataValidator,
}

impl Default for WorkerRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerRegistryBuilder {
    pub fn new() -> Self {
        Self {
            worker_id: 0,
            settings: Settings::default(),
            container: Container::new(),
            controllers: Vec::new(),
            route_table: None,
            middleware: MiddlewareChain::new(),
            exception_handlers: Vec::new(),
            jwt: JwtRegistry::new(),
            rate_limiter: None,
            token_verifier: None,
            validator: DataValidator::new(),
        }
    }

    pub fn with_worker_id(mut self, worker_id: usize) -> Self {
        self.worker_id = worker_id;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Services controllers are injected from.
    pub fn with_container(mut self, container: Container) -> Self {
        self.container = container;
        self
    }

    pub fn with_controller<C: Controller>(mut self) -> Self {
        let descriptor = ControllerDescriptor::of::<C>();
        for (method, reason) in descriptor.skipped() {
            warn!(controller = %descriptor.name(), method, reason, "Method skipped during route extraction");
        }
        self.controllers.push(descriptor);
        self
    }

    /// Uses `rules` as the route table instead of the controllers' own rules.
    pub fn with_route_table(mut self, rules: Vec<RouteRule>) -> Self {
        self.route_table = Some(rules);
        self
    }

    /// Loads the route table from a compiled cache file. A missing or
    /// unreadable file leaves the controllers' own rules in place.
    pub fn with_cached_routes(mut self, path: &Path) -> Self {
        let rules = RouteCache::load(path);
        if rules.is_empty() {
            debug!(path = %path.display(), "No cached routes, using controller rules");
        } else {
            self.route_table = Some(rules);
        }
        self
    }

    /// Adds a middleware. A later instance of the same type replaces an
    /// earlier one, built-ins included.
    ///
    /// Replacing the built-in [`Validate`] also replaces its validator:
    /// checkers added with [`with_rule_checker`](Self::with_rule_checker) no
    /// longer apply and must be registered on the replacement's own
    /// [`DataValidator`].
    pub fn with_middleware<M: Middleware>(mut self, middleware: M) -> Self {
        self.middleware.register(middleware);
        self
    }

    pub fn with_exception_handler<H: ExceptionHandler>(mut self, handler: H) -> Self {
        self.exception_handlers.push(Arc::new(handler));
        self
    }

    pub fn with_jwt_settings(mut self, settings: JwtSettings) -> Self {
        self.jwt.register(settings);
        self
    }

    pub fn with_rate_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Uses `limiter` unless one was already set. Without either, `build()`
    /// gives the registry a private in-memory limiter.
    pub fn with_default_rate_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.rate_limiter.get_or_insert(limiter);
        self
    }

    pub fn with_token_verifier(mut self, verifier: Arc<dyn TokenVerifier>) -> Self {
        self.token_verifier = Some(verifier);
        self
    }

    /// Registers a custom validator name for the built-in [`Validate`]
    /// middleware. Has no effect once `Validate` is replaced through
    /// [`with_middleware`](Self::with_middleware).
    pub fn with_rule_checker<R: RuleChecker>(mut self, checker: R) -> Self {
        self.validator.add_rule_checker(checker);
        self
    }

    /// Freezes the registry.
    ///
    /// Fails when two controllers share a name, a route pattern does not
    /// compile, or a rule names a handler no registered controller provides.
    pub fn build(self) -> Result<Arc<WorkerRegistry>> {
        let rules = match self.route_table {
            Some(rules) => rules,
            None => self
                .controllers
                .iter()
                .flat_map(|d| d.rules().iter().cloned())
                .collect(),
        };

        let mut controllers = HashMap::new();
        let mut controller_order = Vec::with_capacity(self.controllers.len());
        for descriptor in self.controllers {
            let name = descriptor.name();
            if controllers.insert(name, descriptor).is_some() {
                return Err(SwitchyardError::ControllerRegistrationFailed {
                    message: format!("controller name {name} registered twice"),
                });
            }
            controller_order.push(name);
        }

        let mut seen = HashSet::new();
        let mut routes = Vec::with_capacity(rules.len());
        for rule in rules {
            if !seen.insert((rule.handler_id.clone(), rule.http_method)) {
                warn!(handler = %rule.handler_id, "Duplicate route rule dropped");
                continue;
            }
            let has_handler = controllers
                .get(rule.controller_name())
                .is_some_and(|c| c.handler(rule.method_name()).is_some());
            if !controllers.is_empty() && !has_handler {
                return Err(SwitchyardError::ControllerRegistrationFailed {
                    message: format!("no handler registered for {}", rule.handler_id),
                });
            }
            let matcher = PathMatcher::compile(&rule.path_pattern).map_err(|e| {
                SwitchyardError::ControllerRegistrationFailed {
                    message: format!("invalid path pattern {}: {e}", rule.path_pattern),
                }
            })?;
            routes.push(CompiledRoute {
                rule: Arc::new(rule),
                matcher,
            });
        }

        let mut middleware = MiddlewareChain::new();
        if self.settings.request_log_enabled {
            middleware.register(RequestLog);
        }
        let verifier = self
            .token_verifier
            .unwrap_or_else(|| Arc::new(JwtVerifier::default()));
        middleware
            .register(JwtAuth::new(Arc::new(self.jwt)).with_verifier(verifier))
            .register(RateLimit::new(
                self.rate_limiter
                    .unwrap_or_else(|| Arc::new(MemoryRateLimiter::new())),
            ))
            .register(Validate::new(Arc::new(self.validator)));
        middleware.extend(self.middleware);
        if self.settings.execute_time_log_enabled && !middleware.contains::<ExecuteTimeLog>() {
            middleware.register(ExecuteTimeLog);
        }

        let mut exception_handlers = ExceptionHandlers::new(self.settings.exception_match);
        for handler in self.exception_handlers {
            exception_handlers.register_arc(handler);
        }

        info!(
            worker = self.worker_id,
            routes = routes.len(),
            controllers = controllers.len(),
            middleware = middleware.len(),
            "Worker registry ready"
        );

        Ok(Arc::new(WorkerRegistry {
            worker_id: self.worker_id,
            settings: self.settings,
            routes,
            controllers,
            controller_order,
            instances: DashMap::new(),
            container: self.container,
            middleware,
            exception_handlers,
        }))
    }
}
