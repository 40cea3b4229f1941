// Controller functionality is primarily provided through macros:
// - #[controller(path = "...")] declares the controller and derives its DI construction
// - #[routes] compiles the verb, policy and parameter directives of an impl block
//
// The macros generate:
// 1. Injectable and ControllerInfo implementations
// 2. A Controller implementation carrying the route rules and typed handler glue

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use switchyard_meta::RouteRule;

use crate::binder::Arguments;
use crate::di::{Container, Injectable};
use crate::error::{DispatchError, HandlerConfigurationError, Result};
use crate::http::Payload;

pub type HandlerFuture = Pin<Box<dyn Future<Output = std::result::Result<Payload, DispatchError>> + Send>>;

/// Identity of a controller, implemented by `#[controller]`.
pub trait ControllerInfo {
    const NAME: &'static str;
    const BASE_PATH: &'static str;
}

/// A controller whose routes have been compiled by `#[routes]`.
pub trait Controller: ControllerInfo + Injectable {
    /// Route rules with the controller prefix applied.
    fn route_rules() -> Vec<RouteRule>;

    /// One entry per routed method.
    fn handlers() -> Vec<HandlerEntry<Self>>;

    /// Methods that carried a verb directive but were left unrouted, with the reason.
    fn skipped_methods() -> Vec<(&'static str, &'static str)> {
        Vec::new()
    }
}

/// A routed method of `C`, captured as a plain function pointer.
pub struct HandlerEntry<C> {
    pub method: &'static str,
    pub call: fn(Arc<C>, Arguments) -> HandlerFuture,
}

impl<C> HandlerEntry<C> {
    pub fn new(method: &'static str, call: fn(Arc<C>, Arguments) -> HandlerFuture) -> Self {
        Self { method, call }
    }
}

/// A constructed controller with its type erased.
pub type Instance = Arc<dyn Any + Send + Sync>;
type Factory = Arc<dyn Fn(&Container) -> Result<Instance> + Send + Sync>;

/// A handler with the controller type erased.
pub type ErasedHandler = Arc<dyn Fn(Instance, Arguments) -> HandlerFuture + Send + Sync>;

/// Everything the registry needs to know about one controller type.
#[derive(Clone)]
pub struct ControllerDescriptor {
    name: &'static str,
    type_name: &'static str,
    rules: Vec<RouteRule>,
    skipped: Vec<(&'static str, &'static str)>,
    factory: Factory,
    handlers: HashMap<&'static str, ErasedHandler>,
}

impl ControllerDescriptor {
    pub fn of<C: Controller>() -> Self {
        let handlers = C::handlers()
            .into_iter()
            .map(|entry| {
                let call = entry.call;
                let handler: ErasedHandler = Arc::new(move |instance: Instance, args: Arguments| {
                    match instance.downcast::<C>() {
                        Ok(controller) => call(controller, args),
                        Err(_) => {
                            let handler = args.handler_id().to_string();
                            Box::pin(async move {
                                Err(HandlerConfigurationError::HandlerNotFound { handler }.into())
                            })
                        }
                    }
                });
                (entry.method, handler)
            })
            .collect();

        Self {
            name: C::NAME,
            type_name: std::any::type_name::<C>(),
            rules: C::route_rules(),
            skipped: C::skipped_methods(),
            factory: Arc::new(|container: &Container| {
                C::inject(container).map(|c| Arc::new(c) as Instance)
            }),
            handlers,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    pub fn skipped(&self) -> &[(&'static str, &'static str)] {
        &self.skipped
    }

    pub fn handler(&self, method: &str) -> Option<&ErasedHandler> {
        self.handlers.get(method)
    }

    pub fn construct(&self, container: &Container) -> Result<Instance> {
        (self.factory)(container)
    }
}

impl fmt::Debug for ControllerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerDescriptor")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("rules", &self.rules.len())
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// Decodes rules embedded by `#[routes]` and moves them under the controller
/// name and prefix. Undecodable input yields no rules.
pub fn decode_rules(json: &str, controller: &str, base_path: &str) -> Vec<RouteRule> {
    match serde_json::from_str::<Vec<RouteRule>>(json) {
        Ok(rules) => rules
            .into_iter()
            .map(|rule| rule.rebase(controller, base_path))
            .collect(),
        Err(e) => {
            tracing::warn!(controller, error = %e, "Failed to decode embedded route rules");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Json;
    use crate::{controller as controller_attr, routes};
    use serde_json::json;

    #[controller_attr(path = "/ping", name = "Ping")]
    pub struct PingController;

    #[routes]
    impl PingController {
        #[get]
        pub async fn ping(&self) -> Json<serde_json::Value> {
            Json(json!({"pong": true}))
        }

        #[get("/{n}")]
        pub fn echo(#[path_variable] n: i64) -> String {
            n.to_string()
        }
    }

    #[test]
    fn test_descriptor_collects_rules_and_handlers() {
        let descriptor = ControllerDescriptor::of::<PingController>();
        assert_eq!(descriptor.name(), "Ping");
        let ids: Vec<_> = descriptor.rules().iter().map(|r| r.handler_id.as_str()).collect();
        assert_eq!(ids, vec!["Ping@ping", "Ping@echo"]);
        assert_eq!(descriptor.rules()[1].path_pattern, "/ping/{n}");
        assert!(descriptor.handler("ping").is_some());
        assert!(descriptor.handler("echo").is_some());
        assert!(descriptor.handler("missing").is_none());
    }

    #[tokio::test]
    async fn test_erased_handler_invokes_method() {
        let descriptor = ControllerDescriptor::of::<PingController>();
        let instance = descriptor.construct(&Container::new()).unwrap();
        let handler = descriptor.handler("echo").unwrap();
        let payload = handler(
            instance,
            Arguments::new("Ping@echo", vec![crate::binder::ArgValue::Int(5)]),
        )
        .await
        .unwrap();
        assert_eq!(payload, Payload::Text("5".into()));
    }

    #[test]
    fn test_decode_rules_bad_input() {
        assert!(decode_rules("not json", "X", "/").is_empty());
    }
}
