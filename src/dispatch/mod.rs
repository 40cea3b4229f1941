//! The request pipeline.
//!
//! `Matching -> PreMiddleware -> ArgumentBinding -> Invoking -> PostMiddleware -> Responding`.
//! Any step may fail; the error is then resolved through the registry's
//! exception handlers into the response payload.

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use serde_json::json;
use strum_macros::Display;
use tracing::{debug, error, trace};

use crate::binder::ArgumentBinder;
use crate::error::{DispatchError, HandlerConfigurationError};
use crate::http::{Payload, Request, Response};
use crate::registry::{ControllerSlot, WorkerRegistry, WorkerRegistryBuilder};

/// Where a dispatch currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DispatchState {
    Matching,
    PreMiddleware,
    ArgumentBinding,
    Invoking,
    PostMiddleware,
    Responding,
}

/// A dispatch that ended in `Error`, with the state it failed in.
#[derive(Debug)]
pub struct DispatchFailure {
    pub state: DispatchState,
    pub error: DispatchError,
}

/// Runs requests against one worker's registry.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<WorkerRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<WorkerRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<WorkerRegistry> {
        &self.registry
    }

    /// Handles a single request with a registry built just for it, reading
    /// the route table from the cache file named in the builder's settings.
    pub async fn one_shot(builder: WorkerRegistryBuilder, request: Request) -> Response {
        let cache = builder.settings().cache_file_path.clone();
        let builder = match cache {
            Some(path) => builder.with_cached_routes(&path),
            None => builder,
        };
        match builder.build() {
            Ok(registry) => Dispatcher::new(registry).dispatch(request).await,
            Err(e) => {
                error!(error = %e, "Failed to build registry for one-shot dispatch");
                let mut response = Response::new();
                response.set_payload(Payload::Status(StatusCode::INTERNAL_SERVER_ERROR.as_u16()));
                response
            }
        }
    }

    /// Runs the full pipeline and always produces a response.
    pub async fn dispatch(&self, request: Request) -> Response {
        let mut response = Response::new();

        if *request.method() == Method::OPTIONS {
            response.set_payload(Payload::Json(json!({"code": 200})));
            return response;
        }

        if let Err(failure) = self.run(request, &mut response).await {
            debug!(
                state = %failure.state,
                error_type = %failure.error.type_name(),
                "Dispatch failed"
            );
            self.registry
                .exception_handlers()
                .resolve(&failure.error, &mut response);
        }
        response
    }

    /// The pipeline proper; on success the payload is already in `response`.
    pub async fn run(&self, mut request: Request, response: &mut Response) -> Result<(), DispatchFailure> {
        let mut state = DispatchState::Matching;
        let fail = |state: DispatchState| move |error: DispatchError| DispatchFailure { state, error };

        let found = self
            .registry
            .match_route(request.method().as_str(), request.path())
            .map_err(fail(state))?;
        let rule = found.rule.clone();
        request.set_route(found.rule, found.variables);
        let request = Arc::new(request);

        state = self.advance(state, DispatchState::PreMiddleware, &rule.handler_id);
        self.registry
            .middleware()
            .run_pre(&request, response)
            .await
            .map_err(fail(state))?;

        state = self.advance(state, DispatchState::ArgumentBinding, &rule.handler_id);
        let args = ArgumentBinder::bind(&rule, &request).map_err(fail(state))?;

        state = self.advance(state, DispatchState::Invoking, &rule.handler_id);
        let controller = rule.controller_name();
        let handler = self.registry.handler(&rule).ok_or_else(|| {
            fail(state)(
                HandlerConfigurationError::HandlerNotFound {
                    handler: rule.handler_id.clone(),
                }
                .into(),
            )
        })?;
        let instance = match self.registry.controller_instance(controller) {
            Some(ControllerSlot::Ready(instance)) => instance,
            Some(ControllerSlot::Unavailable(reason)) => {
                return Err(fail(state)(
                    HandlerConfigurationError::ControllerUnavailable {
                        controller: controller.to_string(),
                        reason,
                    }
                    .into(),
                ));
            }
            None => {
                return Err(fail(state)(
                    HandlerConfigurationError::ControllerNotRegistered {
                        controller: controller.to_string(),
                    }
                    .into(),
                ));
            }
        };
        let payload = handler(instance, args).await.map_err(fail(state))?;
        response.set_payload(payload);

        state = self.advance(state, DispatchState::PostMiddleware, &rule.handler_id);
        self.registry
            .middleware()
            .run_post(&request, response)
            .await
            .map_err(fail(state))?;

        self.advance(state, DispatchState::Responding, &rule.handler_id);
        Ok(())
    }

    fn advance(&self, from: DispatchState, to: DispatchState, handler: &str) -> DispatchState {
        trace!(worker = self.registry.worker_id(), handler, %from, %to, "Dispatch state");
        to
    }
}
