//! axum adapter: every request goes through one fallback service that
//! converts it, dispatches it and writes the result back.

mod service;
mod shutdown;

pub use service::{DispatchService, MAX_BODY_BYTES, POWERED_BY_HEADER, into_http_response, into_request};
pub use shutdown::shutdown_signal;

use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tracing::info;

use crate::dispatch::Dispatcher;

/// Router serving every path through `dispatcher`.
///
/// Responses are gzip-compressed when the registry's settings enable it.
pub fn router(dispatcher: Dispatcher) -> Router {
    let gzip = dispatcher.registry().settings().gzip_output_enabled;
    let router = Router::new().fallback_service(DispatchService::new(dispatcher));
    if gzip {
        router.layer(CompressionLayer::new().gzip(true))
    } else {
        router
    }
}

/// Serves `dispatcher` on `listener` until `shutdown` completes.
pub async fn serve<F>(listener: TcpListener, dispatcher: Dispatcher, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let worker = dispatcher.registry().worker_id();
    info!(worker, address = ?listener.local_addr().ok(), "HTTP server starting");

    let app = router(dispatcher).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

    info!(worker, "HTTP server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Json;
    use crate::registry::WorkerRegistry;
    use crate::{controller as controller_attr, routes};
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    #[controller_attr(path = "/ping")]
    pub struct PingController;

    #[routes]
    impl PingController {
        #[get]
        pub fn ping(#[request_param(default = "pong")] reply: String) -> Json<Value> {
            Json(json!({"reply": reply}))
        }

        #[get("/ip")]
        pub fn ip(#[client_ip] ip: String) -> String {
            ip
        }
    }

    fn app(gzip: bool) -> Router {
        let settings = crate::config::Settings::default().with_gzip_output(gzip);
        let registry = WorkerRegistry::builder()
            .with_settings(settings)
            .with_controller::<PingController>()
            .build()
            .unwrap();
        router(Dispatcher::new(registry))
    }

    #[tokio::test]
    async fn test_router_dispatches() {
        let response = app(false)
            .oneshot(Request::builder().uri("/ping?reply=hi").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[POWERED_BY_HEADER], "switchyard");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, json!({"reply": "hi"}));
    }

    #[tokio::test]
    async fn test_router_not_found() {
        let response = app(false)
            .oneshot(Request::builder().uri("/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_forwarded_client_ip() {
        let response = app(false)
            .oneshot(
                Request::builder()
                    .uri("/ping/ip")
                    .header("X-Forwarded-For", "203.0.113.9, 10.0.0.1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"203.0.113.9");
    }

    #[tokio::test]
    async fn test_gzip_when_enabled() {
        let response = app(true)
            .oneshot(
                Request::builder()
                    .uri(&format!("/ping?reply={}", "a".repeat(256)))
                    .header(header::ACCEPT_ENCODING, "gzip")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()[header::CONTENT_ENCODING], "gzip");
    }
}
