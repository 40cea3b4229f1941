use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::{Body, to_bytes};
use axum::extract::{ConnectInfo, FromRequest, Multipart};
use axum::http::{self, HeaderName, HeaderValue, StatusCode, header};
use axum::response::IntoResponse;
use tower::Service;
use tracing::{debug, warn};

use crate::dispatch::Dispatcher;
use crate::http::{Payload, Request, Response, UploadedFile};

/// Largest request body read into memory.
pub const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

pub const POWERED_BY_HEADER: &str = "X-Powered-By";

/// Tower service handing every request to a [`Dispatcher`].
#[derive(Clone)]
pub struct DispatchService {
    dispatcher: Dispatcher,
    powered_by: Arc<str>,
}

impl DispatchService {
    pub fn new(dispatcher: Dispatcher) -> Self {
        let powered_by = Arc::from(dispatcher.registry().settings().powered_by.as_str());
        Self {
            dispatcher,
            powered_by,
        }
    }
}

impl Service<http::Request<Body>> for DispatchService {
    type Response = axum::response::Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<Body>) -> Self::Future {
        let dispatcher = self.dispatcher.clone();
        let powered_by = self.powered_by.clone();

        Box::pin(async move {
            let request = match into_request(req).await {
                Ok(request) => request,
                Err(status) => return Ok(status.into_response()),
            };
            let response = dispatcher.dispatch(request).await;
            Ok(into_http_response(response, &powered_by))
        })
    }
}

/// Reads an axum request into the dispatcher's request model.
pub async fn into_request(req: http::Request<Body>) -> Result<Request, StatusCode> {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let mut builder = Request::builder()
        .method(req.method().as_str())
        .uri(
            req.uri()
                .path_and_query()
                .map_or("/", |pq| pq.as_str()),
        )
        .headers(req.headers().clone());
    if let Some(peer) = peer {
        builder = builder.peer_addr(peer);
    }

    let is_multipart = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("multipart/form-data"));

    if !is_multipart {
        let body = to_bytes(req.into_body(), MAX_BODY_BYTES).await.map_err(|e| {
            warn!(error = %e, "Failed to read request body");
            StatusCode::PAYLOAD_TOO_LARGE
        })?;
        return Ok(builder.body(body).build());
    }

    let mut multipart = Multipart::from_request(req, &()).await.map_err(|e| {
        warn!(error = %e, "Malformed multipart request");
        StatusCode::BAD_REQUEST
    })?;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Malformed multipart field");
                return Err(StatusCode::BAD_REQUEST);
            }
        };
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().map(str::to_string);
        let media_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(|e| {
            warn!(field = %name, error = %e, "Failed to read multipart field");
            StatusCode::BAD_REQUEST
        })?;

        builder = match filename {
            Some(filename) => {
                let mut file = UploadedFile::new(name, data).with_filename(filename);
                if let Some(media_type) = media_type {
                    file = file.with_media_type(media_type);
                }
                builder.file(file)
            }
            None => builder.form_field(&name, &String::from_utf8_lossy(&data)),
        };
    }
    Ok(builder.build())
}

/// Writes a dispatch response out as an axum response.
pub fn into_http_response(mut response: Response, powered_by: &str) -> axum::response::Response {
    let status = response.status();
    let payload = response.take_payload();
    let content_type = payload
        .as_ref()
        .and_then(|p| p.content_type())
        .and_then(|ct| HeaderValue::from_str(ct).ok());
    let disposition = payload
        .as_ref()
        .and_then(Payload::content_disposition)
        .and_then(|cd| HeaderValue::from_str(&cd).ok());
    let body = payload.map(Payload::into_body).unwrap_or_default();

    let mut out = (status, body).into_response();
    let headers = out.headers_mut();
    match content_type {
        Some(content_type) => {
            headers.insert(header::CONTENT_TYPE, content_type);
        }
        None => {
            headers.remove(header::CONTENT_TYPE);
        }
    }
    if let Some(disposition) = disposition {
        headers.insert(header::CONTENT_DISPOSITION, disposition);
    }
    for (name, value) in response.headers() {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => debug!(header = %name, "Dropping malformed response header"),
        }
    }
    if let Ok(value) = HeaderValue::from_str(powered_by) {
        headers.insert(HeaderName::from_static("x-powered-by"), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_headers_are_written() {
        let mut response = Response::new();
        response.set_payload(Payload::Json(json!({"ok": true})));
        response.add_header("X-Response-Time", "3ms");

        let out = into_http_response(response, "switchyard");
        assert_eq!(out.status(), StatusCode::OK);
        assert_eq!(out.headers()[header::CONTENT_TYPE], "application/json; charset=utf-8");
        assert_eq!(out.headers()["x-response-time"], "3ms");
        assert_eq!(out.headers()[POWERED_BY_HEADER], "switchyard");
    }

    #[test]
    fn test_status_payload_has_no_content_type() {
        let mut response = Response::new();
        response.set_payload(Payload::Status(404));
        let out = into_http_response(response, "switchyard");
        assert_eq!(out.status(), StatusCode::NOT_FOUND);
        assert!(out.headers().get(header::CONTENT_TYPE).is_none());
    }

    #[tokio::test]
    async fn test_into_request_reads_form_body() {
        let req = http::Request::builder()
            .method("POST")
            .uri("/users?page=2")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("name=ada&age=36"))
            .unwrap();

        let request = into_request(req).await.unwrap();
        assert_eq!(request.path(), "/users");
        assert_eq!(request.query("page"), Some("2"));
        assert_eq!(request.form("name"), Some("ada"));
    }

    #[tokio::test]
    async fn test_into_request_reads_multipart() {
        let boundary = "XBOUNDARY";
        let body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"title\"\r\n\r\n\
             report\r\n\
             --{boundary}\r\n\
             Content-Disposition: form-data; name=\"doc\"; filename=\"a.txt\"\r\n\
             Content-Type: text/plain\r\n\r\n\
             hello\r\n\
             --{boundary}--\r\n"
        );
        let req = http::Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();

        let request = into_request(req).await.unwrap();
        assert_eq!(request.form("title"), Some("report"));
        let file = request.uploaded_file("doc").unwrap();
        assert_eq!(file.client_filename.as_deref(), Some("a.txt"));
        assert_eq!(&file.data[..], b"hello");
    }
}
