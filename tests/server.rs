use serde_json::json;
use switchyard::axum::body::{Body, to_bytes};
use switchyard::axum::http::{self, StatusCode, header};
use switchyard::prelude::*;
use switchyard::server::{POWERED_BY_HEADER, router};
use tower::ServiceExt;

#[controller(path = "/files")]
pub struct FileController;

#[routes]
impl FileController {
    #[post]
    pub fn upload(
        &self,
        #[request_param] title: String,
        #[uploaded_file("doc")] doc: Option<UploadedFile>,
    ) -> Json<Value> {
        match doc {
            Some(file) => Json(json!({
                "title": title,
                "filename": file.client_filename,
                "size": file.data.len(),
            })),
            None => Json(json!({"title": title, "filename": null})),
        }
    }

    #[get("/{name}")]
    pub fn show(&self, #[path_variable] name: String) -> Html {
        Html(format!("<h1>{name}</h1>"))
    }

    #[get("/export/{name}")]
    pub fn export(&self, #[path_variable] name: String) -> Payload {
        Payload::attachment(format!("{name}.csv"), "id,total\n1,9\n").with_content_type("text/csv")
    }

    #[get("/media/logo")]
    pub fn logo(&self) -> Payload {
        Payload::image(vec![0x89, b'P', b'N', b'G'], "image/png")
    }
}

fn app() -> switchyard::axum::Router {
    let registry = WorkerRegistry::builder()
        .with_controller::<FileController>()
        .build()
        .unwrap();
    router(Dispatcher::new(registry))
}

async fn body_json(response: http::Response<Body>) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_multipart_upload_binds_file_and_fields() {
    let boundary = "switchyard-boundary";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"title\"\r\n\r\n\
         q3 report\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"doc\"; filename=\"q3.csv\"\r\n\
         Content-Type: text/csv\r\n\r\n\
         a,b,c\r\n\
         --{boundary}--\r\n"
    );
    let response = app()
        .oneshot(
            http::Request::builder()
                .method("POST")
                .uri("/files")
                .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json; charset=utf-8");
    assert_eq!(
        body_json(response).await,
        json!({"title": "q3 report", "filename": "q3.csv", "size": 5})
    );
}

#[tokio::test]
async fn test_missing_file_binds_none() {
    let response = app()
        .oneshot(
            http::Request::builder()
                .method("POST")
                .uri("/files?title=empty")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(body_json(response).await, json!({"title": "empty", "filename": null}));
}

#[tokio::test]
async fn test_html_response_carries_headers() {
    let response = app()
        .oneshot(http::Request::builder().uri("/files/readme").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/html")
    );
    assert_eq!(response.headers()[POWERED_BY_HEADER], "switchyard");
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"<h1>readme</h1>");
}

#[tokio::test]
async fn test_method_not_allowed_lists_verbs() {
    let response = app()
        .oneshot(
            http::Request::builder()
                .method("DELETE")
                .uri("/files")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()[header::ALLOW], "POST");
}

#[tokio::test]
async fn test_options_short_circuits() {
    let response = app()
        .oneshot(
            http::Request::builder()
                .method("OPTIONS")
                .uri("/anything/at/all")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"code": 200}));
}

#[tokio::test]
async fn test_attachment_is_served_as_download() {
    let response = app()
        .oneshot(http::Request::builder().uri("/files/export/q3").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"q3.csv\""
    );
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"id,total\n1,9\n");
}

#[tokio::test]
async fn test_image_keeps_its_media_type() {
    let response = app()
        .oneshot(http::Request::builder().uri("/files/media/logo").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    assert!(response.headers().get(header::CONTENT_DISPOSITION).is_none());
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], &[0x89, b'P', b'N', b'G']);
}
