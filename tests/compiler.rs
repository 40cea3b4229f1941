use std::path::PathBuf;

use serde_json::json;
use switchyard::axum::http::StatusCode;
use switchyard::http::{Payload, Request};
use switchyard::{
    CompileOutcome, Dispatcher, HttpMethod, RouteCache, RouteCompiler, RouteRule, Settings,
    WorkerRegistry, WorkerRegistryBuilder,
};

mod catalog {
    include!("fixtures/catalog/catalog.rs");
}

use catalog::CatalogController;

fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
}

fn builder(cache: &std::path::Path) -> WorkerRegistryBuilder {
    WorkerRegistry::builder()
        .with_settings(Settings::default().with_cache_file(cache))
        .with_controller::<CatalogController>()
}

#[test]
fn test_scanned_rules_match_macro_rules() {
    let scanned = RouteCompiler::scan(&fixtures(), &["catalog"]);
    let registry = WorkerRegistry::builder()
        .with_controller::<CatalogController>()
        .build()
        .unwrap();

    assert_eq!(scanned, registry.controller_rules());
    let ids: Vec<_> = scanned.iter().map(|r| r.handler_id.as_str()).collect();
    assert_eq!(ids, vec!["Catalog@item", "Catalog@add"]);
    assert_eq!(scanned[0].path_pattern, "/catalog/{sku}");
    assert_eq!(scanned[1].http_method, HttpMethod::Post);
}

#[test]
fn test_compile_is_skipped_when_cache_exists() {
    let dir = tempfile::tempdir().unwrap();
    let compiler = RouteCompiler::new(dir.path().join("routes.json"));

    let outcome = compiler.compile(&fixtures(), &["catalog"], false).unwrap();
    assert_eq!(outcome, CompileOutcome::Written { rules: 2 });
    let first = std::fs::read(compiler.cache_path()).unwrap();

    let outcome = compiler.compile(&fixtures(), &["catalog"], false).unwrap();
    assert_eq!(outcome, CompileOutcome::SkippedExisting);
    assert_eq!(std::fs::read(compiler.cache_path()).unwrap(), first);

    let outcome = compiler.compile(&fixtures(), &["catalog"], true).unwrap();
    assert_eq!(outcome, CompileOutcome::Written { rules: 2 });
}

#[test]
fn test_concurrent_compiles_leave_a_complete_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("routes.json");

    let writers: Vec<_> = (0..8)
        .map(|_| {
            let compiler = RouteCompiler::new(&path);
            std::thread::spawn(move || compiler.compile(&fixtures(), &["catalog"], true).unwrap())
        })
        .collect();
    for writer in writers {
        assert_eq!(writer.join().unwrap(), CompileOutcome::Written { rules: 2 });
    }
    assert_eq!(RouteCache::load(&path).len(), 2);
}

#[tokio::test]
async fn test_one_shot_dispatch_from_compiled_cache() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("routes.json");
    RouteCompiler::new(&path)
        .compile(&fixtures(), &["catalog"], false)
        .unwrap();

    let response = Dispatcher::one_shot(builder(&path), Request::builder().uri("/catalog/tea-01").build()).await;
    assert_eq!(response.payload(), Some(&Payload::Text("tea-01".into())));

    let response = Dispatcher::one_shot(
        builder(&path),
        Request::builder()
            .method("POST")
            .uri("/catalog")
            .json(&json!({"price": 0}))
            .build(),
    )
    .await;
    let Some(Payload::Json(body)) = response.payload() else {
        panic!("expected json payload");
    };
    assert_eq!(body["code"], 1006);
    let fields: serde_json::Value = serde_json::from_str(body["msg"].as_str().unwrap()).unwrap();
    assert_eq!(
        fields,
        json!({"title": "must be filled", "price": "price must be positive"})
    );
}

#[tokio::test]
async fn test_cached_table_replaces_controller_rules() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("routes.json");
    let mut item = RouteCompiler::scan(&fixtures(), &["catalog"]).remove(0);
    item.path_pattern = "/v2/items/{sku}".to_string();
    RouteCache::store(&path, &[item]).unwrap();

    let response = Dispatcher::one_shot(builder(&path), Request::builder().uri("/v2/items/x").build()).await;
    assert_eq!(response.payload(), Some(&Payload::Text("x".into())));

    let response = Dispatcher::one_shot(builder(&path), Request::builder().uri("/catalog/x").build()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stale_cache_fails_the_request_not_the_process() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("routes.json");
    RouteCache::store(&path, &[RouteRule::new("Catalog@removed", HttpMethod::Get, "/gone")]).unwrap();

    let response = Dispatcher::one_shot(builder(&path), Request::builder().uri("/gone").build()).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_missing_cache_falls_back_to_controller_rules() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");

    let response = Dispatcher::one_shot(builder(&path), Request::builder().uri("/catalog/y").build()).await;
    assert_eq!(response.payload(), Some(&Payload::Text("y".into())));
}
