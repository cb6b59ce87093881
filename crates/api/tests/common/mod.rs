#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use biolink_api::backend::MemoryBackend;
use biolink_api::config::{ServerConfig, StoreBackend, DEFAULT_MAX_BODY_BYTES};
use biolink_api::router::build_app_router;
use biolink_api::state::AppState;
use biolink_events::EventBus;
use biolink_pipeline::memory::InMemoryPageStore;
use biolink_pipeline::PipelineConfig;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

/// Fast autosave timing so tests settle within milliseconds.
pub fn fast_pipeline() -> PipelineConfig {
    PipelineConfig {
        debounce: Duration::from_millis(20),
        retry_limit: 2,
        retry_backoff: Duration::from_millis(5),
        error_reset: Duration::from_millis(50),
    }
}

/// Build a test `ServerConfig` backed by the memory store.
pub fn test_config(pipeline: PipelineConfig) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        store_backend: StoreBackend::Memory,
        max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        pipeline,
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryPageStore>,
}

/// Build the full application router with all middleware layers on top of
/// a fresh memory store.
pub fn build_test_app() -> TestApp {
    build_test_app_with(fast_pipeline())
}

pub fn build_test_app_with(pipeline: PipelineConfig) -> TestApp {
    let config = test_config(pipeline);
    let event_bus = Arc::new(EventBus::default());
    let backend = Arc::new(MemoryBackend::new(&event_bus));
    let store = Arc::clone(backend.store());

    let state = AppState::new(config.clone(), backend, event_bus);
    TestApp {
        router: build_app_router(state, &config),
        store,
    }
}

pub async fn get(app: &Router, uri: &str) -> Response {
    send(app, Method::GET, uri, None).await
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> Response {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn put_json(app: &Router, uri: &str, body: Value) -> Response {
    send(app, Method::PUT, uri, Some(body)).await
}

pub async fn patch_json(app: &Router, uri: &str, body: Value) -> Response {
    send(app, Method::PATCH, uri, Some(body)).await
}

pub async fn delete(app: &Router, uri: &str) -> Response {
    send(app, Method::DELETE, uri, None).await
}

pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> Response {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Create a page and return its id.
pub async fn create_page(app: &Router, slug: &str) -> i64 {
    let response = post_json(
        app,
        "/api/v1/pages",
        serde_json::json!({ "user_id": 1, "slug": slug, "profile_name": "Ada" }),
    )
    .await;
    assert_eq!(response.status(), 201);
    body_json(response).await["data"]["page"]["id"]
        .as_i64()
        .unwrap()
}

/// Poll the editor view until its status is `wanted`.
pub async fn wait_for_status(app: &Router, page_id: i64, wanted: &str) -> Value {
    for _ in 0..200 {
        let view = body_json(get(app, &format!("/api/v1/pages/{page_id}/editor")).await).await;
        if view["data"]["status"] == wanted {
            return view;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("page {page_id} never reached status '{wanted}'");
}
