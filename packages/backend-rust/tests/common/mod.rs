#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use mastery_backend::services::bkt_remote::RemoteBktClient;
use mastery_backend::services::content::ContentGenerator;
use mastery_backend::services::mastery::MasteryService;
use mastery_backend::state::AppState;
use mastery_backend::store::memory::MemoryMasteryStore;
use mastery_backend::store::MasteryStore;
use serde_json::Value;
use tower::ServiceExt;

pub fn create_test_app() -> Router {
    create_test_app_with(Arc::new(MemoryMasteryStore::new()), None, None)
}

pub fn create_test_app_with(
    store: Arc<dyn MasteryStore>,
    remote: Option<RemoteBktClient>,
    content: Option<ContentGenerator>,
) -> Router {
    let mastery = MasteryService::new(store).with_remote(remote);
    mastery_backend::app(AppState::new(mastery, content))
}

/// Serves `router` on an ephemeral local port.
pub async fn spawn_server(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    addr
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

pub fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}
