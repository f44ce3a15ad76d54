use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

const STORE_PING_TIMEOUT: Duration = Duration::from_secs(2);

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/info", get(info))
        .route("/live", get(live))
}

async fn root(State(state): State<AppState>) -> Response {
    let store_status = store_check(&state).await;
    let ok = matches!(store_status, StoreCheckStatus::Connected { .. });
    let latency_ms = match store_status {
        StoreCheckStatus::Connected { latency_ms } => Some(latency_ms),
        _ => None,
    };

    let response = HealthResponse {
        status: if ok { "ok" } else { "degraded" },
        database: store_status.label(),
        backend: state.store().backend(),
        latency_ms,
        timestamp: now_iso(),
    };

    let status_code = if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(response)).into_response()
}

async fn info(State(state): State<AppState>) -> Response {
    let mastery = state.mastery();
    let response = HealthInfoResponse {
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        start_time: system_time_iso(state.started_at_system()),
        uptime: state.uptime_seconds(),
        store: state.store().backend(),
        remote_bkt: mastery.remote_enabled(),
        content_provider: state.content().map(|c| c.provider_name()),
    };

    Json(response).into_response()
}

async fn live(State(state): State<AppState>) -> Response {
    Json(LivenessResponse {
        status: "healthy",
        timestamp: now_iso(),
        uptime: state.uptime_seconds(),
    })
    .into_response()
}

#[derive(Debug, Clone, Copy)]
enum StoreCheckStatus {
    Connected { latency_ms: u64 },
    Timeout,
    Disconnected,
}

impl StoreCheckStatus {
    fn label(&self) -> &'static str {
        match self {
            StoreCheckStatus::Connected { .. } => "connected",
            StoreCheckStatus::Timeout => "timeout",
            StoreCheckStatus::Disconnected => "disconnected",
        }
    }
}

async fn store_check(state: &AppState) -> StoreCheckStatus {
    let store = state.store();
    let started = Instant::now();
    match tokio::time::timeout(STORE_PING_TIMEOUT, store.ping()).await {
        Ok(Ok(())) => StoreCheckStatus::Connected {
            latency_ms: started.elapsed().as_millis() as u64,
        },
        Ok(Err(err)) => {
            tracing::warn!(error = %err, backend = store.backend(), "store ping failed");
            StoreCheckStatus::Disconnected
        }
        Err(_) => StoreCheckStatus::Timeout,
    }
}

fn system_time_iso(time: std::time::SystemTime) -> String {
    let datetime: chrono::DateTime<chrono::Utc> = time.into();
    datetime.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
    backend: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<u64>,
    timestamp: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthInfoResponse {
    service: &'static str,
    version: &'static str,
    start_time: String,
    uptime: u64,
    store: &'static str,
    remote_bkt: bool,
    content_provider: Option<&'static str>,
}

#[derive(Serialize)]
struct LivenessResponse {
    status: &'static str,
    timestamp: String,
    uptime: u64,
}
