// src/api.rs
//! HTTP triggers for the task entry points plus a health probe.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::tasks::{TaskError, Tasks};

#[derive(Clone)]
pub struct AppState {
    pub tasks: Arc<Tasks>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/tasks/ingest", post(trigger_ingest))
        .route(
            "/tasks/notify-subscription-code",
            post(trigger_subscription_code),
        )
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

fn default_activate() -> bool {
    true
}

#[derive(serde::Deserialize)]
struct SubscriptionCodeReq {
    code: String,
    recipients: Vec<String>,
    #[serde(default = "default_activate")]
    activate: bool,
}

async fn trigger_ingest(State(state): State<AppState>) -> Response {
    match state.tasks.ingest_feeds().await {
        Ok(report) => Json(report).into_response(),
        Err(e) => task_error(&e),
    }
}

async fn trigger_subscription_code(
    State(state): State<AppState>,
    Json(body): Json<SubscriptionCodeReq>,
) -> Response {
    if body.code.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "code must not be empty" })),
        )
            .into_response();
    }
    match state
        .tasks
        .notify_subscription_code(&body.code, &body.recipients, body.activate)
        .await
    {
        Ok(()) => Json(json!({
            "status": "sent",
            "recipients": body.recipients.len(),
        }))
        .into_response(),
        Err(e) => task_error(&e),
    }
}

fn task_error(e: &TaskError) -> Response {
    tracing::warn!(error = %e, "task trigger failed");
    let status = match e {
        TaskError::Dispatch(_) => StatusCode::BAD_GATEWAY,
        TaskError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": e.to_string() }))).into_response()
}
