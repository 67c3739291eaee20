//! API route definitions: health, version, metrics, ad-hoc triggers, and
//! JSON status snapshots.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::error;

use super::state::AppState;

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/version", get(version))
        .route("/metrics", get(metrics))
        .route("/check", get(trigger_check).post(trigger_check))
}

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/status/secrets", get(secrets_json))
        .route("/status/cert-manager", get(cert_manager_json))
        .route("/status/ingress", get(ingress_json))
}

async fn healthz(State(state): State<AppState>) -> Response {
    let healthy = state.orchestrator.is_healthy();
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = Json(json!({
        "status": if healthy { "healthy" } else { "degraded" },
        "last_success_at": state.orchestrator.last_success_at().map(|t| t.to_rfc3339()),
    }));
    (status, body).into_response()
}

async fn version() -> Json<Value> {
    Json(json!({ "version": env!("CARGO_PKG_VERSION") }))
}

async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics unavailable").into_response()
        }
    }
}

/// Ad-hoc full-cycle trigger. Goes through the same single-flight gate as
/// the scheduler; a cycle already in flight rejects the request.
async fn trigger_check(State(state): State<AppState>) -> Response {
    if state.orchestrator.trigger() {
        (StatusCode::ACCEPTED, "check cycle initiated").into_response()
    } else {
        (StatusCode::CONFLICT, "check cycle already running").into_response()
    }
}

async fn secrets_json(State(state): State<AppState>) -> Response {
    Json((*state.store.secrets()).clone()).into_response()
}

async fn cert_manager_json(State(state): State<AppState>) -> Response {
    Json((*state.store.managed_certs()).clone()).into_response()
}

async fn ingress_json(State(state): State<AppState>) -> Response {
    Json((*state.store.ingresses()).clone()).into_response()
}
