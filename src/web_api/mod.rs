//! WebAPI - REST API Endpoints
//!
//! ## Responsibilities
//!
//! - HTTP API routes
//! - Request validation
//! - Response formatting

mod door_routes;
mod enrollment_routes;
mod routes;

pub use routes::create_router;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;

use crate::bridge_client::BridgeState;
use crate::models::{ApiResponse, HealthResponse};
use crate::state::AppState;
use crate::Result;

/// Sentinel subject for delivery connectivity tests; a face_deleted for a
/// never-enrolled subject is a no-op on the controller
const CONNECTIVITY_TEST_SUBJECT: &str = "connectivity-test";

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let broker_state = state.bridge.state().await;

    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_sec: (Utc::now() - state.started_at).num_seconds(),
        broker_state: broker_state.to_string(),
        http_fallback_enabled: state.config.http_notify.enabled,
    };

    Json(response)
}

/// Status endpoint (villa devices common)
pub async fn device_status(State(_state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "device_type": "roomhub",
        "firmware_version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

/// GET /api/system/status
pub async fn system_status(State(state): State<AppState>) -> impl IntoResponse {
    let health = state.system_health.read().await;
    let broker_connected = state.bridge.state().await == BridgeState::Connected;
    Json(json!({
        "cpu_percent": health.cpu_percent,
        "memory_percent": health.memory_percent,
        "overloaded": health.overloaded,
        "broker_connected": broker_connected,
    }))
}

/// GET /api/notify/status
///
/// Channel availability: broker state plus HTTP fallback configuration
pub async fn notify_status(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.publisher.channel_status().await;
    Json(ApiResponse::success(status))
}

/// Connectivity test result
#[derive(Debug, Serialize)]
pub struct NotifyTestResponse {
    pub delivered_via: String,
}

/// POST /api/notify/test
///
/// Delivers a sentinel envelope end to end; a delivery failure surfaces as
/// HTTP 502 so operators can tell the channel is down.
pub async fn notify_test(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<NotifyTestResponse>>> {
    let outcome = state
        .publisher
        .face_deleted(CONNECTIVITY_TEST_SUBJECT)
        .await?;

    Ok(Json(ApiResponse::success(NotifyTestResponse {
        delivered_via: outcome.to_string(),
    })))
}
