//! API Routes

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

use super::door_routes::door_routes;
use super::enrollment_routes::enrollment_routes;

/// Create API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health & Status
        .route("/healthz", get(super::health_check))
        .route("/api/status", get(super::device_status))
        .route("/api/system/status", get(super::system_status))
        // Notification channels
        .route("/api/notify/status", get(super::notify_status))
        .route("/api/notify/test", post(super::notify_test))
        // Enrollment images
        .nest("/api/faces", enrollment_routes())
        // Door locks & safety timer
        .nest("/api/doors", door_routes())
        .with_state(state)
}
