//! Door API Routes
//!
//! ## エンドポイント
//! - GET /api/doors - 既知ドアの施錠状態と保留デッドライン
//! - POST /api/doors/:door_id/lock - 施錠/解錠（主処理はレジストリ更新）
//! - POST /api/doors/:door_id/release - ビューのアンマウント時にタイマー解除
//!
//! 解錠は安全タイマーを武装し、施錠は保留中のデッドラインを
//! キャンセルする。lock_changed イベントはベストエフォート送出。

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::door_timer::DoorLockState;
use crate::equipment_registry::EquipmentUpdate;
use crate::models::ApiResponse;
use crate::notifier::DeliveryReport;
use crate::state::AppState;
use crate::Result;

/// Door routes
pub fn door_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_doors))
        .route("/:door_id/lock", post(set_lock))
        .route("/:door_id/release", post(release_door))
}

#[derive(Debug, Deserialize)]
pub struct SetLockRequest {
    pub locked: bool,
    #[serde(default)]
    pub door_name: String,
    #[serde(default)]
    pub room_name: String,
}

#[derive(Debug, Serialize)]
pub struct SetLockResponse {
    pub door_id: String,
    pub locked: bool,
    /// Auto-relock deadline, present after an unlock
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_deadline: Option<DateTime<Utc>>,
    pub delivery: DeliveryReport,
}

/// GET /api/doors
async fn list_doors(State(state): State<AppState>) -> Json<Vec<DoorLockState>> {
    Json(state.door_timer.snapshot().await)
}

/// POST /api/doors/:door_id/lock
///
/// The registry update is the primary action; the safety timer and the
/// lock_changed notification follow it.
async fn set_lock(
    State(state): State<AppState>,
    Path(door_id): Path<String>,
    Json(request): Json<SetLockRequest>,
) -> Result<Json<SetLockResponse>> {
    state
        .registry
        .update(&door_id, EquipmentUpdate::lock(request.locked))
        .await?;

    let pending_deadline = if request.locked {
        state.door_timer.locked(&door_id).await;
        None
    } else {
        Some(state.door_timer.unlocked(&door_id).await)
    };

    let delivery = DeliveryReport::from_result(
        state
            .publisher
            .lock_changed(
                &door_id,
                request.locked,
                &request.door_name,
                &request.room_name,
            )
            .await,
    );

    Ok(Json(SetLockResponse {
        door_id,
        locked: request.locked,
        pending_deadline,
        delivery,
    }))
}

/// POST /api/doors/:door_id/release
///
/// View unmount hook: cancels the door's pending deadline so no update is
/// fired against a view that no longer observes the door.
async fn release_door(
    State(state): State<AppState>,
    Path(door_id): Path<String>,
) -> Json<ApiResponse<String>> {
    state.door_timer.release(&door_id).await;
    Json(ApiResponse::success(door_id))
}
