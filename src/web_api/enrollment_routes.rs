//! Enrollment API Routes
//!
//! ## エンドポイント
//! - POST /api/faces/:subject_id - 登録画像セットのアップロード
//! - DELETE /api/faces/:subject_id - 登録画像セットの削除
//!
//! 画像はbase64でJSONボディに載せる。通知の成否は `delivery` として
//! レスポンスに含め、主処理の成否と混同しない。

use axum::{
    extract::{Path, State},
    routing::{delete, post},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::enrollment::FaceImage;
use crate::notifier::DeliveryReport;
use crate::state::AppState;
use crate::{Error, Result};

/// Enrollment routes
pub fn enrollment_routes() -> Router<AppState> {
    Router::new()
        .route("/:subject_id", post(register_faces))
        .route("/:subject_id", delete(delete_faces))
}

/// One base64-encoded image
#[derive(Debug, Deserialize)]
pub struct ImagePayload {
    pub data: String,
    #[serde(default = "default_ext")]
    pub ext: String,
}

fn default_ext() -> String {
    "jpg".to_string()
}

#[derive(Debug, Deserialize)]
pub struct RegisterFacesRequest {
    pub images: Vec<ImagePayload>,
}

#[derive(Debug, Serialize)]
pub struct RegisterFacesResponse {
    pub subject_id: String,
    pub image_urls: Vec<String>,
    pub delivery: DeliveryReport,
}

#[derive(Debug, Serialize)]
pub struct DeleteFacesResponse {
    pub subject_id: String,
    pub deleted: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery: Option<DeliveryReport>,
}

/// POST /api/faces/:subject_id
async fn register_faces(
    State(state): State<AppState>,
    Path(subject_id): Path<String>,
    Json(request): Json<RegisterFacesRequest>,
) -> Result<Json<RegisterFacesResponse>> {
    let mut images = Vec::with_capacity(request.images.len());
    for (index, payload) in request.images.into_iter().enumerate() {
        let bytes = STANDARD.decode(payload.data.as_bytes()).map_err(|e| {
            Error::Validation(format!("image {} is not valid base64: {e}", index + 1))
        })?;
        images.push(FaceImage {
            bytes,
            ext: payload.ext,
        });
    }

    let outcome = state.enrollment.register(&subject_id, images).await?;

    Ok(Json(RegisterFacesResponse {
        subject_id,
        image_urls: outcome.image_urls,
        delivery: outcome.delivery,
    }))
}

/// DELETE /api/faces/:subject_id
async fn delete_faces(
    State(state): State<AppState>,
    Path(subject_id): Path<String>,
) -> Result<Json<DeleteFacesResponse>> {
    let outcome = state.enrollment.delete(&subject_id).await?;

    Ok(Json(DeleteFacesResponse {
        subject_id,
        deleted: outcome.deleted,
        delivery: outcome.delivery,
    }))
}
