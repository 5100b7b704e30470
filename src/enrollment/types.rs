//! Enrollment type definitions

use crate::notifier::DeliveryReport;
use serde::Serialize;

/// A Register call only succeeds with exactly this many images
pub const REQUIRED_IMAGE_COUNT: usize = 5;

/// One enrollment image as received at the API boundary
#[derive(Debug, Clone)]
pub struct FaceImage {
    pub bytes: Vec<u8>,
    /// File extension embedded in the storage key ("jpg", "png", ...)
    pub ext: String,
}

impl FaceImage {
    pub fn content_type(&self) -> &'static str {
        match self.ext.as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            _ => "application/octet-stream",
        }
    }
}

/// Result of a successful Register call
#[derive(Debug, Clone, Serialize)]
pub struct RegisterOutcome {
    /// Signed retrieval URLs, one per image, in ordinal order
    pub image_urls: Vec<String>,
    /// Best-effort notification result
    pub delivery: DeliveryReport,
}

/// Result of a Delete call
#[derive(Debug, Clone, Serialize)]
pub struct DeleteOutcome {
    /// Number of objects removed
    pub deleted: usize,
    /// None when nothing was stored: no event is emitted in that case
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery: Option<DeliveryReport>,
}
