//! Equipment Event Publisher
//!
//! ## 概要
//! 物理コントローラ向けの正規イベントエンベロープを組み立て、
//! ChannelSelectorへ渡す。
//!
//! ## エンベロープ
//! `event` フィールドで種別を判別するJSONオブジェクト:
//! - `face_registered` - `{user_id, image_urls}`
//! - `face_deleted` - `{user_id}`
//! - `lock_changed` - `{door_id, lock_status, door_name, room_name, timestamp}`
//!
//! 冪等キーは付与しない。上流リトライによる重複送出はあり得る前提で、
//! 受信側コントローラが許容する（exactly-onceは保証しない）。

use super::channel::{ChannelSelector, ChannelStatus, DeliveryError, DeliveryOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Canonical event envelope
///
/// Immutable once constructed; not persisted, fire-and-forget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EquipmentEvent {
    /// A subject's enrollment images were provisioned
    FaceRegistered {
        user_id: String,
        image_urls: Vec<String>,
    },
    /// A subject's enrollment images were removed
    FaceDeleted { user_id: String },
    /// A door lock changed state
    LockChanged {
        door_id: String,
        lock_status: bool,
        door_name: String,
        room_name: String,
        /// Server-side timestamp, stamped at envelope construction
        timestamp: DateTime<Utc>,
    },
}

impl EquipmentEvent {
    /// Event kind for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FaceRegistered { .. } => "face_registered",
            Self::FaceDeleted { .. } => "face_deleted",
            Self::LockChanged { .. } => "lock_changed",
        }
    }
}

/// Builds envelopes and hands them to the channel selector
pub struct EquipmentEventPublisher {
    selector: ChannelSelector,
}

impl EquipmentEventPublisher {
    pub fn new(selector: ChannelSelector) -> Self {
        Self { selector }
    }

    /// Notify the controller that a subject's images are available
    pub async fn face_registered(
        &self,
        subject_id: &str,
        image_urls: Vec<String>,
    ) -> Result<DeliveryOutcome, DeliveryError> {
        let event = EquipmentEvent::FaceRegistered {
            user_id: subject_id.to_string(),
            image_urls,
        };
        let outcome = self.selector.deliver(&event).await?;
        info!(subject_id = %subject_id, outcome = %outcome, "face_registered event delivered");
        Ok(outcome)
    }

    /// Notify the controller that a subject's images were removed
    pub async fn face_deleted(
        &self,
        subject_id: &str,
    ) -> Result<DeliveryOutcome, DeliveryError> {
        let event = EquipmentEvent::FaceDeleted {
            user_id: subject_id.to_string(),
        };
        let outcome = self.selector.deliver(&event).await?;
        info!(subject_id = %subject_id, outcome = %outcome, "face_deleted event delivered");
        Ok(outcome)
    }

    /// Notify the controller of a door lock state change
    pub async fn lock_changed(
        &self,
        door_id: &str,
        locked: bool,
        door_name: &str,
        room_name: &str,
    ) -> Result<DeliveryOutcome, DeliveryError> {
        let event = EquipmentEvent::LockChanged {
            door_id: door_id.to_string(),
            lock_status: locked,
            door_name: door_name.to_string(),
            room_name: room_name.to_string(),
            timestamp: Utc::now(),
        };
        let outcome = self.selector.deliver(&event).await?;
        info!(door_id = %door_id, locked = locked, outcome = %outcome, "lock_changed event delivered");
        Ok(outcome)
    }

    /// Channel availability for the ops API
    pub async fn channel_status(&self) -> ChannelStatus {
        self.selector.status().await
    }
}
