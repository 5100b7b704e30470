//! Notifier - equipment event delivery to the physical controller
//!
//! ## 概要
//! 設備・登録イベントを物理コントローラへ届けるための層。
//! - `events` - 正規のイベントエンベロープと各操作のPublisher
//! - `channel` - ブローカー / HTTPフォールバックのチャネル選択
//!
//! ## 設計
//! 配送はベストエフォート。主処理（アップロード・削除・施錠更新）は
//! 配送結果に依存しない。配送失敗は `DeliveryError` として主処理の
//! 結果と必ず区別して扱う。

pub mod channel;
pub mod events;

pub use channel::{
    BrokerChannel, ChannelSelector, ChannelStatus, DeliveryError, DeliveryOutcome, HttpChannel,
};
pub use events::{EquipmentEvent, EquipmentEventPublisher};

use serde::Serialize;

/// Best-effort delivery result, folded for callers of a primary action
///
/// Lets API responses distinguish "data saved, notification failed" from
/// plain success without turning a delivery failure into a request error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryReport {
    /// Delivered over the broker channel
    Broker,
    /// Delivered over the HTTP fallback channel
    Http,
    /// No channel available; notification skipped, not an error
    Skipped,
    /// Delivery was attempted and failed
    Failed { reason: String },
}

impl DeliveryReport {
    /// Fold a delivery attempt into a report
    pub fn from_result(result: Result<DeliveryOutcome, DeliveryError>) -> Self {
        match result {
            Ok(DeliveryOutcome::Broker) => Self::Broker,
            Ok(DeliveryOutcome::Http) => Self::Http,
            Ok(DeliveryOutcome::Skipped) => Self::Skipped,
            Err(e) => Self::Failed {
                reason: e.to_string(),
            },
        }
    }
}

impl std::fmt::Display for DeliveryReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Broker => write!(f, "broker"),
            Self::Http => write!(f, "http"),
            Self::Skipped => write!(f, "skipped"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}
