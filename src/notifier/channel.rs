//! Notification Channel Selector
//!
//! ## 概要
//! イベントごとの配送経路を決定する。
//! - ブローカーチャネルが有効 かつ 接続済みならブローカー配送
//! - そうでなければHTTPフォールバック（設定されている場合）
//! - どちらも使えなければ `Skipped`（エラー扱いしない）
//!
//! ## HTTPフォールバック
//! - 登録通知: `POST <registerURL>` に `{name, image_urls}`
//! - 削除通知: `DELETE <deleteURL>`（`{username}` プレースホルダ置換、
//!   なければ `/delete_user/<id>` を末尾に付加）
//! - 施錠イベントにはHTTP側の操作が定義されていないため `Skipped`

use crate::bridge_client::{BridgeClient, BridgeState};
use crate::notifier::events::EquipmentEvent;
use crate::state::AppConfig;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP fallback settings
#[derive(Debug, Clone)]
pub struct HttpNotifySettings {
    /// Fallback channel enabled flag
    pub enabled: bool,
    /// Registration notification endpoint
    pub register_url: String,
    /// Deletion notification endpoint or template with `{username}`
    pub delete_url: String,
}

impl Default for HttpNotifySettings {
    fn default() -> Self {
        Self {
            enabled: std::env::var("HTTP_NOTIFY_ENABLED")
                .ok()
                .map(|v| v == "true")
                .unwrap_or(false),
            register_url: std::env::var("FACE_REGISTER_URL")
                .unwrap_or_else(|_| "http://localhost:8000/register_user".to_string()),
            delete_url: std::env::var("FACE_DELETE_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
        }
    }
}

/// Which path a delivery took
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Broker,
    Http,
    Skipped,
}

impl std::fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Broker => write!(f, "broker"),
            Self::Http => write!(f, "http"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// Delivery errors, always distinct from the primary action's errors
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// Request never completed (connect/timeout/dns)
    #[error("notification request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Endpoint answered with a non-success status
    #[error("notification endpoint returned {status}: {body}")]
    Status { status: StatusCode, body: String },
}

impl From<DeliveryError> for crate::Error {
    fn from(e: DeliveryError) -> Self {
        crate::Error::Delivery(e.to_string())
    }
}

/// Broker delivery channel (topic-based, at-most-once)
pub struct BrokerChannel {
    bridge: Arc<BridgeClient>,
    topic: String,
}

impl BrokerChannel {
    pub fn new(bridge: Arc<BridgeClient>, topic: String) -> Self {
        Self { bridge, topic }
    }

    /// Broker path is only taken when the session is established
    ///
    /// The first delivery attempt initializes the connection; until the
    /// CONNACK arrives, events flow through the fallback channel.
    pub async fn available(&self) -> bool {
        if self.bridge.state().await == BridgeState::Uninitialized {
            self.bridge.connect().await;
        }
        self.bridge.state().await == BridgeState::Connected
    }

    /// Returns whether a dispatch was attempted
    pub async fn deliver(&self, event: &EquipmentEvent) -> bool {
        self.bridge.publish(&self.topic, event).await
    }
}

/// HTTP fallback channel with per-operation endpoints
pub struct HttpChannel {
    http: reqwest::Client,
    register_url: String,
    delete_url: String,
}

impl HttpChannel {
    pub fn new(settings: &HttpNotifySettings) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            http,
            register_url: settings.register_url.clone(),
            delete_url: settings.delete_url.clone(),
        }
    }

    pub async fn deliver(&self, event: &EquipmentEvent) -> Result<DeliveryOutcome, DeliveryError> {
        match event {
            EquipmentEvent::FaceRegistered {
                user_id,
                image_urls,
            } => {
                let body = json!({
                    "name": user_id,
                    "image_urls": image_urls,
                });
                let response = self.http.post(&self.register_url).json(&body).send().await?;
                Self::check(response).await?;
                debug!(user_id = %user_id, "Registration notified via HTTP fallback");
                Ok(DeliveryOutcome::Http)
            }
            EquipmentEvent::FaceDeleted { user_id } => {
                let url = delete_user_url(&self.delete_url, user_id);
                let response = self.http.delete(&url).send().await?;
                Self::check(response).await?;
                debug!(user_id = %user_id, "Deletion notified via HTTP fallback");
                Ok(DeliveryOutcome::Http)
            }
            EquipmentEvent::LockChanged { door_id, .. } => {
                // Lock events have no HTTP operation on the controller
                debug!(door_id = %door_id, "No HTTP fallback operation for lock events, skipping");
                Ok(DeliveryOutcome::Skipped)
            }
        }
    }

    async fn check(response: reqwest::Response) -> Result<(), DeliveryError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(DeliveryError::Status { status, body })
    }
}

/// Build the deletion URL from a template
///
/// Substitutes the subject id into a `{username}` placeholder, or appends
/// `/delete_user/<id>` when the template carries no placeholder.
pub fn delete_user_url(template: &str, subject_id: &str) -> String {
    if template.contains("{username}") {
        template.replace("{username}", subject_id)
    } else {
        format!("{}/delete_user/{}", template.trim_end_matches('/'), subject_id)
    }
}

/// Channel availability snapshot for the ops API
#[derive(Debug, Clone, Serialize)]
pub struct ChannelStatus {
    pub broker_enabled: bool,
    pub broker_state: String,
    pub http_fallback_enabled: bool,
}

/// Per-call delivery path decision
///
/// Built once from configuration; holds at most one channel of each kind.
pub struct ChannelSelector {
    broker: Option<BrokerChannel>,
    http: Option<HttpChannel>,
}

impl ChannelSelector {
    pub fn new(broker: Option<BrokerChannel>, http: Option<HttpChannel>) -> Self {
        Self { broker, http }
    }

    /// Compose channels from configuration
    pub fn from_config(config: &AppConfig, bridge: Arc<BridgeClient>) -> Self {
        let broker = config
            .broker
            .enabled
            .then(|| BrokerChannel::new(bridge, config.face_topic.clone()));
        let http = config
            .http_notify
            .enabled
            .then(|| HttpChannel::new(&config.http_notify));
        Self::new(broker, http)
    }

    /// Deliver an event over the preferred available channel
    ///
    /// A `Skipped` result is success: the primary action has already
    /// committed and notification is best-effort.
    pub async fn deliver(&self, event: &EquipmentEvent) -> Result<DeliveryOutcome, DeliveryError> {
        if let Some(broker) = &self.broker {
            if broker.available().await {
                if broker.deliver(event).await {
                    return Ok(DeliveryOutcome::Broker);
                }
                warn!(event = %event.kind(), "Broker dispatch failed, trying HTTP fallback");
            }
        }

        if let Some(http) = &self.http {
            return http.deliver(event).await;
        }

        debug!(event = %event.kind(), "No notification channel available, delivery skipped");
        Ok(DeliveryOutcome::Skipped)
    }

    /// Channel availability for the ops API
    pub async fn status(&self) -> ChannelStatus {
        let broker_state = match &self.broker {
            Some(broker) => broker.bridge.state().await.to_string(),
            None => BridgeState::Disabled.to_string(),
        };
        ChannelStatus {
            broker_enabled: self.broker.is_some(),
            broker_state,
            http_fallback_enabled: self.http.is_some(),
        }
    }
}
