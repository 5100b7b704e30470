//! Bridge Client
//!
//! ## 概要
//! 物理コントローラへの通知を配送するMQTTブローカー接続を管理する。
//! - 接続ライフサイクル（Disabled / Uninitialized / Connecting / Connected / Error）
//! - ベストエフォートpublish（QoS 0、at-most-once）
//!
//! ## 設計
//! - `connect()` は冪等。設定で無効化されている場合はDisabledハンドルを返し、
//!   初回のみログを出す
//! - 接続エラーはErrorステートに落とすだけで自動再接続はしない。
//!   以降のpublishは同じ（エラー状態の）クライアントインスタンスを再利用する
//! - 状態を書き換えるのは `connect()` とイベントループドライバのみ。
//!   参照側（ChannelSelector）は読むだけ

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Broker connection settings
#[derive(Debug, Clone)]
pub struct BrokerSettings {
    /// Channel enabled flag; false yields a permanently disabled handle
    pub enabled: bool,
    /// Broker host
    pub host: String,
    /// Broker port
    pub port: u16,
    /// Optional credentials
    pub username: Option<String>,
    pub password: Option<String>,
    /// MQTT client id
    pub client_id: String,
    /// Keep-alive interval in seconds
    pub keep_alive_secs: u64,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            enabled: std::env::var("MQTT_ENABLED")
                .ok()
                .map(|v| v == "true")
                .unwrap_or(false),
            host: std::env::var("MQTT_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("MQTT_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(1883),
            username: std::env::var("MQTT_USERNAME").ok(),
            password: std::env::var("MQTT_PASSWORD").ok(),
            client_id: std::env::var("MQTT_CLIENT_ID")
                .unwrap_or_else(|_| "roomhub".to_string()),
            keep_alive_secs: 30,
        }
    }
}

/// Bridge connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// Channel disabled by configuration; publish permanently short-circuits
    Disabled,
    /// No connection attempt made yet
    Uninitialized,
    /// CONNECT sent, waiting for CONNACK
    Connecting,
    /// Broker session established
    Connected,
    /// Connection failed; not retried until process restart
    Error,
}

impl std::fmt::Display for BridgeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Error => write!(f, "error"),
        }
    }
}

struct Connection {
    state: BridgeState,
    client: Option<AsyncClient>,
}

/// MQTT bridge client
///
/// One instance per process, shared behind `Arc`; created explicitly and
/// injected into collaborators.
pub struct BridgeClient {
    settings: BrokerSettings,
    conn: Arc<RwLock<Connection>>,
}

impl BridgeClient {
    /// Create a new, not-yet-connected client
    pub fn new(settings: BrokerSettings) -> Self {
        Self {
            settings,
            conn: Arc::new(RwLock::new(Connection {
                state: BridgeState::Uninitialized,
                client: None,
            })),
        }
    }

    /// Current connection state
    pub async fn state(&self) -> BridgeState {
        self.conn.read().await.state
    }

    /// Establish the broker connection
    ///
    /// Idempotent: any state other than Uninitialized returns the existing
    /// connection untouched. An errored connection is deliberately reused,
    /// not replaced.
    pub async fn connect(&self) {
        {
            let conn = self.conn.read().await;
            if conn.state != BridgeState::Uninitialized {
                return;
            }
        }

        let mut conn = self.conn.write().await;
        // Re-check after acquiring the write lock
        if conn.state != BridgeState::Uninitialized {
            return;
        }

        if !self.settings.enabled {
            // Disabledへの遷移は一度だけなので、このログも一度だけ出る
            warn!("Broker channel disabled by configuration; equipment events fall back to HTTP where configured");
            conn.state = BridgeState::Disabled;
            return;
        }

        let mut options = MqttOptions::new(
            &self.settings.client_id,
            &self.settings.host,
            self.settings.port,
        );
        options.set_keep_alive(Duration::from_secs(self.settings.keep_alive_secs));
        if let (Some(username), Some(password)) =
            (&self.settings.username, &self.settings.password)
        {
            options.set_credentials(username, password);
        }

        let (client, mut eventloop) = AsyncClient::new(options, 32);
        conn.state = BridgeState::Connecting;
        conn.client = Some(client);

        info!(
            host = %self.settings.host,
            port = self.settings.port,
            client_id = %self.settings.client_id,
            "Bridge connecting to broker"
        );

        // Event loop driver: flips the shared state on CONNACK or on the
        // first connection error, then stops. No automatic reconnect.
        let shared = Arc::clone(&self.conn);
        tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        shared.write().await.state = BridgeState::Connected;
                        info!("Bridge connected to broker");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, "Bridge connection error");
                        shared.write().await.state = BridgeState::Error;
                        break;
                    }
                }
            }
        });
    }

    /// Publish a message to the broker, best effort
    ///
    /// Serializes `message` to its JSON string form and enqueues it at QoS 0
    /// (at-most-once, no acknowledgment expected from the remote controller).
    /// Lazily connects on first use.
    ///
    /// Returns `true` when a dispatch was attempted, `false` when the channel
    /// is disabled or uninitialized, or when the send queue rejected the
    /// message. Never returns an error: connection problems only show up in
    /// logs and in the `Error` state.
    pub async fn publish<T: Serialize>(&self, topic: &str, message: &T) -> bool {
        let payload = match serde_json::to_string(message) {
            Ok(payload) => payload,
            Err(e) => {
                error!(topic = %topic, error = %e, "Failed to serialize broker payload");
                return false;
            }
        };

        if self.state().await == BridgeState::Uninitialized {
            self.connect().await;
        }

        let conn = self.conn.read().await;
        match conn.state {
            BridgeState::Disabled | BridgeState::Uninitialized => {
                debug!(topic = %topic, state = %conn.state, "Broker channel unavailable, publish skipped");
                return false;
            }
            _ => {}
        }

        let Some(client) = conn.client.as_ref() else {
            return false;
        };

        match client.try_publish(topic, QoS::AtMostOnce, false, payload) {
            Ok(()) => {
                debug!(topic = %topic, "Event dispatched to broker");
                true
            }
            Err(e) => {
                warn!(topic = %topic, error = %e, "Broker dispatch failed");
                false
            }
        }
    }
}
