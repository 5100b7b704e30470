//! Application state
//!
//! Holds all shared components and state

use crate::bridge_client::{BridgeClient, BrokerSettings};
use crate::door_timer::{DoorTimer, DEFAULT_AUTO_RELOCK_SECS};
use crate::enrollment::EnrollmentService;
use crate::equipment_registry::EquipmentUpdater;
use crate::face_store::StorageSettings;
use crate::notifier::channel::HttpNotifySettings;
use crate::notifier::EquipmentEventPublisher;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Broker connection settings
    pub broker: BrokerSettings,
    /// HTTP fallback notification settings
    pub http_notify: HttpNotifySettings,
    /// Object storage settings
    pub storage: StorageSettings,
    /// Topic the physical controller subscribes to
    pub face_topic: String,
    /// Signed retrieval URL lifetime in seconds
    pub signed_url_ttl_secs: u64,
    /// Auto-relock delay in seconds
    pub auto_relock_secs: u64,
    /// Equipment registry base URL (external collaborator)
    pub equipment_api_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            broker: BrokerSettings::default(),
            http_notify: HttpNotifySettings::default(),
            storage: StorageSettings::default(),
            face_topic: std::env::var("FACE_TOPIC")
                .unwrap_or_else(|_| "villa/faces".to_string()),
            signed_url_ttl_secs: std::env::var("SIGNED_URL_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(900),
            auto_relock_secs: std::env::var("AUTO_RELOCK_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_AUTO_RELOCK_SECS),
            equipment_api_url: std::env::var("EQUIPMENT_API_URL")
                .unwrap_or_else(|_| "http://localhost:8090".to_string()),
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application config
    pub config: AppConfig,
    /// BridgeClient (broker connection)
    pub bridge: Arc<BridgeClient>,
    /// EquipmentEventPublisher (envelope construction + channel selection)
    pub publisher: Arc<EquipmentEventPublisher>,
    /// EnrollmentService (image upload / signed URL / delete pipeline)
    pub enrollment: Arc<EnrollmentService>,
    /// DoorTimer (auto-relock safety timer)
    pub door_timer: Arc<DoorTimer>,
    /// Equipment registry client (external collaborator)
    pub registry: Arc<dyn EquipmentUpdater>,
    /// System health status
    pub system_health: Arc<RwLock<SystemHealth>>,
    /// Process start time (uptime reporting)
    pub started_at: DateTime<Utc>,
}

/// System health metrics
#[derive(Debug, Clone, Default)]
pub struct SystemHealth {
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub overloaded: bool,
    pub last_overload_at: Option<DateTime<Utc>>,
}

impl SystemHealth {
    /// Check and update overload status
    pub fn update(&mut self, cpu: f32, memory: f32) {
        self.cpu_percent = cpu;
        self.memory_percent = memory;

        if cpu > 85.0 || memory > 90.0 {
            self.overloaded = true;
            self.last_overload_at = Some(Utc::now());
        } else if self.overloaded {
            // Recovery with hysteresis
            if let Some(last) = self.last_overload_at {
                let elapsed = Utc::now() - last;
                if elapsed > chrono::Duration::seconds(60) && cpu < 60.0 && memory < 70.0 {
                    self.overloaded = false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_health_overload_threshold() {
        let mut health = SystemHealth::default();
        health.update(90.0, 50.0);
        assert!(health.overloaded);
        assert!(health.last_overload_at.is_some());

        // High readings keep the overloaded flag
        health.update(86.0, 50.0);
        assert!(health.overloaded);
    }

    #[test]
    fn test_system_health_no_instant_recovery() {
        let mut health = SystemHealth::default();
        health.update(90.0, 95.0);
        assert!(health.overloaded);

        // Recovery requires 60s of hysteresis, not a single good reading
        health.update(10.0, 10.0);
        assert!(health.overloaded);
    }
}
