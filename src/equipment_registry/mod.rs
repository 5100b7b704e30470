//! Equipment Registry Client
//!
//! Adapter for the external equipment registry: partial-field state updates
//! keyed by device id (`PATCH /equipments/{id}`). The registry itself (CRUD,
//! persistence, dashboards) lives outside this server.

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Partial-field update payload
///
/// Only the set fields are serialized; the registry merges them into the
/// device record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EquipmentUpdate {
    /// Door lock state
    #[serde(rename = "lockStatus", skip_serializing_if = "Option::is_none")]
    pub lock_status: Option<bool>,
    /// Generic on/off state (lights etc.)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<bool>,
    /// Light brightness
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness: Option<i32>,
    /// Air conditioner temperature level
    #[serde(rename = "temperaturelevel", skip_serializing_if = "Option::is_none")]
    pub temperature_level: Option<i32>,
}

impl EquipmentUpdate {
    /// Lock-state-only update
    pub fn lock(locked: bool) -> Self {
        Self {
            lock_status: Some(locked),
            ..Self::default()
        }
    }
}

/// Issues partial-field updates against the registry
#[async_trait]
pub trait EquipmentUpdater: Send + Sync {
    async fn update(&self, device_id: &str, update: EquipmentUpdate) -> Result<()>;
}

/// HTTP client for the registry's update API
pub struct RegistryClient {
    http: reqwest::Client,
    base_url: String,
}

impl RegistryClient {
    pub fn new(base_url: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to build HTTP client");

        Self { http, base_url }
    }

    fn update_url(&self, device_id: &str) -> String {
        format!(
            "{}/equipments/{}",
            self.base_url.trim_end_matches('/'),
            device_id
        )
    }
}

#[async_trait]
impl EquipmentUpdater for RegistryClient {
    async fn update(&self, device_id: &str, update: EquipmentUpdate) -> Result<()> {
        let url = self.update_url(device_id);
        let response = self.http.patch(&url).json(&update).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Api(format!(
                "equipment registry returned {status} for device {device_id}"
            )));
        }

        debug!(device_id = %device_id, update = ?update, "Equipment update applied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_update_serializes_only_lock_status() {
        let json = serde_json::to_value(EquipmentUpdate::lock(true)).unwrap();
        assert_eq!(json, serde_json::json!({"lockStatus": true}));
    }

    #[test]
    fn test_full_update_uses_registry_field_names() {
        let update = EquipmentUpdate {
            lock_status: Some(false),
            status: Some(true),
            brightness: Some(70),
            temperature_level: Some(3),
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "lockStatus": false,
                "status": true,
                "brightness": 70,
                "temperaturelevel": 3,
            })
        );
    }

    #[test]
    fn test_update_url_building() {
        let client = RegistryClient::new("http://registry.local/".to_string());
        assert_eq!(
            client.update_url("door-12"),
            "http://registry.local/equipments/door-12"
        );
    }
}
