//! RoomHub - Villa Equipment & Enrollment Sync Server
//!
//! Keeps cloud-registered villa equipment (door locks, lights, air
//! conditioners) synchronized with on-site physical controllers.
//!
//! ## Architecture (7 Components)
//!
//! 1. BridgeClient - MQTT broker connection lifecycle + best-effort publish
//! 2. Notifier - channel selection (broker / HTTP fallback) + event envelopes
//! 3. FaceStore - object storage adapter for enrollment images
//! 4. EnrollmentService - biometric image upload / signed URL / delete pipeline
//! 5. DoorTimer - auto-relock safety timer (per-door deadlines)
//! 6. EquipmentRegistry - partial-field update adapter for the device registry
//! 7. WebAPI - REST API endpoints
//!
//! ## Design Principles
//!
//! - Notification delivery is best-effort, at-most-once; the primary action
//!   (upload/delete/lock update) never depends on delivery success
//! - All collaborators are injected; no global singletons

pub mod bridge_client;
pub mod door_timer;
pub mod enrollment;
pub mod equipment_registry;
pub mod face_store;
pub mod notifier;
pub mod web_api;
pub mod models;
pub mod error;
pub mod state;

pub use error::{Error, Result};
pub use state::AppState;
