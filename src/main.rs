//! RoomHub - Villa Equipment & Enrollment Sync Server
//!
//! Main entry point.

use roomhub::{
    bridge_client::BridgeClient,
    door_timer::DoorTimer,
    enrollment::EnrollmentService,
    equipment_registry::{EquipmentUpdater, RegistryClient},
    face_store::{FaceStore, S3FaceStore},
    notifier::{ChannelSelector, EquipmentEventPublisher},
    state::{AppConfig, AppState, SystemHealth},
    web_api,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roomhub=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting RoomHub v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::default();
    tracing::info!(
        broker_enabled = config.broker.enabled,
        broker_host = %config.broker.host,
        http_fallback_enabled = config.http_notify.enabled,
        face_topic = %config.face_topic,
        bucket = %config.storage.bucket,
        signed_url_ttl_secs = config.signed_url_ttl_secs,
        auto_relock_secs = config.auto_relock_secs,
        equipment_api_url = %config.equipment_api_url,
        "Configuration loaded"
    );

    // Initialize system health
    let system_health = Arc::new(RwLock::new(SystemHealth::default()));

    // Bridge client: constructed here, connected lazily on first publish
    let bridge = Arc::new(BridgeClient::new(config.broker.clone()));
    tracing::info!("BridgeClient initialized (lazy connect)");

    // Notification channels are composed once from configuration
    let selector = ChannelSelector::from_config(&config, bridge.clone());
    let publisher = Arc::new(EquipmentEventPublisher::new(selector));
    tracing::info!("EquipmentEventPublisher initialized");

    let store: Arc<dyn FaceStore> = Arc::new(S3FaceStore::from_settings(&config.storage).await);
    let enrollment = Arc::new(EnrollmentService::new(
        store,
        publisher.clone(),
        Duration::from_secs(config.signed_url_ttl_secs),
    ));
    tracing::info!(bucket = %config.storage.bucket, "EnrollmentService initialized");

    let registry: Arc<dyn EquipmentUpdater> =
        Arc::new(RegistryClient::new(config.equipment_api_url.clone()));
    let door_timer = Arc::new(DoorTimer::new(
        registry.clone(),
        Duration::from_secs(config.auto_relock_secs),
    ));
    tracing::info!(
        auto_relock_secs = config.auto_relock_secs,
        "DoorTimer initialized"
    );

    // Create application state
    let state = AppState {
        config,
        bridge,
        publisher,
        enrollment,
        door_timer: door_timer.clone(),
        registry,
        system_health,
        started_at: chrono::Utc::now(),
    };

    // Create router
    let app = web_api::create_router(state.clone())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    // Start system health monitoring
    let health_monitor = state.system_health.clone();
    tokio::spawn(async move {
        use sysinfo::System;
        let mut sys = System::new_all();
        let mut interval = tokio::time::interval(Duration::from_secs(30));

        loop {
            interval.tick().await;
            sys.refresh_all();

            // Average CPU usage across all cores
            let cpu = {
                let cpus = sys.cpus();
                if cpus.is_empty() {
                    0.0
                } else {
                    cpus.iter().map(|c| c.cpu_usage()).sum::<f32>() / cpus.len() as f32
                }
            };
            let memory = if sys.total_memory() > 0 {
                (sys.used_memory() as f32 / sys.total_memory() as f32) * 100.0
            } else {
                0.0
            };

            let mut health = health_monitor.write().await;
            health.update(cpu, memory);
        }
    });

    // Start server
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Pending auto-relock deadlines die with the process either way; cancel
    // them explicitly so shutdown is quiet
    door_timer.shutdown().await;
    tracing::info!("RoomHub stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install shutdown signal handler");
        // Without a signal handler, keep serving until the process is killed
        std::future::pending::<()>().await;
    }
}
