// Integration tests for the HTTP notification fallback and the equipment
// registry client, using wiremock.

use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use roomhub::enrollment::{EnrollmentService, FaceImage};
use roomhub::equipment_registry::{EquipmentUpdate, EquipmentUpdater, RegistryClient};
use roomhub::face_store::MemoryFaceStore;
use roomhub::notifier::channel::HttpNotifySettings;
use roomhub::notifier::{
    ChannelSelector, DeliveryError, DeliveryOutcome, DeliveryReport, EquipmentEvent,
    EquipmentEventPublisher, HttpChannel,
};
use roomhub::Error;

fn http_selector(server: &MockServer) -> ChannelSelector {
    let settings = HttpNotifySettings {
        enabled: true,
        register_url: format!("{}/register_user", server.uri()),
        delete_url: server.uri(),
    };
    ChannelSelector::new(None, Some(HttpChannel::new(&settings)))
}

fn images(count: usize) -> Vec<FaceImage> {
    (0..count)
        .map(|i| FaceImage {
            bytes: vec![i as u8; 8],
            ext: "jpg".to_string(),
        })
        .collect()
}

// ── Channel delivery ────────────────────────────────────────────────

#[tokio::test]
async fn test_register_notification_posts_name_and_urls() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/register_user"))
        .and(body_json(serde_json::json!({
            "name": "villaA-room3",
            "image_urls": ["u1", "u2"],
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let selector = http_selector(&server);
    let outcome = selector
        .deliver(&EquipmentEvent::FaceRegistered {
            user_id: "villaA-room3".to_string(),
            image_urls: vec!["u1".to_string(), "u2".to_string()],
        })
        .await
        .unwrap();

    assert_eq!(outcome, DeliveryOutcome::Http);
}

#[tokio::test]
async fn test_delete_notification_appends_subject_to_path() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/delete_user/guest-7"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let selector = http_selector(&server);
    let outcome = selector
        .deliver(&EquipmentEvent::FaceDeleted {
            user_id: "guest-7".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(outcome, DeliveryOutcome::Http);
}

#[tokio::test]
async fn test_delete_notification_substitutes_placeholder() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/controller/users/guest-7"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let settings = HttpNotifySettings {
        enabled: true,
        register_url: format!("{}/register_user", server.uri()),
        delete_url: format!("{}/controller/users/{{username}}", server.uri()),
    };
    let selector = ChannelSelector::new(None, Some(HttpChannel::new(&settings)));

    let outcome = selector
        .deliver(&EquipmentEvent::FaceDeleted {
            user_id: "guest-7".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(outcome, DeliveryOutcome::Http);
}

#[tokio::test]
async fn test_non_success_status_is_a_delivery_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/register_user"))
        .respond_with(ResponseTemplate::new(500).set_body_string("controller down"))
        .expect(1)
        .mount(&server)
        .await;

    let selector = http_selector(&server);
    let err = selector
        .deliver(&EquipmentEvent::FaceRegistered {
            user_id: "u1".to_string(),
            image_urls: vec![],
        })
        .await
        .unwrap_err();

    match err {
        DeliveryError::Status { status, body } => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(body, "controller down");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_lock_events_have_no_http_operation() {
    // No mocks mounted: any request would 404 and fail the delivery
    let server = MockServer::start().await;
    let selector = http_selector(&server);

    let outcome = selector
        .deliver(&EquipmentEvent::LockChanged {
            door_id: "D1".to_string(),
            lock_status: true,
            door_name: "Entrance".to_string(),
            room_name: "Room 3".to_string(),
            timestamp: chrono::Utc::now(),
        })
        .await
        .unwrap();

    assert_eq!(outcome, DeliveryOutcome::Skipped);
    assert!(server.received_requests().await.unwrap().is_empty());
}

// ── Enrollment pipeline over the HTTP channel ───────────────────────

#[tokio::test]
async fn test_register_emits_one_event_with_all_urls() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/register_user"))
        .and(body_partial_json(
            serde_json::json!({"name": "villaA-room3"}),
        ))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let publisher = Arc::new(EquipmentEventPublisher::new(http_selector(&server)));
    let service = EnrollmentService::new(
        Arc::new(MemoryFaceStore::new()),
        publisher,
        Duration::from_secs(900),
    );

    let outcome = service.register("villaA-room3", images(5)).await.unwrap();
    assert_eq!(outcome.image_urls.len(), 5);
    assert_eq!(outcome.delivery, DeliveryReport::Http);

    // Exactly one notification carrying all five signed URLs
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = requests[0].body_json().unwrap();
    assert_eq!(body["image_urls"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_delete_emits_one_event_for_nonempty_subject() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/register_user"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/delete_user/u1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let publisher = Arc::new(EquipmentEventPublisher::new(http_selector(&server)));
    let service = EnrollmentService::new(
        Arc::new(MemoryFaceStore::new()),
        publisher,
        Duration::from_secs(900),
    );

    service.register("u1", images(5)).await.unwrap();
    let outcome = service.delete("u1").await.unwrap();
    assert_eq!(outcome.deleted, 5);
    assert_eq!(outcome.delivery, Some(DeliveryReport::Http));
}

#[tokio::test]
async fn test_delete_of_empty_subject_sends_nothing() {
    let server = MockServer::start().await;

    let publisher = Arc::new(EquipmentEventPublisher::new(http_selector(&server)));
    let service = EnrollmentService::new(
        Arc::new(MemoryFaceStore::new()),
        publisher,
        Duration::from_secs(900),
    );

    let outcome = service.delete("nobody").await.unwrap();
    assert_eq!(outcome.deleted, 0);
    assert!(outcome.delivery.is_none());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delivery_failure_does_not_fail_register() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/register_user"))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&server)
        .await;

    let publisher = Arc::new(EquipmentEventPublisher::new(http_selector(&server)));
    let store = Arc::new(MemoryFaceStore::new());
    let service = EnrollmentService::new(store.clone(), publisher, Duration::from_secs(900));

    // Data saved, notification failed: the call still succeeds and the
    // report carries the failure
    let outcome = service.register("u1", images(5)).await.unwrap();
    assert_eq!(outcome.image_urls.len(), 5);
    assert!(matches!(outcome.delivery, DeliveryReport::Failed { .. }));
    assert_eq!(store.keys().await.len(), 5);
}

// ── Equipment registry client ───────────────────────────────────────

#[tokio::test]
async fn test_registry_update_patches_partial_fields() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/equipments/door-12"))
        .and(body_json(serde_json::json!({"lockStatus": true})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = RegistryClient::new(server.uri());
    client
        .update("door-12", EquipmentUpdate::lock(true))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_registry_error_status_surfaces_as_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/equipments/door-12"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let client = RegistryClient::new(server.uri());
    let err = client
        .update("door-12", EquipmentUpdate::lock(true))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Api(_)));
}
