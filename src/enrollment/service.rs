//! Enrollment service

use super::types::{DeleteOutcome, FaceImage, RegisterOutcome, REQUIRED_IMAGE_COUNT};
use crate::error::{Error, Result};
use crate::face_store::{face_key, subject_prefix, FaceStore};
use crate::notifier::{DeliveryReport, EquipmentEventPublisher};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Provisions enrollment image sets to object storage and triggers
/// controller notification
pub struct EnrollmentService {
    store: Arc<dyn FaceStore>,
    publisher: Arc<EquipmentEventPublisher>,
    signed_url_ttl: Duration,
}

impl EnrollmentService {
    pub fn new(
        store: Arc<dyn FaceStore>,
        publisher: Arc<EquipmentEventPublisher>,
        signed_url_ttl: Duration,
    ) -> Self {
        Self {
            store,
            publisher,
            signed_url_ttl,
        }
    }

    /// Register a subject's enrollment image set
    ///
    /// Validates before any I/O, uploads strictly sequentially (ordinal key
    /// assignment stays deterministic and partial failures are easy to
    /// diagnose), mints one signed URL per object and emits a single
    /// face_registered event. Delivery failure does not fail the call; it is
    /// folded into the returned report.
    pub async fn register(
        &self,
        subject_id: &str,
        images: Vec<FaceImage>,
    ) -> Result<RegisterOutcome> {
        validate_subject_id(subject_id)?;
        if images.len() != REQUIRED_IMAGE_COUNT {
            return Err(Error::Validation(format!(
                "expected exactly {} enrollment images, got {}",
                REQUIRED_IMAGE_COUNT,
                images.len()
            )));
        }

        let mut uploaded: Vec<String> = Vec::with_capacity(REQUIRED_IMAGE_COUNT);
        for (index, image) in images.into_iter().enumerate() {
            let content_type = image.content_type();
            let key = face_key(subject_id, index + 1, &image.ext);
            if let Err(e) = self.store.put(&key, image.bytes, content_type).await {
                warn!(
                    subject_id = %subject_id,
                    key = %key,
                    uploaded = uploaded.len(),
                    error = %e,
                    "Upload failed mid-sequence, removing already-uploaded images"
                );
                if let Err(cleanup) = self.store.delete_all(&uploaded).await {
                    warn!(
                        subject_id = %subject_id,
                        error = %cleanup,
                        "Compensating cleanup failed; orphaned objects remain under subject prefix"
                    );
                }
                return Err(e.into());
            }
            uploaded.push(key);
        }

        // Freshly minted on every call; never cached across calls
        let mut image_urls = Vec::with_capacity(uploaded.len());
        for key in &uploaded {
            image_urls.push(self.store.presign_get(key, self.signed_url_ttl).await?);
        }

        let delivery = DeliveryReport::from_result(
            self.publisher
                .face_registered(subject_id, image_urls.clone())
                .await,
        );

        info!(
            subject_id = %subject_id,
            images = uploaded.len(),
            delivery = %delivery,
            "Enrollment images provisioned"
        );

        Ok(RegisterOutcome {
            image_urls,
            delivery,
        })
    }

    /// Remove a subject's enrollment image set
    ///
    /// An empty prefix returns `deleted: 0` and emits no event.
    pub async fn delete(&self, subject_id: &str) -> Result<DeleteOutcome> {
        validate_subject_id(subject_id)?;

        let prefix = subject_prefix(subject_id);
        let keys = self.store.list(&prefix).await?;
        if keys.is_empty() {
            info!(subject_id = %subject_id, "No enrollment images stored, nothing to delete");
            return Ok(DeleteOutcome {
                deleted: 0,
                delivery: None,
            });
        }

        self.store.delete_all(&keys).await?;

        let delivery =
            DeliveryReport::from_result(self.publisher.face_deleted(subject_id).await);

        info!(
            subject_id = %subject_id,
            deleted = keys.len(),
            delivery = %delivery,
            "Enrollment images removed"
        );

        Ok(DeleteOutcome {
            deleted: keys.len(),
            delivery: Some(delivery),
        })
    }
}

/// Subject ids are embedded in storage keys and URL paths
fn validate_subject_id(subject_id: &str) -> Result<()> {
    if subject_id.is_empty() {
        return Err(Error::Validation("subject id must not be empty".to_string()));
    }
    if subject_id.contains('/') || subject_id.contains(char::is_whitespace) {
        return Err(Error::Validation(format!(
            "subject id contains invalid characters: {subject_id}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face_store::MemoryFaceStore;
    use crate::notifier::ChannelSelector;

    fn publisher() -> Arc<EquipmentEventPublisher> {
        // No channels configured: deliveries resolve to Skipped
        Arc::new(EquipmentEventPublisher::new(ChannelSelector::new(
            None, None,
        )))
    }

    fn service(store: Arc<MemoryFaceStore>) -> EnrollmentService {
        EnrollmentService::new(store, publisher(), Duration::from_secs(900))
    }

    fn images(count: usize) -> Vec<FaceImage> {
        (0..count)
            .map(|i| FaceImage {
                bytes: vec![i as u8; 16],
                ext: "jpg".to_string(),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_register_rejects_wrong_image_count_before_io() {
        let store = Arc::new(MemoryFaceStore::new());
        let service = service(store.clone());

        for count in [0, 4, 6] {
            let err = service.register("villaA-room3", images(count)).await.unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "count {count}");
        }
        assert_eq!(store.len().await, 0, "no objects may be uploaded");
    }

    #[tokio::test]
    async fn test_register_rejects_bad_subject_id() {
        let store = Arc::new(MemoryFaceStore::new());
        let service = service(store.clone());

        let err = service.register("", images(5)).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = service.register("a/b", images(5)).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_register_uploads_ordinal_keys_and_mints_urls() {
        let store = Arc::new(MemoryFaceStore::new());
        let service = service(store.clone());

        let outcome = service.register("villaA-room3", images(5)).await.unwrap();

        assert_eq!(outcome.image_urls.len(), 5);
        assert!(outcome.image_urls.iter().all(|url| url.contains("expires=900")));
        assert_eq!(outcome.delivery, DeliveryReport::Skipped);

        let keys = store.keys().await;
        assert_eq!(
            keys,
            vec![
                "faces/villaA-room3/face_1.jpg",
                "faces/villaA-room3/face_2.jpg",
                "faces/villaA-room3/face_3.jpg",
                "faces/villaA-room3/face_4.jpg",
                "faces/villaA-room3/face_5.jpg",
            ]
        );
    }

    #[tokio::test]
    async fn test_register_mid_failure_compensates_uploads() {
        let store = Arc::new(MemoryFaceStore::failing_at(3));
        let service = service(store.clone());

        let err = service.register("u1", images(5)).await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));

        // The two objects uploaded before the failure were cleaned up
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_delete_empty_subject_emits_nothing() {
        let store = Arc::new(MemoryFaceStore::new());
        let service = service(store);

        let outcome = service.delete("nobody").await.unwrap();
        assert_eq!(outcome.deleted, 0);
        assert!(outcome.delivery.is_none());
    }

    #[tokio::test]
    async fn test_delete_removes_all_and_reports_count() {
        let store = Arc::new(MemoryFaceStore::new());
        let service = service(store.clone());

        service.register("u1", images(5)).await.unwrap();
        // Another subject's images must survive
        service.register("u2", images(5)).await.unwrap();

        let outcome = service.delete("u1").await.unwrap();
        assert_eq!(outcome.deleted, 5);
        assert_eq!(outcome.delivery, Some(DeliveryReport::Skipped));

        assert_eq!(store.list("faces/u1/").await.unwrap().len(), 0);
        assert_eq!(store.list("faces/u2/").await.unwrap().len(), 5);
    }
}
