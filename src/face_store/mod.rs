//! FaceStore - Object Storage Adapter for Enrollment Images
//!
//! ## 概要
//! 生体登録画像のオブジェクトストレージ入出力を担当する。
//! - アップロード / プレフィックス一覧 / 一括削除
//! - 時限付き署名付き取得URLの発行（毎回新規発行、キャッシュしない）
//!
//! ## キー設計
//! `faces/{subjectId}/face_{i}.{ext}` - 序数 i (1..=5) はキーに埋め込まれ、
//! 登録呼び出しをまたいで安定
//!
//! Backends: S3-compatible endpoints (MinIO included) via aws-sdk-s3, and an
//! in-memory store for tests and local development.

use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Object storage settings
#[derive(Debug, Clone)]
pub struct StorageSettings {
    /// Custom endpoint (MinIO etc.); None uses the AWS default resolution
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            endpoint: std::env::var("S3_ENDPOINT").ok(),
            region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            bucket: std::env::var("S3_BUCKET").unwrap_or_else(|_| "villa-faces".to_string()),
            access_key: std::env::var("S3_ACCESS_KEY").ok(),
            secret_key: std::env::var("S3_SECRET_KEY").ok(),
        }
    }
}

/// Storage-layer errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("upload failed for {key}: {message}")]
    Upload { key: String, message: String },
    #[error("list failed for prefix {prefix}: {message}")]
    List { prefix: String, message: String },
    #[error("delete failed: {message}")]
    Delete { message: String },
    #[error("presign failed for {key}: {message}")]
    Presign { key: String, message: String },
}

impl From<StoreError> for crate::Error {
    fn from(e: StoreError) -> Self {
        crate::Error::Storage(e.to_string())
    }
}

/// Storage key for one enrollment image; ordinal is 1-based
pub fn face_key(subject_id: &str, ordinal: usize, ext: &str) -> String {
    format!("faces/{subject_id}/face_{ordinal}.{ext}")
}

/// Prefix holding all of a subject's enrollment images
pub fn subject_prefix(subject_id: &str) -> String {
    format!("faces/{subject_id}/")
}

/// Object storage operations needed by the enrollment pipeline
#[async_trait]
pub trait FaceStore: Send + Sync {
    /// Upload one object
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StoreError>;

    /// List object keys under a prefix
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Delete the given objects; empty input is a no-op
    async fn delete_all(&self, keys: &[String]) -> Result<(), StoreError>;

    /// Mint a time-limited signed retrieval URL for one object
    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String, StoreError>;
}

/// S3-compatible implementation
pub struct S3FaceStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3FaceStore {
    /// Build a client from settings
    ///
    /// Path-style addressing is forced so that bucket-per-host DNS is not
    /// required (MinIO default deployment).
    pub async fn from_settings(settings: &StorageSettings) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()));
        if let Some(endpoint) = &settings.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        if let (Some(access_key), Some(secret_key)) =
            (&settings.access_key, &settings.secret_key)
        {
            loader = loader.credentials_provider(Credentials::new(
                access_key.clone(),
                secret_key.clone(),
                None,
                None,
                "roomhub-static",
            ));
        }
        let shared = loader.load().await;
        let config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(true)
            .build();

        Self {
            client: aws_sdk_s3::Client::from_conf(config),
            bucket: settings.bucket.clone(),
        }
    }
}

#[async_trait]
impl FaceStore for S3FaceStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StoreError> {
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StoreError::Upload {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        debug!(key = %key, size = size, "Object uploaded");
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .send()
            .await
            .map_err(|e| StoreError::List {
                prefix: prefix.to_string(),
                message: e.to_string(),
            })?;

        Ok(output
            .contents()
            .iter()
            .filter_map(|object| object.key().map(str::to_string))
            .collect())
    }

    async fn delete_all(&self, keys: &[String]) -> Result<(), StoreError> {
        if keys.is_empty() {
            return Ok(());
        }

        let objects = keys
            .iter()
            .map(|key| {
                ObjectIdentifier::builder()
                    .key(key)
                    .build()
                    .map_err(|e| StoreError::Delete {
                        message: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .build()
            .map_err(|e| StoreError::Delete {
                message: e.to_string(),
            })?;

        self.client
            .delete_objects()
            .bucket(&self.bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| StoreError::Delete {
                message: e.to_string(),
            })?;

        debug!(count = keys.len(), "Objects deleted");
        Ok(())
    }

    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String, StoreError> {
        let presign_config =
            PresigningConfig::expires_in(ttl).map_err(|e| StoreError::Presign {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| StoreError::Presign {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        Ok(presigned.uri().to_string())
    }
}

/// In-memory store for tests and local development
///
/// Supports injecting a failure at the Nth upload to exercise the
/// partial-failure path of the enrollment pipeline.
#[derive(Default)]
pub struct MemoryFaceStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    /// 1-based upload ordinal that fails; None never fails
    fail_put_at: Option<usize>,
    puts: Mutex<usize>,
}

impl MemoryFaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose Nth `put` (1-based) fails
    pub fn failing_at(n: usize) -> Self {
        Self {
            fail_put_at: Some(n),
            ..Self::default()
        }
    }

    /// Number of stored objects
    pub async fn len(&self) -> usize {
        self.objects.lock().await.len()
    }

    /// Stored keys, sorted
    pub async fn keys(&self) -> Vec<String> {
        self.objects.lock().await.keys().cloned().collect()
    }
}

#[async_trait]
impl FaceStore for MemoryFaceStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<(), StoreError> {
        let mut puts = self.puts.lock().await;
        *puts += 1;
        if self.fail_put_at == Some(*puts) {
            return Err(StoreError::Upload {
                key: key.to_string(),
                message: "injected upload failure".to_string(),
            });
        }
        drop(puts);

        self.objects.lock().await.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .objects
            .lock()
            .await
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn delete_all(&self, keys: &[String]) -> Result<(), StoreError> {
        let mut objects = self.objects.lock().await;
        for key in keys {
            objects.remove(key);
        }
        Ok(())
    }

    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String, StoreError> {
        if !self.objects.lock().await.contains_key(key) {
            return Err(StoreError::Presign {
                key: key.to_string(),
                message: "object not found".to_string(),
            });
        }
        Ok(format!("memory:///{key}?expires={}", ttl.as_secs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_key_embeds_ordinal() {
        assert_eq!(
            face_key("villaA-room3", 1, "jpg"),
            "faces/villaA-room3/face_1.jpg"
        );
        assert_eq!(
            face_key("villaA-room3", 5, "png"),
            "faces/villaA-room3/face_5.png"
        );
    }

    #[test]
    fn test_subject_prefix() {
        assert_eq!(subject_prefix("u1"), "faces/u1/");
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryFaceStore::new();
        store
            .put("faces/u1/face_1.jpg", vec![1, 2, 3], "image/jpeg")
            .await
            .unwrap();
        store
            .put("faces/u2/face_1.jpg", vec![4], "image/jpeg")
            .await
            .unwrap();

        let listed = store.list("faces/u1/").await.unwrap();
        assert_eq!(listed, vec!["faces/u1/face_1.jpg".to_string()]);

        let url = store
            .presign_get("faces/u1/face_1.jpg", Duration::from_secs(900))
            .await
            .unwrap();
        assert!(url.contains("expires=900"));

        store.delete_all(&listed).await.unwrap();
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_memory_store_injected_failure() {
        let store = MemoryFaceStore::failing_at(2);
        store.put("k1", vec![0], "image/jpeg").await.unwrap();
        let err = store.put("k2", vec![0], "image/jpeg").await.unwrap_err();
        assert!(matches!(err, StoreError::Upload { .. }));
        // Later uploads succeed again
        store.put("k3", vec![0], "image/jpeg").await.unwrap();
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_memory_store_presign_missing_object() {
        let store = MemoryFaceStore::new();
        let err = store
            .presign_get("faces/u1/face_1.jpg", Duration::from_secs(900))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Presign { .. }));
    }
}
