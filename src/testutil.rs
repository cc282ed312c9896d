//! Shared test helpers for adapter unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Url;

use crate::config::AdapterConfig;
use crate::object_store::{
    ObjectMeta, ObjectStore, ObjectStoreError, PresignRequest, StorageClass, Verb,
};

/// Adapter configuration pointing at `test-bucket` with tiering disabled.
pub fn test_config() -> AdapterConfig {
    AdapterConfig {
        bucket: "test-bucket".to_string(),
        ..AdapterConfig::default()
    }
}

/// Owned copy of a presign request seen by [`RecordingStore`].
#[derive(Debug, Clone)]
pub struct RecordedPresign {
    pub bucket: String,
    pub key: String,
    pub verb: Verb,
    pub content_type: Option<String>,
    pub storage_class: Option<StorageClass>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// In-memory store that answers `head` from fixed tables and records every
/// presign call.
#[derive(Default)]
pub struct RecordingStore {
    objects: HashMap<String, u64>,
    failures: HashMap<String, (u16, String)>,
    presigned: Mutex<Vec<RecordedPresign>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(mut self, key: &str, size: u64) -> Self {
        self.objects.insert(key.to_string(), size);
        self
    }

    pub fn with_failure(mut self, key: &str, status: u16, message: &str) -> Self {
        self.failures
            .insert(key.to_string(), (status, message.to_string()));
        self
    }

    pub fn presigned(&self) -> Vec<RecordedPresign> {
        self.presigned.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for RecordingStore {
    async fn head(&self, _bucket: &str, key: &str) -> Result<ObjectMeta, ObjectStoreError> {
        if let Some((status, message)) = self.failures.get(key) {
            return Err(ObjectStoreError::Status {
                status: *status,
                message: message.clone(),
            });
        }
        self.objects
            .get(key)
            .map(|size| ObjectMeta { size: *size })
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))
    }

    fn presign(&self, request: &PresignRequest<'_>) -> Result<Url, ObjectStoreError> {
        self.presigned.lock().unwrap().push(RecordedPresign {
            bucket: request.bucket.to_string(),
            key: request.key.to_string(),
            verb: request.verb,
            content_type: request.content_type.map(str::to_string),
            storage_class: request.storage_class,
            issued_at: request.issued_at,
            expires_at: request.expires_at(),
        });
        let mut url = Url::parse("https://store.test/").unwrap();
        url.set_path(&format!("/{}/{}", request.bucket, request.key));
        Ok(url)
    }
}
