//! Issues pre-signed upload and download URLs for content-addressed blobs.

mod models;

pub use models::{BlobFailure, SignedBlob, SignedUrl};

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{SubsecRound, Utc};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{AdapterConfig, Config};
use crate::object_store::{self, ObjectStore, ObjectStoreError, PresignRequest, StorageClass, Verb};
use crate::UPLOAD_CONTENT_TYPE;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdapterError {
    #[error("Operation cancelled by caller")]
    Cancelled,
    /// The backend cannot express the storage key as a URL.
    #[error("Cannot issue URL for key '{key}': {message}")]
    Unsignable { key: String, message: String },
}

/// Turns an oid into a bounded-lifetime URL on the configured backend.
///
/// Holds no mutable state; clones share the same store and configuration.
#[derive(Clone)]
pub struct BlobAdapter {
    store: Arc<dyn ObjectStore>,
    config: Arc<AdapterConfig>,
}

impl BlobAdapter {
    pub fn new(store: Arc<dyn ObjectStore>, config: Arc<AdapterConfig>) -> Self {
        Self { store, config }
    }

    /// Build the configured backend and wrap it in an adapter.
    pub fn from_config(config: &Config) -> Result<Self, anyhow::Error> {
        let store = object_store::from_config(&config.storage)?;
        Ok(Self::new(store, Arc::new(config.adapter.clone())))
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Storage key for an oid. The prefix is prepended verbatim.
    pub fn object_key(&self, oid: &str) -> String {
        format!("{}{}", self.config.key_prefix, oid)
    }

    /// Issue a PUT URL. Signing is local, so this never touches the backend.
    ///
    /// `size` is the declared upload size and only drives the tiering decision.
    /// Fails only when the backend cannot address the key, e.g. one with a
    /// `..` segment.
    pub fn upload(&self, oid: &str, size: Option<u64>) -> Result<SignedUrl, AdapterError> {
        let key = self.object_key(oid);
        let storage_class = tiering_class(
            size,
            self.config.tiering_min_size,
            self.config.tiering_class,
        );

        debug!(oid, key = %key, size, storage_class = ?storage_class, "Issuing upload URL");

        let mut signed = self
            .sign(&key, Verb::Put, Some(UPLOAD_CONTENT_TYPE), storage_class)
            .map_err(|e| {
                warn!(oid, key = %key, error = %e, "Cannot sign upload URL");
                AdapterError::Unsignable {
                    key: key.clone(),
                    message: e.to_string(),
                }
            })?;
        signed.headers = Some(HashMap::from([(
            "Content-Type".to_string(),
            UPLOAD_CONTENT_TYPE.to_string(),
        )]));
        Ok(signed)
    }

    /// Look the object up on the backend, then issue a GET URL.
    ///
    /// Backend failures come back as [`SignedBlob::Failed`]. Cancelling `cancel`
    /// abandons the lookup and yields [`AdapterError::Cancelled`].
    pub async fn download(
        &self,
        oid: &str,
        cancel: &CancellationToken,
    ) -> Result<SignedBlob, AdapterError> {
        let key = self.object_key(oid);

        let meta = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(oid, key = %key, "Download lookup cancelled");
                return Err(AdapterError::Cancelled);
            }
            result = self.store.head(&self.config.bucket, &key) => result,
        };

        let signed = meta.and_then(|meta| {
            debug!(oid, key = %key, size = meta.size, "Issuing download URL");
            let mut signed = self.sign(&key, Verb::Get, None, None)?;
            signed.size = Some(meta.size);
            Ok(signed)
        });

        match signed {
            Ok(signed) => Ok(signed.into()),
            Err(e) => {
                let code = e.status_code();
                warn!(oid, key = %key, code, error = %e, "Download failed");
                Ok(SignedBlob::Failed(BlobFailure {
                    code,
                    message: e.to_string(),
                }))
            }
        }
    }

    fn sign(
        &self,
        key: &str,
        verb: Verb,
        content_type: Option<&str>,
        storage_class: Option<StorageClass>,
    ) -> Result<SignedUrl, ObjectStoreError> {
        // SigV4 dates have second resolution
        let request = PresignRequest {
            bucket: &self.config.bucket,
            key,
            verb,
            content_type,
            issued_at: Utc::now().trunc_subsecs(0),
            expires_in: self.config.expiry,
            storage_class,
        };

        Ok(SignedUrl {
            url: self.store.presign(&request)?,
            headers: None,
            size: None,
            expires_at: request.expires_at(),
            expires_in: self.config.expiry.as_secs(),
        })
    }
}

/// Storage class for an upload of `size` bytes, given a minimum size threshold.
///
/// Fires only when the size is known, the threshold is non-negative, and the
/// size is strictly greater than it.
pub fn tiering_class(
    size: Option<u64>,
    min_size: i64,
    class: StorageClass,
) -> Option<StorageClass> {
    let size = size?;
    let min_size = u64::try_from(min_size).ok()?;
    (size > min_size).then_some(class)
}
