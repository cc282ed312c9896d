mod local;
mod s3;
mod signing;

pub use local::{LocalStore, VerifiedAccess};
pub use s3::S3Store;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Url;
use thiserror::Error;

use crate::config::{StorageBackend, StorageConfig};

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Invalid object key: {0}")]
    InvalidKey(String),
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error("Backend error: {0}")]
    Backend(String),
}

impl ObjectStoreError {
    /// Numeric HTTP-style status reported to callers for this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            ObjectStoreError::NotFound(_) => 404,
            ObjectStoreError::InvalidKey(_) => 400,
            ObjectStoreError::Status { status, .. } => *status,
            ObjectStoreError::Io(_) => 500,
            ObjectStoreError::Backend(_) => 503,
        }
    }
}

/// HTTP verb a pre-signed URL is valid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Put,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Put => "PUT",
        }
    }
}

impl FromStr for Verb {
    type Err = ObjectStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Verb::Get),
            "PUT" => Ok(Verb::Put),
            other => Err(ObjectStoreError::Status {
                status: 405,
                message: format!("Unsupported method: {other}"),
            }),
        }
    }
}

/// Storage tier requested for an uploaded object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    IntelligentTiering,
    StandardIa,
    OnezoneIa,
    GlacierIr,
}

impl StorageClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageClass::IntelligentTiering => "INTELLIGENT_TIERING",
            StorageClass::StandardIa => "STANDARD_IA",
            StorageClass::OnezoneIa => "ONEZONE_IA",
            StorageClass::GlacierIr => "GLACIER_IR",
        }
    }
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "INTELLIGENT_TIERING" => Ok(StorageClass::IntelligentTiering),
            "STANDARD_IA" => Ok(StorageClass::StandardIa),
            "ONEZONE_IA" => Ok(StorageClass::OnezoneIa),
            "GLACIER_IR" => Ok(StorageClass::GlacierIr),
            other => Err(format!("unknown storage class '{other}'")),
        }
    }
}

/// Object metadata returned by `head`, without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectMeta {
    pub size: u64,
}

/// Everything a backend needs to sign one URL.
#[derive(Debug, Clone)]
pub struct PresignRequest<'a> {
    pub bucket: &'a str,
    pub key: &'a str,
    pub verb: Verb,
    pub content_type: Option<&'a str>,
    pub issued_at: DateTime<Utc>,
    pub expires_in: Duration,
    pub storage_class: Option<StorageClass>,
}

impl PresignRequest<'_> {
    /// Absolute instant after which the backend rejects the URL.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.issued_at + chrono::Duration::seconds(self.expires_in.as_secs() as i64)
    }
}

/// Storage capability the blob adapter depends on.
///
/// `head` is the only network operation. `presign` is local and synchronous:
/// it signs with credentials the store already holds. Its only failure is
/// `InvalidKey`, for keys the backend cannot address by URL as written.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn head(&self, bucket: &str, key: &str) -> Result<ObjectMeta, ObjectStoreError>;
    fn presign(&self, request: &PresignRequest<'_>) -> Result<Url, ObjectStoreError>;
}

/// Build the configured storage backend.
pub fn from_config(storage: &StorageConfig) -> Result<Arc<dyn ObjectStore>, anyhow::Error> {
    let store: Arc<dyn ObjectStore> = match storage.backend {
        StorageBackend::S3 => {
            let store = S3Store::new(&storage.s3)?;
            tracing::info!(region = %storage.s3.region, "Using S3 storage backend");
            Arc::new(store)
        }
        StorageBackend::Local => {
            let public_url = storage
                .local
                .public_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("LOCAL_PUBLIC_URL is required for local storage"))?;
            let signing_key = storage
                .local
                .signing_key
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("LOCAL_SIGNING_KEY is required for local storage"))?;
            let store = LocalStore::new(&storage.local.path, public_url, signing_key.as_bytes())?;
            tracing::info!(
                "Using local storage backend at: {}",
                storage.local.path
            );
            Arc::new(store)
        }
    };
    Ok(store)
}
