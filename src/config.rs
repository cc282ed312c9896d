use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::object_store::StorageClass;

/// Longest lifetime SigV4 allows for a presigned URL.
pub const MAX_URL_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub adapter: AdapterConfig,
    pub storage: StorageConfig,
}

/// Read-only settings shared by every adapter call.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    pub bucket: String,
    /// Prepended verbatim to every oid to form the storage key.
    pub key_prefix: String,
    /// Lifetime of issued URLs.
    pub expiry: Duration,
    /// Uploads strictly larger than this many bytes get `tiering_class`.
    /// Negative disables tiering.
    pub tiering_min_size: i64,
    pub tiering_class: StorageClass,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Local,
    S3,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub s3: S3Config,
    pub local: LocalConfig,
}

#[derive(Clone)]
pub struct S3Config {
    pub region: String,
    /// Custom endpoint for S3-compatible services. Defaults to the AWS regional endpoint.
    pub endpoint: Option<String>,
    /// Address buckets as `<endpoint>/<bucket>` instead of `<bucket>.<endpoint>`.
    pub path_style: bool,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
}

#[derive(Clone)]
pub struct LocalConfig {
    /// Directory holding `<bucket>/<key>` files
    pub path: String,
    /// HTTPS base URL the files are served under
    pub public_url: Option<String>,
    pub signing_key: Option<String>,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            key_prefix: String::new(),
            expiry: Duration::from_secs(3600),
            tiering_min_size: -1,
            tiering_class: StorageClass::IntelligentTiering,
        }
    }
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            endpoint: None,
            path_style: false,
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
        }
    }
}

impl fmt::Debug for S3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Config")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("path_style", &self.path_style)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &self.secret_access_key.as_ref().map(|_| "<redacted>"))
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl fmt::Debug for LocalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalConfig")
            .field("path", &self.path)
            .field("public_url", &self.public_url)
            .field("signing_key", &self.signing_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            path: "./blobs".to_string(),
            public_url: None,
            signing_key: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bucket = lookup("LFS_BUCKET").unwrap_or_default();
        let key_prefix = lookup("LFS_KEY_PREFIX").unwrap_or_default();

        let expiry = lookup("LFS_URL_EXPIRY_SECS")
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(3600));

        let tiering_min_size = lookup("LFS_TIERING_MIN_SIZE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(-1);

        let tiering_class = match lookup("LFS_TIERING_CLASS") {
            Some(class) => class.parse().map_err(ConfigError::ValidationError)?,
            None => StorageClass::IntelligentTiering,
        };

        let backend = match lookup("STORAGE_BACKEND")
            .unwrap_or_else(|| "s3".to_string())
            .to_lowercase()
            .as_str()
        {
            "local" => StorageBackend::Local,
            _ => StorageBackend::S3,
        };

        let path_style = lookup("S3_FORCE_PATH_STYLE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let config = Config {
            adapter: AdapterConfig {
                bucket,
                key_prefix,
                expiry,
                tiering_min_size,
                tiering_class,
            },
            storage: StorageConfig {
                backend,
                s3: S3Config {
                    region: lookup("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
                    endpoint: lookup("S3_ENDPOINT"),
                    path_style,
                    access_key_id: lookup("AWS_ACCESS_KEY_ID"),
                    secret_access_key: lookup("AWS_SECRET_ACCESS_KEY"),
                    session_token: lookup("AWS_SESSION_TOKEN"),
                },
                local: LocalConfig {
                    path: lookup("LOCAL_STORAGE_PATH").unwrap_or_else(|| "./blobs".to_string()),
                    public_url: lookup("LOCAL_PUBLIC_URL"),
                    signing_key: lookup("LOCAL_SIGNING_KEY"),
                },
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.adapter.bucket.is_empty() {
            return Err(ConfigError::ValidationError(
                "LFS_BUCKET cannot be empty".to_string(),
            ));
        }

        if self.adapter.expiry.is_zero() || self.adapter.expiry > MAX_URL_EXPIRY {
            return Err(ConfigError::ValidationError(format!(
                "LFS_URL_EXPIRY_SECS must be between 1 and {}",
                MAX_URL_EXPIRY.as_secs()
            )));
        }

        match self.storage.backend {
            StorageBackend::S3 => {
                if self.storage.s3.access_key_id.is_none()
                    || self.storage.s3.secret_access_key.is_none()
                {
                    return Err(ConfigError::ValidationError(
                        "AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY are required when STORAGE_BACKEND=s3"
                            .to_string(),
                    ));
                }
                if let Some(ref endpoint) = self.storage.s3.endpoint {
                    require_https("S3_ENDPOINT", endpoint)?;
                }
            }
            StorageBackend::Local => {
                let public_url = self.storage.local.public_url.as_deref().ok_or_else(|| {
                    ConfigError::ValidationError(
                        "LOCAL_PUBLIC_URL is required when STORAGE_BACKEND=local".to_string(),
                    )
                })?;
                require_https("LOCAL_PUBLIC_URL", public_url)?;
                if self
                    .storage
                    .local
                    .signing_key
                    .as_deref()
                    .map_or(true, str::is_empty)
                {
                    return Err(ConfigError::ValidationError(
                        "LOCAL_SIGNING_KEY is required when STORAGE_BACKEND=local".to_string(),
                    ));
                }
            }
        }

        if self.adapter.tiering_min_size < 0 {
            tracing::debug!("Storage tiering disabled");
        }

        Ok(())
    }
}

fn require_https(name: &str, url: &str) -> Result<(), ConfigError> {
    if !url.starts_with("https://") {
        return Err(ConfigError::ValidationError(format!(
            "{name} must be an https URL, got '{url}'"
        )));
    }
    Ok(())
}
