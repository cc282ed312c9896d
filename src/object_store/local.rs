use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use reqwest::Url;
use ring::hmac;

use super::signing::{uri_decode, uri_encode};
use super::{ObjectMeta, ObjectStore, ObjectStoreError, PresignRequest, StorageClass, Verb};

/// Local filesystem object store for development and testing.
///
/// Objects live at `<base_path>/<bucket>/<key>`. Signed URLs point at
/// `<public_url>/<bucket>/<key>` and carry an HMAC-SHA256 signature that the
/// process serving those files checks with [`LocalStore::verify`].
pub struct LocalStore {
    base_path: PathBuf,
    public_url: Url,
    signing_key: hmac::Key,
}

/// A signed request that passed [`LocalStore::verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedAccess {
    pub verb: Verb,
    pub path: PathBuf,
    /// Content type the client must send, when one was signed in.
    pub content_type: Option<String>,
    pub storage_class: Option<StorageClass>,
}

impl LocalStore {
    pub fn new<P: AsRef<Path>>(
        base_path: P,
        public_url: &str,
        signing_key: &[u8],
    ) -> Result<Self, anyhow::Error> {
        let public_url = Url::parse(public_url)?;
        if public_url.scheme() != "https" {
            anyhow::bail!("Local storage public URL must use https: {public_url}");
        }
        if signing_key.is_empty() {
            anyhow::bail!("Local storage signing key must not be empty");
        }

        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;

        Ok(Self {
            base_path,
            public_url,
            signing_key: hmac::Key::new(hmac::HMAC_SHA256, signing_key),
        })
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, ObjectStoreError> {
        if !is_plain_segment(bucket) {
            return Err(ObjectStoreError::InvalidKey(format!("{bucket}/{key}")));
        }
        let mut path = self.base_path.join(bucket);
        for segment in key.split('/') {
            if !is_plain_segment(segment) {
                return Err(ObjectStoreError::InvalidKey(key.to_string()));
            }
            path.push(segment);
        }
        Ok(path)
    }

    fn base_url_path(&self) -> &str {
        self.public_url.path().trim_end_matches('/')
    }

    fn url_path(&self, bucket: &str, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url_path(),
            uri_encode(bucket, false),
            uri_encode(key, true)
        )
    }

    /// Check a URL produced by [`ObjectStore::presign`] against the method the
    /// client actually used. Failures are reported as 403.
    pub fn verify(
        &self,
        url: &Url,
        method: &str,
        now: DateTime<Utc>,
    ) -> Result<VerifiedAccess, ObjectStoreError> {
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
        let param = |name: &str| {
            params
                .get(name)
                .ok_or_else(|| forbidden(format!("Missing {name} parameter")))
        };

        let signed_method = param("method")?;
        let expires = param("expires")?;
        let signature = param("signature")?;
        let content_type = params.get("content-type").map(String::as_str);
        let storage_class = params.get("storage-class").map(String::as_str);

        if signed_method != method {
            return Err(forbidden(format!(
                "URL is signed for {signed_method}, not {method}"
            )));
        }
        let verb: Verb = signed_method.parse()?;

        let signature = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| forbidden("Malformed signature"))?;
        let message = string_to_sign(signed_method, url.path(), expires, content_type, storage_class);
        hmac::verify(&self.signing_key, message.as_bytes(), &signature)
            .map_err(|_| forbidden("Signature mismatch"))?;

        let expires: i64 = expires
            .parse()
            .map_err(|_| forbidden("Malformed expires parameter"))?;
        if now.timestamp() > expires {
            return Err(forbidden("URL has expired"));
        }

        let object = url
            .path()
            .strip_prefix(self.base_url_path())
            .and_then(|rest| rest.strip_prefix('/'))
            .and_then(|rest| rest.split_once('/'))
            .ok_or_else(|| forbidden("URL does not address an object"))?;
        let bucket = uri_decode(object.0).ok_or_else(|| forbidden("Malformed bucket"))?;
        let key = uri_decode(object.1).ok_or_else(|| forbidden("Malformed key"))?;

        Ok(VerifiedAccess {
            verb,
            path: self.object_path(&bucket, &key)?,
            content_type: content_type.map(str::to_string),
            storage_class: storage_class.and_then(|c| c.parse().ok()),
        })
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn head(&self, bucket: &str, key: &str) -> Result<ObjectMeta, ObjectStoreError> {
        let path = self.object_path(bucket, key)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(ObjectMeta { size: meta.len() }),
            Ok(_) => Err(ObjectStoreError::NotFound(key.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ObjectStoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn presign(&self, request: &PresignRequest<'_>) -> Result<Url, ObjectStoreError> {
        // a URL for a key with no file path could never pass `verify`
        self.object_path(request.bucket, request.key)?;
        let path = self.url_path(request.bucket, request.key);
        let method = request.verb.as_str();
        let expires = request.expires_at().timestamp().to_string();
        let storage_class = request.storage_class.map(|c| c.as_str());

        let mut query = format!("method={method}&expires={expires}");
        if let Some(content_type) = request.content_type {
            query.push_str(&format!("&content-type={}", uri_encode(content_type, false)));
        }
        if let Some(class) = storage_class {
            query.push_str(&format!("&storage-class={class}"));
        }

        let message = string_to_sign(method, &path, &expires, request.content_type, storage_class);
        let signature = hmac::sign(&self.signing_key, message.as_bytes());
        query.push_str(&format!(
            "&signature={}",
            base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(signature.as_ref())
        ));

        let mut url = self.public_url.clone();
        url.set_path(&path);
        url.set_query(Some(&query));
        Ok(url)
    }
}

fn string_to_sign(
    method: &str,
    path: &str,
    expires: &str,
    content_type: Option<&str>,
    storage_class: Option<&str>,
) -> String {
    format!(
        "{method}\n{path}\n{expires}\n{}\n{}",
        content_type.unwrap_or_default(),
        storage_class.unwrap_or_default()
    )
}

fn is_plain_segment(segment: &str) -> bool {
    !segment.is_empty() && segment != "." && segment != ".." && !segment.contains('\\')
}

fn forbidden(message: impl Into<String>) -> ObjectStoreError {
    ObjectStoreError::Status {
        status: 403,
        message: message.into(),
    }
}
