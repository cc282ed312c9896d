use std::collections::HashMap;

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Serialize, Serializer};

/// A usable, time-limited access URL.
///
/// Serializes as a transfer-protocol action object (`href`, `header`,
/// `expires_at`, `expires_in`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignedUrl {
    #[serde(rename = "href", serialize_with = "serialize_url")]
    pub url: Url,
    /// Headers the client must send with the request (uploads only).
    #[serde(rename = "header", skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
    /// Size reported by the backend (downloads only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    pub expires_at: DateTime<Utc>,
    /// Configured lifetime in seconds.
    pub expires_in: u64,
}

/// A backend-reported failure, normalized to a status code and message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlobFailure {
    pub code: u16,
    pub message: String,
}

/// Result of asking for a blob URL: either a signed URL or a normalized failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SignedBlob {
    Signed(SignedUrl),
    Failed(BlobFailure),
}

impl SignedBlob {
    pub fn signed(&self) -> Option<&SignedUrl> {
        match self {
            SignedBlob::Signed(url) => Some(url),
            SignedBlob::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&BlobFailure> {
        match self {
            SignedBlob::Signed(_) => None,
            SignedBlob::Failed(failure) => Some(failure),
        }
    }
}

impl From<SignedUrl> for SignedBlob {
    fn from(url: SignedUrl) -> Self {
        SignedBlob::Signed(url)
    }
}

fn serialize_url<S: Serializer>(url: &Url, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(url.as_str())
}
