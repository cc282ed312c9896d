//! lfs-blob-adapter - Pre-signed blob URLs for a content-addressed transfer protocol
//!
//! This crate hands out time-limited upload and download URLs so payload bytes
//! never pass through the controlling service:
//! - Swappable storage backends behind one trait (S3 / S3-compatible, local filesystem)
//! - SigV4 query presigning computed locally, no round-trip per upload URL
//! - Size-based storage-class tiering on upload
//! - Backend lookup failures normalized into a data result on download

pub mod adapter;
pub mod config;
pub mod object_store;
pub mod telemetry;
#[cfg(test)]
pub mod testutil;

pub use adapter::{AdapterError, BlobAdapter, BlobFailure, SignedBlob, SignedUrl};
pub use config::{AdapterConfig, Config};

/// Content type every blob upload must be sent with.
pub const UPLOAD_CONTENT_TYPE: &str = "application/octet-stream";
