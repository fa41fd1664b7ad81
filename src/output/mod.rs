//! Artifact decoding and persistence
//!
//! Raw documents land at `raw-reports/{reportId}.gz` and decoded JSON at
//! `parsed-reports/{reportId}.json`. Writes overwrite unconditionally, so
//! storing the same artifact twice leaves the same observable state.

use bytes::Bytes;
use object_store::path::Path as ObjectPath;
use object_store::PutPayload;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::metrics::record_artifact_stored;
use crate::{ParsedArtifact, RawArtifact, ReportId};

pub mod decode;
pub mod store;

pub use decode::{decode_gzip_json, DecodeError};
pub use store::{BucketStores, LocalBuckets, MemoryBuckets, S3Buckets};

/// Prefix for raw documents
pub const RAW_PREFIX: &str = "raw-reports";

/// Prefix for decoded documents
pub const PARSED_PREFIX: &str = "parsed-reports";

/// Output errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// Document could not be decoded
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Bucket could not be opened
    #[error("cannot open bucket {bucket}: {message}")]
    Backend {
        /// Bucket name
        bucket: String,
        /// Backend error
        message: String,
    },

    /// Write rejected by the store
    #[error("failed to write {key}: {message}")]
    Storage {
        /// Object key
        key: String,
        /// Backend error
        message: String,
    },

    /// Parsed document could not be serialized
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Key for a raw document
pub fn raw_key(report_id: &ReportId) -> String {
    format!("{RAW_PREFIX}/{report_id}.gz")
}

/// Key for a decoded document
pub fn parsed_key(report_id: &ReportId) -> String {
    format!("{PARSED_PREFIX}/{report_id}.json")
}

/// Location of a written object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredObject {
    /// Bucket written to
    pub bucket: String,
    /// Object key
    pub key: String,
    /// Bytes written
    pub size: usize,
}

/// Writes report artifacts to a bucket
#[derive(Clone)]
pub struct ArtifactSink {
    stores: Arc<dyn BucketStores>,
    default_bucket: String,
}

impl ArtifactSink {
    /// Sink writing to `default_bucket` unless a call overrides it
    pub fn new(stores: Arc<dyn BucketStores>, default_bucket: impl Into<String>) -> Self {
        Self {
            stores,
            default_bucket: default_bucket.into(),
        }
    }

    /// Bucket used when a call passes no override
    pub fn default_bucket(&self) -> &str {
        &self.default_bucket
    }

    /// Store the raw document bytes as-is
    pub async fn store_raw(
        &self,
        raw: &RawArtifact,
        report_id: &ReportId,
        bucket: Option<&str>,
    ) -> OutputResult<StoredObject> {
        let stored = self
            .put(bucket, raw_key(report_id), raw.bytes().clone())
            .await?;
        record_artifact_stored("raw", stored.size);
        Ok(stored)
    }

    /// Store the decoded document as JSON
    pub async fn store_parsed(
        &self,
        parsed: &ParsedArtifact,
        report_id: &ReportId,
        bucket: Option<&str>,
    ) -> OutputResult<StoredObject> {
        let body = serde_json::to_vec(parsed.value())
            .map_err(|e| OutputError::Serialization(e.to_string()))?;
        let stored = self
            .put(bucket, parsed_key(report_id), Bytes::from(body))
            .await?;
        record_artifact_stored("parsed", stored.size);
        Ok(stored)
    }

    async fn put(&self, bucket: Option<&str>, key: String, body: Bytes) -> OutputResult<StoredObject> {
        let bucket = bucket.unwrap_or(&self.default_bucket);
        let store = self.stores.open(bucket)?;
        let size = body.len();

        store
            .put(&ObjectPath::from(key.as_str()), PutPayload::from(body))
            .await
            .map_err(|e| OutputError::Storage {
                key: key.clone(),
                message: e.to_string(),
            })?;

        info!(
            backend = self.stores.backend(),
            bucket,
            key = %key,
            bytes = size,
            "Stored artifact"
        );

        Ok(StoredObject {
            bucket: bucket.to_string(),
            key,
            size,
        })
    }
}
