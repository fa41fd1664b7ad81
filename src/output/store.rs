//! Bucket-addressed object store backends
//!
//! A [`BucketStores`] resolves a bucket name to an [`ObjectStore`]. S3 is used
//! in production, a local directory for manual runs and memory for tests.

use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::ObjectStore;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::debug;

use super::{OutputError, OutputResult};

/// Resolves bucket names to stores
pub trait BucketStores: Send + Sync {
    /// Store backing `bucket`
    fn open(&self, bucket: &str) -> OutputResult<Arc<dyn ObjectStore>>;

    /// Backend label for logs
    fn backend(&self) -> &'static str;
}

/// Amazon S3, configured from the standard `AWS_*` environment
#[derive(Debug, Default, Clone, Copy)]
pub struct S3Buckets;

impl BucketStores for S3Buckets {
    fn open(&self, bucket: &str) -> OutputResult<Arc<dyn ObjectStore>> {
        let store = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .build()
            .map_err(|e| OutputError::Backend {
                bucket: bucket.to_string(),
                message: e.to_string(),
            })?;
        Ok(Arc::new(store))
    }

    fn backend(&self) -> &'static str {
        "s3"
    }
}

/// Local directory laid out as `<root>/<bucket>/<key>`
#[derive(Debug, Clone)]
pub struct LocalBuckets {
    root: PathBuf,
}

impl LocalBuckets {
    /// Buckets under `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl BucketStores for LocalBuckets {
    fn open(&self, bucket: &str) -> OutputResult<Arc<dyn ObjectStore>> {
        let dir = self.root.join(bucket);
        std::fs::create_dir_all(&dir).map_err(|e| OutputError::Backend {
            bucket: bucket.to_string(),
            message: format!("cannot create {}: {e}", dir.display()),
        })?;
        debug!(dir = %dir.display(), "Opened local bucket");

        let store = LocalFileSystem::new_with_prefix(&dir).map_err(|e| OutputError::Backend {
            bucket: bucket.to_string(),
            message: e.to_string(),
        })?;
        Ok(Arc::new(store))
    }

    fn backend(&self) -> &'static str {
        "local"
    }
}

/// In-memory buckets; the same name always resolves to the same store
#[derive(Debug, Default)]
pub struct MemoryBuckets {
    buckets: Mutex<HashMap<String, Arc<InMemory>>>,
}

impl MemoryBuckets {
    /// Empty set of buckets
    pub fn new() -> Self {
        Self::default()
    }

    /// Concrete store for `bucket`, created on first use
    pub fn bucket(&self, bucket: &str) -> Arc<InMemory> {
        let mut buckets = self
            .buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        buckets
            .entry(bucket.to_string())
            .or_insert_with(|| Arc::new(InMemory::new()))
            .clone()
    }
}

impl BucketStores for MemoryBuckets {
    fn open(&self, bucket: &str) -> OutputResult<Arc<dyn ObjectStore>> {
        Ok(self.bucket(bucket))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
