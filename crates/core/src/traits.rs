//! ObjectStore trait definition
//!
//! This trait defines the two backend capabilities the mirror consumes:
//! listing a bucket and fetching one object as a byte stream. It keeps the
//! Lister and Mirror Writer decoupled from the specific S3 SDK.

use std::pin::Pin;

use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

use crate::error::Result;
use crate::path::{is_directory_marker, BucketName};

/// Readable body of a fetched object
pub type ObjectStream = Pin<Box<dyn AsyncRead + Send>>;

/// One entry returned by a bucket listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectInfo {
    /// Object key
    pub key: String,

    /// Size in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<i64>,

    /// Human-readable size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_human: Option<String>,

    /// Last modified timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<Timestamp>,

    /// ETag (usually MD5 for single-part uploads)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    /// Whether this is a directory marker
    pub is_dir: bool,
}

impl ObjectInfo {
    /// Create an ObjectInfo from a listed key
    ///
    /// Keys ending in `/` are directory markers.
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        let is_dir = is_directory_marker(&key);
        Self {
            key,
            size_bytes: None,
            size_human: None,
            last_modified: None,
            etag: None,
            is_dir,
        }
    }

    /// Set the object size
    pub fn with_size(mut self, size: i64) -> Self {
        self.size_bytes = Some(size);
        self.size_human = Some(humansize::format_size(
            size.max(0) as u64,
            humansize::BINARY,
        ));
        self
    }
}

/// Result of a list operation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListResult {
    /// Listed objects, in backend order
    pub items: Vec<ObjectInfo>,

    /// Whether the result is truncated (more items available)
    pub truncated: bool,

    /// Continuation token the backend offered for the next page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuation_token: Option<String>,
}

/// Trait for the storage operations the mirror needs
///
/// This trait is implemented by the S3 adapter and can be mocked for testing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List the first page of objects in a bucket, recursively
    async fn list_objects(&self, bucket: &BucketName) -> Result<ListResult>;

    /// Open an object's content as a byte stream
    async fn get_object(&self, bucket: &BucketName, key: &str) -> Result<ObjectStream>;
}
