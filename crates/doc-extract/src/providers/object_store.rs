//! Object store provider trait for documents, artifacts and their tags

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::Result;

/// User metadata key holding the original filename
pub const METADATA_KEY_FILE_NAME: &str = "file-name";
/// User metadata key holding the document identifier
pub const METADATA_KEY_IDENTIFIER: &str = "identifier";

/// Immutable headers of a stored object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub content_type: Option<String>,
    pub content_length: u64,
    #[serde(default)]
    pub user_metadata: HashMap<String, String>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Content and headers to write
#[derive(Debug, Clone, Default)]
pub struct ObjectUpload {
    pub body: Bytes,
    pub content_type: Option<String>,
    pub user_metadata: HashMap<String, String>,
}

impl ObjectUpload {
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn user_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.user_metadata.insert(key.into(), value.into());
        self
    }
}

/// An object read back from the store
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub metadata: ObjectMetadata,
    pub body: Bytes,
}

/// Mutable key/value tag attached to an object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Trait for object storage
///
/// Implementations:
/// - `InMemoryObjectStore`: process-local map
/// - `LocalObjectStore`: local filesystem
/// - `S3ObjectStore`: Amazon S3 (feature `aws`)
///
/// Missing objects are `Ok(None)` from reads, never an error.
#[async_trait]
pub trait ObjectStoreProvider: Send + Sync {
    /// Write (or overwrite) an object, tags are reset
    async fn put_object(&self, bucket: &str, key: &str, upload: ObjectUpload)
        -> Result<ObjectMetadata>;

    /// Read content and headers
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Option<StoredObject>>;

    /// Read headers only
    async fn head_object(&self, bucket: &str, key: &str) -> Result<Option<ObjectMetadata>>;

    /// Remove an object; removing a missing object is not an error
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;

    /// Current tag set, empty when the object has no tags
    async fn get_tags(&self, bucket: &str, key: &str) -> Result<Vec<Tag>>;

    /// Replace the whole tag set
    async fn put_tags(&self, bucket: &str, key: &str, tags: Vec<Tag>) -> Result<()>;

    /// URL through which a client can upload `key` until `ttl` elapses
    async fn presign_put(&self, bucket: &str, key: &str, ttl: Duration) -> Result<String>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
