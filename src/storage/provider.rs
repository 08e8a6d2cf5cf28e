use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

use crate::error::Result;

/// Blob store contract. Keys are opaque, globally unique and never
/// reused; content is immutable once written.
#[async_trait]
pub trait BlobProvider: Send + Sync {
    /// Store a blob and return its key
    async fn put(&self, data: Bytes, content_type: &str) -> Result<String>;

    /// Fetch a blob's bytes and content type by key
    async fn get(&self, key: &str) -> Result<(Bytes, String)>;

    /// Delete a blob
    async fn delete(&self, key: &str) -> Result<()>;

    /// Produce a time-limited signed retrieval URL for the key
    fn signed_url(&self, key: &str, ttl: Duration) -> String;

    /// Get the storage type name
    fn storage_type(&self) -> &'static str;
}
