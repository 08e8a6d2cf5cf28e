use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::storage::BlobProvider;

type HmacSha1 = Hmac<Sha1>;

/// Local file system blob store. Each blob lives under an opaque uuid
/// key with a content-type sidecar; retrieval goes through signed URLs
/// served by the blob handler.
pub struct LocalBlobStore {
    base_path: PathBuf,
    signing_secret: String,
}

impl LocalBlobStore {
    pub fn new(base_path: impl Into<PathBuf>, signing_secret: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            signing_secret: signing_secret.into(),
        }
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.base_path.join(key)
    }

    fn sidecar_path(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{}.ct", key))
    }

    fn sign(&self, key: &str, expires: i64) -> String {
        let mut mac = HmacSha1::new_from_slice(self.signing_secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(format!("{}|{}", key, expires).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Verify a signed URL's signature and expiry
    pub fn verify_signature(&self, key: &str, expires: i64, sig: &str) -> Result<()> {
        if expires < Utc::now().timestamp() {
            return Err(AppError::Forbidden("Signed URL expired".to_string()));
        }
        if self.sign(key, expires) != sig {
            return Err(AppError::Forbidden("Invalid signature".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobProvider for LocalBlobStore {
    async fn put(&self, data: Bytes, content_type: &str) -> Result<String> {
        let key = Uuid::new_v4().to_string();
        let path = self.blob_path(&key);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&path).await?;
        file.write_all(&data).await?;
        file.flush().await?;

        fs::write(self.sidecar_path(&key), content_type).await?;

        tracing::debug!("Stored blob {} ({} bytes, {})", key, data.len(), content_type);
        Ok(key)
    }

    async fn get(&self, key: &str) -> Result<(Bytes, String)> {
        // Keys are uuids we generated; reject anything path-like
        if key.contains('/') || key.contains('\\') || key.contains("..") {
            return Err(AppError::BadRequest("Invalid blob key".to_string()));
        }

        let data = fs::read(self.blob_path(key)).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::NotFound(format!("Blob not found: {}", key))
            } else {
                AppError::Storage(format!("Failed to read blob: {}", e))
            }
        })?;

        let content_type = fs::read_to_string(self.sidecar_path(key))
            .await
            .unwrap_or_else(|_| "application/octet-stream".to_string());

        Ok((Bytes::from(data), content_type))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.blob_path(key);
        if path.exists() {
            fs::remove_file(&path).await?;
            let _ = fs::remove_file(self.sidecar_path(key)).await;
            tracing::debug!("Deleted blob {}", key);
        }
        Ok(())
    }

    fn signed_url(&self, key: &str, ttl: Duration) -> String {
        let expires = Utc::now().timestamp() + ttl.as_secs() as i64;
        let sig = self.sign(key, expires);
        format!("/api/v1/blobs/{}?expires={}&sig={}", key, expires, sig)
    }

    fn storage_type(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_round_trip() {
        let store = LocalBlobStore::new("/tmp/one4lib-test-blobs", "secret");
        let expires = Utc::now().timestamp() + 60;
        let sig = store.sign("abc", expires);
        assert!(store.verify_signature("abc", expires, &sig).is_ok());
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let store = LocalBlobStore::new("/tmp/one4lib-test-blobs", "secret");
        let expires = Utc::now().timestamp() + 60;
        let sig = store.sign("abc", expires);
        assert!(store.verify_signature("other-key", expires, &sig).is_err());
    }

    #[test]
    fn expired_url_is_rejected() {
        let store = LocalBlobStore::new("/tmp/one4lib-test-blobs", "secret");
        let expires = Utc::now().timestamp() - 1;
        let sig = store.sign("abc", expires);
        assert!(store.verify_signature("abc", expires, &sig).is_err());
    }

    #[tokio::test]
    async fn put_then_get_returns_bytes_and_content_type() {
        let dir = std::env::temp_dir().join(format!("o4l-blobs-{}", Uuid::new_v4()));
        let store = LocalBlobStore::new(&dir, "secret");
        let key = store
            .put(Bytes::from_static(b"hello"), "text/plain")
            .await
            .unwrap();
        let (data, ct) = store.get(&key).await.unwrap();
        assert_eq!(&data[..], b"hello");
        assert_eq!(ct, "text/plain");
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
