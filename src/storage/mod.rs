pub mod local;
pub mod provider;

pub use local::*;
pub use provider::*;

use std::sync::Arc;

use crate::config::Config;

/// Process-wide blob store handle, built once at startup
#[derive(Clone)]
pub struct BlobStore {
    local: Arc<LocalBlobStore>,
}

impl BlobStore {
    pub fn new(config: &Config) -> Self {
        Self {
            local: Arc::new(LocalBlobStore::new(
                &config.storage.blob_path,
                &config.jwt.secret,
            )),
        }
    }

    pub fn provider(&self) -> &LocalBlobStore {
        &self.local
    }
}
