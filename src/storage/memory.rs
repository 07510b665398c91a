//! In-process blob backend
//!
//! Holds blobs in a map keyed by `(container, name)`. URLs are rooted at a
//! configurable base so they look like the ones the real service returns.

use std::collections::HashMap;

use tokio::sync::RwLock;
use url::Url;

use crate::error::{GateError, Result};
use crate::storage::{join_blob_url, BlobBackend};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:10000/devstoreaccount1";

/// [`BlobBackend`] keeping blobs in memory.
#[derive(Debug)]
pub struct MemoryBlobBackend {
    base_url: String,
    blobs: RwLock<HashMap<(String, String), String>>,
}

impl MemoryBlobBackend {
    /// Creates an empty backend with emulator-style URLs.
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Creates an empty backend whose URLs start with `base_url`.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            blobs: RwLock::new(HashMap::new()),
        }
    }

    /// Content of `name` in `container`, if present.
    pub async fn content(&self, container: &str, name: &str) -> Option<String> {
        self.blobs
            .read()
            .await
            .get(&(container.to_string(), name.to_string()))
            .cloned()
    }

    /// Number of stored blobs across all containers.
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    /// Returns `true` when no blob is stored.
    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

impl Default for MemoryBlobBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl BlobBackend for MemoryBlobBackend {
    fn blob_url(&self, container: &str, name: &str) -> Result<Url> {
        let base = Url::parse(&self.base_url).map_err(GateError::Url)?;
        join_blob_url(&base, container, name)
    }

    async fn put(&self, container: &str, name: &str, content: &str) -> Result<()> {
        self.blobs
            .write()
            .await
            .insert((container.to_string(), name.to_string()), content.to_string());
        Ok(())
    }

    async fn delete(&self, container: &str, name: &str) -> Result<()> {
        self.blobs
            .write()
            .await
            .remove(&(container.to_string(), name.to_string()));
        Ok(())
    }
}
