//! Knowledge-base blob storage
//!
//! [`BlobStore`] writes and removes named text blobs in the single
//! [`BLOB_CONTAINER_NAME`] container. The actual I/O goes through a
//! [`BlobBackend`]:
//!
//! - [`azure::AzureBlobBackend`] talks to the Blob service REST API with
//!   Shared Key authorization.
//! - [`memory::MemoryBlobBackend`] keeps blobs in process.

pub mod azure;
pub mod connection_string;
pub mod memory;

use std::sync::Arc;

use url::Url;

use crate::constants::BLOB_CONTAINER_NAME;
use crate::error::{GateError, Result};

pub use azure::AzureBlobBackend;
pub use connection_string::StorageAccount;
pub use memory::MemoryBlobBackend;

/// Longest blob name the Blob service accepts.
pub const MAX_BLOB_NAME_LEN: usize = 1024;

/// Object storage operations used by [`BlobStore`].
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait BlobBackend: Send + Sync {
    /// URL of `name` in `container`.
    fn blob_url(&self, container: &str, name: &str) -> Result<Url>;

    /// Creates or overwrites `name` with `content`.
    async fn put(&self, container: &str, name: &str, content: &str) -> Result<()>;

    /// Removes `name`. A missing blob is not an error.
    async fn delete(&self, container: &str, name: &str) -> Result<()>;
}

/// Text blob store bound to the knowledge-base container.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use listsearch_gate::storage::{BlobStore, MemoryBlobBackend};
///
/// # tokio_test::block_on(async {
/// let store = BlobStore::new(Arc::new(MemoryBlobBackend::new()));
/// let url = store.upload("hello", "f1").await.unwrap();
/// assert!(url.as_str().ends_with("/listsearch-kb/f1"));
/// store.delete("f1").await.unwrap();
/// store.delete("f1").await.unwrap();
/// # });
/// ```
#[derive(Clone)]
pub struct BlobStore {
    backend: Arc<dyn BlobBackend>,
    container: String,
}

impl BlobStore {
    /// Creates a store over `backend`.
    pub fn new(backend: Arc<dyn BlobBackend>) -> Self {
        Self {
            backend,
            container: BLOB_CONTAINER_NAME.to_string(),
        }
    }

    /// Creates a store for the account described by `connection_string`.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::InvalidConnectionString`] when the string does
    /// not parse.
    pub fn from_connection_string(
        http: Arc<reqwest::Client>,
        connection_string: &str,
    ) -> Result<Self> {
        let account = StorageAccount::parse(connection_string)?;
        Ok(Self::new(Arc::new(AzureBlobBackend::new(http, account))))
    }

    /// Container every blob of this store lives in.
    pub fn container(&self) -> &str {
        &self.container
    }

    /// Uploads `content` as `name`, replacing any existing blob, and returns
    /// the blob's URL.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::InvalidBlobName`] for an empty or over-long name
    /// without contacting the service; backend failures propagate.
    pub async fn upload(&self, content: &str, name: &str) -> Result<Url> {
        validate_blob_name(name)?;
        let url = self.backend.blob_url(&self.container, name)?;
        self.backend.put(&self.container, name, content).await?;
        tracing::info!(blob = %name, bytes = content.len(), "Uploaded blob");
        Ok(url)
    }

    /// Deletes `name` if it exists.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::InvalidBlobName`] for an invalid name; backend
    /// failures other than a missing blob propagate.
    pub async fn delete(&self, name: &str) -> Result<()> {
        validate_blob_name(name)?;
        self.backend.delete(&self.container, name).await?;
        tracing::info!(blob = %name, "Deleted blob");
        Ok(())
    }
}

impl std::fmt::Debug for BlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobStore")
            .field("container", &self.container)
            .finish_non_exhaustive()
    }
}

/// Rejects names the service would refuse or that would not map to a
/// single blob URL.
///
/// `/` separates virtual directories, so every segment must be non-empty and
/// must not be `.` or `..`. A trailing `.` is rejected as well.
///
/// # Examples
///
/// ```
/// use listsearch_gate::storage::validate_blob_name;
///
/// assert!(validate_blob_name("docs/f1.txt").is_ok());
/// assert!(validate_blob_name("docs/../f1").is_err());
/// assert!(validate_blob_name("docs/").is_err());
/// ```
pub fn validate_blob_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(GateError::InvalidBlobName("name must not be empty".to_string()).into());
    }
    if name.len() > MAX_BLOB_NAME_LEN {
        return Err(GateError::InvalidBlobName(format!(
            "name exceeds {MAX_BLOB_NAME_LEN} characters"
        ))
        .into());
    }
    if name.ends_with('.') {
        return Err(GateError::InvalidBlobName(format!("'{name}' must not end with '.'")).into());
    }
    if let Some(segment) = name
        .split('/')
        .find(|segment| segment.is_empty() || *segment == "." || *segment == "..")
    {
        return Err(GateError::InvalidBlobName(format!(
            "'{name}' contains the path segment '{segment}'"
        ))
        .into());
    }
    Ok(())
}

/// Appends `container` and `name` to `endpoint` as path segments. `/` in the
/// name is kept as a virtual directory separator; other reserved characters
/// are percent-encoded.
pub(crate) fn join_blob_url(endpoint: &Url, container: &str, name: &str) -> Result<Url> {
    let mut url = endpoint.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.path_segments_mut()
        .map_err(|_| GateError::Storage(format!("blob endpoint '{endpoint}' cannot be a base")))?
        .pop_if_empty()
        .push(container)
        .extend(name.split('/'));
    Ok(url)
}
