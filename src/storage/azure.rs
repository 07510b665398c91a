//! Blob service REST backend
//!
//! Requests are signed with the account key (Shared Key authorization,
//! service version `2021-06-08`). Uploads are single-shot block blob `PUT`s;
//! the container is expected to exist.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use url::Url;

use crate::error::{GateError, Result};
use crate::storage::connection_string::StorageAccount;
use crate::storage::{join_blob_url, BlobBackend};

type HmacSha256 = Hmac<Sha256>;

/// Blob service API version sent with every request.
pub const STORAGE_API_VERSION: &str = "2021-06-08";

const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

const ERROR_CODE_HEADER: &str = "x-ms-error-code";

const BLOB_NOT_FOUND: &str = "BlobNotFound";

/// [`BlobBackend`] for an Azure storage account (or a compatible emulator).
#[derive(Debug, Clone)]
pub struct AzureBlobBackend {
    http: Arc<reqwest::Client>,
    account: StorageAccount,
}

impl AzureBlobBackend {
    /// Creates a backend for `account` sharing `http`.
    pub fn new(http: Arc<reqwest::Client>, account: StorageAccount) -> Self {
        Self { http, account }
    }

    /// Account this backend writes to.
    pub fn account(&self) -> &StorageAccount {
        &self.account
    }

    fn authorization(&self, string_to_sign: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.account.account_key())
            .map_err(|e| GateError::Storage(format!("failed to create HMAC: {e}")))?;
        mac.update(string_to_sign.as_bytes());
        let signature = BASE64.encode(mac.finalize().into_bytes());
        Ok(format!(
            "SharedKey {}:{}",
            self.account.account_name(),
            signature
        ))
    }
}

/// Shared Key string-to-sign for a request without conditional headers.
///
/// `canonical_headers` must already be sorted and include only `x-ms-*`
/// headers, each as `name:value`.
pub fn string_to_sign(
    verb: &str,
    content_length: usize,
    content_type: &str,
    canonical_headers: &[(&str, &str)],
    account_name: &str,
    url: &Url,
) -> String {
    // Zero length is signed as an empty field.
    let content_length = if content_length == 0 {
        String::new()
    } else {
        content_length.to_string()
    };
    let headers: String = canonical_headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();

    format!(
        "{verb}\n\n\n{content_length}\n\n{content_type}\n\n\n\n\n\n\n{headers}/{account_name}{}",
        url.path()
    )
}

fn http_date() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

#[async_trait::async_trait]
impl BlobBackend for AzureBlobBackend {
    fn blob_url(&self, container: &str, name: &str) -> Result<Url> {
        join_blob_url(self.account.blob_endpoint(), container, name)
    }

    async fn put(&self, container: &str, name: &str, content: &str) -> Result<()> {
        let url = self.blob_url(container, name)?;
        let date = http_date();
        let to_sign = string_to_sign(
            "PUT",
            content.len(),
            TEXT_CONTENT_TYPE,
            &[
                ("x-ms-blob-type", "BlockBlob"),
                ("x-ms-date", &date),
                ("x-ms-version", STORAGE_API_VERSION),
            ],
            self.account.account_name(),
            &url,
        );

        let resp = self
            .http
            .put(url.clone())
            .header("Authorization", self.authorization(&to_sign)?)
            .header("x-ms-blob-type", "BlockBlob")
            .header("x-ms-date", &date)
            .header("x-ms-version", STORAGE_API_VERSION)
            .header("Content-Type", TEXT_CONTENT_TYPE)
            .header("Content-Length", content.len())
            .body(content.to_string())
            .send()
            .await
            .map_err(|e| GateError::Storage(format!("upload of '{name}' failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(GateError::Storage(format!(
                "upload of '{name}' returned {status}: {body}"
            ))
            .into());
        }

        tracing::debug!(url = %url, "Blob PUT accepted");
        Ok(())
    }

    async fn delete(&self, container: &str, name: &str) -> Result<()> {
        let url = self.blob_url(container, name)?;
        let date = http_date();
        let to_sign = string_to_sign(
            "DELETE",
            0,
            "",
            &[("x-ms-date", &date), ("x-ms-version", STORAGE_API_VERSION)],
            self.account.account_name(),
            &url,
        );

        let resp = self
            .http
            .delete(url.clone())
            .header("Authorization", self.authorization(&to_sign)?)
            .header("x-ms-date", &date)
            .header("x-ms-version", STORAGE_API_VERSION)
            .send()
            .await
            .map_err(|e| GateError::Storage(format!("delete of '{name}' failed: {e}")))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            let error_code = resp
                .headers()
                .get(ERROR_CODE_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            if blob_is_absent(error_code.as_deref()) {
                tracing::debug!(url = %url, "Blob already absent");
                return Ok(());
            }
            let body = resp.text().await.unwrap_or_default();
            return Err(GateError::Storage(format!(
                "delete of '{name}' returned {status} ({}): {body}",
                error_code.as_deref().unwrap_or_default()
            ))
            .into());
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GateError::Storage(format!(
                "delete of '{name}' returned {status}: {body}"
            ))
            .into());
        }
        Ok(())
    }
}

/// A `404` on delete only means "already gone" when it is about the blob.
/// `ContainerNotFound` and friends are configuration failures.
fn blob_is_absent(error_code: Option<&str>) -> bool {
    matches!(error_code, None | Some(BLOB_NOT_FOUND))
}
