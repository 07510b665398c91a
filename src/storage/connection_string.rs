//! Storage account connection strings
//!
//! Parses the `Key=Value;Key=Value` form issued by the Azure portal:
//!
//! ```text
//! DefaultEndpointsProtocol=https;AccountName=acct;AccountKey=<base64>;EndpointSuffix=core.windows.net
//! ```
//!
//! An explicit `BlobEndpoint` wins over the protocol/suffix pair, and
//! `UseDevelopmentStorage=true` selects the local emulator account.

use std::collections::HashMap;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use url::Url;

use crate::error::{GateError, Result};

/// Well-known account name of the local storage emulator.
pub const DEV_STORE_ACCOUNT_NAME: &str = "devstoreaccount1";

/// Well-known account key of the local storage emulator.
pub const DEV_STORE_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";

/// Blob endpoint of the local storage emulator.
pub const DEV_STORE_BLOB_ENDPOINT: &str = "http://127.0.0.1:10000/devstoreaccount1";

const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

/// Account credentials and blob endpoint resolved from a connection string.
///
/// # Examples
///
/// ```
/// use listsearch_gate::storage::connection_string::StorageAccount;
///
/// let account: StorageAccount =
///     "DefaultEndpointsProtocol=https;AccountName=acct;AccountKey=c2VjcmV0;EndpointSuffix=core.windows.net"
///         .parse()
///         .unwrap();
/// assert_eq!(account.account_name(), "acct");
/// assert_eq!(account.blob_endpoint().as_str(), "https://acct.blob.core.windows.net/");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct StorageAccount {
    account_name: String,
    account_key: Vec<u8>,
    blob_endpoint: Url,
}

impl StorageAccount {
    /// Account credentials of the local storage emulator.
    pub fn development() -> Result<Self> {
        Ok(Self {
            account_name: DEV_STORE_ACCOUNT_NAME.to_string(),
            account_key: decode_key(DEV_STORE_ACCOUNT_KEY)?,
            blob_endpoint: Url::parse(DEV_STORE_BLOB_ENDPOINT).map_err(GateError::Url)?,
        })
    }

    /// Storage account name.
    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    /// Decoded account key used for Shared Key signing.
    pub fn account_key(&self) -> &[u8] {
        &self.account_key
    }

    /// Base URL of the blob service.
    pub fn blob_endpoint(&self) -> &Url {
        &self.blob_endpoint
    }

    /// Parses a connection string.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::InvalidConnectionString`] when a segment is not
    /// `key=value`, the account name or key is missing, the key is not
    /// base64, or the endpoint is not a URL.
    pub fn parse(connection_string: &str) -> Result<Self> {
        let mut settings: HashMap<String, String> = HashMap::new();
        for segment in connection_string.split(';').map(str::trim) {
            if segment.is_empty() {
                continue;
            }
            // Values (base64 keys) may contain '=' themselves.
            let (key, value) = segment.split_once('=').ok_or_else(|| {
                GateError::InvalidConnectionString(format!("segment '{segment}' is not key=value"))
            })?;
            settings.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }

        if settings
            .get("usedevelopmentstorage")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
        {
            return Self::development();
        }

        let account_name = settings
            .get("accountname")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| GateError::InvalidConnectionString("missing AccountName".to_string()))?
            .clone();

        let account_key = settings
            .get("accountkey")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| GateError::InvalidConnectionString("missing AccountKey".to_string()))?;
        let account_key = decode_key(account_key)?;

        let blob_endpoint = match settings.get("blobendpoint") {
            Some(endpoint) => endpoint.clone(),
            None => {
                let protocol = settings
                    .get("defaultendpointsprotocol")
                    .map(String::as_str)
                    .unwrap_or("https");
                if protocol != "https" && protocol != "http" {
                    return Err(GateError::InvalidConnectionString(format!(
                        "unsupported DefaultEndpointsProtocol '{protocol}'"
                    ))
                    .into());
                }
                let suffix = settings
                    .get("endpointsuffix")
                    .map(String::as_str)
                    .unwrap_or(DEFAULT_ENDPOINT_SUFFIX);
                format!("{protocol}://{account_name}.blob.{suffix}")
            }
        };
        let blob_endpoint = Url::parse(&blob_endpoint).map_err(|e| {
            GateError::InvalidConnectionString(format!("invalid blob endpoint '{blob_endpoint}': {e}"))
        })?;

        Ok(Self {
            account_name,
            account_key,
            blob_endpoint,
        })
    }
}

impl FromStr for StorageAccount {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Debug for StorageAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageAccount")
            .field("account_name", &self.account_name)
            .field("account_key", &"<redacted>")
            .field("blob_endpoint", &self.blob_endpoint.as_str())
            .finish()
    }
}

fn decode_key(key: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(key)
        .map_err(|e| GateError::InvalidConnectionString(format!("AccountKey is not base64: {e}")).into())
}
