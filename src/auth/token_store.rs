//! Persistence of app-login access tokens
//!
//! Tokens acquired by the passive app-login scheme are stored per user email
//! through the [`TokenPersistence`] seam. Two implementations ship:
//!
//! - [`KeyringTokenStore`] writes to the OS credential store (Keychain,
//!   Secret Service, Windows Credential Manager). Records are tagged with a
//!   key id derived from the configured token key; a record written under a
//!   different key loads as `None`, so rotating the key invalidates every
//!   stored token.
//! - [`MemoryTokenStore`] keeps tokens in process, for tests and local runs.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use crate::auth::exchange::AccessToken;
use crate::error::{GateError, Result};

/// Storage seam for acquired access tokens, keyed by user email.
#[async_trait::async_trait]
pub trait TokenPersistence: Send + Sync {
    /// Stores `token` for `user_email`, replacing any previous token.
    async fn save(&self, user_email: &str, token: &AccessToken) -> Result<()>;

    /// Loads the token stored for `user_email`, `None` when absent.
    async fn load(&self, user_email: &str) -> Result<Option<AccessToken>>;

    /// Removes the token for `user_email`. Removing a missing token is a
    /// no-op.
    async fn delete(&self, user_email: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// KeyringTokenStore
// ---------------------------------------------------------------------------

/// Record serialized into the keyring.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedToken {
    key_id: String,
    stored_at: DateTime<Utc>,
    token: AccessToken,
}

/// OS keyring backed [`TokenPersistence`].
///
/// Records are JSON and the access token inside is stored in clear text:
/// the OS keyring's access control is the only protection at rest. The
/// token key is not an encryption key; it only produces the key id that
/// invalidates records written under a different key.
///
/// # Examples
///
/// ```no_run
/// use listsearch_gate::auth::token_store::{KeyringTokenStore, TokenPersistence};
///
/// # async fn example() -> listsearch_gate::error::Result<()> {
/// let store = KeyringTokenStore::new("listsearch-gate-sharepoint", "token-key");
/// let token = store.load("alice@contoso.com").await?;
/// assert!(token.is_none() || token.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct KeyringTokenStore {
    service: String,
    key_id: String,
}

impl KeyringTokenStore {
    /// Creates a store writing entries under `service`, tagged with the key
    /// id of `token_key`.
    pub fn new(service: impl Into<String>, token_key: &str) -> Self {
        Self {
            service: service.into(),
            key_id: key_id(token_key),
        }
    }

    /// Key id records written by this store carry.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Parses a stored record; records tagged with another key id load as
    /// `None`.
    fn decode_record(&self, user_email: &str, json: &str) -> Result<Option<AccessToken>> {
        let record: PersistedToken =
            serde_json::from_str(json).map_err(GateError::Serialization)?;
        if record.key_id != self.key_id {
            tracing::warn!(user = %user_email, "Stored token was written under a different token key");
            return Ok(None);
        }
        Ok(Some(record.token))
    }

    fn entry(&self, user_email: &str) -> Result<keyring::Entry> {
        Ok(keyring::Entry::new(&self.service, user_email).map_err(GateError::Keyring)?)
    }
}

#[async_trait::async_trait]
impl TokenPersistence for KeyringTokenStore {
    async fn save(&self, user_email: &str, token: &AccessToken) -> Result<()> {
        let record = PersistedToken {
            key_id: self.key_id.clone(),
            stored_at: Utc::now(),
            token: token.clone(),
        };
        let json = serde_json::to_string(&record).map_err(GateError::Serialization)?;
        let entry = self.entry(user_email)?;

        tokio::task::spawn_blocking(move || entry.set_password(&json))
            .await
            .map_err(|e| GateError::TokenStore(format!("keyring task panicked: {e}")))?
            .map_err(GateError::Keyring)?;

        tracing::info!(user = %user_email, "Stored app-login access token");
        Ok(())
    }

    async fn load(&self, user_email: &str) -> Result<Option<AccessToken>> {
        let entry = self.entry(user_email)?;
        let stored = tokio::task::spawn_blocking(move || entry.get_password())
            .await
            .map_err(|e| GateError::TokenStore(format!("keyring task panicked: {e}")))?;

        let json = match stored {
            Ok(json) => json,
            Err(keyring::Error::NoEntry) => return Ok(None),
            Err(e) => return Err(GateError::Keyring(e).into()),
        };

        self.decode_record(user_email, &json)
    }

    async fn delete(&self, user_email: &str) -> Result<()> {
        let entry = self.entry(user_email)?;
        let result = tokio::task::spawn_blocking(move || entry.delete_password())
            .await
            .map_err(|e| GateError::TokenStore(format!("keyring task panicked: {e}")))?;

        match result {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(GateError::Keyring(e).into()),
        }
    }
}

/// First 8 bytes of the SHA-256 digest of `token_key`, hex encoded.
pub fn key_id(token_key: &str) -> String {
    let digest = Sha256::digest(token_key.as_bytes());
    digest[..8].iter().map(|b| format!("{b:02x}")).collect()
}

// ---------------------------------------------------------------------------
// MemoryTokenStore
// ---------------------------------------------------------------------------

/// In-process [`TokenPersistence`].
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<HashMap<String, AccessToken>>,
}

impl MemoryTokenStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored tokens.
    pub async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }

    /// Returns `true` when nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.tokens.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl TokenPersistence for MemoryTokenStore {
    async fn save(&self, user_email: &str, token: &AccessToken) -> Result<()> {
        self.tokens
            .write()
            .await
            .insert(user_email.to_string(), token.clone());
        Ok(())
    }

    async fn load(&self, user_email: &str) -> Result<Option<AccessToken>> {
        Ok(self.tokens.read().await.get(user_email).cloned())
    }

    async fn delete(&self, user_email: &str) -> Result<()> {
        self.tokens.write().await.remove(user_email);
        Ok(())
    }
}
