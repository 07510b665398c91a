//! Error types for listsearch-gate
//!
//! All fallible operations return [`Result`], an `anyhow` alias, and raise
//! one of the [`GateError`] variants below so callers can downcast when they
//! need to distinguish failure kinds.

use thiserror::Error;

/// Main error type for gate and blob-store operations.
///
/// Note that an allow-list denial is *not* an error; it is a
/// [`GateDecision::Deny`](crate::auth::gate::GateDecision::Deny) value.
#[derive(Error, Debug)]
pub enum GateError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Authentication protocol errors (bad metadata, malformed messages)
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Authorization code exchange failed
    #[error("Token exchange error: {0}")]
    TokenExchange(String),

    /// Token persistence failed
    #[error("Token store error: {0}")]
    TokenStore(String),

    /// Blob storage request failed or was rejected
    #[error("Storage error: {0}")]
    Storage(String),

    /// Storage connection string could not be parsed
    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(String),

    /// Blob name rejected before any I/O
    #[error("Invalid blob name: {0}")]
    InvalidBlobName(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Keyring/credential storage errors
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

/// Result type alias for listsearch-gate operations
pub type Result<T> = anyhow::Result<T>;
