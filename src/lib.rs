//! listsearch-gate - UPN-gated sign-in and knowledge-base blob helper
//!
//! This library provides the two pieces of glue a ListSearch deployment
//! needs around its identity provider and storage account.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `auth`: Allow-list gate, OpenID-Connect schemes, code exchange and token persistence
//! - `storage`: Text blob upload and delete in the knowledge-base container
//! - `web`: axum routes that start the sign-in flows
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use listsearch_gate::auth::{AuthenticationGate, Claim, IdentityAssertion};
//! use listsearch_gate::storage::{BlobStore, MemoryBlobBackend};
//! use listsearch_gate::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_file("config.yaml")?;
//!     config.validate()?;
//!
//!     let gate = AuthenticationGate::new(config.auth.allow_list());
//!     let assertion = IdentityAssertion::new(vec![Claim::new("upn", "alice@contoso.com")]);
//!     println!("{:?}", gate.on_token_validated(&assertion));
//!
//!     let store = BlobStore::new(Arc::new(MemoryBlobBackend::new()));
//!     println!("{}", store.upload("hello", "f1").await?);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod cli;
pub mod commands;
pub mod config;
pub mod constants;
pub mod error;
pub mod storage;
pub mod web;

// Re-export commonly used types
pub use auth::{AllowList, AuthenticationGate, GateDecision};
pub use config::Config;
pub use error::{GateError, Result};
pub use storage::BlobStore;
