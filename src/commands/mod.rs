/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint:

- `serve`     - Run the sign-in routes
- `blob`      - Upload or delete knowledge-base blobs
- `check_upn` - Evaluate a UPN against the allow-list
*/

use crate::config::Config;
use crate::error::{GateError, Result};
use std::sync::Arc;

// Sign-in server
pub mod serve {
    //! Sign-in server handler.
    //!
    //! Resolves provider endpoints, wires the keyring token store into the
    //! app-login handler and serves the router until Ctrl-C.

    use super::*;
    use crate::auth::token_store::{KeyringTokenStore, TokenPersistence};
    use crate::web::{router, AppState};

    /// Run the sign-in server
    ///
    /// # Arguments
    ///
    /// * `config` - Loaded configuration
    ///
    /// # Errors
    ///
    /// Returns error if required settings are missing or the listener
    /// cannot bind
    pub async fn run_serve(config: Config) -> Result<()> {
        config.validate_for_serve()?;

        let http = Arc::new(reqwest::Client::new());
        let tokens: Arc<dyn TokenPersistence> = Arc::new(KeyringTokenStore::new(
            config.app_login.keyring_service.clone(),
            &config.app_login.token_key,
        ));

        let state = AppState::from_config(&config, http, tokens).await;
        tracing::info!(
            allowed_upns = state.gate.allow_list().len(),
            app_login_passive = !state.app_login.challenges_unauthenticated(),
            "Sign-in schemes configured"
        );

        let listener = tokio::net::TcpListener::bind(&config.server.bind)
            .await
            .map_err(GateError::Io)?;
        tracing::info!("Listening on {}", listener.local_addr().map_err(GateError::Io)?);

        axum::serve(listener, router(state))
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(GateError::Io)?;

        tracing::info!("Server stopped");
        Ok(())
    }

    async fn shutdown_signal() {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

// Blob maintenance
pub mod blob {
    //! Blob upload and delete handlers.

    use super::*;
    use crate::storage::BlobStore;
    use std::path::PathBuf;
    use url::Url;

    fn open_store(config: &Config) -> Result<BlobStore> {
        BlobStore::from_connection_string(
            Arc::new(reqwest::Client::new()),
            config.storage_connection_string()?,
        )
    }

    /// Upload a blob and print its URL
    ///
    /// # Arguments
    ///
    /// * `config` - Loaded configuration
    /// * `name` - Blob name
    /// * `file` - File to read the content from
    /// * `content` - Inline content, used when `file` is `None`
    ///
    /// # Errors
    ///
    /// Returns error if no content source is given, the file cannot be read
    /// or the upload fails
    pub async fn upload(
        config: &Config,
        name: &str,
        file: Option<PathBuf>,
        content: Option<String>,
    ) -> Result<Url> {
        let content = match (file, content) {
            (Some(path), _) => tokio::fs::read_to_string(&path).await.map_err(|e| {
                GateError::Storage(format!("Failed to read {}: {}", path.display(), e))
            })?,
            (None, Some(content)) => content,
            (None, None) => {
                return Err(
                    GateError::Storage("either --file or --content is required".to_string()).into(),
                )
            }
        };

        let url = open_store(config)?.upload(&content, name).await?;
        println!("{}", url);
        Ok(url)
    }

    /// Delete a blob; a missing blob is not an error
    ///
    /// # Errors
    ///
    /// Returns error if the service rejects the request
    pub async fn delete(config: &Config, name: &str) -> Result<()> {
        open_store(config)?.delete(name).await?;
        println!("Deleted {}", name);
        Ok(())
    }
}

// Allow-list check
pub mod check_upn {
    //! Evaluates a UPN the same way a validated sign-in is evaluated.

    use super::*;
    use crate::auth::claims::{Claim, IdentityAssertion};
    use crate::auth::gate::{AuthenticationGate, GateDecision};
    use crate::constants::UPN_CLAIM_TYPE;

    /// Check `upn` against the configured allow-list and print the decision
    pub fn check_upn(config: &Config, upn: &str) -> GateDecision {
        let gate = AuthenticationGate::new(config.auth.allow_list());
        let assertion = IdentityAssertion::new(vec![Claim::new(UPN_CLAIM_TYPE, upn)]);
        let decision = gate.on_token_validated(&assertion);

        match &decision {
            GateDecision::Continue => println!("{}: allowed", upn),
            GateDecision::Deny { redirect_to } => {
                println!("{}: denied (redirect to {})", upn, redirect_to)
            }
        }
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::gate::GateDecision;

    #[test]
    fn test_check_upn_allowed_any_case() {
        let mut config = Config::default();
        config.auth.valid_upns = Some("alice@contoso.com;bob@contoso.com".to_string());
        assert_eq!(
            check_upn::check_upn(&config, "BOB@Contoso.com"),
            GateDecision::Continue
        );
    }

    #[test]
    fn test_check_upn_denied_without_allow_list() {
        let config = Config::default();
        assert!(!check_upn::check_upn(&config, "alice@contoso.com").is_continue());
    }

    #[tokio::test]
    async fn test_blob_upload_requires_connection_string() {
        let config = Config::default();
        let err = blob::upload(&config, "f1", None, Some("x".to_string()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("connection_string"));
    }

    #[tokio::test]
    async fn test_serve_bind_failure_is_io_error() {
        let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let mut config = Config::default();
        config.auth.client_id = "interactive-client".to_string();
        config.auth.aad_instance = "http://127.0.0.1:1/".to_string();
        config.auth.tenant_id = "contoso".to_string();
        config.app_login.client_id = "graph-client".to_string();
        config.app_login.client_secret = "secret".to_string();
        config.app_login.token_key = "token-key".to_string();
        config.server.bind = occupied.local_addr().unwrap().to_string();

        let err = serve::run_serve(config).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<GateError>(), Some(GateError::Io(_))));
    }

    #[tokio::test]
    async fn test_blob_upload_missing_file() {
        let mut config = Config::default();
        config.storage.connection_string = Some("UseDevelopmentStorage=true".to_string());
        let result = blob::upload(
            &config,
            "f1",
            Some(std::path::PathBuf::from("/nonexistent/listsearch/input.txt")),
            None,
        )
        .await;
        assert!(result.is_err());
    }
}
