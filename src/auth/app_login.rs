//! Passive app-login: code exchange and token persistence
//!
//! When the passive scheme's callback receives an authorization code, the
//! code is redeemed with the app-login client credentials and the resulting
//! access token is stored for the signed-in user. The sign-in only proceeds
//! once both steps have completed; a failure in either aborts it and nothing
//! is stored.

use std::sync::Arc;

use url::Url;

use crate::auth::claims::IdentityAssertion;
use crate::auth::exchange::{redirect_uri_for, CodeExchanger};
use crate::auth::token_store::TokenPersistence;
use crate::error::{GateError, Result};

/// Inputs of the authorization-code-received notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCodeContext {
    /// Authorization code from the callback.
    pub code: String,
    /// URI of the callback request, including its query.
    pub request_uri: Url,
    /// Name (email) of the authenticated user.
    pub user_email: String,
}

impl AuthorizationCodeContext {
    /// Builds the context from a callback and the assertion it carried.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Auth`] when the assertion has no name claim;
    /// without it there is no key to store the token under.
    pub fn from_assertion(
        code: impl Into<String>,
        request_uri: Url,
        assertion: &IdentityAssertion,
    ) -> Result<Self> {
        let user_email = assertion
            .name()
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| GateError::Auth("authenticated ticket has no name claim".to_string()))?;

        Ok(Self {
            code: code.into(),
            request_uri,
            user_email: user_email.to_string(),
        })
    }
}

/// Handles authorization codes delivered to the passive scheme.
pub struct AppLoginHandler {
    exchanger: CodeExchanger,
    tokens: Arc<dyn TokenPersistence>,
}

impl AppLoginHandler {
    /// Creates a handler redeeming codes with `exchanger` and storing the
    /// results in `tokens`.
    pub fn new(exchanger: CodeExchanger, tokens: Arc<dyn TokenPersistence>) -> Self {
        Self { exchanger, tokens }
    }

    /// Redeems the code and persists the token for the user.
    ///
    /// The redirect URI sent with the exchange is the callback request's
    /// scheme, host and path.
    ///
    /// # Errors
    ///
    /// Propagates [`GateError::TokenExchange`] from the exchange and any
    /// persistence error. On exchange failure the store is not touched.
    pub async fn on_authorization_code_received(
        &self,
        context: &AuthorizationCodeContext,
    ) -> Result<()> {
        let redirect_uri = redirect_uri_for(&context.request_uri);

        let token = self
            .exchanger
            .exchange_code(&context.code, &redirect_uri)
            .await
            .inspect_err(|e| {
                tracing::warn!(user = %context.user_email, error = %e, "App-login code exchange failed");
            })?;

        self.tokens.save(&context.user_email, &token).await?;
        tracing::info!(user = %context.user_email, "App-login completed");
        Ok(())
    }
}

impl std::fmt::Debug for AppLoginHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppLoginHandler")
            .field("exchanger", &self.exchanger)
            .finish_non_exhaustive()
    }
}
