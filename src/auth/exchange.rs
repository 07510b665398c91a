//! Authorization code exchange with client credentials
//!
//! The passive app-login scheme receives an authorization code on its
//! callback and redeems it at the provider's token endpoint, authenticating
//! with the app-login client id and secret. The call is awaited once; there
//! is no retry and no timeout beyond what the shared HTTP client imposes.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{GateError, Result};

// ---------------------------------------------------------------------------
// AccessToken
// ---------------------------------------------------------------------------

/// Access token acquired from the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    /// Opaque access token.
    pub access_token: String,

    /// Token type, typically `"Bearer"`.
    pub token_type: String,

    /// Absolute expiry computed from `expires_in`.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_seconds_option"
    )]
    pub expires_at: Option<DateTime<Utc>>,

    /// Refresh token, when the provider issued one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Resource the token was issued for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
}

impl AccessToken {
    /// Returns `true` when the token is expired or expires within 60 seconds.
    /// Tokens without an expiry never expire.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            None => false,
            Some(expires_at) => Utc::now() >= expires_at - chrono::Duration::seconds(60),
        }
    }
}

// ---------------------------------------------------------------------------
// Token endpoint response
// ---------------------------------------------------------------------------

/// `expires_in` arrives as a number from v2 endpoints and as a decimal
/// string from Azure AD v1 endpoints.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Seconds {
    Number(u64),
    Text(String),
}

impl Seconds {
    fn as_secs(&self) -> Option<u64> {
        match self {
            Seconds::Number(n) => Some(*n),
            Seconds::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    #[serde(default)]
    expires_in: Option<Seconds>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    resource: Option<String>,
}

/// Upper bound applied to `expires_in` so the expiry stays representable.
const MAX_EXPIRES_IN_SECS: i64 = 10 * 365 * 24 * 3600;

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl TokenResponse {
    fn into_access_token(self) -> AccessToken {
        let expires_at = self
            .expires_in
            .as_ref()
            .and_then(Seconds::as_secs)
            .map(|secs| {
                let secs = i64::try_from(secs).unwrap_or(i64::MAX).min(MAX_EXPIRES_IN_SECS);
                Utc::now() + chrono::Duration::seconds(secs)
            });

        AccessToken {
            access_token: self.access_token,
            token_type: self.token_type,
            expires_at,
            refresh_token: self.refresh_token,
            resource: self.resource,
        }
    }
}

// ---------------------------------------------------------------------------
// CodeExchanger
// ---------------------------------------------------------------------------

/// Client credentials used to redeem authorization codes.
#[derive(Clone)]
pub struct ClientCredential {
    /// Application (client) id.
    pub client_id: String,
    /// Application secret. Never logged.
    pub client_secret: String,
}

impl std::fmt::Debug for ClientCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredential")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Redeems authorization codes at one token endpoint.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use listsearch_gate::auth::exchange::{ClientCredential, CodeExchanger};
///
/// # async fn example() -> listsearch_gate::error::Result<()> {
/// let exchanger = CodeExchanger::new(
///     Arc::new(reqwest::Client::new()),
///     "https://login.microsoftonline.com/contoso/oauth2/token",
///     ClientCredential {
///         client_id: "graph-client".to_string(),
///         client_secret: "secret".to_string(),
///     },
/// );
/// let token = exchanger
///     .exchange_code("auth-code", "https://app.example.com/Account/AppLogin")
///     .await?;
/// println!("token type {}", token.token_type);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CodeExchanger {
    http: Arc<reqwest::Client>,
    token_endpoint: String,
    credential: ClientCredential,
}

impl CodeExchanger {
    /// Creates an exchanger for `token_endpoint`.
    pub fn new(
        http: Arc<reqwest::Client>,
        token_endpoint: impl Into<String>,
        credential: ClientCredential,
    ) -> Self {
        Self {
            http,
            token_endpoint: token_endpoint.into(),
            credential,
        }
    }

    /// Token endpoint codes are redeemed at.
    pub fn token_endpoint(&self) -> &str {
        &self.token_endpoint
    }

    /// Exchanges `code` for an access token.
    ///
    /// The token is requested for the app-login client itself as resource,
    /// and `redirect_uri` must equal the one the code was issued to.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::TokenExchange`] when the request cannot be sent,
    /// the endpoint answers with a non-success status, or the response body
    /// is not a token response.
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<AccessToken> {
        let mut params: HashMap<&str, &str> = HashMap::new();
        params.insert("grant_type", "authorization_code");
        params.insert("code", code);
        params.insert("redirect_uri", redirect_uri);
        params.insert("client_id", &self.credential.client_id);
        params.insert("client_secret", &self.credential.client_secret);
        params.insert("resource", &self.credential.client_id);

        let resp = self
            .http
            .post(&self.token_endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| GateError::TokenExchange(format!("token request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(GateError::TokenExchange(format!(
                "token endpoint returned {status}: {body}"
            ))
            .into());
        }

        let raw: TokenResponse = resp
            .json()
            .await
            .map_err(|e| GateError::TokenExchange(format!("failed to parse token response: {e}")))?;

        tracing::debug!(
            client_id = %self.credential.client_id,
            "Authorization code redeemed"
        );
        Ok(raw.into_access_token())
    }
}

/// The current request's scheme, host and path, with query and fragment
/// removed. Used as the `redirect_uri` of the code exchange.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use listsearch_gate::auth::exchange::redirect_uri_for;
///
/// let request = Url::parse("https://app.example.com/Account/AppLogin?code=abc#x").unwrap();
/// assert_eq!(redirect_uri_for(&request), "https://app.example.com/Account/AppLogin");
/// ```
pub fn redirect_uri_for(request_uri: &Url) -> String {
    let mut uri = request_uri.clone();
    uri.set_query(None);
    uri.set_fragment(None);
    uri.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_uri_keeps_port_and_path() {
        let request = Url::parse("http://localhost:8080/signin-applogin?state=1").unwrap();
        assert_eq!(redirect_uri_for(&request), "http://localhost:8080/signin-applogin");
    }

    #[test]
    fn test_redirect_uri_root_path() {
        let request = Url::parse("https://app.example.com?code=1").unwrap();
        assert_eq!(redirect_uri_for(&request), "https://app.example.com/");
    }

    #[test]
    fn test_token_response_numeric_expiry() {
        let raw: TokenResponse = serde_json::from_value(serde_json::json!({
            "access_token": "tok",
            "token_type": "Bearer",
            "expires_in": 3600
        }))
        .unwrap();
        let token = raw.into_access_token();
        assert!(token.expires_at.is_some());
        assert!(!token.is_expired());
    }

    #[test]
    fn test_token_response_string_expiry() {
        let raw: TokenResponse = serde_json::from_value(serde_json::json!({
            "access_token": "tok",
            "token_type": "Bearer",
            "expires_in": "3599",
            "resource": "graph-client"
        }))
        .unwrap();
        let token = raw.into_access_token();
        assert!(token.expires_at.is_some());
        assert_eq!(token.resource.as_deref(), Some("graph-client"));
    }

    #[test]
    fn test_token_response_defaults_token_type() {
        let raw: TokenResponse =
            serde_json::from_value(serde_json::json!({ "access_token": "tok" })).unwrap();
        let token = raw.into_access_token();
        assert_eq!(token.token_type, "Bearer");
        assert!(token.expires_at.is_none());
        assert!(!token.is_expired());
    }

    #[test]
    fn test_unparseable_expiry_is_ignored() {
        let raw: TokenResponse = serde_json::from_value(serde_json::json!({
            "access_token": "tok",
            "expires_in": "soon"
        }))
        .unwrap();
        assert!(raw.into_access_token().expires_at.is_none());
    }

    #[test]
    fn test_access_token_expiry_buffer() {
        let token = AccessToken {
            access_token: "tok".to_string(),
            token_type: "Bearer".to_string(),
            expires_at: Some(Utc::now() + chrono::Duration::seconds(30)),
            refresh_token: None,
            resource: None,
        };
        assert!(token.is_expired());
    }

    #[test]
    fn test_client_credential_debug_redacts_secret() {
        let credential = ClientCredential {
            client_id: "cid".to_string(),
            client_secret: "hunter2".to_string(),
        };
        let rendered = format!("{credential:?}");
        assert!(rendered.contains("cid"));
        assert!(!rendered.contains("hunter2"));
    }
}
