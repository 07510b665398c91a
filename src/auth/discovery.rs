//! OpenID-Connect provider discovery
//!
//! Both schemes talk to the same authority. Its endpoints are read from the
//! OpenID Connect Discovery document at
//! `<authority>/.well-known/openid-configuration`. When the document cannot
//! be fetched, the Azure AD v1 endpoint layout under the authority is used
//! instead so that sign-in redirects keep working against the known
//! provider.
//!
//! # References
//!
//! - OpenID Connect Discovery 1.0 <https://openid.net/specs/openid-connect-discovery-1_0.html>

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{GateError, Result};

/// Endpoints of an OpenID-Connect provider.
///
/// # Examples
///
/// ```
/// use listsearch_gate::auth::discovery::ProviderMetadata;
///
/// let json = r#"{
///     "issuer": "https://sts.example.com/tenant/",
///     "authorization_endpoint": "https://login.example.com/tenant/oauth2/authorize",
///     "token_endpoint": "https://login.example.com/tenant/oauth2/token"
/// }"#;
///
/// let meta: ProviderMetadata = serde_json::from_str(json).unwrap();
/// assert!(meta.end_session_endpoint.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderMetadata {
    /// Issuer identifier of the provider.
    pub issuer: String,

    /// Authorization endpoint that receives authentication requests.
    pub authorization_endpoint: String,

    /// Token endpoint used for the authorization code exchange.
    pub token_endpoint: String,

    /// End-session endpoint that receives logout requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_session_endpoint: Option<String>,

    /// JSON Web Key Set location used to check ID token signatures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,

    /// Additional fields not modelled above.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl ProviderMetadata {
    /// Azure AD v1 endpoint layout rooted at `authority`.
    ///
    /// # Examples
    ///
    /// ```
    /// use listsearch_gate::auth::discovery::ProviderMetadata;
    ///
    /// let meta = ProviderMetadata::azure_ad_defaults("https://login.microsoftonline.com/contoso");
    /// assert_eq!(
    ///     meta.token_endpoint,
    ///     "https://login.microsoftonline.com/contoso/oauth2/token"
    /// );
    /// ```
    pub fn azure_ad_defaults(authority: &str) -> Self {
        let base = authority.trim_end_matches('/');
        Self {
            issuer: base.to_string(),
            authorization_endpoint: format!("{base}/oauth2/authorize"),
            token_endpoint: format!("{base}/oauth2/token"),
            end_session_endpoint: Some(format!("{base}/oauth2/logout")),
            jwks_uri: Some(format!("{base}/discovery/keys")),
            extra: HashMap::new(),
        }
    }

    /// Logout endpoint, falling back to `<authorize>/../logout` when the
    /// provider does not advertise one.
    pub fn logout_endpoint(&self) -> String {
        match &self.end_session_endpoint {
            Some(endpoint) => endpoint.clone(),
            None => match self.authorization_endpoint.rsplit_once('/') {
                Some((base, _)) => format!("{base}/logout"),
                None => self.authorization_endpoint.clone(),
            },
        }
    }
}

impl ProviderMetadata {
    /// Signing key set location, falling back to the Azure AD layout next to
    /// the `oauth2` endpoints when the provider does not advertise one.
    pub fn jwks_endpoint(&self) -> String {
        match &self.jwks_uri {
            Some(uri) => uri.clone(),
            None => match self.authorization_endpoint.split_once("/oauth2/") {
                Some((base, _)) => format!("{base}/discovery/keys"),
                None => format!("{}/discovery/keys", self.issuer.trim_end_matches('/')),
            },
        }
    }
}

/// Discovery document location for `authority`.
pub fn discovery_url(authority: &str) -> String {
    format!(
        "{}/.well-known/openid-configuration",
        authority.trim_end_matches('/')
    )
}

/// Fetches the discovery document for `authority`.
///
/// # Errors
///
/// Returns [`GateError::Auth`] when the request fails, the provider answers
/// with a non-success status, or the body is not a discovery document.
///
/// # Examples
///
/// ```no_run
/// use listsearch_gate::auth::discovery::fetch_provider_metadata;
///
/// # async fn example() -> listsearch_gate::error::Result<()> {
/// let http = reqwest::Client::new();
/// let meta = fetch_provider_metadata(&http, "https://login.microsoftonline.com/contoso").await?;
/// println!("authorize at {}", meta.authorization_endpoint);
/// # Ok(())
/// # }
/// ```
pub async fn fetch_provider_metadata(
    http: &reqwest::Client,
    authority: &str,
) -> Result<ProviderMetadata> {
    let url = discovery_url(authority);

    let resp = http
        .get(&url)
        .send()
        .await
        .map_err(|e| GateError::Auth(format!("discovery request to {url} failed: {e}")))?;

    if !resp.status().is_success() {
        return Err(GateError::Auth(format!(
            "discovery endpoint {url} returned {}",
            resp.status()
        ))
        .into());
    }

    let meta = resp
        .json::<ProviderMetadata>()
        .await
        .map_err(|e| GateError::Auth(format!("failed to parse discovery document: {e}")))?;

    Ok(meta)
}

/// Fetches provider metadata, falling back to
/// [`ProviderMetadata::azure_ad_defaults`] when discovery fails.
pub async fn resolve_provider_metadata(http: &reqwest::Client, authority: &str) -> ProviderMetadata {
    match fetch_provider_metadata(http, authority).await {
        Ok(meta) => {
            tracing::debug!(issuer = %meta.issuer, "Loaded provider metadata from discovery");
            meta
        }
        Err(e) => {
            tracing::warn!(
                authority = %authority,
                error = %e,
                "Provider discovery failed, using Azure AD endpoint defaults"
            );
            ProviderMetadata::azure_ad_defaults(authority)
        }
    }
}
