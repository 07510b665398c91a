//! Outbound OpenID-Connect protocol messages
//!
//! An [`OpenIdConnectMessage`] is what a scheme sends to the identity
//! provider: either an authentication request (a challenge or an explicit
//! sign-in) or a logout request. Notifications may edit a message before it
//! is rendered into a redirect URL by [`OpenIdConnectMessage::to_url`].

use std::fmt;

use url::Url;

use crate::error::{GateError, Result};

/// Kind of outbound protocol message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    /// Authorization request sent to the `authorize` endpoint.
    Authentication,
    /// End-session request sent to the `logout` endpoint.
    Logout,
    /// Back-channel token request.
    Token,
}

/// Values of the `prompt` request parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    /// Force the user to re-enter credentials, no silent SSO.
    Login,
    /// Never show UI; fail when interaction is needed.
    None,
    /// Force the consent screen.
    Consent,
    /// Let the user pick an account.
    SelectAccount,
}

impl Prompt {
    /// Wire value of the parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Prompt::Login => "login",
            Prompt::None => "none",
            Prompt::Consent => "consent",
            Prompt::SelectAccount => "select_account",
        }
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outbound message addressed to the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenIdConnectMessage {
    /// Message kind.
    pub request_type: RequestType,
    /// Provider endpoint the message is sent to.
    pub issuer_address: String,
    /// `client_id` parameter.
    pub client_id: String,
    /// `redirect_uri` parameter (authentication requests).
    pub redirect_uri: Option<String>,
    /// `response_type` parameter, `code id_token` for hybrid flow.
    pub response_type: Option<String>,
    /// `response_mode` parameter, `form_post` by default.
    pub response_mode: Option<String>,
    /// `scope` parameter.
    pub scope: Option<String>,
    /// Opaque `state` round-tripped by the provider.
    pub state: Option<String>,
    /// `nonce` bound into the id token.
    pub nonce: Option<String>,
    /// `prompt` parameter.
    pub prompt: Option<Prompt>,
    /// `post_logout_redirect_uri` parameter (logout requests).
    pub post_logout_redirect_uri: Option<String>,
}

impl OpenIdConnectMessage {
    /// Creates a bare message of the given kind.
    pub fn new(
        request_type: RequestType,
        issuer_address: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            request_type,
            issuer_address: issuer_address.into(),
            client_id: client_id.into(),
            redirect_uri: None,
            response_type: None,
            response_mode: None,
            scope: None,
            state: None,
            nonce: None,
            prompt: None,
            post_logout_redirect_uri: None,
        }
    }

    /// Renders the message as a redirect URL against `issuer_address`.
    ///
    /// Parameters already present on the endpoint URL are preserved; unset
    /// optional parameters are omitted.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Auth`] when `issuer_address` is not a valid
    /// absolute URL.
    ///
    /// # Examples
    ///
    /// ```
    /// use listsearch_gate::auth::protocol::{OpenIdConnectMessage, Prompt, RequestType};
    ///
    /// let mut msg = OpenIdConnectMessage::new(
    ///     RequestType::Authentication,
    ///     "https://login.example.com/tenant/oauth2/authorize",
    ///     "client-123",
    /// );
    /// msg.prompt = Some(Prompt::Login);
    /// let url = msg.to_url().unwrap();
    /// assert!(url.as_str().contains("prompt=login"));
    /// assert!(url.as_str().contains("client_id=client-123"));
    /// ```
    pub fn to_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.issuer_address).map_err(|e| {
            GateError::Auth(format!(
                "invalid provider endpoint '{}': {e}",
                self.issuer_address
            ))
        })?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &self.client_id);
            let optional = [
                ("redirect_uri", self.redirect_uri.as_deref()),
                ("response_type", self.response_type.as_deref()),
                ("response_mode", self.response_mode.as_deref()),
                ("scope", self.scope.as_deref()),
                ("state", self.state.as_deref()),
                ("nonce", self.nonce.as_deref()),
                ("prompt", self.prompt.as_ref().map(Prompt::as_str)),
                (
                    "post_logout_redirect_uri",
                    self.post_logout_redirect_uri.as_deref(),
                ),
            ];
            for (key, value) in optional {
                if let Some(v) = value {
                    query.append_pair(key, v);
                }
            }
        }

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query_value(url: &Url, key: &str) -> Option<String> {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    #[test]
    fn test_prompt_wire_values() {
        assert_eq!(Prompt::Login.as_str(), "login");
        assert_eq!(Prompt::None.as_str(), "none");
        assert_eq!(Prompt::Consent.as_str(), "consent");
        assert_eq!(Prompt::SelectAccount.to_string(), "select_account");
    }

    #[test]
    fn test_to_url_omits_unset_parameters() {
        let msg = OpenIdConnectMessage::new(
            RequestType::Logout,
            "https://login.example.com/t/oauth2/logout",
            "cid",
        );
        let url = msg.to_url().unwrap();
        assert_eq!(query_value(&url, "client_id").as_deref(), Some("cid"));
        assert!(query_value(&url, "prompt").is_none());
        assert!(query_value(&url, "redirect_uri").is_none());
    }

    #[test]
    fn test_to_url_encodes_redirect_uri() {
        let mut msg = OpenIdConnectMessage::new(
            RequestType::Authentication,
            "https://login.example.com/t/oauth2/authorize",
            "cid",
        );
        msg.redirect_uri = Some("https://app.example.com/signin?x=1".to_string());
        let url = msg.to_url().unwrap();
        assert_eq!(
            query_value(&url, "redirect_uri").as_deref(),
            Some("https://app.example.com/signin?x=1")
        );
        assert!(!url.as_str().contains("signin?x=1"));
    }

    #[test]
    fn test_to_url_preserves_existing_endpoint_query() {
        let msg = OpenIdConnectMessage::new(
            RequestType::Authentication,
            "https://login.example.com/authorize?p=b2c_signin",
            "cid",
        );
        let url = msg.to_url().unwrap();
        assert_eq!(query_value(&url, "p").as_deref(), Some("b2c_signin"));
    }

    #[test]
    fn test_to_url_rejects_relative_endpoint() {
        let msg = OpenIdConnectMessage::new(RequestType::Authentication, "/authorize", "cid");
        let err = msg.to_url().unwrap_err();
        assert!(err.to_string().contains("invalid provider endpoint"));
    }
}
