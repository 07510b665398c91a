//! OpenID-Connect scheme registrations
//!
//! The application registers two independent schemes against the same
//! authority:
//!
//! - the interactive, allow-list gated [`APP_LOGIN_SCHEME`] that signs users
//!   into the cookie session, and
//! - the passive [`SHAREPOINT_APP_LOGIN_SCHEME`] that is only started by an
//!   explicit sign-in and exists to acquire and persist an access token.
//!
//! Each [`OidcScheme`] owns its own [`SchemeOptions`]; nothing is inherited
//! between them. Both run [`on_redirect_to_provider`] on every outbound
//! message.

use base64::Engine as _;

use crate::auth::discovery::ProviderMetadata;
use crate::auth::gate::on_redirect_to_provider;
use crate::auth::protocol::{OpenIdConnectMessage, RequestType};
use crate::config::Config;
use crate::constants::{APP_LOGIN_SCHEME, COOKIE_SCHEME, SHAREPOINT_APP_LOGIN_SCHEME};

/// Whether a scheme answers challenges for unauthenticated requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthenticationMode {
    /// Challenges unauthenticated requests automatically.
    Active,
    /// Only runs on explicit sign-in calls.
    Passive,
}

/// Options for one OpenID-Connect scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemeOptions {
    /// Name the scheme is registered under.
    pub authentication_type: String,
    /// Scheme that signed-in identities are issued to.
    pub sign_in_as_authentication_type: String,
    /// Active or passive registration.
    pub mode: AuthenticationMode,
    /// Application (client) id registered with the provider.
    pub client_id: String,
    /// Provider authority, `<instance>/<tenant>`.
    pub authority: String,
    /// Where the provider sends the browser after logout.
    pub post_logout_redirect_uri: Option<String>,
    /// `response_type` requested on sign-in.
    pub response_type: String,
    /// `scope` requested on sign-in.
    pub scope: String,
}

impl SchemeOptions {
    fn base(
        authentication_type: &str,
        sign_in_as: &str,
        mode: AuthenticationMode,
        client_id: &str,
        config: &Config,
    ) -> Self {
        Self {
            authentication_type: authentication_type.to_string(),
            sign_in_as_authentication_type: sign_in_as.to_string(),
            mode,
            client_id: client_id.to_string(),
            authority: config.auth.authority(),
            post_logout_redirect_uri: config.auth.post_logout_redirect_uri.clone(),
            response_type: "code id_token".to_string(),
            scope: "openid profile".to_string(),
        }
    }

    /// Options of the interactive, allow-list gated scheme.
    ///
    /// Signs identities into the cookie scheme and challenges automatically.
    pub fn interactive(config: &Config) -> Self {
        Self::base(
            APP_LOGIN_SCHEME,
            COOKIE_SCHEME,
            AuthenticationMode::Active,
            &config.auth.client_id,
            config,
        )
    }

    /// Options of the passive token-acquisition scheme.
    ///
    /// Uses the app-login client id and signs identities into its own
    /// scheme so they never become a browsing session.
    pub fn app_login(config: &Config) -> Self {
        Self::base(
            SHAREPOINT_APP_LOGIN_SCHEME,
            SHAREPOINT_APP_LOGIN_SCHEME,
            AuthenticationMode::Passive,
            &config.app_login.client_id,
            config,
        )
    }
}

/// A registered scheme bound to resolved provider endpoints.
#[derive(Debug, Clone)]
pub struct OidcScheme {
    options: SchemeOptions,
    metadata: ProviderMetadata,
}

impl OidcScheme {
    /// Binds `options` to the provider's endpoints.
    pub fn new(options: SchemeOptions, metadata: ProviderMetadata) -> Self {
        Self { options, metadata }
    }

    /// Scheme options.
    pub fn options(&self) -> &SchemeOptions {
        &self.options
    }

    /// Provider endpoints.
    pub fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    /// Returns `true` when an unauthenticated request should trigger this
    /// scheme's challenge. Passive schemes never do.
    pub fn challenges_unauthenticated(&self) -> bool {
        self.options.mode == AuthenticationMode::Active
    }

    /// Builds the authentication request for a sign-in that will return to
    /// `redirect_uri`.
    ///
    /// Fresh `state` and `nonce` values are generated per request and the
    /// message goes through [`on_redirect_to_provider`], so it always carries
    /// `prompt=login`.
    pub fn authentication_request(&self, redirect_uri: &str) -> OpenIdConnectMessage {
        let mut message = OpenIdConnectMessage::new(
            RequestType::Authentication,
            self.metadata.authorization_endpoint.clone(),
            self.options.client_id.clone(),
        );
        message.redirect_uri = Some(redirect_uri.to_string());
        message.response_type = Some(self.options.response_type.clone());
        message.response_mode = Some("form_post".to_string());
        message.scope = Some(self.options.scope.clone());
        message.state = Some(random_token());
        message.nonce = Some(random_token());

        tracing::debug!(
            scheme = %self.options.authentication_type,
            endpoint = %message.issuer_address,
            "Redirecting to identity provider for authentication"
        );
        on_redirect_to_provider(message)
    }

    /// Builds the logout request.
    pub fn logout_request(&self) -> OpenIdConnectMessage {
        let mut message = OpenIdConnectMessage::new(
            RequestType::Logout,
            self.metadata.logout_endpoint(),
            self.options.client_id.clone(),
        );
        message.post_logout_redirect_uri = self.options.post_logout_redirect_uri.clone();
        on_redirect_to_provider(message)
    }
}

/// 16 random bytes, base64url without padding.
fn random_token() -> String {
    use rand::RngCore as _;
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}
