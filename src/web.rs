//! HTTP sign-in surface
//!
//! A small axum router that runs the two OpenID-Connect flows and renders
//! the denial page:
//!
//! - `GET /Account/SignIn`      challenge of the interactive scheme
//! - `GET /Account/AppLogin`    explicit sign-in of the passive scheme
//! - `GET /Account/SignOut`     logout message to the provider
//! - `GET /Account/InvalidUser` static page for users not on the allow-list
//! - `POST /signin-oidc`        interactive callback, runs the allow-list gate
//! - `POST /signin-applogin`    app-login callback, redeems and stores a token
//!
//! Both callbacks receive the provider's `form_post` response. The `state`
//! must match a sign-in started by this process and the `id_token` must pass
//! [`IdTokenValidator`] before any claim is used.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;
use url::Url;

use crate::auth::app_login::{AppLoginHandler, AuthorizationCodeContext};
use crate::auth::claims::IdentityAssertion;
use crate::auth::discovery::resolve_provider_metadata;
use crate::auth::exchange::{ClientCredential, CodeExchanger};
use crate::auth::gate::{AuthenticationGate, GateDecision};
use crate::auth::id_token::{IdTokenValidator, JwksValidator};
use crate::auth::pending::{PendingSignIn, PendingSignIns, SignInFlow};
use crate::auth::scheme::{OidcScheme, SchemeOptions};
use crate::auth::token_store::TokenPersistence;
use crate::config::Config;
use crate::constants::INVALID_USER_PATH;
use crate::error::GateError;

/// Callback path of the interactive scheme.
pub const SIGNIN_CALLBACK_PATH: &str = "/signin-oidc";

/// Callback path of the passive app-login scheme.
pub const APP_LOGIN_CALLBACK_PATH: &str = "/signin-applogin";

/// Where a completed sign-in lands.
pub const POST_SIGN_IN_PATH: &str = "/";

const INVALID_USER_PAGE: &str = "<!DOCTYPE html>\n<html>\n<head><title>Access denied</title></head>\n<body>\n<h1>Access denied</h1>\n<p>Your account is not allowed to use this application. Contact your administrator to be added.</p>\n</body>\n</html>\n";

/// Shared state of the sign-in routes.
#[derive(Clone)]
pub struct AppState {
    /// Interactive, allow-list gated scheme.
    pub interactive: Arc<OidcScheme>,
    /// Passive app-login scheme.
    pub app_login: Arc<OidcScheme>,
    /// Allow-list check for validated interactive sign-ins.
    pub gate: Arc<AuthenticationGate>,
    /// Code exchange and token persistence for app-login callbacks.
    pub app_login_handler: Arc<AppLoginHandler>,
    /// ID token checks applied to both callbacks.
    pub validator: Arc<dyn IdTokenValidator>,
    /// Sign-ins waiting for their callback.
    pub pending: Arc<PendingSignIns>,
    /// Externally visible base URL; derived from the `Host` header when unset.
    pub public_base_url: Option<String>,
}

impl AppState {
    /// Builds the state from configuration, resolving provider endpoints
    /// once. Discovery failures fall back to Azure AD defaults.
    pub async fn from_config(
        config: &Config,
        http: Arc<reqwest::Client>,
        tokens: Arc<dyn TokenPersistence>,
    ) -> Self {
        let authority = config.auth.authority();
        let metadata = resolve_provider_metadata(&http, &authority).await;

        let interactive = OidcScheme::new(SchemeOptions::interactive(config), metadata.clone());
        let app_login = OidcScheme::new(SchemeOptions::app_login(config), metadata.clone());

        let validator = JwksValidator::from_metadata(http.clone(), &metadata);
        let exchanger = CodeExchanger::new(
            http,
            metadata.token_endpoint.clone(),
            ClientCredential {
                client_id: config.app_login.client_id.clone(),
                client_secret: config.app_login.client_secret.clone(),
            },
        );

        Self {
            interactive: Arc::new(interactive),
            app_login: Arc::new(app_login),
            gate: Arc::new(AuthenticationGate::new(config.auth.allow_list())),
            app_login_handler: Arc::new(AppLoginHandler::new(exchanger, tokens)),
            validator: Arc::new(validator),
            pending: Arc::new(PendingSignIns::default()),
            public_base_url: config.server.public_base_url.clone(),
        }
    }

    fn scheme(&self, flow: SignInFlow) -> &OidcScheme {
        match flow {
            SignInFlow::Interactive => &self.interactive,
            SignInFlow::AppLogin => &self.app_login,
        }
    }

    fn base_url(&self, headers: &HeaderMap) -> String {
        if let Some(base) = &self.public_base_url {
            return base.trim_end_matches('/').to_string();
        }
        let host = headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("localhost");
        let scheme = headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("http");
        format!("{scheme}://{host}")
    }
}

/// Builds the router over `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/Account/SignIn", get(sign_in))
        .route("/Account/AppLogin", get(app_login))
        .route("/Account/SignOut", get(sign_out))
        .route(INVALID_USER_PATH, get(invalid_user))
        .route(SIGNIN_CALLBACK_PATH, post(sign_in_callback))
        .route(APP_LOGIN_CALLBACK_PATH, post(app_login_callback))
        .with_state(state)
}

/// Failure while running a flow.
///
/// Server-side failures render as `500`; rejected callbacks keep their
/// `4xx` status. Details are logged, never returned.
#[derive(Debug)]
pub struct WebError {
    status: StatusCode,
    error: anyhow::Error,
}

impl WebError {
    /// A failure caused by the request itself.
    pub fn rejected(status: StatusCode, error: impl Into<anyhow::Error>) -> Self {
        Self {
            status,
            error: error.into(),
        }
    }

    /// Status the failure renders with.
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<anyhow::Error> for WebError {
    fn from(error: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error,
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(error = %self.error, "Sign-in request failed");
            (self.status, "Sign-in is temporarily unavailable").into_response()
        } else {
            tracing::warn!(status = %self.status, error = %self.error, "Sign-in response rejected");
            (self.status, "Sign-in response rejected").into_response()
        }
    }
}

/// `302 Found` to `location`.
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

impl IntoResponse for GateDecision {
    /// `Continue` has nothing to render and answers `204 No Content`;
    /// `Deny` answers `302 Found` to its redirect target.
    fn into_response(self) -> Response {
        match self {
            GateDecision::Continue => StatusCode::NO_CONTENT.into_response(),
            GateDecision::Deny { redirect_to } => found(&redirect_to),
        }
    }
}

async fn start_sign_in(
    state: &AppState,
    headers: &HeaderMap,
    flow: SignInFlow,
    callback_path: &str,
) -> std::result::Result<Response, WebError> {
    let redirect_uri = format!("{}{}", state.base_url(headers), callback_path);
    let message = state.scheme(flow).authentication_request(&redirect_uri);
    let location = message.to_url()?;

    if let (Some(key), Some(nonce)) = (message.state, message.nonce) {
        state
            .pending
            .insert(
                key,
                PendingSignIn {
                    flow,
                    nonce,
                    redirect_uri,
                },
            )
            .await;
    }
    Ok(found(location.as_str()))
}

async fn sign_in(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> std::result::Result<Response, WebError> {
    start_sign_in(&state, &headers, SignInFlow::Interactive, SIGNIN_CALLBACK_PATH).await
}

async fn app_login(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> std::result::Result<Response, WebError> {
    start_sign_in(&state, &headers, SignInFlow::AppLogin, APP_LOGIN_CALLBACK_PATH).await
}

/// Fields of the provider's `form_post` response.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackForm {
    /// Opaque value sent with the authentication request.
    pub state: Option<String>,
    /// Signed ID token.
    pub id_token: Option<String>,
    /// Authorization code (hybrid flow).
    pub code: Option<String>,
    /// Error code when the provider refused the sign-in.
    pub error: Option<String>,
    /// Human-readable error detail.
    pub error_description: Option<String>,
}

/// Matches the callback to its pending sign-in and validates the ID token.
async fn complete_sign_in(
    state: &AppState,
    form: &CallbackForm,
    flow: SignInFlow,
) -> std::result::Result<(PendingSignIn, IdentityAssertion), WebError> {
    if let Some(error) = &form.error {
        return Err(WebError::rejected(
            StatusCode::BAD_REQUEST,
            anyhow::anyhow!(
                "provider returned '{error}': {}",
                form.error_description.as_deref().unwrap_or_default()
            ),
        ));
    }

    let key = form.state.as_deref().unwrap_or_default();
    let pending = match state.pending.take(key).await {
        Some(pending) if pending.flow == flow => pending,
        _ => {
            return Err(WebError::rejected(
                StatusCode::BAD_REQUEST,
                anyhow::anyhow!("unknown or expired sign-in state"),
            ))
        }
    };

    let id_token = form.id_token.as_deref().ok_or_else(|| {
        WebError::rejected(
            StatusCode::BAD_REQUEST,
            anyhow::anyhow!("callback carries no id_token"),
        )
    })?;

    let audience = &state.scheme(flow).options().client_id;
    let assertion = state
        .validator
        .validate(id_token, audience, &pending.nonce)
        .await
        .map_err(|e| WebError::rejected(StatusCode::UNAUTHORIZED, e))?;

    Ok((pending, assertion))
}

async fn sign_in_callback(
    State(state): State<AppState>,
    Form(form): Form<CallbackForm>,
) -> std::result::Result<Response, WebError> {
    let (_, assertion) = complete_sign_in(&state, &form, SignInFlow::Interactive).await?;

    Ok(match state.gate.on_token_validated(&assertion) {
        GateDecision::Continue => found(POST_SIGN_IN_PATH),
        denied => denied.into_response(),
    })
}

async fn app_login_callback(
    State(state): State<AppState>,
    Form(form): Form<CallbackForm>,
) -> std::result::Result<Response, WebError> {
    let (pending, assertion) = complete_sign_in(&state, &form, SignInFlow::AppLogin).await?;

    let code = form.code.as_deref().ok_or_else(|| {
        WebError::rejected(
            StatusCode::BAD_REQUEST,
            anyhow::anyhow!("app-login callback carries no code"),
        )
    })?;
    let request_uri = Url::parse(&pending.redirect_uri)
        .map_err(|e| anyhow::Error::from(GateError::Url(e)))?;
    let context = AuthorizationCodeContext::from_assertion(code, request_uri, &assertion)
        .map_err(|e| WebError::rejected(StatusCode::BAD_REQUEST, e))?;

    state
        .app_login_handler
        .on_authorization_code_received(&context)
        .await?;
    Ok(found(POST_SIGN_IN_PATH))
}

async fn sign_out(State(state): State<AppState>) -> std::result::Result<Response, WebError> {
    let message = state.interactive.logout_request();
    Ok(found(message.to_url()?.as_str()))
}

async fn invalid_user() -> Html<&'static str> {
    Html(INVALID_USER_PAGE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deny_renders_found_redirect() {
        let response = GateDecision::Deny {
            redirect_to: INVALID_USER_PATH.to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            INVALID_USER_PATH
        );
    }

    #[test]
    fn test_continue_renders_no_content() {
        let response = GateDecision::Continue.into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[test]
    fn test_web_error_hides_details() {
        let response = WebError::from(anyhow::anyhow!("secret detail")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_rejected_callback_keeps_status() {
        let error = WebError::rejected(StatusCode::BAD_REQUEST, anyhow::anyhow!("bad state"));
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
