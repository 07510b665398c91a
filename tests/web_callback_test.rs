//! Sign-in callback integration tests
//!
//! Each test starts a sign-in through the router, signs an ID token for the
//! issued `state` and `nonce`, and posts it back the way the provider's
//! `form_post` response would. A wiremock server stands in for the key set
//! and token endpoints.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use base64::Engine as _;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use tower::ServiceExt;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use listsearch_gate::auth::app_login::AppLoginHandler;
use listsearch_gate::auth::exchange::{ClientCredential, CodeExchanger};
use listsearch_gate::auth::id_token::JwksValidator;
use listsearch_gate::auth::token_store::{MemoryTokenStore, TokenPersistence};
use listsearch_gate::constants::INVALID_USER_PATH;
use listsearch_gate::web::{
    router, AppState, APP_LOGIN_CALLBACK_PATH, POST_SIGN_IN_PATH, SIGNIN_CALLBACK_PATH,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const SECRET: &[u8] = b"callback-test-signing-secret-0001";
const KID: &str = "test-key";
const ISSUER: &str = "https://login.example.com/contoso";

struct Started {
    state: String,
    nonce: String,
}

async fn mount_key_set(server: &MockServer) {
    let key_set = serde_json::json!({
        "keys": [{
            "kty": "oct",
            "kid": KID,
            "alg": "HS256",
            "k": base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(SECRET),
        }]
    });
    Mock::given(method("GET"))
        .and(path("/contoso/discovery/keys"))
        .respond_with(ResponseTemplate::new(200).set_body_json(key_set))
        .mount(server)
        .await;
}

/// Router state whose ID tokens are checked against `server`'s key set.
async fn state_for(server: &MockServer) -> (AppState, Arc<MemoryTokenStore>) {
    mount_key_set(server).await;
    let config = common::test_config();
    let (mut state, tokens) = common::test_state(&config);
    state.public_base_url = Some("https://app.example.com".to_string());
    state.validator = Arc::new(JwksValidator::new(
        Arc::new(reqwest::Client::new()),
        format!("{}/contoso/discovery/keys", server.uri()),
        ISSUER,
    ));
    (state, tokens)
}

fn id_token(audience: &str, nonce: &str, upn: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = serde_json::json!({
        "iss": ISSUER,
        "aud": audience,
        "exp": now + 600,
        "iat": now,
        "nonce": nonce,
        "upn": upn,
        "name": upn,
    });
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(KID.to_string());
    encode(&header, &claims, &EncodingKey::from_secret(SECRET)).expect("token encodes")
}

async fn start(app: &Router, route: &str) -> Started {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(route).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);

    let location = response.headers().get(header::LOCATION).unwrap().to_str().unwrap();
    let url = Url::parse(location).expect("absolute location");
    let param = |key: &str| {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
            .expect("parameter present")
    };
    Started {
        state: param("state"),
        nonce: param("nonce"),
    }
}

async fn post_form(app: &Router, callback: &str, fields: &[(&str, &str)]) -> Response {
    let body = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields)
        .finish();
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(callback)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap()
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .expect("location header")
        .to_str()
        .expect("ascii location")
}

fn handler_for(server: &MockServer, tokens: Arc<MemoryTokenStore>) -> Arc<AppLoginHandler> {
    let exchanger = CodeExchanger::new(
        Arc::new(reqwest::Client::new()),
        format!("{}/contoso/oauth2/token", server.uri()),
        ClientCredential {
            client_id: "graph-client".to_string(),
            client_secret: "graph-secret".to_string(),
        },
    );
    Arc::new(AppLoginHandler::new(exchanger, tokens))
}

// ---------------------------------------------------------------------------
// Interactive callback
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_allowed_user_completes_sign_in() {
    let server = MockServer::start().await;
    let (state, _) = state_for(&server).await;
    let app = router(state);

    let started = start(&app, "/Account/SignIn").await;
    let token = id_token("interactive-client", &started.nonce, "Alice@Contoso.com");
    let response = post_form(
        &app,
        SIGNIN_CALLBACK_PATH,
        &[("id_token", token.as_str()), ("state", started.state.as_str())],
    )
    .await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), POST_SIGN_IN_PATH);
}

#[tokio::test]
async fn test_unlisted_user_redirected_to_invalid_user() {
    let server = MockServer::start().await;
    let (state, _) = state_for(&server).await;
    let app = router(state);

    let started = start(&app, "/Account/SignIn").await;
    let token = id_token("interactive-client", &started.nonce, "mallory@contoso.com");
    let response = post_form(
        &app,
        SIGNIN_CALLBACK_PATH,
        &[("id_token", token.as_str()), ("state", started.state.as_str())],
    )
    .await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), INVALID_USER_PATH);
}

#[tokio::test]
async fn test_replayed_state_is_rejected() {
    let server = MockServer::start().await;
    let (state, _) = state_for(&server).await;
    let app = router(state);

    let started = start(&app, "/Account/SignIn").await;
    let token = id_token("interactive-client", &started.nonce, "alice@contoso.com");
    let fields = [("id_token", token.as_str()), ("state", started.state.as_str())];

    let first = post_form(&app, SIGNIN_CALLBACK_PATH, &fields).await;
    assert_eq!(first.status(), StatusCode::FOUND);

    let replay = post_form(&app, SIGNIN_CALLBACK_PATH, &fields).await;
    assert_eq!(replay.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unsolicited_callback_is_rejected() {
    let server = MockServer::start().await;
    let (state, _) = state_for(&server).await;
    let app = router(state);

    let token = id_token("interactive-client", "n", "alice@contoso.com");
    let response = post_form(
        &app,
        SIGNIN_CALLBACK_PATH,
        &[("id_token", token.as_str()), ("state", "never-issued")],
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_state_from_other_flow_is_rejected() {
    let server = MockServer::start().await;
    let (state, _) = state_for(&server).await;
    let app = router(state);

    let started = start(&app, "/Account/AppLogin").await;
    let token = id_token("interactive-client", &started.nonce, "alice@contoso.com");
    let response = post_form(
        &app,
        SIGNIN_CALLBACK_PATH,
        &[("id_token", token.as_str()), ("state", started.state.as_str())],
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_wrong_nonce_is_unauthorized() {
    let server = MockServer::start().await;
    let (state, _) = state_for(&server).await;
    let app = router(state);

    let started = start(&app, "/Account/SignIn").await;
    let token = id_token("interactive-client", "someone-elses-nonce", "alice@contoso.com");
    let response = post_form(
        &app,
        SIGNIN_CALLBACK_PATH,
        &[("id_token", token.as_str()), ("state", started.state.as_str())],
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_for_other_client_is_unauthorized() {
    let server = MockServer::start().await;
    let (state, _) = state_for(&server).await;
    let app = router(state);

    let started = start(&app, "/Account/SignIn").await;
    let token = id_token("graph-client", &started.nonce, "alice@contoso.com");
    let response = post_form(
        &app,
        SIGNIN_CALLBACK_PATH,
        &[("id_token", token.as_str()), ("state", started.state.as_str())],
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_provider_error_is_rejected() {
    let server = MockServer::start().await;
    let (state, _) = state_for(&server).await;
    let app = router(state);

    let started = start(&app, "/Account/SignIn").await;
    let response = post_form(
        &app,
        SIGNIN_CALLBACK_PATH,
        &[
            ("error", "access_denied"),
            ("error_description", "user cancelled"),
            ("state", started.state.as_str()),
        ],
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// App-login callback
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_app_login_callback_persists_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/contoso/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "token_type": "Bearer",
            "expires_in": "3599",
            "access_token": "sharepoint_access_token"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (mut state, tokens) = state_for(&server).await;
    state.app_login_handler = handler_for(&server, tokens.clone());
    let app = router(state);

    let started = start(&app, "/Account/AppLogin").await;
    let token = id_token("graph-client", &started.nonce, "alice@contoso.com");
    let response = post_form(
        &app,
        APP_LOGIN_CALLBACK_PATH,
        &[
            ("code", "auth-code-123"),
            ("id_token", token.as_str()),
            ("state", started.state.as_str()),
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), POST_SIGN_IN_PATH);
    let stored = tokens
        .load("alice@contoso.com")
        .await
        .unwrap()
        .expect("token persisted");
    assert_eq!(stored.access_token, "sharepoint_access_token");

    let requests = server.received_requests().await.expect("recording enabled");
    let exchange = requests
        .iter()
        .find(|r| r.url.path() == "/contoso/oauth2/token")
        .expect("token request sent");
    let redirect_uri = url::form_urlencoded::parse(&exchange.body)
        .find(|(k, _)| k == "redirect_uri")
        .map(|(_, v)| v.into_owned());
    assert_eq!(
        redirect_uri,
        Some(format!("https://app.example.com{APP_LOGIN_CALLBACK_PATH}"))
    );
}

#[tokio::test]
async fn test_app_login_exchange_failure_stores_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/contoso/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#))
        .mount(&server)
        .await;

    let (mut state, tokens) = state_for(&server).await;
    state.app_login_handler = handler_for(&server, tokens.clone());
    let app = router(state);

    let started = start(&app, "/Account/AppLogin").await;
    let token = id_token("graph-client", &started.nonce, "alice@contoso.com");
    let response = post_form(
        &app,
        APP_LOGIN_CALLBACK_PATH,
        &[
            ("code", "auth-code-123"),
            ("id_token", token.as_str()),
            ("state", started.state.as_str()),
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(tokens.is_empty().await);
}

#[tokio::test]
async fn test_app_login_without_code_is_rejected() {
    let server = MockServer::start().await;
    let (state, tokens) = state_for(&server).await;
    let app = router(state);

    let started = start(&app, "/Account/AppLogin").await;
    let token = id_token("graph-client", &started.nonce, "alice@contoso.com");
    let response = post_form(
        &app,
        APP_LOGIN_CALLBACK_PATH,
        &[("id_token", token.as_str()), ("state", started.state.as_str())],
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(tokens.is_empty().await);
}
