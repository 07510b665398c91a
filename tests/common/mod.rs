use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use listsearch_gate::auth::discovery::ProviderMetadata;
use listsearch_gate::auth::exchange::{ClientCredential, CodeExchanger};
use listsearch_gate::auth::gate::AuthenticationGate;
use listsearch_gate::auth::id_token::JwksValidator;
use listsearch_gate::auth::pending::PendingSignIns;
use listsearch_gate::auth::scheme::{OidcScheme, SchemeOptions};
use listsearch_gate::auth::token_store::MemoryTokenStore;
use listsearch_gate::auth::app_login::AppLoginHandler;
use listsearch_gate::config::Config;
use listsearch_gate::web::AppState;

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Configuration with both schemes populated and two allowed users.
#[allow(dead_code)]
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.auth.client_id = "interactive-client".to_string();
    config.auth.aad_instance = "https://login.example.com/".to_string();
    config.auth.tenant_id = "contoso".to_string();
    config.auth.post_logout_redirect_uri = Some("https://app.example.com/".to_string());
    config.auth.valid_upns = Some("alice@contoso.com; bob@contoso.com".to_string());
    config.app_login.client_id = "graph-client".to_string();
    config.app_login.client_secret = "graph-secret".to_string();
    config.app_login.token_key = "token-key".to_string();
    config
}

/// Router state over Azure AD default endpoints and an in-memory token
/// store, without any network access.
#[allow(dead_code)]
pub fn test_state(config: &Config) -> (AppState, Arc<MemoryTokenStore>) {
    let metadata = ProviderMetadata::azure_ad_defaults(&config.auth.authority());
    let http = Arc::new(reqwest::Client::new());
    let tokens = Arc::new(MemoryTokenStore::new());
    let validator = JwksValidator::new(http.clone(), "http://127.0.0.1:1/keys", metadata.issuer.clone());
    let exchanger = CodeExchanger::new(
        http,
        metadata.token_endpoint.clone(),
        ClientCredential {
            client_id: config.app_login.client_id.clone(),
            client_secret: config.app_login.client_secret.clone(),
        },
    );

    let state = AppState {
        interactive: Arc::new(OidcScheme::new(
            SchemeOptions::interactive(config),
            metadata.clone(),
        )),
        app_login: Arc::new(OidcScheme::new(SchemeOptions::app_login(config), metadata)),
        gate: Arc::new(AuthenticationGate::new(config.auth.allow_list())),
        app_login_handler: Arc::new(AppLoginHandler::new(exchanger, tokens.clone())),
        validator: Arc::new(validator),
        pending: Arc::new(PendingSignIns::default()),
        public_base_url: None,
    };
    (state, tokens)
}
