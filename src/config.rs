//! Configuration management for listsearch-gate
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::auth::AllowList;
use crate::error::{GateError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default Azure AD instance.
pub const DEFAULT_AAD_INSTANCE: &str = "https://login.microsoftonline.com/";

/// Main configuration structure for listsearch-gate
///
/// Holds the interactive sign-in settings, the passive app-login
/// credentials, blob storage access and the HTTP listener.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Interactive sign-in scheme and allow-list
    #[serde(default)]
    pub auth: AuthConfig,
    /// Passive app-login scheme used to acquire SharePoint tokens
    #[serde(default)]
    pub app_login: AppLoginConfig,
    /// Knowledge-base blob storage
    #[serde(default)]
    pub storage: StorageConfig,
    /// HTTP listener
    #[serde(default)]
    pub server: ServerConfig,
}

/// Interactive sign-in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Client id of the interactive application registration
    #[serde(default)]
    pub client_id: String,

    /// Azure AD instance, e.g. `https://login.microsoftonline.com/`
    #[serde(default = "default_aad_instance")]
    pub aad_instance: String,

    /// Directory (tenant) id or domain
    #[serde(default)]
    pub tenant_id: String,

    /// Where the provider sends the browser after sign-out
    #[serde(default)]
    pub post_logout_redirect_uri: Option<String>,

    /// `;`-delimited user principal names allowed to sign in
    #[serde(default)]
    pub valid_upns: Option<String>,
}

fn default_aad_instance() -> String {
    DEFAULT_AAD_INSTANCE.to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            aad_instance: default_aad_instance(),
            tenant_id: String::new(),
            post_logout_redirect_uri: None,
            valid_upns: None,
        }
    }
}

impl AuthConfig {
    /// Authority URL: the instance with a trailing slash followed by the
    /// tenant.
    ///
    /// # Examples
    ///
    /// ```
    /// use listsearch_gate::config::AuthConfig;
    ///
    /// let auth = AuthConfig {
    ///     aad_instance: "https://login.microsoftonline.com".to_string(),
    ///     tenant_id: "contoso.onmicrosoft.com".to_string(),
    ///     ..AuthConfig::default()
    /// };
    /// assert_eq!(auth.authority(), "https://login.microsoftonline.com/contoso.onmicrosoft.com");
    /// ```
    pub fn authority(&self) -> String {
        format!("{}{}", ensure_trailing_slash(&self.aad_instance), self.tenant_id)
    }

    /// Parsed allow-list. Missing configuration yields an empty list, which
    /// denies everyone.
    pub fn allow_list(&self) -> AllowList {
        AllowList::parse(self.valid_upns.as_deref())
    }
}

/// Passive app-login configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct AppLoginConfig {
    /// Client id of the app-login (Graph) application registration
    #[serde(default)]
    pub client_id: String,

    /// Client secret of the app-login registration
    #[serde(default)]
    pub client_secret: String,

    /// Key tagging persisted tokens; changing it invalidates stored tokens
    #[serde(default)]
    pub token_key: String,

    /// Keyring service name tokens are stored under
    #[serde(default = "default_keyring_service")]
    pub keyring_service: String,
}

fn default_keyring_service() -> String {
    "listsearch-gate-sharepoint".to_string()
}

impl Default for AppLoginConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            token_key: String::new(),
            keyring_service: default_keyring_service(),
        }
    }
}

impl std::fmt::Debug for AppLoginConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppLoginConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("token_key", &"<redacted>")
            .field("keyring_service", &self.keyring_service)
            .finish()
    }
}

/// Blob storage configuration
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage account connection string
    #[serde(default)]
    pub connection_string: Option<String>,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field(
                "connection_string",
                &self.connection_string.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Externally visible base URL, used to build callback URLs when the
    /// server sits behind a proxy
    #[serde(default)]
    pub public_base_url: Option<String>,
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            public_base_url: None,
        }
    }
}

/// Appends `/` to `value` unless it already ends with one.
///
/// # Examples
///
/// ```
/// use listsearch_gate::config::ensure_trailing_slash;
///
/// assert_eq!(ensure_trailing_slash("https://host"), "https://host/");
/// assert_eq!(ensure_trailing_slash("https://host/"), "https://host/");
/// ```
pub fn ensure_trailing_slash(value: &str) -> String {
    if value.ends_with('/') {
        value.to_string()
    } else {
        format!("{value}/")
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    /// Parse a YAML configuration file
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Config`] if the file cannot be read or parsed
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| GateError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| GateError::Config(format!("Failed to parse config: {}", e)).into())
    }

    /// Apply `LISTSEARCH_*` environment variable overrides
    pub fn apply_env_vars(&mut self) {
        if let Ok(client_id) = std::env::var("LISTSEARCH_CLIENT_ID") {
            self.auth.client_id = client_id;
        }

        if let Ok(instance) = std::env::var("LISTSEARCH_AAD_INSTANCE") {
            self.auth.aad_instance = instance;
        }

        if let Ok(tenant_id) = std::env::var("LISTSEARCH_TENANT_ID") {
            self.auth.tenant_id = tenant_id;
        }

        if let Ok(uri) = std::env::var("LISTSEARCH_POST_LOGOUT_REDIRECT_URI") {
            self.auth.post_logout_redirect_uri = Some(uri);
        }

        if let Ok(upns) = std::env::var("LISTSEARCH_VALID_UPNS") {
            self.auth.valid_upns = Some(upns);
        }

        if let Ok(client_id) = std::env::var("LISTSEARCH_GRAPH_APP_CLIENT_ID") {
            self.app_login.client_id = client_id;
        }

        if let Ok(secret) = std::env::var("LISTSEARCH_GRAPH_APP_CLIENT_SECRET") {
            self.app_login.client_secret = secret;
        }

        if let Ok(token_key) = std::env::var("LISTSEARCH_TOKEN_KEY") {
            self.app_login.token_key = token_key;
        }

        if let Ok(connection_string) = std::env::var("LISTSEARCH_STORAGE_CONNECTION_STRING") {
            self.storage.connection_string = Some(connection_string);
        }

        if let Ok(bind) = std::env::var("LISTSEARCH_BIND") {
            self.server.bind = bind;
        }

        if let Ok(base) = std::env::var("LISTSEARCH_PUBLIC_BASE_URL") {
            self.server.public_base_url = Some(base);
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }

        if let crate::cli::Commands::Serve { bind: Some(bind) } = &cli.command {
            self.server.bind = bind.clone();
        }
    }

    /// Validate the settings every command relies on
    ///
    /// An absent or empty allow-list is valid: it denies every user and
    /// only logs a warning.
    ///
    /// # Errors
    ///
    /// Returns error if the AAD instance is not an absolute URL or a base
    /// URL is malformed
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.auth.aad_instance).map_err(|e| {
            GateError::Config(format!(
                "aad_instance '{}' is not a valid URL: {}",
                self.auth.aad_instance, e
            ))
        })?;

        if let Some(base) = &self.server.public_base_url {
            url::Url::parse(base).map_err(|e| {
                GateError::Config(format!("public_base_url '{}' is not a valid URL: {}", base, e))
            })?;
        }

        if self.auth.allow_list().is_empty() {
            tracing::warn!("No valid UPNs configured; every sign-in will be denied");
        }

        Ok(())
    }

    /// Validate the settings the sign-in server needs
    ///
    /// # Errors
    ///
    /// Returns error if a client id, the tenant, or the app-login secret is
    /// missing
    pub fn validate_for_serve(&self) -> Result<()> {
        self.validate()?;

        if self.auth.client_id.trim().is_empty() {
            return Err(GateError::Config("auth.client_id cannot be empty".to_string()).into());
        }

        if self.auth.tenant_id.trim().is_empty() {
            return Err(GateError::Config("auth.tenant_id cannot be empty".to_string()).into());
        }

        if self.app_login.client_id.trim().is_empty() {
            return Err(
                GateError::Config("app_login.client_id cannot be empty".to_string()).into(),
            );
        }

        if self.app_login.client_secret.is_empty() {
            return Err(
                GateError::Config("app_login.client_secret cannot be empty".to_string()).into(),
            );
        }

        if self.app_login.token_key.is_empty() {
            return Err(GateError::Config("app_login.token_key cannot be empty".to_string()).into());
        }

        self.server
            .bind
            .parse::<std::net::SocketAddr>()
            .map_err(|e| {
                GateError::Config(format!("server.bind '{}' is invalid: {}", self.server.bind, e))
            })?;

        Ok(())
    }

    /// Storage connection string
    ///
    /// # Errors
    ///
    /// Returns error if no connection string is configured
    pub fn storage_connection_string(&self) -> Result<&str> {
        self.storage
            .connection_string
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                GateError::Config("storage.connection_string is not configured".to_string()).into()
            })
    }
}
