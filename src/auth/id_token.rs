//! ID token validation for the sign-in callbacks
//!
//! The provider posts an `id_token` to each scheme's callback. Before any
//! claim in it is trusted, [`JwksValidator`] checks:
//!
//! - the signature, against the provider's JSON Web Key Set
//! - `iss` against the discovered issuer
//! - `aud` against the scheme's client id
//! - `exp` (with the default 60 second leeway)
//! - `nonce` against the value sent with the authentication request
//!
//! The key set is fetched on first use and fetched again when a token names
//! a key id that is not cached, which covers provider key rollover.

use std::sync::Arc;

use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{decode, decode_header, DecodingKey, Validation};
use tokio::sync::RwLock;

use crate::auth::claims::IdentityAssertion;
use crate::auth::discovery::ProviderMetadata;
use crate::error::{GateError, Result};

/// Turns a posted `id_token` into a validated [`IdentityAssertion`].
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait IdTokenValidator: Send + Sync {
    /// Validates `id_token` for `audience` and the `nonce` of the pending
    /// sign-in.
    async fn validate(
        &self,
        id_token: &str,
        audience: &str,
        nonce: &str,
    ) -> Result<IdentityAssertion>;
}

/// [`IdTokenValidator`] backed by the provider's JWKS endpoint.
#[derive(Debug)]
pub struct JwksValidator {
    http: Arc<reqwest::Client>,
    jwks_uri: String,
    issuer: String,
    keys: RwLock<Option<JwkSet>>,
}

impl JwksValidator {
    /// Creates a validator fetching keys from `jwks_uri` and accepting tokens
    /// issued by `issuer`.
    pub fn new(
        http: Arc<reqwest::Client>,
        jwks_uri: impl Into<String>,
        issuer: impl Into<String>,
    ) -> Self {
        Self {
            http,
            jwks_uri: jwks_uri.into(),
            issuer: issuer.into(),
            keys: RwLock::new(None),
        }
    }

    /// Creates a validator for the provider described by `metadata`.
    pub fn from_metadata(http: Arc<reqwest::Client>, metadata: &ProviderMetadata) -> Self {
        Self::new(http, metadata.jwks_endpoint(), metadata.issuer.clone())
    }

    /// Key set location.
    pub fn jwks_uri(&self) -> &str {
        &self.jwks_uri
    }

    async fn fetch_keys(&self) -> Result<JwkSet> {
        let resp = self
            .http
            .get(&self.jwks_uri)
            .send()
            .await
            .map_err(|e| GateError::Auth(format!("key set request to {} failed: {e}", self.jwks_uri)))?;

        if !resp.status().is_success() {
            return Err(GateError::Auth(format!(
                "key set endpoint {} returned {}",
                self.jwks_uri,
                resp.status()
            ))
            .into());
        }

        let keys = resp
            .json::<JwkSet>()
            .await
            .map_err(|e| GateError::Auth(format!("failed to parse key set: {e}")))?;
        tracing::debug!(keys = keys.keys.len(), "Loaded provider signing keys");
        Ok(keys)
    }

    async fn signing_key(&self, kid: Option<&str>) -> Result<Jwk> {
        if let Some(set) = self.keys.read().await.as_ref() {
            if let Some(jwk) = find_key(set, kid) {
                return Ok(jwk.clone());
            }
        }

        let set = self.fetch_keys().await?;
        let jwk = find_key(&set, kid).cloned();
        *self.keys.write().await = Some(set);

        jwk.ok_or_else(|| {
            GateError::Auth(format!(
                "no signing key matches kid '{}'",
                kid.unwrap_or("<none>")
            ))
            .into()
        })
    }
}

#[async_trait::async_trait]
impl IdTokenValidator for JwksValidator {
    async fn validate(
        &self,
        id_token: &str,
        audience: &str,
        nonce: &str,
    ) -> Result<IdentityAssertion> {
        let header = decode_header(id_token)
            .map_err(|e| GateError::Auth(format!("malformed id token: {e}")))?;
        let jwk = self.signing_key(header.kid.as_deref()).await?;

        if let Some(key_alg) = &jwk.common.key_algorithm {
            if format!("{key_alg:?}") != format!("{:?}", header.alg) {
                return Err(GateError::Auth(format!(
                    "id token algorithm {:?} does not match key algorithm {key_alg:?}",
                    header.alg
                ))
                .into());
            }
        }

        let key = DecodingKey::from_jwk(&jwk)
            .map_err(|e| GateError::Auth(format!("unusable signing key: {e}")))?;

        let mut validation = Validation::new(header.alg);
        validation.set_audience(&[audience]);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "aud", "iss"]);

        let data = decode::<serde_json::Value>(id_token, &key, &validation)
            .map_err(|e| GateError::Auth(format!("id token rejected: {e}")))?;

        match data.claims.get("nonce").and_then(serde_json::Value::as_str) {
            Some(value) if value == nonce => {}
            _ => return Err(GateError::Auth("id token nonce does not match".to_string()).into()),
        }

        Ok(IdentityAssertion::from_payload(&data.claims))
    }
}

/// Key named by `kid`, or the only key when the token names none.
fn find_key<'a>(set: &'a JwkSet, kid: Option<&str>) -> Option<&'a Jwk> {
    match kid {
        Some(kid) => set.find(kid),
        None if set.keys.len() == 1 => set.keys.first(),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";
    const ISSUER: &str = "https://login.example.com/contoso";

    fn key_set(kid: &str, alg: Option<&str>) -> JwkSet {
        let mut jwk = serde_json::json!({
            "kty": "oct",
            "kid": kid,
            "k": base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(SECRET),
        });
        if let Some(alg) = alg {
            jwk["alg"] = serde_json::json!(alg);
        }
        serde_json::from_value(serde_json::json!({ "keys": [jwk] })).unwrap()
    }

    fn token(kid: &str, claims: serde_json::Value) -> String {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(kid.to_string());
        encode(&header, &claims, &EncodingKey::from_secret(SECRET)).unwrap()
    }

    fn claims(aud: &str, nonce: &str) -> serde_json::Value {
        let now = chrono::Utc::now().timestamp();
        serde_json::json!({
            "iss": ISSUER,
            "aud": aud,
            "exp": now + 600,
            "iat": now,
            "nonce": nonce,
            "upn": "alice@contoso.com",
            "name": "alice@contoso.com"
        })
    }

    async fn validator(set: JwkSet) -> JwksValidator {
        let validator = JwksValidator::new(
            Arc::new(reqwest::Client::new()),
            "http://127.0.0.1:1/keys",
            ISSUER,
        );
        *validator.keys.write().await = Some(set);
        validator
    }

    #[tokio::test]
    async fn test_valid_token_yields_claims() {
        let validator = validator(key_set("k1", Some("HS256"))).await;
        let assertion = validator
            .validate(&token("k1", claims("client", "n-1")), "client", "n-1")
            .await
            .unwrap();
        assert_eq!(assertion.upn(), Some("alice@contoso.com"));
        assert_eq!(assertion.name(), Some("alice@contoso.com"));
    }

    #[tokio::test]
    async fn test_nonce_mismatch_rejected() {
        let validator = validator(key_set("k1", None)).await;
        let err = validator
            .validate(&token("k1", claims("client", "n-1")), "client", "n-2")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("nonce"));
    }

    #[tokio::test]
    async fn test_wrong_audience_rejected() {
        let validator = validator(key_set("k1", None)).await;
        let result = validator
            .validate(&token("k1", claims("other-client", "n")), "client", "n")
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_wrong_issuer_rejected() {
        let validator = validator(key_set("k1", None)).await;
        let mut payload = claims("client", "n");
        payload["iss"] = serde_json::json!("https://evil.example.com/");
        assert!(validator
            .validate(&token("k1", payload), "client", "n")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_tampered_signature_rejected() {
        let validator = validator(key_set("k1", None)).await;
        let mut raw = token("k1", claims("client", "n"));
        raw.push('A');
        assert!(validator.validate(&raw, "client", "n").await.is_err());
    }

    #[tokio::test]
    async fn test_key_algorithm_mismatch_rejected() {
        let validator = validator(key_set("k1", Some("HS512"))).await;
        let err = validator
            .validate(&token("k1", claims("client", "n")), "client", "n")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not match key algorithm"));
    }

    #[tokio::test]
    async fn test_unknown_kid_with_unreachable_key_set_fails() {
        let validator = validator(key_set("k1", None)).await;
        assert!(validator
            .validate(&token("rotated", claims("client", "n")), "client", "n")
            .await
            .is_err());
    }

    #[test]
    fn test_find_key_without_kid_needs_single_key() {
        let set = key_set("only", None);
        assert!(find_key(&set, None).is_some());
        assert!(find_key(&set, Some("only")).is_some());
        assert!(find_key(&set, Some("missing")).is_none());
    }
}
