//! Claims carried by a validated identity assertion
//!
//! An [`IdentityAssertion`] is handed to the gate only after
//! [`id_token`](crate::auth::id_token) has verified the token signature and
//! lifetime. Nothing in this crate mutates or persists it.
//!
//! Claim types can arrive in two spellings: the short JWT names issued by the
//! provider (`upn`, `name`) or the long schema URIs produced by inbound claim
//! mapping. Lookups for the well-known types accept both.

use serde::{Deserialize, Serialize};

use crate::constants::{NAME_CLAIM_TYPE, UPN_CLAIM_TYPE};

/// Short JWT claim name equivalent to [`UPN_CLAIM_TYPE`].
pub const SHORT_UPN_CLAIM_TYPE: &str = "upn";

/// Short JWT claim name equivalent to [`NAME_CLAIM_TYPE`].
pub const SHORT_NAME_CLAIM_TYPE: &str = "name";

/// A single `(type, value)` claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// Claim type, either a short JWT name or a schema URI.
    #[serde(rename = "type")]
    pub claim_type: String,

    /// Claim value.
    pub value: String,
}

impl Claim {
    /// Builds a claim from anything string-like.
    ///
    /// # Examples
    ///
    /// ```
    /// use listsearch_gate::auth::claims::Claim;
    ///
    /// let claim = Claim::new("upn", "alice@contoso.com");
    /// assert_eq!(claim.value, "alice@contoso.com");
    /// ```
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
        }
    }

    /// Returns `true` when this claim carries the user principal name.
    pub fn is_upn(&self) -> bool {
        self.claim_type == UPN_CLAIM_TYPE || self.claim_type == SHORT_UPN_CLAIM_TYPE
    }

    fn is_name(&self) -> bool {
        self.claim_type == NAME_CLAIM_TYPE || self.claim_type == SHORT_NAME_CLAIM_TYPE
    }
}

/// An externally validated set of claims, in issue order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityAssertion {
    claims: Vec<Claim>,
}

impl IdentityAssertion {
    /// Creates an assertion from an ordered claim list.
    pub fn new(claims: Vec<Claim>) -> Self {
        Self { claims }
    }

    /// Builds an assertion from a decoded token payload.
    ///
    /// Each top-level string member becomes one claim; string arrays become
    /// one claim per element, in order. Numbers and booleans are rendered
    /// with their JSON text. Objects and nulls are skipped.
    ///
    /// # Examples
    ///
    /// ```
    /// use listsearch_gate::auth::claims::IdentityAssertion;
    ///
    /// let payload = serde_json::json!({
    ///     "upn": "alice@contoso.com",
    ///     "name": "Alice",
    ///     "roles": ["reader", "writer"]
    /// });
    /// let assertion = IdentityAssertion::from_payload(&payload);
    /// assert_eq!(assertion.upn(), Some("alice@contoso.com"));
    /// assert_eq!(assertion.claims().len(), 4);
    /// ```
    pub fn from_payload(payload: &serde_json::Value) -> Self {
        let mut claims = Vec::new();
        if let Some(members) = payload.as_object() {
            for (claim_type, value) in members {
                push_claim_values(&mut claims, claim_type, value);
            }
        }
        Self { claims }
    }

    /// All claims in issue order.
    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    /// Value of the first UPN claim, if any.
    pub fn upn(&self) -> Option<&str> {
        self.claims
            .iter()
            .find(|c| c.is_upn())
            .map(|c| c.value.as_str())
    }

    /// Value of the first name claim, if any.
    ///
    /// For organisational accounts this is the user's email address and is
    /// the key under which acquired tokens are persisted.
    pub fn name(&self) -> Option<&str> {
        self.claims
            .iter()
            .find(|c| c.is_name())
            .map(|c| c.value.as_str())
    }
}

fn push_claim_values(claims: &mut Vec<Claim>, claim_type: &str, value: &serde_json::Value) {
    match value {
        serde_json::Value::String(s) => claims.push(Claim::new(claim_type, s.clone())),
        serde_json::Value::Number(n) => claims.push(Claim::new(claim_type, n.to_string())),
        serde_json::Value::Bool(b) => claims.push(Claim::new(claim_type, b.to_string())),
        serde_json::Value::Array(items) => {
            for item in items {
                if !item.is_array() {
                    push_claim_values(claims, claim_type, item);
                }
            }
        }
        serde_json::Value::Object(_) | serde_json::Value::Null => {}
    }
}
