//! Allow-list gate applied to validated sign-ins
//!
//! The sign-in callback has already verified the ID token by the time
//! [`AuthenticationGate::on_token_validated`] runs.
//! The gate adds one authorization check: the first UPN claim must be on the
//! allow-list. The check itself is the pure function [`authorize_claims`].

use crate::auth::allow_list::AllowList;
use crate::auth::claims::{Claim, IdentityAssertion};
use crate::auth::protocol::{OpenIdConnectMessage, Prompt, RequestType};
use crate::constants::INVALID_USER_PATH;

/// Outcome of the allow-list check for one sign-in attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Establish the session as normal.
    Continue,
    /// Do not establish a session; redirect the user and stop processing
    /// the sign-in response.
    Deny {
        /// Relative path of the redirect.
        redirect_to: String,
    },
}

impl GateDecision {
    /// Returns `true` for [`GateDecision::Continue`].
    pub fn is_continue(&self) -> bool {
        matches!(self, GateDecision::Continue)
    }
}

/// Decides whether `claims` may complete sign-in.
///
/// Only the first UPN claim is considered. A missing UPN, or one that does
/// not match the allow-list ignoring case, yields a deny that redirects to
/// `/Account/InvalidUser`.
///
/// # Examples
///
/// ```
/// use listsearch_gate::auth::allow_list::AllowList;
/// use listsearch_gate::auth::claims::Claim;
/// use listsearch_gate::auth::gate::{authorize_claims, GateDecision};
///
/// let allow = AllowList::parse(Some("alice@contoso.com"));
/// let claims = vec![Claim::new("upn", "ALICE@contoso.com")];
/// assert_eq!(authorize_claims(&claims, &allow), GateDecision::Continue);
///
/// let decision = authorize_claims(&[], &allow);
/// assert!(!decision.is_continue());
/// ```
pub fn authorize_claims(claims: &[Claim], allow_list: &AllowList) -> GateDecision {
    match claims.iter().find(|c| c.is_upn()) {
        Some(upn) if allow_list.contains(&upn.value) => GateDecision::Continue,
        _ => GateDecision::Deny {
            redirect_to: INVALID_USER_PATH.to_string(),
        },
    }
}

/// Forces an interactive login on outbound authentication requests.
///
/// Logout and token messages are returned untouched.
pub fn on_redirect_to_provider(mut message: OpenIdConnectMessage) -> OpenIdConnectMessage {
    if message.request_type == RequestType::Authentication {
        message.prompt = Some(Prompt::Login);
    }
    message
}

/// Gate holding the allow-list loaded at startup.
///
/// Immutable after construction; share it behind an `Arc` across requests.
#[derive(Debug, Clone)]
pub struct AuthenticationGate {
    allow_list: AllowList,
}

impl AuthenticationGate {
    /// Creates a gate over `allow_list`.
    ///
    /// An empty allow-list is accepted and denies every sign-in.
    pub fn new(allow_list: AllowList) -> Self {
        if allow_list.is_empty() {
            tracing::warn!("UPN allow-list is empty; every sign-in will be denied");
        }
        Self { allow_list }
    }

    /// The configured allow-list.
    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    /// Runs the allow-list check for a validated assertion.
    pub fn on_token_validated(&self, assertion: &IdentityAssertion) -> GateDecision {
        let decision = authorize_claims(assertion.claims(), &self.allow_list);
        match (&decision, assertion.upn()) {
            (GateDecision::Continue, Some(upn)) => {
                tracing::info!(upn = %upn, "Sign-in allowed");
            }
            (GateDecision::Deny { redirect_to }, Some(upn)) => {
                tracing::warn!(upn = %upn, redirect = %redirect_to, "UPN not on allow-list, sign-in denied");
            }
            (GateDecision::Deny { redirect_to }, None) => {
                tracing::warn!(redirect = %redirect_to, "Assertion has no UPN claim, sign-in denied");
            }
            (GateDecision::Continue, None) => {}
        }
        decision
    }
}
