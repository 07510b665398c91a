//! UPN-gated OpenID-Connect sign-in
//!
//! Sign-in callbacks are validated by [`id_token`] before any claim reaches
//! the allow-list gate or the app-login token exchange.
//!
//! # Module Layout
//!
//! - [`allow_list`]  -- `;`-delimited, case-insensitive UPN allow-list
//! - [`claims`]      -- claim set of a validated assertion
//! - [`gate`]        -- allow-list decision and forced login prompt
//! - [`protocol`]    -- outbound OpenID-Connect messages
//! - [`scheme`]      -- the interactive and passive scheme registrations
//! - [`discovery`]   -- provider endpoint discovery
//! - [`id_token`]    -- signature, audience and nonce checks on callbacks
//! - [`pending`]     -- sign-ins waiting for their callback
//! - [`exchange`]    -- authorization code exchange with client credentials
//! - [`app_login`]   -- exchange-then-persist for the passive scheme
//! - [`token_store`] -- token persistence (OS keyring, in-memory)

pub mod allow_list;
pub mod app_login;
pub mod claims;
pub mod discovery;
pub mod exchange;
pub mod gate;
pub mod id_token;
pub mod pending;
pub mod protocol;
pub mod scheme;
pub mod token_store;

pub use allow_list::AllowList;
pub use claims::{Claim, IdentityAssertion};
pub use gate::{AuthenticationGate, GateDecision};
