//! Sign-ins waiting for their provider callback
//!
//! Every authentication request carries a fresh `state` and `nonce`. The
//! pair is remembered here until the provider posts back to the callback;
//! a callback whose `state` is unknown, expired or already used is refused.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

/// How long a started sign-in may take before its callback is refused.
pub const DEFAULT_SIGN_IN_TTL: Duration = Duration::from_secs(10 * 60);

/// Which scheme started the sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignInFlow {
    /// Interactive, allow-list gated sign-in.
    Interactive,
    /// Passive app-login used to acquire an access token.
    AppLogin,
}

/// A started sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSignIn {
    /// Scheme that issued the request.
    pub flow: SignInFlow,
    /// `nonce` the ID token must carry.
    pub nonce: String,
    /// Callback URL sent as `redirect_uri`.
    pub redirect_uri: String,
}

/// Pending sign-ins keyed by `state`.
#[derive(Debug)]
pub struct PendingSignIns {
    ttl: Duration,
    entries: RwLock<HashMap<String, (Instant, PendingSignIn)>>,
}

impl Default for PendingSignIns {
    fn default() -> Self {
        Self::new(DEFAULT_SIGN_IN_TTL)
    }
}

impl PendingSignIns {
    /// Creates an empty registry whose entries live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Remembers `pending` under `state`, dropping expired entries.
    pub async fn insert(&self, state: impl Into<String>, pending: PendingSignIn) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, (started, _)| now.duration_since(*started) < self.ttl);
        entries.insert(state.into(), (now, pending));
    }

    /// Removes and returns the sign-in started with `state`. Each state can
    /// be taken once; expired entries yield `None`.
    pub async fn take(&self, state: &str) -> Option<PendingSignIn> {
        let (started, pending) = self.entries.write().await.remove(state)?;
        if started.elapsed() >= self.ttl {
            tracing::debug!("Sign-in callback arrived after its state expired");
            return None;
        }
        Some(pending)
    }

    /// Number of remembered sign-ins, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns `true` when nothing is pending.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
