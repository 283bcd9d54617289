//! Session credential handling
//!
//! The dashboard keeps a single bearer credential for the signed-in user.
//! Requests attach it when present; a 401 response clears it and fires the
//! session-expired hook exactly once per occurrence so the embedding
//! application can route the user back to its login entry point.

use std::sync::{Arc, RwLock};

/// Callback invoked after a 401 clears the stored credential
pub type SessionHook = Arc<dyn Fn() + Send + Sync>;

/// Shared in-memory store for the bearer credential
#[derive(Clone, Default)]
pub struct TokenStore {
    inner: Arc<RwLock<Option<String>>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a credential, replacing any previous one
    pub fn set(&self, token: impl Into<String>) {
        *self.inner.write().unwrap() = Some(token.into());
    }

    /// Current credential, if any
    pub fn get(&self) -> Option<String> {
        self.inner.read().unwrap().clone()
    }

    /// Whether a credential is present
    pub fn is_authenticated(&self) -> bool {
        self.inner.read().unwrap().is_some()
    }

    /// Clear the credential; returns true if one was present
    pub fn clear(&self) -> bool {
        self.inner.write().unwrap().take().is_some()
    }

    /// Authorization header value for the stored credential
    pub fn bearer_header(&self) -> Option<String> {
        self.get().map(|token| format!("Bearer {}", token))
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the credential itself
        f.debug_struct("TokenStore")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}
