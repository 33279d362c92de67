//! Token nonce replay protection.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::Mutex;

use crate::error::TokenError;

/// Records spent token nonces.
///
/// Nonces are scoped to their issuer: the same nonce string minted by two
/// different issuers refers to two different tokens.
///
/// Implementations may be in-memory (the reference [`InMemoryNonceStore`])
/// or backed by a shared datastore, provided `mark_used` is a single atomic
/// check-and-insert.
pub trait NonceStore: Send + Sync {
    /// Marks `(issuer, nonce)` as used until `expires_at` (Unix seconds).
    ///
    /// # Errors
    ///
    /// Returns `TokenError::ReplayDetected` if the pair was already recorded.
    fn mark_used(&self, issuer: &str, nonce: &str, expires_at: i64) -> Result<(), TokenError>;

    /// Returns true if `(issuer, nonce)` has been recorded.
    fn contains(&self, issuer: &str, nonce: &str) -> bool;

    /// Number of recorded entries.
    fn len(&self) -> usize;

    /// Returns true if nothing is recorded.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes entries whose expiry is strictly before `now`.
    ///
    /// Returns the number of removed entries.
    fn prune_at(&self, now: i64) -> usize;

    /// Removes entries that expired before the current wall-clock time.
    fn prune(&self) -> usize {
        self.prune_at(Utc::now().timestamp())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct NonceKey {
    issuer: String,
    nonce: String,
}

impl NonceKey {
    fn new(issuer: &str, nonce: &str) -> Self {
        Self {
            issuer: issuer.to_string(),
            nonce: nonce.to_string(),
        }
    }
}

/// Thread-safe in-memory [`NonceStore`].
///
/// Each entry expires with its token, so pruning reclaims memory once the
/// token could no longer verify anyway.
///
/// # Example
///
/// ```
/// use acp::{InMemoryNonceStore, NonceStore};
///
/// let store = InMemoryNonceStore::new();
/// store.mark_used("issuer", "n-1", 2_000_000_000).unwrap();
///
/// assert!(store.mark_used("issuer", "n-1", 2_000_000_000).is_err());
/// assert!(store.mark_used("other-issuer", "n-1", 2_000_000_000).is_ok());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryNonceStore {
    entries: Mutex<HashMap<NonceKey, i64>>,
}

impl InMemoryNonceStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl NonceStore for InMemoryNonceStore {
    fn mark_used(&self, issuer: &str, nonce: &str, expires_at: i64) -> Result<(), TokenError> {
        let mut entries = self.entries.lock();
        let key = NonceKey::new(issuer, nonce);
        if entries.contains_key(&key) {
            return Err(TokenError::ReplayDetected {
                nonce: nonce.to_string(),
            });
        }
        entries.insert(key, expires_at);
        Ok(())
    }

    fn contains(&self, issuer: &str, nonce: &str) -> bool {
        self.entries
            .lock()
            .contains_key(&NonceKey::new(issuer, nonce))
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }

    fn prune_at(&self, now: i64) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, expires_at| *expires_at >= now);
        let removed = before - entries.len();
        if removed > 0 {
            tracing::info!(removed, remaining = entries.len(), "pruned expired token nonces");
        }
        removed
    }
}
