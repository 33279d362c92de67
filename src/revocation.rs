//! Revocation checking interface.
//!
//! The verifier never talks to a revocation service directly; it calls a
//! [`RevocationChecker`] and treats any error as a rejection.

use std::collections::HashSet;
use std::time::Duration;

use parking_lot::RwLock;

use crate::error::RevocationError;
use crate::token::RevocationDescriptor;

/// Answers whether a token has been revoked.
///
/// Implementations that perform network I/O must honour `timeout` and
/// return `RevocationError::Timeout` when it elapses.
pub trait RevocationChecker: Send + Sync {
    /// Returns `Ok(true)` if the token identified by `token_id` is revoked.
    ///
    /// # Errors
    ///
    /// Returns `RevocationError` if no answer could be obtained.
    fn is_revoked(
        &self,
        token_id: &str,
        descriptor: &RevocationDescriptor,
        timeout: Duration,
    ) -> Result<bool, RevocationError>;
}

/// In-memory revocation list keyed by token identifier.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use acp::{RevocationChecker, RevocationDescriptor, RevocationKind, RevocationList};
///
/// let list = RevocationList::new();
/// list.revoke("nonce-1");
///
/// let rev = RevocationDescriptor { kind: RevocationKind::Crl, uri: "mem://".into() };
/// assert!(list.is_revoked("nonce-1", &rev, Duration::from_secs(1)).unwrap());
/// assert!(!list.is_revoked("nonce-2", &rev, Duration::from_secs(1)).unwrap());
/// ```
#[derive(Debug, Default)]
pub struct RevocationList {
    revoked: RwLock<HashSet<String>>,
}

impl RevocationList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Revokes a token. Returns false if it was already revoked.
    pub fn revoke(&self, token_id: impl Into<String>) -> bool {
        self.revoked.write().insert(token_id.into())
    }

    /// Returns true if the token is on the list.
    #[must_use]
    pub fn is_listed(&self, token_id: &str) -> bool {
        self.revoked.read().contains(token_id)
    }

    /// Number of revoked tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.revoked.read().len()
    }

    /// Returns true if nothing has been revoked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.revoked.read().is_empty()
    }
}

impl RevocationChecker for RevocationList {
    fn is_revoked(
        &self,
        token_id: &str,
        _descriptor: &RevocationDescriptor,
        _timeout: Duration,
    ) -> Result<bool, RevocationError> {
        Ok(self.is_listed(token_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::RevocationKind;

    fn descriptor() -> RevocationDescriptor {
        RevocationDescriptor {
            kind: RevocationKind::Endpoint,
            uri: "https://rev.bank.example/v1/status".into(),
        }
    }

    #[test]
    fn revoke_is_idempotent() {
        let list = RevocationList::new();
        assert!(list.revoke("t"));
        assert!(!list.revoke("t"));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn unlisted_token_is_not_revoked() {
        let list = RevocationList::new();
        assert!(list.is_empty());
        assert_eq!(
            list.is_revoked("t", &descriptor(), Duration::from_millis(10)),
            Ok(false)
        );
    }
}
