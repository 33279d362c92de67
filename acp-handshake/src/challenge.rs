//! Single-use challenge nonces.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use parking_lot::Mutex;
use rand::RngCore;
use rand::rngs::OsRng;

use crate::error::HandshakeError;

/// Lifetime of an issued challenge.
pub const CHALLENGE_TTL: Duration = Duration::from_secs(30);

/// Random bytes per challenge (128 bits).
pub const CHALLENGE_SIZE: usize = 16;

/// Store of outstanding challenges.
///
/// A challenge is issued once and leaves the store on its first
/// [`consume`](Self::consume), whether or not it was still fresh.
///
/// # Example
///
/// ```
/// use acp_handshake::{ChallengeStore, HandshakeError};
///
/// let store = ChallengeStore::new();
/// let challenge = store.generate().unwrap();
///
/// assert!(store.consume(&challenge).is_ok());
/// assert_eq!(store.consume(&challenge), Err(HandshakeError::ChallengeExpired));
/// ```
#[derive(Debug)]
pub struct ChallengeStore {
    ttl: Duration,
    challenges: Mutex<HashMap<String, Instant>>,
}

impl ChallengeStore {
    /// Creates a store with the protocol TTL of 30 seconds.
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(CHALLENGE_TTL)
    }

    /// Creates a store with a custom TTL.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            challenges: Mutex::new(HashMap::new()),
        }
    }

    /// The TTL applied to new challenges.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issues a fresh base64url challenge.
    ///
    /// # Errors
    ///
    /// Returns `ChallengeGeneration` if the OS RNG fails.
    pub fn generate(&self) -> Result<String, HandshakeError> {
        self.generate_at(Instant::now())
    }

    /// Issues a challenge as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// Returns `ChallengeGeneration` if the OS RNG fails.
    pub fn generate_at(&self, now: Instant) -> Result<String, HandshakeError> {
        self.insert_fresh(now, draw_challenge)
    }

    /// Inserts the first drawn value not already outstanding.
    fn insert_fresh<F>(&self, now: Instant, mut draw: F) -> Result<String, HandshakeError>
    where
        F: FnMut() -> Result<String, HandshakeError>,
    {
        let mut challenges = self.challenges.lock();
        loop {
            match challenges.entry(draw()?) {
                Entry::Vacant(slot) => {
                    let challenge = slot.key().clone();
                    slot.insert(now + self.ttl);
                    return Ok(challenge);
                }
                Entry::Occupied(_) => tracing::warn!("challenge collision, drawing again"),
            }
        }
    }

    /// Consumes `challenge`.
    ///
    /// # Errors
    ///
    /// Returns `ChallengeExpired` if the challenge is unknown or stale.
    pub fn consume(&self, challenge: &str) -> Result<(), HandshakeError> {
        self.consume_at(challenge, Instant::now())
    }

    /// Consumes `challenge` as of `now`.
    ///
    /// # Errors
    ///
    /// Returns `ChallengeExpired` if the challenge is unknown or stale.
    pub fn consume_at(&self, challenge: &str, now: Instant) -> Result<(), HandshakeError> {
        // Removed before the freshness check: a stale challenge is spent too.
        let expires_at = self
            .challenges
            .lock()
            .remove(challenge)
            .ok_or(HandshakeError::ChallengeExpired)?;
        if now > expires_at {
            return Err(HandshakeError::ChallengeExpired);
        }
        Ok(())
    }

    /// Returns true if `challenge` is outstanding (fresh or stale).
    #[must_use]
    pub fn contains(&self, challenge: &str) -> bool {
        self.challenges.lock().contains_key(challenge)
    }

    /// Number of outstanding challenges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.challenges.lock().len()
    }

    /// Returns true if no challenge is outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.challenges.lock().is_empty()
    }

    /// Drops challenges whose TTL elapsed without being consumed.
    pub fn prune(&self) -> usize {
        self.prune_at(Instant::now())
    }

    /// [`prune`](Self::prune) as of `now`.
    pub fn prune_at(&self, now: Instant) -> usize {
        let mut challenges = self.challenges.lock();
        let before = challenges.len();
        challenges.retain(|_, expires_at| *expires_at >= now);
        let removed = before - challenges.len();
        if removed > 0 {
            tracing::info!(removed, remaining = challenges.len(), "pruned expired challenges");
        }
        removed
    }
}

fn draw_challenge() -> Result<String, HandshakeError> {
    let mut bytes = [0u8; CHALLENGE_SIZE];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| HandshakeError::ChallengeGeneration {
            reason: e.to_string(),
        })?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

impl Default for ChallengeStore {
    fn default() -> Self {
        Self::new()
    }
}
