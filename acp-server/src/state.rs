//! Shared verifier state.

use std::sync::Arc;
use std::time::Duration;

use acp::{InMemoryKeyRegistry, InMemoryNonceStore, NonceStore, RiskEngine, Verifier, VerifyingKey};
use acp_handshake::ChallengeStore;
use tokio::task::JoinHandle;

/// Everything a request handler needs. Shared behind an `Arc`.
#[derive(Debug)]
pub struct AppState {
    /// Key that signs every accepted capability token
    pub institution_key: VerifyingKey,
    /// Presenting agents' keys, for proof-of-possession
    pub registry: InMemoryKeyRegistry,
    /// Outstanding handshake challenges
    pub challenges: ChallengeStore,
    /// Token nonces seen so far
    pub nonces: InMemoryNonceStore,
    /// Token verifier
    pub verifier: Verifier,
    /// Risk policy
    pub risk: RiskEngine,
}

impl AppState {
    /// Creates state with empty stores and default policies.
    #[must_use]
    pub fn new(institution_key: VerifyingKey, registry: InMemoryKeyRegistry) -> Self {
        Self {
            institution_key,
            registry,
            challenges: ChallengeStore::new(),
            nonces: InMemoryNonceStore::new(),
            verifier: Verifier::new(),
            risk: RiskEngine::new(),
        }
    }

    /// Replaces the token verifier.
    #[must_use]
    pub fn with_verifier(mut self, verifier: Verifier) -> Self {
        self.verifier = verifier;
        self
    }

    /// Replaces the challenge store.
    #[must_use]
    pub fn with_challenges(mut self, challenges: ChallengeStore) -> Self {
        self.challenges = challenges;
        self
    }
}

/// Handles for the background prune loops.
#[derive(Debug)]
pub struct PruneTasks {
    /// Challenge store sweeper
    pub challenges: JoinHandle<()>,
    /// Nonce store sweeper
    pub nonces: JoinHandle<()>,
}

impl PruneTasks {
    /// Stops both loops.
    pub fn abort(&self) {
        self.challenges.abort();
        self.nonces.abort();
    }
}

/// Spawns the two independent prune loops on the current runtime.
#[must_use]
pub fn spawn_pruners(state: &Arc<AppState>, every: Duration) -> PruneTasks {
    let challenges = {
        let state = Arc::clone(state);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                state.challenges.prune();
            }
        })
    };
    let nonces = {
        let state = Arc::clone(state);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                state.nonces.prune();
            }
        })
    };
    PruneTasks { challenges, nonces }
}
