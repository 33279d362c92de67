//! Agent public-key registry interface.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::TokenError;
use crate::identity::AgentId;
use crate::keys::VerifyingKey;

/// Resolves an `AgentID` to its published public key.
pub trait KeyRegistry: Send + Sync {
    /// Looks up the key for `agent_id`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::UnknownAgent` if no key is registered.
    fn lookup_public_key(&self, agent_id: &AgentId) -> Result<VerifyingKey, TokenError>;
}

/// In-memory [`KeyRegistry`].
///
/// Keys are indexed by their derived `AgentID`, so a registered key always
/// matches the identifier it is found under.
#[derive(Debug, Default)]
pub struct InMemoryKeyRegistry {
    keys: RwLock<HashMap<AgentId, VerifyingKey>>,
}

impl InMemoryKeyRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a key and returns the `AgentID` it was stored under.
    pub fn register(&self, key: VerifyingKey) -> AgentId {
        let agent_id = AgentId::derive(&key);
        self.keys.write().insert(agent_id.clone(), key);
        agent_id
    }

    /// Number of registered agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    /// Returns true if no agents are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }
}

impl KeyRegistry for InMemoryKeyRegistry {
    fn lookup_public_key(&self, agent_id: &AgentId) -> Result<VerifyingKey, TokenError> {
        self.keys
            .read()
            .get(agent_id)
            .copied()
            .ok_or_else(|| TokenError::UnknownAgent {
                agent_id: agent_id.to_string(),
            })
    }
}
