//! Convenient re-exports for glob imports.
//!
//! ```rust
//! use acp::prelude::*;
//!
//! let identity = AgentIdentity::generate();
//! assert!(AgentId::parse(identity.agent_id().as_str()).is_ok());
//! ```
//!
//! Free functions and constants stay at the crate root.

pub use crate::{
    // Identity and keys
    AgentId, AgentIdentity, SigningKey, VerifyingKey,
    // Tokens
    CapabilityToken, DelegationPolicy, RevocationDescriptor, RevocationKind, TokenBuilder,
    TokenIssuer,
    // Verification
    DelegationChain, VerificationContext, Verifier,
    // Stores and backends
    InMemoryKeyRegistry, InMemoryNonceStore, KeyRegistry, NonceStore, RevocationChecker,
    RevocationList,
    // Risk
    RiskAssessment, RiskDecision, RiskEngine, RiskLevel, RiskRequest,
    // Errors
    DelegationError, RevocationError, TokenError,
};
