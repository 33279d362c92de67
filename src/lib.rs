//! Capability tokens and delegation trust for autonomous agents.
//!
//! An institution mints signed capability tokens that grant an agent a
//! bounded set of actions over a bounded resource scope. Tokens may be
//! re-delegated to sub-agents under strictly narrowing constraints. A
//! verifier decides from the raw token and the request context whether
//! the action is authorized, and the risk engine separately decides
//! whether it is acceptable.
//!
//! # Overview
//!
//! ```text
//! raw token ──► Verifier (9 ordered checks) ──► replay check ──► CapabilityToken
//!                                                                     │
//!                   DelegationChain::validate (for delegated tokens) ◄┘
//!                                                                     │
//!                                                  risk::assess ◄─────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use acp::{
//!     AgentIdentity, CapabilityToken, InMemoryNonceStore, TokenIssuer, VerificationContext,
//!     Verifier,
//! };
//!
//! let bank = AgentIdentity::generate();
//! let agent = AgentIdentity::generate();
//! let issuer = TokenIssuer::new(bank.clone());
//!
//! let token = issuer
//!     .issue(
//!         CapabilityToken::builder()
//!             .subject(agent.agent_id())
//!             .add_capability("acp:cap:financial.payment")
//!             .resource("org.bank/accounts")
//!             .constraint("max_amount_usd", 5000),
//!     )
//!     .unwrap();
//! let raw = token.to_json().unwrap();
//!
//! let nonces = InMemoryNonceStore::new();
//! let ctx = VerificationContext::new()
//!     .capability("acp:cap:financial.payment")
//!     .resource("org.bank/accounts/ACC-001")
//!     .nonce_store(&nonces);
//!
//! let verifier = Verifier::new();
//! let verified = verifier.verify(raw.as_bytes(), &bank.verifying_key(), &ctx).unwrap();
//! assert_eq!(verified.constraints["max_amount_usd"], 5000);
//!
//! // The same token cannot be presented twice.
//! assert!(verifier.verify(raw.as_bytes(), &bank.verifying_key(), &ctx).is_err());
//! ```
//!
//! # Verification Order
//!
//! | Step | Check | Error |
//! |------|-------|-------|
//! | 1 | `ver` is supported | `UnsupportedVersion` |
//! | 2 | signature over JCS bytes | `InvalidSignature` |
//! | 3 | `now <= exp` | `TokenExpired` |
//! | 4 | `now >= iat - skew` | `NotYetValid` |
//! | 5 | revocation | `TokenRevoked` / `RevocationCheckFailed` |
//! | 6 | capability granted | `EmptyCapabilitySet` / `CapabilityNotPresent` |
//! | 7 | resource covered | `ResourceNotCovered` |
//! | 8 | delegation policy | `DelegationNotAllowed` / `AbsoluteDepthExceeded` / `InvalidParentHash` |
//! | 9 | constraints returned to caller | |
//! | last | nonce unspent | `ReplayDetected` |
//!
//! # Cryptography
//!
//! - Signatures are Ed25519 over `SHA-256(JCS(token without sig))`,
//!   encoded base64url without padding.
//! - An `AgentID` is `base58(SHA-256(public_key))`.
//! - Canonicalization is RFC 8785, so field order and whitespace never
//!   affect validity.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod canonical;
mod constants;
pub mod delegation;
mod error;
mod identity;
mod issuer;
mod keys;
mod nonce;
pub mod prelude;
#[cfg(kani)]
mod proofs;
mod registry;
mod revocation;
pub mod risk;
mod token;
pub mod verification;
mod verifier;

pub use constants::{
    AGENT_ID_MAX_LENGTH, AGENT_ID_MIN_LENGTH, BASE58_ALPHABET, CLOCK_SKEW_SECS,
    DEFAULT_REVOCATION_TIMEOUT_MS, DEFAULT_TOKEN_TTL_SECS, MAX_CHAIN_LENGTH, MAX_DELEGATION_DEPTH,
    NONCE_SIZE, RESOURCE_SEPARATOR, SUPPORTED_VERSION,
};
pub use delegation::{DelegationChain, validate_chain_json, verify_chain, verify_chain_with};
pub use error::{DelegationError, RevocationError, TokenError};
pub use identity::{AgentId, AgentIdentity, is_well_formed, sha256_base64url, sign, verify};
pub use issuer::TokenIssuer;
pub use keys::{SigningKey, VerifyingKey};
pub use nonce::{InMemoryNonceStore, NonceStore};
pub use registry::{InMemoryKeyRegistry, KeyRegistry};
pub use revocation::{RevocationChecker, RevocationList};
pub use risk::{RiskAssessment, RiskDecision, RiskEngine, RiskLevel, RiskRequest};
pub use token::{
    CapabilityToken, DelegationPolicy, RevocationDescriptor, RevocationKind, TokenBuilder,
    compute_raw_token_hash, compute_token_hash, generate_nonce,
};
pub use verification::{
    check_capability, check_delegation_policy, check_expiration, check_not_before, check_resource,
    resource_covers,
};
pub use verifier::{VerificationContext, Verifier, verify_token};
