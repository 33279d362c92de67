//! Error types for the handshake protocol.

use thiserror::Error;

/// Errors produced while issuing challenges or verifying a proof of possession.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeError {
    /// The challenge or signature header is absent or empty.
    #[error("missing required ACP headers; send both X-ACP-Challenge and X-ACP-Signature")]
    MissingHeaders,
    /// The challenge is unknown, already consumed, or past its TTL.
    #[error("challenge expired or not found; request a new one from /acp/v1/challenge")]
    ChallengeExpired,
    /// The signature does not decode or does not verify over the request.
    #[error("proof-of-possession signature invalid")]
    InvalidProof,
    /// The operating system RNG could not produce a challenge.
    #[error("failed to generate challenge: {reason}")]
    ChallengeGeneration {
        /// Description of the RNG failure
        reason: String,
    },
}

impl HandshakeError {
    /// Stable error code for this rejection.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingHeaders => "HP-001",
            Self::ChallengeExpired => "HP-002",
            Self::InvalidProof => "HP-003",
            Self::ChallengeGeneration { .. } => "HP-004",
        }
    }
}
