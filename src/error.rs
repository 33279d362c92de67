//! Error types for token, delegation and revocation operations.
//!
//! Every variant is a terminal decision. `code()` returns a stable
//! identifier suitable for wire responses and log correlation.

use std::time::Duration;

use thiserror::Error;

/// Errors produced while minting, parsing or verifying capability tokens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// The raw bytes are not a JSON object of the expected shape.
    #[error("invalid token format: {reason}")]
    InvalidTokenFormat {
        /// Description of the format error
        reason: String,
    },
    /// The `ver` field does not match the supported protocol version.
    #[error("unsupported token version '{found}'; this verifier accepts '{supported}'")]
    UnsupportedVersion {
        /// Version string found in the token
        found: String,
        /// Version this verifier supports
        supported: &'static str,
    },
    /// Signature is missing, undecodable or does not verify.
    #[error("token signature verification failed; token may have been tampered with")]
    InvalidSignature,
    /// The token's expiration has passed.
    #[error("token expired at {expired_at}; request a new capability token")]
    TokenExpired {
        /// When the token expired (RFC 3339)
        expired_at: String,
    },
    /// The token's `iat` lies beyond the tolerated clock skew.
    #[error("token not yet valid; issued at {issued_at}")]
    NotYetValid {
        /// When the token claims to have been issued (RFC 3339)
        issued_at: String,
    },
    /// The revocation checker reported the token as revoked.
    #[error("token '{token_id}' has been revoked")]
    TokenRevoked {
        /// Identifier passed to the revocation checker
        token_id: String,
    },
    /// The revocation checker could not produce an answer.
    #[error("revocation check failed: {0}")]
    RevocationCheckFailed(#[from] RevocationError),
    /// The `cap` array is empty.
    #[error("token grants no capabilities; 'cap' must not be empty")]
    EmptyCapabilitySet,
    /// The requested capability is not an element of `cap`.
    #[error("capability '{requested}' is not granted by this token")]
    CapabilityNotPresent {
        /// The capability that was requested
        requested: String,
    },
    /// The requested resource lies outside the token's scope.
    #[error("resource '{requested}' is not covered by token scope '{scope}'")]
    ResourceNotCovered {
        /// The resource that was requested
        requested: String,
        /// The scope carried by the token
        scope: String,
    },
    /// `deleg.allowed` is false but `deleg.max_depth` is not zero.
    #[error("delegation not permitted but max_depth is {max_depth}; expected 0")]
    DelegationNotAllowed {
        /// The offending depth value
        max_depth: u32,
    },
    /// `deleg.max_depth` exceeds the absolute ceiling.
    #[error("max_depth {max_depth} exceeds the absolute limit of {limit}")]
    AbsoluteDepthExceeded {
        /// The offending depth value
        max_depth: u32,
        /// The absolute ceiling
        limit: u32,
    },
    /// `parent_hash` is present but is not a base64url SHA-256 digest.
    #[error("invalid parent_hash '{value}'")]
    InvalidParentHash {
        /// The value found in the token
        value: String,
    },
    /// The token's nonce has already been spent.
    #[error("nonce '{nonce}' already used; replay detected")]
    ReplayDetected {
        /// The replayed nonce
        nonce: String,
    },
    /// An `iss` or `sub` value is not a well-formed `AgentID`.
    #[error("malformed AgentID '{value}'; expected 43-44 base58 characters")]
    MalformedAgentId {
        /// The rejected value
        value: String,
    },
    /// A required field was not provided to a builder.
    #[error("missing required field '{field}' in capability token")]
    MissingField {
        /// Name of the missing field
        field: &'static str,
    },
    /// The TTL duration is invalid.
    #[error("TTL duration is invalid or out of range")]
    InvalidTtl,
    /// A private key seed was not exactly 32 bytes.
    #[error("invalid seed length {actual}; Ed25519 seeds must be exactly 32 bytes")]
    InvalidSeedLength {
        /// Length of the rejected seed
        actual: usize,
    },
    /// Key bytes or encoding are invalid.
    #[error("invalid key format: {reason}")]
    InvalidKeyFormat {
        /// Description of the key error
        reason: String,
    },
    /// No public key registered for an agent.
    #[error("no public key registered for agent '{agent_id}'")]
    UnknownAgent {
        /// The agent lacking a registered key
        agent_id: String,
    },
}

impl TokenError {
    /// Stable error code for this rejection.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedVersion { .. } => "CT-001",
            Self::InvalidSignature => "CT-002",
            Self::TokenExpired { .. } => "CT-003",
            Self::NotYetValid { .. } => "CT-004",
            Self::CapabilityNotPresent { .. } => "CT-005",
            Self::ResourceNotCovered { .. } => "CT-006",
            Self::DelegationNotAllowed { .. } => "CT-007",
            Self::AbsoluteDepthExceeded { .. } => "CT-008",
            Self::InvalidParentHash { .. } => "CT-009",
            Self::TokenRevoked { .. } => "CT-010",
            Self::ReplayDetected { .. } => "CT-011",
            Self::EmptyCapabilitySet => "CT-012",
            Self::MalformedAgentId { .. } => "CT-013",
            Self::InvalidTokenFormat { .. } => "CT-014",
            Self::RevocationCheckFailed(_) => "CT-015",
            Self::MissingField { .. } => "IS-001",
            Self::InvalidTtl => "IS-002",
            Self::InvalidSeedLength { .. } => "KY-001",
            Self::InvalidKeyFormat { .. } => "KY-002",
            Self::UnknownAgent { .. } => "RG-001",
        }
    }

    /// Returns true for the step-8 delegation policy violations.
    #[must_use]
    pub const fn is_delegation_constraint_violation(&self) -> bool {
        matches!(
            self,
            Self::DelegationNotAllowed { .. } | Self::AbsoluteDepthExceeded { .. }
        )
    }
}

/// Errors produced by a revocation backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RevocationError {
    /// The backend did not answer within the caller's timeout.
    #[error("revocation backend did not answer within {timeout:?}")]
    Timeout {
        /// The timeout that elapsed
        timeout: Duration,
    },
    /// The backend is unreachable or returned garbage.
    #[error("revocation backend unavailable: {reason}")]
    Unavailable {
        /// Description of the failure
        reason: String,
    },
}

/// Errors produced while validating a delegation chain.
///
/// `link` is the chain index of the child token in the offending pair.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DelegationError {
    /// The chain has no tokens.
    #[error("delegation chain is empty")]
    EmptyChain,
    /// The chain exceeds the root plus eight delegations.
    #[error("delegation chain has {len} tokens; at most {max} are allowed")]
    ChainTooLong {
        /// Number of tokens presented
        len: usize,
        /// Maximum chain length
        max: usize,
    },
    /// The root token carries a `parent_hash`.
    #[error("root token must not carry a parent_hash")]
    RootHasParentHash,
    /// The parent does not allow delegation.
    #[error("link {link}: parent token does not permit delegation")]
    DelegationNotAllowed {
        /// Index of the child token
        link: usize,
    },
    /// The child claims a capability its parent lacks.
    #[error("link {link}: capability '{capability}' is not granted by the parent")]
    CapabilityEscalation {
        /// Index of the child token
        link: usize,
        /// The escalated capability
        capability: String,
    },
    /// The child's resource is broader than or outside its parent's.
    #[error("link {link}: resource '{child}' is not covered by parent resource '{parent}'")]
    ResourceEscalation {
        /// Index of the child token
        link: usize,
        /// Child resource
        child: String,
        /// Parent resource
        parent: String,
    },
    /// The child outlives its parent.
    #[error("link {link}: child expiration {child_exp} exceeds parent expiration {parent_exp}")]
    ExpirationExtension {
        /// Index of the child token
        link: usize,
        /// Child `exp`
        child_exp: i64,
        /// Parent `exp`
        parent_exp: i64,
    },
    /// The child's `max_depth` is not exactly the parent's minus one.
    #[error("link {link}: max_depth must be {expected}, found {actual}")]
    DepthViolation {
        /// Index of the child token
        link: usize,
        /// Parent depth minus one
        expected: i64,
        /// Child depth
        actual: u32,
    },
    /// The child's `max_depth` exceeds the absolute ceiling.
    #[error("link {link}: max_depth {max_depth} exceeds the absolute limit")]
    AbsoluteDepthExceeded {
        /// Index of the child token
        link: usize,
        /// Child depth
        max_depth: u32,
    },
    /// The child has no `parent_hash`.
    #[error("link {link}: delegated token is missing parent_hash")]
    MissingParentHash {
        /// Index of the child token
        link: usize,
    },
    /// The child's `parent_hash` does not match its parent.
    #[error("link {link}: parent_hash does not match the parent token")]
    ParentHashMismatch {
        /// Index of the child token
        link: usize,
    },
    /// A chain member failed individual token verification.
    #[error("token {link} rejected: {source}")]
    MemberRejected {
        /// Index of the rejected token
        link: usize,
        /// The underlying verification failure
        source: TokenError,
    },
    /// A token-level operation failed while building or hashing the chain.
    #[error(transparent)]
    Token(#[from] TokenError),
}

impl DelegationError {
    /// Stable error code for this rejection.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::EmptyChain => "DG-001",
            Self::ChainTooLong { .. } => "DG-002",
            Self::RootHasParentHash => "DG-003",
            Self::DelegationNotAllowed { .. } => "DG-004",
            Self::CapabilityEscalation { .. } => "DG-005",
            Self::ResourceEscalation { .. } => "DG-006",
            Self::ExpirationExtension { .. } => "DG-007",
            Self::DepthViolation { .. } => "DG-008",
            Self::AbsoluteDepthExceeded { .. } => "DG-009",
            Self::MissingParentHash { .. } => "DG-010",
            Self::ParentHashMismatch { .. } => "DG-011",
            Self::MemberRejected { source, .. } | Self::Token(source) => source.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_token_numbering() {
        assert_eq!(TokenError::InvalidSignature.code(), "CT-002");
        assert_eq!(TokenError::EmptyCapabilitySet.code(), "CT-012");
        assert_eq!(
            TokenError::ReplayDetected {
                nonce: "n".into()
            }
            .code(),
            "CT-011"
        );
    }

    #[test]
    fn delegation_constraint_classification() {
        assert!(TokenError::DelegationNotAllowed { max_depth: 1 }
            .is_delegation_constraint_violation());
        assert!(TokenError::AbsoluteDepthExceeded {
            max_depth: 9,
            limit: 8
        }
        .is_delegation_constraint_violation());
        assert!(!TokenError::InvalidSignature.is_delegation_constraint_violation());
    }

    #[test]
    fn member_rejection_reports_inner_code() {
        let err = DelegationError::MemberRejected {
            link: 2,
            source: TokenError::InvalidSignature,
        };
        assert_eq!(err.code(), "CT-002");
        assert!(err.to_string().contains("token 2 rejected"));
    }

    #[test]
    fn revocation_error_converts_fail_closed() {
        let err: TokenError = RevocationError::Unavailable {
            reason: "connection refused".into(),
        }
        .into();
        assert_eq!(err.code(), "CT-015");
    }
}
