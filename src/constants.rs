//! Protocol constants for capability tokens and delegation.

/// The only token version this engine accepts.
pub const SUPPORTED_VERSION: &str = "1.0";

/// Absolute ceiling for `deleg.max_depth` on any token.
pub const MAX_DELEGATION_DEPTH: u32 = 8;

/// Maximum chain length: the root plus eight delegations.
pub const MAX_CHAIN_LENGTH: usize = MAX_DELEGATION_DEPTH as usize + 1;

/// Tolerated clock drift when checking `iat`, in seconds.
pub const CLOCK_SKEW_SECS: i64 = 300;

/// Number of random bytes in a freshly minted token nonce.
pub const NONCE_SIZE: usize = 16;

/// Minimum length of an `AgentID`.
pub const AGENT_ID_MIN_LENGTH: usize = 43;

/// Maximum length of an `AgentID`.
pub const AGENT_ID_MAX_LENGTH: usize = 44;

/// Bitcoin base58 alphabet (no `0`, `O`, `I`, `l`).
pub const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Separator between resource path segments.
pub const RESOURCE_SEPARATOR: char = '/';

/// Default lifetime of issued tokens, in seconds.
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

/// Default bound on a single revocation lookup, in milliseconds.
pub const DEFAULT_REVOCATION_TIMEOUT_MS: u64 = 2000;
