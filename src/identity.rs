//! Agent identities, `AgentID` derivation and the signing primitive.
//!
//! Signatures are always `Ed25519(sk, SHA-256(bytes))`, encoded as
//! base64url without padding. Callers pass the canonical bytes; the
//! pre-hash happens here so issuers and verifiers cannot disagree on it.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ed25519_dalek::{Signature, Signer};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::constants::{AGENT_ID_MAX_LENGTH, AGENT_ID_MIN_LENGTH, BASE58_ALPHABET};
use crate::error::TokenError;
use crate::keys::{SigningKey, VerifyingKey};

/// A stable agent identifier: `base58(SHA-256(raw public key))`.
///
/// # Example
///
/// ```
/// use acp::{AgentId, SigningKey};
///
/// let key = SigningKey::generate().verifying_key();
/// let id = AgentId::derive(&key);
///
/// assert!(AgentId::parse(id.as_str()).is_ok());
/// assert!(AgentId::parse("0OIl").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentId(String);

impl AgentId {
    /// Derives the `AgentID` for a public key.
    #[must_use]
    pub fn derive(public_key: &VerifyingKey) -> Self {
        let digest = Sha256::digest(public_key.to_bytes());
        Self(bs58::encode(digest).into_string())
    }

    /// Parses and validates an `AgentID` string.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::MalformedAgentId` unless the input is 43–44
    /// characters drawn from the base58 alphabet.
    pub fn parse(input: &str) -> Result<Self, TokenError> {
        if is_well_formed(input) {
            Ok(Self(input.to_string()))
        } else {
            Err(TokenError::MalformedAgentId {
                value: input.to_string(),
            })
        }
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Returns true if `input` is a well-formed `AgentID`.
#[must_use]
pub fn is_well_formed(input: &str) -> bool {
    (AGENT_ID_MIN_LENGTH..=AGENT_ID_MAX_LENGTH).contains(&input.len())
        && input.chars().all(|c| BASE58_ALPHABET.contains(c))
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AgentId {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AgentId {
    type Error = TokenError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if is_well_formed(&value) {
            Ok(Self(value))
        } else {
            Err(TokenError::MalformedAgentId { value })
        }
    }
}

impl From<AgentId> for String {
    fn from(id: AgentId) -> Self {
        id.0
    }
}

impl AsRef<str> for AgentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// An agent's keypair together with its derived `AgentID`.
///
/// Immutable after creation: the three parts are always consistent.
#[derive(Debug, Clone)]
pub struct AgentIdentity {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
    agent_id: AgentId,
}

impl AgentIdentity {
    /// Generates a fresh identity from the OS CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate())
    }

    /// Loads an identity from a 32-byte private key seed.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::InvalidSeedLength` unless `seed` is exactly 32 bytes.
    pub fn from_seed(seed: &[u8]) -> Result<Self, TokenError> {
        SigningKey::from_seed(seed).map(Self::from_signing_key)
    }

    /// Wraps an existing signing key.
    #[must_use]
    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        let verifying_key = signing_key.verifying_key();
        let agent_id = AgentId::derive(&verifying_key);
        Self {
            signing_key,
            verifying_key,
            agent_id,
        }
    }

    /// Returns the agent's identifier.
    #[must_use]
    pub fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    /// Returns the public key to publish in the registry.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.verifying_key
    }

    /// Returns the signing key.
    #[must_use]
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// Signs canonical bytes; see [`sign`].
    #[must_use]
    pub fn sign(&self, canonical_bytes: &[u8]) -> String {
        sign(&self.signing_key, canonical_bytes)
    }
}

/// Signs `canonical_bytes` as `Ed25519(sk, SHA-256(canonical_bytes))`.
///
/// Returns the 64-byte signature encoded as base64url without padding.
#[must_use]
pub fn sign(signing_key: &SigningKey, canonical_bytes: &[u8]) -> String {
    let digest = Sha256::digest(canonical_bytes);
    let signature: Signature = signing_key.as_dalek().sign(&digest);
    URL_SAFE_NO_PAD.encode(signature.to_bytes())
}

/// Verifies a base64url signature produced by [`sign`].
///
/// Returns false on any malformed input instead of failing.
///
/// # Example
///
/// ```
/// use acp::{sign, verify, AgentIdentity};
///
/// let id = AgentIdentity::generate();
/// let sig = sign(id.signing_key(), b"payload");
///
/// assert!(verify(&id.verifying_key(), b"payload", &sig));
/// assert!(!verify(&id.verifying_key(), b"tampered", &sig));
/// ```
#[must_use]
pub fn verify(public_key: &VerifyingKey, canonical_bytes: &[u8], signature: &str) -> bool {
    let Ok(sig_bytes) = URL_SAFE_NO_PAD.decode(signature) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(&sig_bytes) else {
        return false;
    };
    let digest = Sha256::digest(canonical_bytes);
    public_key
        .as_dalek()
        .verify_strict(&digest, &signature)
        .is_ok()
}

/// Returns `base64url(SHA-256(bytes))` without padding.
#[must_use]
pub fn sha256_base64url(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_id_is_deterministic() {
        let identity = AgentIdentity::from_seed(&[42u8; 32]).unwrap();
        let again = AgentIdentity::from_seed(&[42u8; 32]).unwrap();

        assert_eq!(identity.agent_id(), again.agent_id());
        assert_eq!(
            AgentId::derive(&identity.verifying_key()),
            *identity.agent_id()
        );
    }

    #[test]
    fn derived_id_is_well_formed() {
        for _ in 0..32 {
            let id = AgentIdentity::generate();
            let len = id.agent_id().as_str().len();
            assert!((AGENT_ID_MIN_LENGTH..=AGENT_ID_MAX_LENGTH).contains(&len));
            assert!(is_well_formed(id.agent_id().as_str()));
        }
    }

    #[test]
    fn distinct_keys_have_distinct_ids() {
        let a = AgentIdentity::generate();
        let b = AgentIdentity::generate();
        assert_ne!(a.agent_id(), b.agent_id());
    }

    #[test]
    fn parse_rejects_excluded_characters() {
        let base = "1".repeat(43);
        for bad in ['0', 'O', 'I', 'l', '-', '_'] {
            let candidate = format!("{bad}{}", &base[1..]);
            assert!(matches!(
                AgentId::parse(&candidate),
                Err(TokenError::MalformedAgentId { .. })
            ));
        }
    }

    #[test]
    fn parse_enforces_length_bounds() {
        assert!(AgentId::parse(&"1".repeat(42)).is_err());
        assert!(AgentId::parse(&"1".repeat(43)).is_ok());
        assert!(AgentId::parse(&"1".repeat(44)).is_ok());
        assert!(AgentId::parse(&"1".repeat(45)).is_err());
    }

    #[test]
    fn sign_verify_round_trip() {
        let id = AgentIdentity::generate();
        let sig = id.sign(b"canonical");

        assert!(verify(&id.verifying_key(), b"canonical", &sig));
    }

    #[test]
    fn verify_rejects_other_key() {
        let signer = AgentIdentity::generate();
        let other = AgentIdentity::generate();
        let sig = signer.sign(b"canonical");

        assert!(!verify(&other.verifying_key(), b"canonical", &sig));
    }

    #[test]
    fn verify_rejects_flipped_signature_byte() {
        let id = AgentIdentity::generate();
        let sig = id.sign(b"canonical");
        let mut raw = URL_SAFE_NO_PAD.decode(&sig).unwrap();
        raw[10] ^= 0x01;
        let tampered = URL_SAFE_NO_PAD.encode(raw);

        assert!(!verify(&id.verifying_key(), b"canonical", &tampered));
    }

    #[test]
    fn verify_returns_false_on_garbage() {
        let id = AgentIdentity::generate();
        assert!(!verify(&id.verifying_key(), b"x", ""));
        assert!(!verify(&id.verifying_key(), b"x", "!!!"));
        assert!(!verify(&id.verifying_key(), b"x", "AAAA"));
    }

    #[test]
    fn agent_id_serde_validates() {
        let id = AgentIdentity::generate();
        let json = serde_json::to_string(id.agent_id()).unwrap();
        let back: AgentId = serde_json::from_str(&json).unwrap();
        assert_eq!(&back, id.agent_id());

        assert!(serde_json::from_str::<AgentId>("\"short\"").is_err());
    }
}
