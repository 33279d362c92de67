//! Ed25519 keys.
//!
//! Institutions sign capability tokens with a [`SigningKey`]; verifiers hold
//! only the [`VerifyingKey`], which travels as 43 characters of unpadded
//! base64url.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ed25519_dalek::{PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH};

use crate::error::TokenError;

/// Ed25519 private key.
///
/// `Debug` prints the public half only.
///
/// ```
/// use acp::SigningKey;
///
/// let seed = [42u8; 32];
/// let key = SigningKey::from_seed(&seed).unwrap();
/// assert_eq!(key.to_bytes(), seed);
/// ```
#[derive(Clone)]
pub struct SigningKey(ed25519_dalek::SigningKey);

impl SigningKey {
    /// Draws a fresh key from `OsRng`.
    #[must_use]
    pub fn generate() -> Self {
        Self(ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng))
    }

    /// Rebuilds a key from its 32-byte seed.
    ///
    /// # Errors
    ///
    /// `InvalidSeedLength` for any other length.
    pub fn from_seed(seed: &[u8]) -> Result<Self, TokenError> {
        <[u8; SECRET_KEY_LENGTH]>::try_from(seed)
            .map(|bytes| Self(ed25519_dalek::SigningKey::from_bytes(&bytes)))
            .map_err(|_| TokenError::InvalidSeedLength { actual: seed.len() })
    }

    /// The seed. Handle with care.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; SECRET_KEY_LENGTH] {
        self.0.to_bytes()
    }

    /// The matching public key.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey(self.0.verifying_key())
    }

    pub(crate) fn as_dalek(&self) -> &ed25519_dalek::SigningKey {
        &self.0
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SigningKey")
            .field(&self.verifying_key())
            .finish()
    }
}

/// Ed25519 public key, as published in the agent registry.
///
/// ```
/// use acp::{SigningKey, VerifyingKey};
///
/// let public = SigningKey::generate().verifying_key();
/// let wire = public.to_base64url();
/// assert_eq!(wire.len(), 43);
/// assert_eq!(VerifyingKey::from_base64url(&wire).unwrap(), public);
/// ```
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct VerifyingKey(ed25519_dalek::VerifyingKey);

impl VerifyingKey {
    /// Parses 32 raw bytes.
    ///
    /// # Errors
    ///
    /// `InvalidKeyFormat` on a wrong length or a point that is not on the curve.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TokenError> {
        let raw = <[u8; PUBLIC_KEY_LENGTH]>::try_from(bytes).map_err(|_| {
            TokenError::InvalidKeyFormat {
                reason: format!("public key must be {PUBLIC_KEY_LENGTH} bytes, got {}", bytes.len()),
            }
        })?;
        ed25519_dalek::VerifyingKey::from_bytes(&raw)
            .map(Self)
            .map_err(|e| TokenError::InvalidKeyFormat {
                reason: e.to_string(),
            })
    }

    /// Parses the unpadded base64url form. Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// `InvalidKeyFormat` if decoding fails or [`from_bytes`](Self::from_bytes) does.
    pub fn from_base64url(encoded: &str) -> Result<Self, TokenError> {
        match URL_SAFE_NO_PAD.decode(encoded.trim()) {
            Ok(bytes) => Self::from_bytes(&bytes),
            Err(e) => Err(TokenError::InvalidKeyFormat {
                reason: format!("public key is not base64url: {e}"),
            }),
        }
    }

    /// Raw key bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        self.0.to_bytes()
    }

    /// Unpadded base64url form.
    #[must_use]
    pub fn to_base64url(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0.as_bytes())
    }

    pub(crate) fn as_dalek(&self) -> &ed25519_dalek::VerifyingKey {
        &self.0
    }
}

impl fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VerifyingKey({})", self.to_base64url())
    }
}
