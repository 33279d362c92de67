//! The capability token verification engine.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. parse, `ver` must equal the supported version
//! 2. Ed25519 signature over `JCS(token without sig)` of the received bytes
//! 3. `now <= exp`
//! 4. `now >= iat - clock_skew`
//! 5. revocation, when the token names a descriptor and a checker is supplied
//! 6. `cap` non-empty and containing the requested capability
//! 7. `res` covering the requested resource
//! 8. delegation policy and `parent_hash` shape
//! 9. constraints are returned to the caller uninterpreted
//!
//! Replay detection runs last, once the token is known to be structurally
//! valid, so the nonce store cannot be exercised with forged tokens.
//!
//! The ordering is part of the protocol. Do not reorder.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use serde_json::Value;

use crate::canonical::{SIGNATURE_FIELD, parse_object, signing_payload};
use crate::constants::{CLOCK_SKEW_SECS, DEFAULT_REVOCATION_TIMEOUT_MS, SUPPORTED_VERSION};
use crate::error::TokenError;
use crate::identity::{AgentId, verify};
use crate::keys::VerifyingKey;
use crate::nonce::NonceStore;
use crate::revocation::RevocationChecker;
use crate::token::CapabilityToken;
use crate::verification::{
    check_capability, check_delegation_policy, check_expiration, check_not_before, check_resource,
};

/// Runtime context for one verification.
///
/// Every field is optional. An absent requested capability or resource
/// skips that comparison; an absent checker or store skips that lookup.
///
/// # Example
///
/// ```
/// use acp::{InMemoryNonceStore, VerificationContext};
///
/// let nonces = InMemoryNonceStore::new();
/// let ctx = VerificationContext::new()
///     .capability("acp:cap:financial.payment")
///     .resource("org.bank/accounts/ACC-001")
///     .nonce_store(&nonces);
///
/// assert_eq!(ctx.requested_capability(), Some("acp:cap:financial.payment"));
/// ```
#[derive(Clone, Copy)]
pub struct VerificationContext<'a> {
    requested_capability: Option<&'a str>,
    requested_resource: Option<&'a str>,
    revocation_checker: Option<&'a dyn RevocationChecker>,
    revocation_timeout: Duration,
    nonce_store: Option<&'a dyn NonceStore>,
}

impl<'a> VerificationContext<'a> {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self {
            requested_capability: None,
            requested_resource: None,
            revocation_checker: None,
            revocation_timeout: Duration::from_millis(DEFAULT_REVOCATION_TIMEOUT_MS),
            nonce_store: None,
        }
    }

    /// Requires the token to grant `capability`.
    #[must_use]
    pub fn capability(mut self, capability: &'a str) -> Self {
        self.requested_capability = Some(capability);
        self
    }

    /// Requires the token's scope to cover `resource`.
    #[must_use]
    pub fn resource(mut self, resource: &'a str) -> Self {
        self.requested_resource = Some(resource);
        self
    }

    /// Consults `checker` for tokens that carry a revocation descriptor.
    #[must_use]
    pub fn revocation_checker(mut self, checker: &'a dyn RevocationChecker) -> Self {
        self.revocation_checker = Some(checker);
        self
    }

    /// Bounds each revocation lookup.
    #[must_use]
    pub fn revocation_timeout(mut self, timeout: Duration) -> Self {
        self.revocation_timeout = timeout;
        self
    }

    /// Records the token nonce in `store` and rejects replays.
    #[must_use]
    pub fn nonce_store(mut self, store: &'a dyn NonceStore) -> Self {
        self.nonce_store = Some(store);
        self
    }

    /// The requested capability, if any.
    #[must_use]
    pub fn requested_capability(&self) -> Option<&'a str> {
        self.requested_capability
    }

    /// The requested resource, if any.
    #[must_use]
    pub fn requested_resource(&self) -> Option<&'a str> {
        self.requested_resource
    }

    /// A copy of this context with the per-request parts removed.
    ///
    /// Used for the non-leaf members of a delegation chain, which are
    /// checked for validity but not against the concrete request.
    #[must_use]
    pub(crate) fn without_request(self) -> Self {
        Self {
            requested_capability: None,
            requested_resource: None,
            nonce_store: None,
            ..self
        }
    }
}

impl Default for VerificationContext<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for VerificationContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationContext")
            .field("requested_capability", &self.requested_capability)
            .field("requested_resource", &self.requested_resource)
            .field("revocation_checker", &self.revocation_checker.is_some())
            .field("revocation_timeout", &self.revocation_timeout)
            .field("nonce_store", &self.nonce_store.is_some())
            .finish()
    }
}

/// Verifies capability tokens against an issuer key.
///
/// # Example
///
/// ```
/// use acp::{AgentIdentity, TokenIssuer, VerificationContext, Verifier};
///
/// let institution = AgentIdentity::generate();
/// let agent = AgentIdentity::generate();
/// let issuer = TokenIssuer::new(institution.clone());
///
/// let token = issuer
///     .issue(
///         acp::CapabilityToken::builder()
///             .subject(agent.agent_id())
///             .add_capability("acp:cap:financial.payment")
///             .resource("org.bank/accounts"),
///     )
///     .unwrap();
/// let raw = token.to_json().unwrap();
///
/// let ctx = VerificationContext::new().capability("acp:cap:financial.payment");
/// let verified = Verifier::new()
///     .verify(raw.as_bytes(), &institution.verifying_key(), &ctx)
///     .unwrap();
/// assert_eq!(verified.sub, agent.agent_id().as_str());
/// ```
#[derive(Debug, Clone)]
pub struct Verifier {
    supported_version: &'static str,
    clock_skew: i64,
}

impl Verifier {
    /// Creates a verifier for protocol version `1.0` with a 300 s skew budget.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            supported_version: SUPPORTED_VERSION,
            clock_skew: CLOCK_SKEW_SECS,
        }
    }

    /// Overrides the clock-skew budget applied to `iat`.
    #[must_use]
    pub const fn with_clock_skew(mut self, secs: i64) -> Self {
        self.clock_skew = secs;
        self
    }

    /// Returns the clock-skew budget in seconds.
    #[must_use]
    pub const fn clock_skew(&self) -> i64 {
        self.clock_skew
    }

    /// Verifies `raw` at the current wall-clock time.
    ///
    /// # Errors
    ///
    /// Returns the first failed check as a `TokenError`.
    pub fn verify(
        &self,
        raw: &[u8],
        issuer_key: &VerifyingKey,
        ctx: &VerificationContext<'_>,
    ) -> Result<CapabilityToken, TokenError> {
        self.verify_at(raw, issuer_key, ctx, Utc::now().timestamp())
    }

    /// Verifies `raw` as of `now` (Unix seconds).
    ///
    /// # Errors
    ///
    /// Returns the first failed check as a `TokenError`.
    pub fn verify_at(
        &self,
        raw: &[u8],
        issuer_key: &VerifyingKey,
        ctx: &VerificationContext<'_>,
        now: i64,
    ) -> Result<CapabilityToken, TokenError> {
        let result = self.run_checks(raw, issuer_key, ctx, now);
        match &result {
            Ok(token) => tracing::trace!(
                iss = %token.iss,
                sub = %token.sub,
                nonce = %token.nonce,
                "capability token verified"
            ),
            Err(err) => tracing::debug!(code = err.code(), error = %err, "capability token rejected"),
        }
        result
    }

    fn run_checks(
        &self,
        raw: &[u8],
        issuer_key: &VerifyingKey,
        ctx: &VerificationContext<'_>,
        now: i64,
    ) -> Result<CapabilityToken, TokenError> {
        // Step 1
        let object = parse_object(raw)?;
        let version = object.get("ver").and_then(Value::as_str).unwrap_or_default();
        if version != self.supported_version {
            return Err(TokenError::UnsupportedVersion {
                found: version.to_string(),
                supported: self.supported_version,
            });
        }

        // Step 2: canonicalize what was received, not a re-serialized struct.
        let signature = object
            .get(SIGNATURE_FIELD)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or(TokenError::InvalidSignature)?;
        let payload = signing_payload(&object)?;
        if !verify(issuer_key, &payload, signature) {
            return Err(TokenError::InvalidSignature);
        }

        let token: CapabilityToken =
            serde_json::from_value(Value::Object(object)).map_err(|e| {
                TokenError::InvalidTokenFormat {
                    reason: e.to_string(),
                }
            })?;
        AgentId::parse(&token.iss)?;
        AgentId::parse(&token.sub)?;

        // Steps 3 and 4
        check_expiration(token.exp, now)?;
        check_not_before(token.iat, now, self.clock_skew)?;

        // Step 5: checker failures are rejections.
        if let (Some(descriptor), Some(checker)) = (&token.rev, ctx.revocation_checker) {
            if checker.is_revoked(token.token_id(), descriptor, ctx.revocation_timeout)? {
                return Err(TokenError::TokenRevoked {
                    token_id: token.token_id().to_string(),
                });
            }
        }

        // Steps 6 and 7
        check_capability(&token.cap, ctx.requested_capability)?;
        check_resource(&token.res, ctx.requested_resource)?;

        // Step 8: chain relations are checked by the delegation validator.
        check_delegation_policy(&token.deleg)?;
        if let Some(parent_hash) = &token.parent_hash {
            check_parent_hash_shape(parent_hash)?;
        }

        // Step 9: constraints travel back to the caller untouched.

        if let Some(store) = ctx.nonce_store {
            store.mark_used(&token.iss, &token.nonce, token.exp)?;
        }

        Ok(token)
    }
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Verifies `raw` with a default [`Verifier`].
///
/// # Errors
///
/// Returns the first failed check as a `TokenError`.
pub fn verify_token(
    raw: &[u8],
    issuer_key: &VerifyingKey,
    ctx: &VerificationContext<'_>,
) -> Result<CapabilityToken, TokenError> {
    Verifier::new().verify(raw, issuer_key, ctx)
}

fn check_parent_hash_shape(parent_hash: &str) -> Result<(), TokenError> {
    match URL_SAFE_NO_PAD.decode(parent_hash) {
        Ok(bytes) if bytes.len() == 32 => Ok(()),
        _ => Err(TokenError::InvalidParentHash {
            value: parent_hash.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::identity::{AgentIdentity, sign};
    use crate::nonce::InMemoryNonceStore;

    const NOW: i64 = 1_700_000_000;

    struct Fixture {
        institution: AgentIdentity,
        agent: AgentIdentity,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                institution: AgentIdentity::from_seed(&[11u8; 32]).unwrap(),
                agent: AgentIdentity::from_seed(&[22u8; 32]).unwrap(),
            }
        }

        fn body(&self) -> serde_json::Map<String, Value> {
            let value = json!({
                "ver": "1.0",
                "iss": self.institution.agent_id().as_str(),
                "sub": self.agent.agent_id().as_str(),
                "cap": ["acp:cap:financial.payment"],
                "res": "org.bank/accounts",
                "iat": NOW,
                "exp": NOW + 3600,
                "nonce": "bm9uY2UtMQ",
                "deleg": {"allowed": false, "max_depth": 0},
                "constraints": {"max_amount_usd": 5000}
            });
            match value {
                Value::Object(map) => map,
                _ => unreachable!(),
            }
        }

        fn sign(&self, mut body: serde_json::Map<String, Value>) -> Vec<u8> {
            body.remove("sig");
            let payload = signing_payload(&body).unwrap();
            body.insert(
                "sig".into(),
                Value::String(sign(self.institution.signing_key(), &payload)),
            );
            serde_json::to_vec(&Value::Object(body)).unwrap()
        }

        fn verify(
            &self,
            raw: &[u8],
            ctx: &VerificationContext<'_>,
        ) -> Result<CapabilityToken, TokenError> {
            Verifier::new().verify_at(raw, &self.institution.verifying_key(), ctx, NOW)
        }
    }

    #[test]
    fn valid_token_passes_and_returns_constraints() {
        let f = Fixture::new();
        let raw = f.sign(f.body());

        let token = f.verify(&raw, &VerificationContext::new()).unwrap();

        assert_eq!(token.constraints["max_amount_usd"], 5000);
    }

    #[test]
    fn wrong_version_is_rejected_before_signature() {
        let f = Fixture::new();
        let mut body = f.body();
        body.insert("ver".into(), json!("2.0"));
        body.insert("sig".into(), json!("garbage"));
        let raw = serde_json::to_vec(&body).unwrap();

        assert!(matches!(
            f.verify(&raw, &VerificationContext::new()),
            Err(TokenError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn missing_signature_is_invalid() {
        let f = Fixture::new();
        let raw = serde_json::to_vec(&f.body()).unwrap();

        assert_eq!(
            f.verify(&raw, &VerificationContext::new()),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn field_reordering_keeps_signature_valid() {
        let f = Fixture::new();
        let raw = f.sign(f.body());
        let value: Value = serde_json::from_slice(&raw).unwrap();
        // serde_json::Map is ordered by key; emit a hand-reversed document
        let Value::Object(map) = value else { unreachable!() };
        let reversed = format!(
            "{{{}}}",
            map.iter()
                .rev()
                .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), v))
                .collect::<Vec<_>>()
                .join(" , ")
        );

        assert!(f.verify(reversed.as_bytes(), &VerificationContext::new()).is_ok());
    }

    #[test]
    fn unknown_signed_field_is_covered_by_signature() {
        let f = Fixture::new();
        let mut body = f.body();
        body.insert("ext".into(), json!("signed"));
        let raw = f.sign(body);
        let tampered = String::from_utf8(raw).unwrap().replace("\"signed\"", "\"forged\"");

        assert_eq!(
            f.verify(tampered.as_bytes(), &VerificationContext::new()),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn malformed_subject_is_rejected() {
        let f = Fixture::new();
        let mut body = f.body();
        body.insert("sub".into(), json!("not-an-agent-id"));
        let raw = f.sign(body);

        assert!(matches!(
            f.verify(&raw, &VerificationContext::new()),
            Err(TokenError::MalformedAgentId { .. })
        ));
    }

    #[test]
    fn parent_hash_must_be_a_digest() {
        let f = Fixture::new();
        let mut body = f.body();
        body.insert("parent_hash".into(), json!("short"));
        let raw = f.sign(body);

        assert!(matches!(
            f.verify(&raw, &VerificationContext::new()),
            Err(TokenError::InvalidParentHash { .. })
        ));
    }

    #[test]
    fn expired_token_never_touches_nonce_store() {
        let f = Fixture::new();
        let mut body = f.body();
        body.insert("exp".into(), json!(NOW - 1));
        let raw = f.sign(body);
        let store = InMemoryNonceStore::new();
        let ctx = VerificationContext::new().nonce_store(&store);

        assert!(matches!(f.verify(&raw, &ctx), Err(TokenError::TokenExpired { .. })));
        assert!(store.is_empty());
    }

    #[test]
    fn non_object_input_is_invalid_format() {
        let f = Fixture::new();
        for raw in [&b"[]"[..], b"\"token\"", b"{not json"] {
            assert!(matches!(
                f.verify(raw, &VerificationContext::new()),
                Err(TokenError::InvalidTokenFormat { .. })
            ));
        }
    }
}
