//! Capability token data model.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::canonical::{parse_object, signing_payload};
use crate::constants::{DEFAULT_TOKEN_TTL_SECS, NONCE_SIZE, SUPPORTED_VERSION};
use crate::error::TokenError;
use crate::identity::{AgentId, sha256_base64url, sign};
use crate::keys::SigningKey;
use crate::verification::resource_covers;

/// Re-delegation rules carried by a token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationPolicy {
    /// Whether the bearer may mint child tokens.
    pub allowed: bool,
    /// How many further delegation hops remain.
    pub max_depth: u32,
}

impl DelegationPolicy {
    /// A policy that forbids re-delegation.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            allowed: false,
            max_depth: 0,
        }
    }

    /// A policy that allows `max_depth` further hops.
    #[must_use]
    pub const fn allowed(max_depth: u32) -> Self {
        Self {
            allowed: true,
            max_depth,
        }
    }
}

/// How a verifier checks whether a token has been revoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevocationKind {
    /// Online status endpoint.
    Endpoint,
    /// Certificate-revocation-list style document.
    Crl,
}

/// Revocation descriptor (`rev` on the wire).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationDescriptor {
    /// Mechanism to use.
    #[serde(rename = "type")]
    pub kind: RevocationKind,
    /// Location of the revocation service.
    pub uri: String,
}

/// A signed capability token.
///
/// Field names match the JSON wire format. `iss` and `sub` are kept as
/// raw strings so the verifier can report `MalformedAgentId` itself; use
/// [`CapabilityToken::issuer_id`] and [`CapabilityToken::subject_id`] for
/// validated access.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityToken {
    /// Protocol version.
    pub ver: String,
    /// Issuer `AgentID`.
    pub iss: String,
    /// Subject (bearer) `AgentID`.
    pub sub: String,
    /// Granted capability identifiers.
    pub cap: Vec<String>,
    /// Resource scope (`domain/segment/...`).
    pub res: String,
    /// Issued-at, Unix seconds.
    pub iat: i64,
    /// Expiration, Unix seconds.
    pub exp: i64,
    /// Single-use nonce, base64url.
    pub nonce: String,
    /// Delegation policy.
    pub deleg: DelegationPolicy,
    /// Hash of the parent token; absent on roots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_hash: Option<String>,
    /// Capability-specific limits, interpreted by the caller.
    #[serde(default)]
    pub constraints: Map<String, Value>,
    /// Revocation descriptor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<RevocationDescriptor>,
    /// Ed25519 signature over the canonical form of every other field.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sig: String,
}

impl CapabilityToken {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> TokenBuilder {
        TokenBuilder::new()
    }

    /// Parses a token from JSON without verifying it.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::InvalidTokenFormat` if the JSON does not match
    /// the token shape.
    pub fn from_json(raw: &[u8]) -> Result<Self, TokenError> {
        serde_json::from_slice(raw).map_err(|e| TokenError::InvalidTokenFormat {
            reason: e.to_string(),
        })
    }

    /// Serializes the token to compact JSON.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::InvalidTokenFormat` if serialization fails.
    pub fn to_json(&self) -> Result<String, TokenError> {
        serde_json::to_string(self).map_err(|e| TokenError::InvalidTokenFormat {
            reason: e.to_string(),
        })
    }

    /// Canonical bytes covered by the signature.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::InvalidTokenFormat` if the token cannot be
    /// represented as a JSON object.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, TokenError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => signing_payload(&map),
            Ok(_) => Err(TokenError::InvalidTokenFormat {
                reason: "token did not serialize to an object".to_string(),
            }),
            Err(e) => Err(TokenError::InvalidTokenFormat {
                reason: e.to_string(),
            }),
        }
    }

    /// Signs the token in place, replacing any existing signature.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::InvalidTokenFormat` if canonicalization fails.
    pub fn sign_with(&mut self, signing_key: &SigningKey) -> Result<(), TokenError> {
        self.sig = sign(signing_key, &self.signing_bytes()?);
        Ok(())
    }

    /// Validated issuer identifier.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::MalformedAgentId` if `iss` is malformed.
    pub fn issuer_id(&self) -> Result<AgentId, TokenError> {
        AgentId::parse(&self.iss)
    }

    /// Validated subject identifier.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::MalformedAgentId` if `sub` is malformed.
    pub fn subject_id(&self) -> Result<AgentId, TokenError> {
        AgentId::parse(&self.sub)
    }

    /// Identifier handed to revocation checkers.
    #[must_use]
    pub fn token_id(&self) -> &str {
        &self.nonce
    }

    /// Returns true if this token has no parent.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_hash.is_none()
    }

    /// Returns true if `capability` is an exact element of `cap`.
    #[must_use]
    pub fn has_capability(&self, capability: &str) -> bool {
        self.cap.iter().any(|c| c == capability)
    }

    /// Returns true if `resource` lies within this token's scope.
    #[must_use]
    pub fn covers_resource(&self, resource: &str) -> bool {
        resource_covers(&self.res, resource)
    }

    /// Expiration as a timestamp, if representable.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// Computes `base64url(SHA-256(JCS(token without sig)))` of a typed token.
///
/// This is the value a child token carries in `parent_hash`. It matches
/// what was signed only for tokens serialized by this crate. For a token
/// received as JSON use [`compute_raw_token_hash`], which also covers
/// explicit `null` members and fields this crate does not model.
///
/// # Errors
///
/// Returns `TokenError::InvalidTokenFormat` if canonicalization fails.
pub fn compute_token_hash(token: &CapabilityToken) -> Result<String, TokenError> {
    Ok(sha256_base64url(&token.signing_bytes()?))
}

/// Computes the `parent_hash` of a token from the exact JSON received.
///
/// # Errors
///
/// Returns `TokenError::InvalidTokenFormat` if `raw` is not a JSON object
/// or cannot be canonicalized.
pub fn compute_raw_token_hash(raw: &[u8]) -> Result<String, TokenError> {
    Ok(sha256_base64url(&signing_payload(&parse_object(raw)?)?))
}

/// Generates a fresh base64url nonce from the OS CSPRNG.
#[must_use]
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Builder for unsigned capability tokens.
///
/// # Example
///
/// ```
/// use acp::{AgentIdentity, CapabilityToken, DelegationPolicy};
///
/// let issuer = AgentIdentity::generate();
/// let agent = AgentIdentity::generate();
///
/// let token = CapabilityToken::builder()
///     .issuer(issuer.agent_id())
///     .subject(agent.agent_id())
///     .add_capability("acp:cap:financial.payment")
///     .resource("org.bank/accounts")
///     .delegation(DelegationPolicy::allowed(2))
///     .build()
///     .unwrap();
///
/// assert!(token.sig.is_empty());
/// assert_eq!(token.deleg.max_depth, 2);
/// ```
#[derive(Debug, Clone)]
pub struct TokenBuilder {
    issuer: Option<String>,
    subject: Option<String>,
    capabilities: Vec<String>,
    resource: Option<String>,
    ttl: Duration,
    issued_at: Option<i64>,
    expires_at: Option<i64>,
    nonce: Option<String>,
    delegation: DelegationPolicy,
    parent_hash: Option<String>,
    constraints: Map<String, Value>,
    revocation: Option<RevocationDescriptor>,
}

impl TokenBuilder {
    /// Creates a builder with a one-hour TTL and no delegation.
    #[must_use]
    pub fn new() -> Self {
        Self {
            issuer: None,
            subject: None,
            capabilities: Vec::new(),
            resource: None,
            ttl: Duration::from_secs(DEFAULT_TOKEN_TTL_SECS),
            issued_at: None,
            expires_at: None,
            nonce: None,
            delegation: DelegationPolicy::none(),
            parent_hash: None,
            constraints: Map::new(),
            revocation: None,
        }
    }

    /// Sets the issuer.
    #[must_use]
    pub fn issuer(mut self, issuer: &AgentId) -> Self {
        self.issuer = Some(issuer.to_string());
        self
    }

    /// Sets the subject.
    #[must_use]
    pub fn subject(mut self, subject: &AgentId) -> Self {
        self.subject = Some(subject.to_string());
        self
    }

    /// Replaces the capability set.
    #[must_use]
    pub fn capabilities(mut self, caps: Vec<String>) -> Self {
        self.capabilities = caps;
        self
    }

    /// Adds a single capability; duplicates are ignored.
    #[must_use]
    pub fn add_capability(mut self, cap: impl Into<String>) -> Self {
        let cap = cap.into();
        if !self.capabilities.contains(&cap) {
            self.capabilities.push(cap);
        }
        self
    }

    /// Sets the resource scope.
    #[must_use]
    pub fn resource(mut self, res: impl Into<String>) -> Self {
        self.resource = Some(res.into());
        self
    }

    /// Sets the time-to-live measured from `iat`.
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Pins `iat` instead of using the current time.
    #[must_use]
    pub fn issued_at(mut self, iat: i64) -> Self {
        self.issued_at = Some(iat);
        self
    }

    /// Pins `exp` instead of deriving it from the TTL.
    #[must_use]
    pub fn expires_at(mut self, exp: i64) -> Self {
        self.expires_at = Some(exp);
        self
    }

    /// Pins the nonce instead of generating one.
    #[must_use]
    pub fn nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Sets the delegation policy.
    #[must_use]
    pub fn delegation(mut self, policy: DelegationPolicy) -> Self {
        self.delegation = policy;
        self
    }

    /// Sets the parent hash for a delegated token.
    #[must_use]
    pub fn parent_hash(mut self, hash: impl Into<String>) -> Self {
        self.parent_hash = Some(hash.into());
        self
    }

    /// Adds a capability-specific constraint.
    #[must_use]
    pub fn constraint(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.constraints.insert(key.into(), value.into());
        self
    }

    /// Sets the revocation descriptor.
    #[must_use]
    pub fn revocation(mut self, kind: RevocationKind, uri: impl Into<String>) -> Self {
        self.revocation = Some(RevocationDescriptor {
            kind,
            uri: uri.into(),
        });
        self
    }

    pub(crate) const fn delegation_policy(&self) -> DelegationPolicy {
        self.delegation
    }

    pub(crate) fn requested_capabilities(&self) -> &[String] {
        &self.capabilities
    }

    pub(crate) fn requested_resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    pub(crate) fn requested_expiry(&self) -> Option<i64> {
        self.expires_at
    }

    /// Builds an unsigned token.
    ///
    /// # Errors
    ///
    /// - `MissingField` if `issuer`, `subject` or `resource` is not set
    /// - `EmptyCapabilitySet` if no capability was added
    /// - `InvalidTtl` if the TTL does not fit in Unix seconds
    pub fn build(self) -> Result<CapabilityToken, TokenError> {
        let iss = self.issuer.ok_or(TokenError::MissingField { field: "issuer" })?;
        let sub = self
            .subject
            .ok_or(TokenError::MissingField { field: "subject" })?;
        let res = self
            .resource
            .ok_or(TokenError::MissingField { field: "resource" })?;
        if self.capabilities.is_empty() {
            return Err(TokenError::EmptyCapabilitySet);
        }

        let iat = self.issued_at.unwrap_or_else(|| Utc::now().timestamp());
        let exp = match self.expires_at {
            Some(exp) => exp,
            None => {
                let ttl = i64::try_from(self.ttl.as_secs()).map_err(|_| TokenError::InvalidTtl)?;
                iat.checked_add(ttl).ok_or(TokenError::InvalidTtl)?
            }
        };

        Ok(CapabilityToken {
            ver: SUPPORTED_VERSION.to_string(),
            iss,
            sub,
            cap: self.capabilities,
            res,
            iat,
            exp,
            nonce: self.nonce.unwrap_or_else(generate_nonce),
            deleg: self.delegation,
            parent_hash: self.parent_hash,
            constraints: self.constraints,
            rev: self.revocation,
            sig: String::new(),
        })
    }
}

impl Default for TokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::identity::AgentIdentity;

    fn draft() -> TokenBuilder {
        let issuer = AgentIdentity::from_seed(&[1u8; 32]).unwrap();
        let agent = AgentIdentity::from_seed(&[2u8; 32]).unwrap();
        TokenBuilder::new()
            .issuer(issuer.agent_id())
            .subject(agent.agent_id())
            .add_capability("acp:cap:financial.payment")
            .resource("org.bank/accounts")
            .issued_at(1_700_000_000)
            .nonce("fixed-nonce")
    }

    #[test]
    fn builder_requires_resource() {
        let issuer = AgentIdentity::generate();
        let result = TokenBuilder::new()
            .issuer(issuer.agent_id())
            .subject(issuer.agent_id())
            .add_capability("acp:cap:data.read")
            .build();

        assert!(matches!(
            result,
            Err(TokenError::MissingField { field: "resource" })
        ));
    }

    #[test]
    fn builder_rejects_empty_capabilities() {
        let issuer = AgentIdentity::generate();
        let result = TokenBuilder::new()
            .issuer(issuer.agent_id())
            .subject(issuer.agent_id())
            .resource("org.bank")
            .build();

        assert_eq!(result, Err(TokenError::EmptyCapabilitySet));
    }

    #[test]
    fn builder_derives_expiration_from_ttl() {
        let token = draft().ttl(Duration::from_secs(60)).build().unwrap();
        assert_eq!(token.exp, 1_700_000_060);
    }

    #[test]
    fn builder_deduplicates_capabilities() {
        let token = draft()
            .add_capability("acp:cap:financial.payment")
            .build()
            .unwrap();
        assert_eq!(token.cap.len(), 1);
    }

    #[test]
    fn generated_nonces_differ() {
        assert_ne!(generate_nonce(), generate_nonce());
        assert_eq!(generate_nonce().len(), 22);
    }

    #[test]
    fn wire_format_uses_protocol_names() {
        let token = draft()
            .constraint("max_amount_usd", 5000)
            .revocation(RevocationKind::Endpoint, "https://rev.bank.example/check")
            .build()
            .unwrap();
        let value = serde_json::to_value(&token).unwrap();

        assert_eq!(value["ver"], "1.0");
        assert_eq!(value["deleg"], json!({"allowed": false, "max_depth": 0}));
        assert_eq!(value["rev"]["type"], "endpoint");
        assert_eq!(value["constraints"]["max_amount_usd"], 5000);
        assert!(value.get("parent_hash").is_none());
        assert!(value.get("sig").is_none());
    }

    #[test]
    fn hash_ignores_signature() {
        let mut token = draft().build().unwrap();
        let unsigned = compute_token_hash(&token).unwrap();

        token.sign_with(&SigningKey::from_seed(&[1u8; 32]).unwrap()).unwrap();
        let signed = compute_token_hash(&token).unwrap();

        assert_eq!(unsigned, signed);
        assert_eq!(signed.len(), 43);
    }

    #[test]
    fn hash_changes_with_content() {
        let a = draft().build().unwrap();
        let b = draft().resource("org.bank/loans").build().unwrap();

        assert_ne!(compute_token_hash(&a).unwrap(), compute_token_hash(&b).unwrap());
    }

    #[test]
    fn json_round_trip_preserves_hash() {
        let mut token = draft().constraint("max_amount_usd", 5000).build().unwrap();
        token.sign_with(&SigningKey::from_seed(&[1u8; 32]).unwrap()).unwrap();

        let json = token.to_json().unwrap();
        let back = CapabilityToken::from_json(json.as_bytes()).unwrap();

        assert_eq!(back, token);
        assert_eq!(
            compute_token_hash(&back).unwrap(),
            compute_token_hash(&token).unwrap()
        );
    }

    #[test]
    fn raw_hash_agrees_with_typed_hash_for_own_tokens() {
        let token = draft().constraint("max_amount_usd", 5000).build().unwrap();
        let json = token.to_json().unwrap();

        assert_eq!(
            compute_raw_token_hash(json.as_bytes()).unwrap(),
            compute_token_hash(&token).unwrap()
        );
    }

    #[test]
    fn raw_hash_covers_explicit_null_parent_hash() {
        let token = draft().build().unwrap();
        let mut value = serde_json::to_value(&token).unwrap();
        value["parent_hash"] = Value::Null;
        let raw = serde_json::to_vec(&value).unwrap();

        // The typed model cannot tell `null` from absent; the raw bytes can.
        let parsed = CapabilityToken::from_json(&raw).unwrap();
        assert!(parsed.parent_hash.is_none());
        assert_ne!(
            compute_raw_token_hash(&raw).unwrap(),
            compute_token_hash(&parsed).unwrap()
        );
    }
}
