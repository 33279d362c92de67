//! Proof-of-possession bound to one HTTP request.
//!
//! The agent signs
//!
//! ```text
//! METHOD|path|challenge|base64url(SHA-256(body))
//! ```
//!
//! with the key behind its `AgentID`. The payload ties the proof to the
//! exact method, path and body it accompanies, and the challenge makes it
//! single-use.

use acp::{AgentIdentity, VerifyingKey, sha256_base64url};

use crate::challenge::ChallengeStore;
use crate::error::HandshakeError;

/// Header carrying the challenge being answered.
pub const HEADER_CHALLENGE: &str = "X-ACP-Challenge";

/// Header carrying the base64url proof-of-possession signature.
pub const HEADER_SIGNATURE: &str = "X-ACP-Signature";

/// Header carrying the presenter's `AgentID`.
pub const HEADER_AGENT_ID: &str = "X-ACP-Agent-ID";

/// Header carrying `Bearer <capability token JSON>`.
pub const HEADER_AUTHORIZATION: &str = "Authorization";

/// Transport-agnostic view of the request being proven.
///
/// Empty header values are treated as absent.
#[derive(Debug, Clone, Copy)]
pub struct HandshakeRequest<'a> {
    /// HTTP method, as sent.
    pub method: &'a str,
    /// Request path without query string.
    pub path: &'a str,
    /// Raw request body.
    pub body: &'a [u8],
    /// Value of `X-ACP-Challenge`.
    pub challenge: Option<&'a str>,
    /// Value of `X-ACP-Signature`.
    pub signature: Option<&'a str>,
}

impl<'a> HandshakeRequest<'a> {
    /// Creates a request view without handshake headers.
    #[must_use]
    pub const fn new(method: &'a str, path: &'a str, body: &'a [u8]) -> Self {
        Self {
            method,
            path,
            body,
            challenge: None,
            signature: None,
        }
    }

    /// Sets the challenge header value.
    #[must_use]
    pub const fn challenge(mut self, challenge: &'a str) -> Self {
        self.challenge = Some(challenge);
        self
    }

    /// Sets the signature header value.
    #[must_use]
    pub const fn signature(mut self, signature: &'a str) -> Self {
        self.signature = Some(signature);
        self
    }
}

/// Builds the string an agent signs to answer `challenge`.
///
/// # Example
///
/// ```
/// use acp_handshake::build_pop_payload;
///
/// let payload = build_pop_payload("POST", "/acp/v1/verify", "abc", b"");
/// assert_eq!(
///     payload,
///     "POST|/acp/v1/verify|abc|47DEQpj8HBSa-_TImW-5JCeuQeRkm5NMpJWZG3hSuFU"
/// );
/// ```
#[must_use]
pub fn build_pop_payload(method: &str, path: &str, challenge: &str, body: &[u8]) -> String {
    format!("{method}|{path}|{challenge}|{}", sha256_base64url(body))
}

/// Signs the proof for one request. Used by agent clients.
#[must_use]
pub fn sign_pop(
    identity: &AgentIdentity,
    method: &str,
    path: &str,
    challenge: &str,
    body: &[u8],
) -> String {
    identity.sign(build_pop_payload(method, path, challenge, body).as_bytes())
}

/// Verifies the proof of possession carried by `request`.
///
/// The challenge is consumed before the signature is examined, so a
/// challenge can never be retried after a failed proof.
///
/// # Errors
///
/// - `MissingHeaders` if the challenge or signature is absent
/// - `ChallengeExpired` if the challenge is unknown or stale
/// - `InvalidProof` if the signature does not verify under `agent_key`
pub fn verify_proof_of_possession(
    request: &HandshakeRequest<'_>,
    store: &ChallengeStore,
    agent_key: &VerifyingKey,
) -> Result<(), HandshakeError> {
    let (Some(challenge), Some(signature)) =
        (non_empty(request.challenge), non_empty(request.signature))
    else {
        return Err(HandshakeError::MissingHeaders);
    };

    store.consume(challenge)?;

    let payload = build_pop_payload(request.method, request.path, challenge, request.body);
    if !acp::verify(agent_key, payload.as_bytes(), signature) {
        tracing::debug!(method = request.method, path = request.path, "proof of possession rejected");
        return Err(HandshakeError::InvalidProof);
    }
    Ok(())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = br#"{"requested_capability":"acp:cap:financial.payment"}"#;

    fn signed(agent: &AgentIdentity, store: &ChallengeStore) -> (String, String) {
        let challenge = store.generate().unwrap();
        let signature = sign_pop(agent, "POST", "/acp/v1/verify", &challenge, BODY);
        (challenge, signature)
    }

    #[test]
    fn valid_proof_is_accepted_once() {
        let agent = AgentIdentity::generate();
        let store = ChallengeStore::new();
        let (challenge, signature) = signed(&agent, &store);
        let request = HandshakeRequest::new("POST", "/acp/v1/verify", BODY)
            .challenge(&challenge)
            .signature(&signature);

        assert_eq!(
            verify_proof_of_possession(&request, &store, &agent.verifying_key()),
            Ok(())
        );
        assert_eq!(
            verify_proof_of_possession(&request, &store, &agent.verifying_key()),
            Err(HandshakeError::ChallengeExpired)
        );
    }

    #[test]
    fn missing_or_empty_headers() {
        let agent = AgentIdentity::generate();
        let store = ChallengeStore::new();
        let (challenge, _) = signed(&agent, &store);
        let no_sig = HandshakeRequest::new("POST", "/", BODY).challenge(&challenge);
        let empty_sig = no_sig.signature("");

        for request in [no_sig, empty_sig] {
            assert_eq!(
                verify_proof_of_possession(&request, &store, &agent.verifying_key()),
                Err(HandshakeError::MissingHeaders)
            );
        }
        // A request rejected for missing headers never touches the store.
        assert!(store.contains(&challenge));
    }

    #[test]
    fn proof_is_bound_to_method_path_and_body() {
        let agent = AgentIdentity::generate();
        let store = ChallengeStore::new();

        for (method, path, body) in [
            ("GET", "/acp/v1/verify", BODY),
            ("POST", "/acp/v1/other", BODY),
            ("POST", "/acp/v1/verify", &b"{}"[..]),
        ] {
            let (challenge, signature) = signed(&agent, &store);
            let request = HandshakeRequest::new(method, path, body)
                .challenge(&challenge)
                .signature(&signature);

            assert_eq!(
                verify_proof_of_possession(&request, &store, &agent.verifying_key()),
                Err(HandshakeError::InvalidProof)
            );
        }
    }

    #[test]
    fn failed_proof_still_spends_the_challenge() {
        let agent = AgentIdentity::generate();
        let impostor = AgentIdentity::generate();
        let store = ChallengeStore::new();
        let (challenge, signature) = signed(&impostor, &store);
        let request = HandshakeRequest::new("POST", "/acp/v1/verify", BODY)
            .challenge(&challenge)
            .signature(&signature);

        assert_eq!(
            verify_proof_of_possession(&request, &store, &agent.verifying_key()),
            Err(HandshakeError::InvalidProof)
        );
        assert!(!store.contains(&challenge));
    }
}
