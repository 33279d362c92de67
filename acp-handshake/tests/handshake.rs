//! Integration tests for the challenge / proof-of-possession handshake.

use std::time::{Duration, Instant};

use acp::AgentIdentity;
use acp_handshake::{
    CHALLENGE_TTL, ChallengeStore, HandshakeError, HandshakeRequest, build_pop_payload, sign_pop,
    verify_proof_of_possession,
};
use proptest::prelude::*;

const PATH: &str = "/acp/v1/verify";

#[test]
fn challenge_survives_one_presentation_only() {
    // Arrange
    let agent = AgentIdentity::generate();
    let store = ChallengeStore::new();
    let challenge = store.generate().unwrap();
    let body = b"{\"amount\":150000}";
    let good = sign_pop(&agent, "POST", PATH, &challenge, body);
    let bad = sign_pop(&agent, "POST", PATH, &challenge, b"{\"amount\":1}");

    // Act: the first attempt fails after consumption, the retry must not succeed.
    let first = verify_proof_of_possession(
        &HandshakeRequest::new("POST", PATH, body)
            .challenge(&challenge)
            .signature(&bad),
        &store,
        &agent.verifying_key(),
    );
    let retry = verify_proof_of_possession(
        &HandshakeRequest::new("POST", PATH, body)
            .challenge(&challenge)
            .signature(&good),
        &store,
        &agent.verifying_key(),
    );

    // Assert
    assert_eq!(first, Err(HandshakeError::InvalidProof));
    assert_eq!(retry, Err(HandshakeError::ChallengeExpired));
}

#[test]
fn expired_challenge_is_rejected_and_removed() {
    let store = ChallengeStore::new();
    let issued = Instant::now();
    let challenge = store.generate_at(issued).unwrap();

    let result = store.consume_at(&challenge, issued + CHALLENGE_TTL + Duration::from_millis(1));

    assert_eq!(result, Err(HandshakeError::ChallengeExpired));
    assert!(store.is_empty());
}

#[test]
fn prune_bounds_memory() {
    let store = ChallengeStore::with_ttl(Duration::from_secs(1));
    let issued = Instant::now();
    for _ in 0..50 {
        store.generate_at(issued).unwrap();
    }

    assert_eq!(store.prune_at(issued + Duration::from_secs(2)), 50);
    assert!(store.is_empty());
}

#[test]
fn malformed_signature_is_invalid_proof() {
    let agent = AgentIdentity::generate();
    let store = ChallengeStore::new();
    let challenge = store.generate().unwrap();

    let result = verify_proof_of_possession(
        &HandshakeRequest::new("POST", PATH, b"")
            .challenge(&challenge)
            .signature("!!not-base64!!"),
        &store,
        &agent.verifying_key(),
    );

    assert_eq!(result, Err(HandshakeError::InvalidProof));
}

#[test]
fn error_codes_are_stable() {
    assert_eq!(HandshakeError::MissingHeaders.code(), "HP-001");
    assert_eq!(HandshakeError::ChallengeExpired.code(), "HP-002");
    assert_eq!(HandshakeError::InvalidProof.code(), "HP-003");
}

proptest! {
    #[test]
    fn payload_has_four_pipe_separated_fields(
        method in "[A-Z]{3,7}",
        path in "/[a-z0-9/]{0,30}",
        body in prop::collection::vec(any::<u8>(), 0..128),
    ) {
        let store = ChallengeStore::new();
        let challenge = store.generate().unwrap();
        let payload = build_pop_payload(&method, &path, &challenge, &body);
        let fields: Vec<&str> = payload.split('|').collect();

        prop_assert_eq!(fields.len(), 4);
        prop_assert_eq!(fields[0], method.as_str());
        prop_assert_eq!(fields[1], path.as_str());
        prop_assert_eq!(fields[2], challenge.as_str());
        prop_assert_eq!(fields[3].len(), 43);
    }

    #[test]
    fn honest_agent_always_passes(
        body in prop::collection::vec(any::<u8>(), 0..256),
    ) {
        let agent = AgentIdentity::generate();
        let store = ChallengeStore::new();
        let challenge = store.generate().unwrap();
        let proof = sign_pop(&agent, "POST", PATH, &challenge, &body);
        let request = HandshakeRequest::new("POST", PATH, &body)
            .challenge(&challenge)
            .signature(&proof);

        prop_assert!(verify_proof_of_possession(&request, &store, &agent.verifying_key()).is_ok());
        prop_assert!(store.is_empty());
    }
}
