//! Challenge and proof-of-possession handshake for ACP.
//!
//! A bearer token alone proves nothing about who presents it. Before a
//! capability token is accepted, the presenting agent answers a one-time
//! challenge by signing the exact request it is making.
//!
//! # Flow
//!
//! ```text
//! agent                                 server
//!   │  GET /acp/v1/challenge              │
//!   │ ──────────────────────────────────► │  ChallengeStore::generate
//!   │ ◄────────────────────────────────── │  {challenge, expires_in: "30s"}
//!   │  POST /acp/v1/verify                │
//!   │    X-ACP-Challenge: <challenge>     │
//!   │    X-ACP-Signature: <pop>           │  verify_proof_of_possession
//!   │    Authorization: Bearer <token>    │  then token verification
//! ```
//!
//! # Example
//!
//! ```rust
//! use acp::AgentIdentity;
//! use acp_handshake::{ChallengeStore, HandshakeRequest, sign_pop, verify_proof_of_possession};
//!
//! let agent = AgentIdentity::generate();
//! let store = ChallengeStore::new();
//!
//! // Server side
//! let challenge = store.generate().unwrap();
//!
//! // Agent side
//! let body = br#"{"requested_capability":"acp:cap:data.read"}"#;
//! let proof = sign_pop(&agent, "POST", "/acp/v1/verify", &challenge, body);
//!
//! // Server side
//! let request = HandshakeRequest::new("POST", "/acp/v1/verify", body)
//!     .challenge(&challenge)
//!     .signature(&proof);
//! assert!(verify_proof_of_possession(&request, &store, &agent.verifying_key()).is_ok());
//! ```
//!
//! # Security Properties
//!
//! | Property | How Achieved |
//! |----------|--------------|
//! | Single use | Challenge removed on first lookup |
//! | Freshness | 30 s TTL |
//! | Channel binding | Method, path and body hash are signed |
//! | No retry after failure | Challenge consumed before the signature check |

#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod challenge;
mod error;
mod pop;

pub use challenge::{CHALLENGE_SIZE, CHALLENGE_TTL, ChallengeStore};
pub use error::HandshakeError;
pub use pop::{
    HEADER_AGENT_ID, HEADER_AUTHORIZATION, HEADER_CHALLENGE, HEADER_SIGNATURE, HandshakeRequest,
    build_pop_payload, sign_pop, verify_proof_of_possession,
};
