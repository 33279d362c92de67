//! Reference HTTP verifier for ACP.
//!
//! Wires the challenge store, proof-of-possession, token verification and
//! risk scoring behind three endpoints:
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `GET /acp/v1/challenge` | Issue a one-time challenge |
//! | `POST /acp/v1/verify` | Authorize one request |
//! | `GET /acp/v1/health` | Liveness check |
//!
//! Protocol rejections answer `401 {error, code}`, risk denials answer
//! `403 {error, risk_score}`.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
mod error;
pub mod routes;
mod state;

pub use config::Config;
pub use error::ServerError;
pub use routes::{ChallengeResponse, HealthResponse, VerifyRequest, VerifyResponse, authorize, router};
pub use state::{AppState, PruneTasks, spawn_pruners};
