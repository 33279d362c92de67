//! HTTP routes.

use std::sync::Arc;

use acp::{AgentId, KeyRegistry, NonceStore, RiskLevel, RiskRequest, VerificationContext};
use acp_handshake::{
    HEADER_AGENT_ID, HEADER_AUTHORIZATION, HEADER_CHALLENGE, HEADER_SIGNATURE, HandshakeError,
    HandshakeRequest, verify_proof_of_possession,
};
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::Json;
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use tower_http::trace::TraceLayer;

use crate::error::ServerError;
use crate::state::AppState;

/// Issues handshake challenges.
pub const CHALLENGE_PATH: &str = "/acp/v1/challenge";

/// Verifies a token presentation.
pub const VERIFY_PATH: &str = "/acp/v1/verify";

/// Liveness check.
pub const HEALTH_PATH: &str = "/acp/v1/health";

/// Protocol family reported by the health check.
pub const PROTOCOL_VERSION: &str = "ACP-1.0";

/// Response to `GET /acp/v1/challenge`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeResponse {
    /// Base64url challenge to sign
    pub challenge: String,
    /// Lifetime, e.g. `"30s"`
    pub expires_in: String,
}

/// Body of `POST /acp/v1/verify`.
///
/// The token may travel here or in `Authorization: Bearer`; the header
/// wins when both are present.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyRequest {
    /// Raw capability token JSON
    #[serde(default)]
    pub capability_token: Option<Box<RawValue>>,
    /// Capability being exercised. Required.
    #[serde(default)]
    pub requested_capability: String,
    /// Resource being accessed. Required.
    #[serde(default)]
    pub requested_resource: String,
    /// Transaction amount, for risk scoring
    #[serde(default)]
    pub amount: Option<f64>,
}

/// Successful authorization decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyResponse {
    /// Always true on this path
    pub authorized: bool,
    /// Presenting agent
    pub agent_id: String,
    /// Capability exercised
    pub capability: String,
    /// Resource accessed
    pub resource: String,
    /// Risk classification
    pub risk_level: RiskLevel,
    /// Risk score in `0..=100`
    pub risk_score: u8,
    /// Whether step-up authentication is required
    pub requires_mfa: bool,
}

/// Health check body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `"ok"`
    pub status: String,
    /// Protocol version
    pub version: String,
}

/// Builds the service router.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(CHALLENGE_PATH, get(challenge))
        .route(VERIFY_PATH, post(verify))
        .route(HEALTH_PATH, get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn challenge(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ChallengeResponse>, ServerError> {
    let challenge = state.challenges.generate()?;
    Ok(Json(ChallengeResponse {
        challenge,
        expires_in: format!("{}s", state.challenges.ttl().as_secs()),
    }))
}

async fn verify(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<VerifyResponse>, ServerError> {
    authorize(&state, method.as_str(), uri.path(), &headers, &body).map(Json)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: PROTOCOL_VERSION.to_string(),
    })
}

/// Runs the full decision for one verify request.
///
/// Order: presenter lookup, proof of possession, token verification,
/// subject binding, replay, risk.
///
/// # Errors
///
/// Returns the first failure as a `ServerError`.
pub fn authorize(
    state: &AppState,
    method: &str,
    path: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<VerifyResponse, ServerError> {
    let presenter = header(headers, HEADER_AGENT_ID).ok_or(HandshakeError::MissingHeaders)?;
    let agent_id = AgentId::parse(presenter)?;
    let agent_key = state.registry.lookup_public_key(&agent_id)?;

    let mut proof = HandshakeRequest::new(method, path, body);
    proof.challenge = header(headers, HEADER_CHALLENGE);
    proof.signature = header(headers, HEADER_SIGNATURE);
    verify_proof_of_possession(&proof, &state.challenges, &agent_key)?;

    let request: VerifyRequest = if body.is_empty() {
        VerifyRequest::default()
    } else {
        serde_json::from_slice(body).map_err(|e| ServerError::InvalidBody {
            reason: e.to_string(),
        })?
    };
    let raw_token = bearer_token(headers)
        .or_else(|| request.capability_token.as_deref().map(RawValue::get))
        .ok_or(ServerError::MissingToken)?;

    if request.requested_capability.is_empty() || request.requested_resource.is_empty() {
        return Err(ServerError::InvalidBody {
            reason: "requested_capability and requested_resource are required".to_string(),
        });
    }

    // No nonce store here: the nonce is spent only after subject binding.
    let ctx = VerificationContext::new()
        .capability(&request.requested_capability)
        .resource(&request.requested_resource);
    let token = state
        .verifier
        .verify(raw_token.as_bytes(), &state.institution_key, &ctx)?;

    if token.sub != agent_id.as_str() {
        return Err(ServerError::SubjectMismatch {
            subject: token.sub,
            agent_id: agent_id.to_string(),
        });
    }
    state.nonces.mark_used(&token.iss, &token.nonce, token.exp)?;

    let mut risk_request =
        RiskRequest::new(&request.requested_capability, &request.requested_resource);
    if let Some(amount) = request.amount {
        risk_request = risk_request.with_amount(amount);
    }
    let assessment = state.risk.assess(&risk_request);
    if !assessment.approved {
        return Err(ServerError::RiskDenied {
            score: assessment.score,
        });
    }

    tracing::info!(
        agent_id = %agent_id,
        capability = %request.requested_capability,
        risk = %assessment.level,
        "request authorized"
    );
    Ok(VerifyResponse {
        authorized: true,
        agent_id: agent_id.to_string(),
        capability: request.requested_capability,
        resource: request.requested_resource,
        risk_level: assessment.level,
        risk_score: assessment.score,
        requires_mfa: assessment.requires_mfa,
    })
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    header(headers, HEADER_AUTHORIZATION)?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
