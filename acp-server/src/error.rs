//! Server errors and their HTTP rendering.

use acp::TokenError;
use acp_handshake::HandshakeError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Errors raised while serving or starting the verifier.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The challenge or proof-of-possession was rejected.
    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    /// The capability token or agent lookup was rejected.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// The request body is not a valid verify request.
    #[error("invalid request body: {reason}")]
    InvalidBody {
        /// Parser message
        reason: String,
    },

    /// Neither the `Authorization` header nor the body carries a token.
    #[error("no capability token presented; send Authorization: Bearer <token>")]
    MissingToken,

    /// The token was issued to someone other than the presenter.
    #[error("token subject {subject} does not match presenting agent {agent_id}")]
    SubjectMismatch {
        /// `sub` of the verified token
        subject: String,
        /// Value of `X-ACP-Agent-ID`
        agent_id: String,
    },

    /// The risk engine denied an otherwise valid request.
    #[error("risk score exceeds threshold")]
    RiskDenied {
        /// Score that triggered the denial
        score: u8,
    },

    /// Startup configuration is unusable.
    #[error("invalid configuration: {reason}")]
    Config {
        /// What is wrong
        reason: String,
    },

    /// Binding or serving failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Stable error code reported to clients.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Handshake(err) => err.code(),
            Self::Token(err) => err.code(),
            Self::InvalidBody { .. } => "SV-001",
            Self::MissingToken => "SV-002",
            Self::SubjectMismatch { .. } => "SV-003",
            Self::RiskDenied { .. } => "SV-004",
            Self::Config { .. } => "SV-005",
            Self::Io(_) => "SV-006",
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Handshake(HandshakeError::ChallengeGeneration { .. })
            | Self::Config { .. }
            | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidBody { .. } => StatusCode::BAD_REQUEST,
            Self::RiskDenied { .. } => StatusCode::FORBIDDEN,
            Self::Handshake(_)
            | Self::Token(_)
            | Self::MissingToken
            | Self::SubjectMismatch { .. } => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::RiskDenied { score } => json!({
                "error": self.to_string(),
                "risk_score": score,
            }),
            _ => json!({
                "error": self.to_string(),
                "code": self.code(),
            }),
        };
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        } else {
            tracing::info!(code = self.code(), status = status.as_u16(), "request rejected");
        }
        (status, Json(body)).into_response()
    }
}
