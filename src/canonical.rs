//! RFC 8785 (JCS) canonicalization of token payloads.
//!
//! Signatures and `parent_hash` values are computed over the canonical
//! form of the token object with the `sig` member removed.

use serde_json::{Map, Value};

use crate::error::TokenError;

/// Name of the signature member excluded from the signed payload.
pub const SIGNATURE_FIELD: &str = "sig";

/// Serializes a JSON value to its JCS canonical bytes.
///
/// # Errors
///
/// Returns `TokenError::InvalidTokenFormat` if the value cannot be
/// canonicalized (for example a non-finite number).
///
/// # Example
///
/// ```
/// use serde_json::json;
///
/// let bytes = acp::canonical::canonicalize(&json!({"b": 1, "a": [true, null]})).unwrap();
/// assert_eq!(bytes, br#"{"a":[true,null],"b":1}"#);
/// ```
pub fn canonicalize(value: &Value) -> Result<Vec<u8>, TokenError> {
    serde_jcs::to_vec(value).map_err(|e| TokenError::InvalidTokenFormat {
        reason: format!("canonicalization failed: {e}"),
    })
}

/// Parses received token bytes into a JSON object, keeping every member.
///
/// # Errors
///
/// Returns `TokenError::InvalidTokenFormat` if `raw` is not a JSON object.
pub fn parse_object(raw: &[u8]) -> Result<Map<String, Value>, TokenError> {
    match serde_json::from_slice(raw) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(_) => Err(TokenError::InvalidTokenFormat {
            reason: "token is not a JSON object".to_string(),
        }),
        Err(e) => Err(TokenError::InvalidTokenFormat {
            reason: e.to_string(),
        }),
    }
}

/// Canonical bytes of a token object with `sig` removed.
///
/// # Errors
///
/// Returns `TokenError::InvalidTokenFormat` if canonicalization fails.
pub fn signing_payload(object: &Map<String, Value>) -> Result<Vec<u8>, TokenError> {
    let mut unsigned = object.clone();
    unsigned.remove(SIGNATURE_FIELD);
    canonicalize(&Value::Object(unsigned))
}
