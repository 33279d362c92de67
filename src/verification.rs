//! Pure verification functions.
//!
//! Each function here is deterministic and side-effect free. The verifier
//! and the delegation validator both call into this module so a rule has
//! exactly one definition.
//!
//! # Security Properties
//!
//! | Function | Property |
//! |----------|----------|
//! | [`resource_covers`] | Scope equals the request, or is a prefix ending on a `/` boundary |
//! | [`check_expiration`] | `now <= exp` |
//! | [`check_not_before`] | `now >= iat - skew` |
//! | [`check_capability`] | `cap` is non-empty and contains the request exactly |
//! | [`check_delegation_policy`] | `max_depth <= 8`, and `allowed = false` implies `max_depth = 0` |

use chrono::DateTime;

use crate::constants::{MAX_DELEGATION_DEPTH, RESOURCE_SEPARATOR};
use crate::error::TokenError;
use crate::token::DelegationPolicy;

/// Pure function: checks whether `scope` covers `requested`.
///
/// Equal strings match. Otherwise `scope` must be a strict prefix of
/// `requested` and the next character must be `/`, so `accounts` does
/// not cover `accounts2`.
///
/// # Examples
///
/// ```
/// use acp::resource_covers;
///
/// assert!(resource_covers("org.bank/accounts", "org.bank/accounts"));
/// assert!(resource_covers("org.bank/accounts", "org.bank/accounts/ACC-001"));
/// assert!(!resource_covers("org.bank/accounts", "org.bank/accounts2"));
/// assert!(!resource_covers("org.bank/accounts", "org.bank"));
/// ```
#[must_use]
pub fn resource_covers(scope: &str, requested: &str) -> bool {
    if scope == requested {
        return true;
    }
    requested
        .strip_prefix(scope)
        .is_some_and(|rest| rest.starts_with(RESOURCE_SEPARATOR))
}

/// Pure function: checks that a token has not expired at `now`.
///
/// The boundary `now == exp` is still valid.
///
/// # Errors
///
/// Returns `TokenError::TokenExpired` if `now > exp`.
///
/// # Examples
///
/// ```
/// use acp::check_expiration;
///
/// assert!(check_expiration(100, 99).is_ok());
/// assert!(check_expiration(100, 100).is_ok());
/// assert!(check_expiration(100, 101).is_err());
/// ```
pub fn check_expiration(exp: i64, now: i64) -> Result<(), TokenError> {
    if now <= exp {
        Ok(())
    } else {
        Err(TokenError::TokenExpired {
            expired_at: render_timestamp(exp),
        })
    }
}

/// Pure function: checks that `iat` is not beyond `now + skew`.
///
/// # Errors
///
/// Returns `TokenError::NotYetValid` if `now < iat - skew`.
pub fn check_not_before(iat: i64, now: i64, skew: i64) -> Result<(), TokenError> {
    if now >= iat.saturating_sub(skew) {
        Ok(())
    } else {
        Err(TokenError::NotYetValid {
            issued_at: render_timestamp(iat),
        })
    }
}

/// Pure function: checks the capability set against an optional request.
///
/// # Errors
///
/// - `EmptyCapabilitySet` if `caps` is empty
/// - `CapabilityNotPresent` if `requested` is not an exact element of `caps`
pub fn check_capability(caps: &[String], requested: Option<&str>) -> Result<(), TokenError> {
    if caps.is_empty() {
        return Err(TokenError::EmptyCapabilitySet);
    }
    match requested {
        Some(req) if !caps.iter().any(|c| c == req) => Err(TokenError::CapabilityNotPresent {
            requested: req.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Pure function: checks the resource scope against an optional request.
///
/// # Errors
///
/// Returns `TokenError::ResourceNotCovered` if `requested` lies outside `scope`.
pub fn check_resource(scope: &str, requested: Option<&str>) -> Result<(), TokenError> {
    match requested {
        Some(req) if !resource_covers(scope, req) => Err(TokenError::ResourceNotCovered {
            requested: req.to_string(),
            scope: scope.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Pure function: checks a token's own delegation policy.
///
/// # Errors
///
/// - `AbsoluteDepthExceeded` if `max_depth > 8`
/// - `DelegationNotAllowed` if delegation is disabled but `max_depth != 0`
pub fn check_delegation_policy(policy: &DelegationPolicy) -> Result<(), TokenError> {
    if policy.max_depth > MAX_DELEGATION_DEPTH {
        return Err(TokenError::AbsoluteDepthExceeded {
            max_depth: policy.max_depth,
            limit: MAX_DELEGATION_DEPTH,
        });
    }
    if !policy.allowed && policy.max_depth != 0 {
        return Err(TokenError::DelegationNotAllowed {
            max_depth: policy.max_depth,
        });
    }
    Ok(())
}

fn render_timestamp(secs: i64) -> String {
    DateTime::from_timestamp(secs, 0).map_or_else(|| secs.to_string(), |t| t.to_rfc3339())
}
