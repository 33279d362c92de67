//! Deterministic risk scoring for concrete actions.
//!
//! `score = base(capability) + scope(resource) + amount_bucket(amount)`,
//! clamped to `[0, 100]`.
//!
//! | Component | Input | Points |
//! |-----------|-------|--------|
//! | base | `acp:cap:financial.*` | 50 |
//! | base | `acp:cap:system.*` | 40 |
//! | base | `acp:cap:data.write*` | 30 |
//! | base | `acp:cap:data.read*` | 10 |
//! | base | anything else | 20 |
//! | scope | 1 / 2 / 3 / 4+ segments | 20 / 10 / 5 / 0 |
//! | amount | > 100 000 / > 10 000 / > 1 000 | 30 / 20 / 10 |
//!
//! A denied assessment is a policy outcome, not an error.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::RESOURCE_SEPARATOR;

/// Score at or above which multi-factor approval is required.
pub const DEFAULT_MFA_THRESHOLD: u8 = 60;

/// Score at or above which the action is denied.
pub const DEFAULT_DENY_THRESHOLD: u8 = 90;

const MAX_SCORE: u32 = 100;

/// Coarse classification of a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Below 25.
    Low,
    /// 25 to 49.
    Medium,
    /// 50 to 74.
    High,
    /// 75 and above.
    Critical,
}

impl RiskLevel {
    /// Classifies a score.
    #[must_use]
    pub const fn from_score(score: u8) -> Self {
        match score {
            75.. => Self::Critical,
            50.. => Self::High,
            25.. => Self::Medium,
            _ => Self::Low,
        }
    }

    /// Lowercase name used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The action being scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRequest {
    /// Capability being exercised.
    pub capability: String,
    /// Resource being acted on.
    pub resource: String,
    /// Monetary amount, if the action moves value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
}

impl RiskRequest {
    /// Creates a request without an amount.
    #[must_use]
    pub fn new(capability: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            capability: capability.into(),
            resource: resource.into(),
            amount: None,
        }
    }

    /// Attaches a monetary amount.
    #[must_use]
    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }
}

/// Result of scoring one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Classification of `score`.
    pub level: RiskLevel,
    /// Score in `[0, 100]`.
    pub score: u8,
    /// Whether the caller must obtain multi-factor approval.
    pub requires_mfa: bool,
    /// Whether the action passes the deny threshold.
    pub approved: bool,
}

impl RiskAssessment {
    /// The assessment as a policy decision.
    #[must_use]
    pub const fn decision(&self) -> RiskDecision {
        if self.approved {
            RiskDecision::Approved {
                requires_mfa: self.requires_mfa,
            }
        } else {
            RiskDecision::Denied { score: self.score }
        }
    }
}

/// Outcome of risk gating, kept apart from protocol errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskDecision {
    /// The action may proceed.
    Approved {
        /// Whether multi-factor approval must be collected first.
        requires_mfa: bool,
    },
    /// The action is refused by policy.
    Denied {
        /// The score that exceeded the threshold.
        score: u8,
    },
}

/// Risk scorer with configurable thresholds.
///
/// # Example
///
/// ```
/// use acp::{RiskEngine, RiskLevel, RiskRequest};
///
/// let engine = RiskEngine::new();
/// let request = RiskRequest::new("acp:cap:financial.payment", "org.bank/accounts/ACC-001")
///     .with_amount(150_000.0);
///
/// let assessment = engine.assess(&request);
/// assert_eq!(assessment.score, 85);
/// assert_eq!(assessment.level, RiskLevel::Critical);
/// assert!(assessment.requires_mfa);
/// assert!(assessment.approved);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskEngine {
    mfa_threshold: u8,
    deny_threshold: u8,
}

impl RiskEngine {
    /// Creates an engine with the default thresholds.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mfa_threshold: DEFAULT_MFA_THRESHOLD,
            deny_threshold: DEFAULT_DENY_THRESHOLD,
        }
    }

    /// Sets the score at which MFA becomes mandatory.
    #[must_use]
    pub const fn with_mfa_threshold(mut self, threshold: u8) -> Self {
        self.mfa_threshold = threshold;
        self
    }

    /// Sets the score at which actions are denied.
    #[must_use]
    pub const fn with_deny_threshold(mut self, threshold: u8) -> Self {
        self.deny_threshold = threshold;
        self
    }

    /// Scores `request`.
    #[must_use]
    pub fn assess(&self, request: &RiskRequest) -> RiskAssessment {
        let total = capability_score(&request.capability)
            + scope_score(&request.resource)
            + request.amount.map_or(0, amount_score);
        let score = u8::try_from(total.min(MAX_SCORE)).unwrap_or(u8::MAX);

        RiskAssessment {
            level: RiskLevel::from_score(score),
            score,
            requires_mfa: score >= self.mfa_threshold,
            approved: score < self.deny_threshold,
        }
    }
}

impl Default for RiskEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Scores an action with the default thresholds.
#[must_use]
pub fn assess(capability: &str, resource: &str, amount: Option<f64>) -> RiskAssessment {
    RiskEngine::new().assess(&RiskRequest {
        capability: capability.to_string(),
        resource: resource.to_string(),
        amount,
    })
}

fn capability_score(capability: &str) -> u32 {
    if capability.starts_with("acp:cap:financial.") {
        50
    } else if capability.starts_with("acp:cap:data.write") {
        30
    } else if capability.starts_with("acp:cap:data.read") {
        10
    } else if capability.starts_with("acp:cap:system.") {
        40
    } else {
        20
    }
}

fn scope_score(resource: &str) -> u32 {
    match resource.split(RESOURCE_SEPARATOR).count() {
        1 => 20,
        2 => 10,
        3 => 5,
        _ => 0,
    }
}

fn amount_score(amount: f64) -> u32 {
    if amount > 100_000.0 {
        30
    } else if amount > 10_000.0 {
        20
    } else if amount > 1_000.0 {
        10
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_value_payment_needs_mfa_but_passes() {
        let a = assess(
            "acp:cap:financial.payment",
            "org.bank/accounts/ACC-001",
            Some(150_000.0),
        );
        assert_eq!(a.score, 85);
        assert!(a.requires_mfa);
        assert!(a.approved);
    }

    #[test]
    fn extreme_payment_on_broad_scope_is_denied() {
        let a = assess("acp:cap:financial.payment", "org.bank/accounts", Some(999_999_999.0));
        assert_eq!(a.score, 90);
        assert!(!a.approved);
        assert_eq!(a.decision(), RiskDecision::Denied { score: 90 });
    }

    #[test]
    fn read_is_low_risk() {
        let a = assess("acp:cap:data.read", "org.bank/reports", None);
        assert_eq!(a.score, 20);
        assert_eq!(a.level, RiskLevel::Low);
        assert_eq!(a.decision(), RiskDecision::Approved { requires_mfa: false });
    }

    #[test]
    fn unknown_capability_on_institution_scope() {
        let a = assess("acp:cap:custom.thing", "org.bank", None);
        assert_eq!(a.score, 40);
        assert_eq!(a.level, RiskLevel::Medium);
    }

    #[test]
    fn score_is_clamped() {
        let a = assess("acp:cap:financial.transfer", "org", Some(1e12));
        assert_eq!(a.score, 100);
        assert_eq!(a.level, RiskLevel::Critical);
    }

    #[test]
    fn amount_buckets_are_exclusive_at_the_boundary() {
        assert_eq!(amount_score(1_000.0), 0);
        assert_eq!(amount_score(1_000.01), 10);
        assert_eq!(amount_score(10_000.0), 10);
        assert_eq!(amount_score(100_000.0), 20);
        assert_eq!(amount_score(f64::NAN), 0);
    }

    #[test]
    fn level_boundaries() {
        assert_eq!(RiskLevel::from_score(24), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(25), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(50), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(75), RiskLevel::Critical);
    }

    #[test]
    fn custom_thresholds() {
        let engine = RiskEngine::new().with_mfa_threshold(30).with_deny_threshold(40);
        let a = engine.assess(&RiskRequest::new("acp:cap:system.admin", "org.bank/infra"));
        assert_eq!(a.score, 50);
        assert!(a.requires_mfa);
        assert!(!a.approved);
    }

    #[test]
    fn level_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&RiskLevel::Critical).unwrap(), "\"critical\"");
        assert_eq!(RiskLevel::High.to_string(), "high");
    }
}
