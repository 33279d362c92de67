//! Kani proof harnesses for the pure verification rules.
//!
//! ```bash
//! cargo kani -p acp
//! ```
//!
//! | Category | Property | Harness |
//! |----------|----------|---------|
//! | Expiration | `now == exp` passes | `expiry_boundary_is_valid` |
//! | Expiration | Past `exp` fails | `past_expiry_always_fails` |
//! | Not-before | Skew is honoured | `skew_window_is_exact` |
//! | Delegation | Ceiling enforced | `depth_above_ceiling_fails` |
//! | Delegation | Disabled implies zero | `disabled_delegation_requires_zero_depth` |
//! | Resource | Reflexive | `scope_covers_itself` |
//! | Resource | Boundary | `sibling_prefix_is_not_covered` |
//! | Risk | Level matches score | `level_is_monotonic` |

#![cfg(kani)]

use crate::constants::MAX_DELEGATION_DEPTH;
use crate::risk::RiskLevel;
use crate::token::DelegationPolicy;
use crate::verification::{
    check_delegation_policy, check_expiration, check_not_before, resource_covers,
};

mod temporal_proofs {
    use super::*;

    #[kani::proof]
    fn expiry_boundary_is_valid() {
        let exp: i64 = kani::any();
        assert!(check_expiration(exp, exp).is_ok());
    }

    #[kani::proof]
    fn past_expiry_always_fails() {
        let exp: i64 = kani::any();
        let offset: i64 = kani::any();
        kani::assume(offset > 0 && exp < i64::MAX - offset);
        // Rendering the timestamp is not under test.
        kani::assume(exp > 0 && exp < 4_102_444_800);

        assert!(check_expiration(exp, exp + offset).is_err());
    }

    #[kani::proof]
    fn skew_window_is_exact() {
        let iat: i64 = kani::any();
        let skew: i64 = kani::any();
        kani::assume(iat > 0 && iat < 4_102_444_800);
        kani::assume(skew >= 0 && skew < 86_400);

        assert!(check_not_before(iat, iat - skew, skew).is_ok());
        assert!(check_not_before(iat, iat - skew - 1, skew).is_err());
    }
}

mod delegation_proofs {
    use super::*;

    #[kani::proof]
    fn depth_above_ceiling_fails() {
        let policy = DelegationPolicy {
            allowed: kani::any(),
            max_depth: kani::any(),
        };
        kani::assume(policy.max_depth > MAX_DELEGATION_DEPTH);

        assert!(check_delegation_policy(&policy).is_err());
    }

    #[kani::proof]
    fn disabled_delegation_requires_zero_depth() {
        let max_depth: u32 = kani::any();
        let policy = DelegationPolicy {
            allowed: false,
            max_depth,
        };

        assert_eq!(check_delegation_policy(&policy).is_ok(), max_depth == 0);
    }
}

mod resource_proofs {
    use super::*;

    #[kani::proof]
    #[kani::unwind(9)]
    fn scope_covers_itself() {
        let bytes: [u8; 8] = kani::any();
        if let Ok(scope) = std::str::from_utf8(&bytes) {
            assert!(resource_covers(scope, scope));
        }
    }

    #[kani::proof]
    #[kani::unwind(9)]
    fn sibling_prefix_is_not_covered() {
        let bytes: [u8; 4] = kani::any();
        let next: u8 = kani::any();
        kani::assume(next.is_ascii_alphanumeric());
        if let Ok(scope) = std::str::from_utf8(&bytes) {
            let sibling = format!("{scope}{}", char::from(next));
            assert!(!resource_covers(scope, &sibling));
        }
    }
}

mod risk_proofs {
    use super::*;

    #[kani::proof]
    fn level_is_monotonic() {
        let a: u8 = kani::any();
        let b: u8 = kani::any();
        kani::assume(a <= b);

        assert!(RiskLevel::from_score(a) <= RiskLevel::from_score(b));
    }
}
