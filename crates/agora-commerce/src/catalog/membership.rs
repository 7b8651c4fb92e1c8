//! Membership (VIP) tiers.
//!
//! Tiers are derived from cumulative delivered-order spend and gate
//! certain vouchers.

use crate::money::Money;
use serde::{Deserialize, Serialize};
use std::fmt;

/// VIP tier, ordered lowest to highest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum MembershipTier {
    #[default]
    Standard,
    Vip1,
    Vip2,
    Vip3,
}

/// Lifetime delivered spend required for VIP1, in dong.
pub const VIP1_THRESHOLD: i64 = 1_000_000;
/// Lifetime delivered spend required for VIP2.
pub const VIP2_THRESHOLD: i64 = 3_000_000;
/// Lifetime delivered spend required for VIP3.
pub const VIP3_THRESHOLD: i64 = 5_000_000;

impl MembershipTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipTier::Standard => "STANDARD",
            MembershipTier::Vip1 => "VIP1",
            MembershipTier::Vip2 => "VIP2",
            MembershipTier::Vip3 => "VIP3",
        }
    }

    /// Tier earned by a given lifetime delivered spend.
    pub fn for_lifetime_spend(total: Money) -> Self {
        if total.amount >= VIP3_THRESHOLD {
            MembershipTier::Vip3
        } else if total.amount >= VIP2_THRESHOLD {
            MembershipTier::Vip2
        } else if total.amount >= VIP1_THRESHOLD {
            MembershipTier::Vip1
        } else {
            MembershipTier::Standard
        }
    }

    /// Whether this tier satisfies a voucher's required tier.
    pub fn satisfies(&self, required: MembershipTier) -> bool {
        *self >= required
    }
}

impl fmt::Display for MembershipTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_thresholds() {
        assert_eq!(
            MembershipTier::for_lifetime_spend(Money::vnd(0)),
            MembershipTier::Standard
        );
        assert_eq!(
            MembershipTier::for_lifetime_spend(Money::vnd(999_999)),
            MembershipTier::Standard
        );
        assert_eq!(
            MembershipTier::for_lifetime_spend(Money::vnd(1_000_000)),
            MembershipTier::Vip1
        );
        assert_eq!(
            MembershipTier::for_lifetime_spend(Money::vnd(3_000_000)),
            MembershipTier::Vip2
        );
        assert_eq!(
            MembershipTier::for_lifetime_spend(Money::vnd(7_500_000)),
            MembershipTier::Vip3
        );
    }

    #[test]
    fn test_tier_ordering() {
        assert!(MembershipTier::Vip2.satisfies(MembershipTier::Vip1));
        assert!(MembershipTier::Vip1.satisfies(MembershipTier::Vip1));
        assert!(!MembershipTier::Standard.satisfies(MembershipTier::Vip1));
    }
}
