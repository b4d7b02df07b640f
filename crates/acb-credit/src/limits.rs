//! Borrow limits by tier and score

use acb_common::{Amount, CreditScore, Loan, LoanStatus, Result, Tier, ONE_TOKEN};
use serde::{Deserialize, Serialize};

/// Divisor for the score factor `(500 + score) / 1000`
const SCORE_FACTOR_DENOMINATOR: u128 = 1000;

/// Offset for the score factor
const SCORE_FACTOR_OFFSET: u128 = 500;

/// Per-tier allowance multipliers in basis points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierMultipliers {
    pub a: u32,
    pub b: u32,
    pub c: u32,
    pub d: u32,
}

impl Default for TierMultipliers {
    fn default() -> Self {
        Self {
            a: 30_000,
            b: 20_000,
            c: 10_000,
            d: 2_500,
        }
    }
}

impl TierMultipliers {
    pub fn for_tier(&self, tier: Tier) -> u32 {
        match tier {
            Tier::A => self.a,
            Tier::B => self.b,
            Tier::C => self.c,
            Tier::D => self.d,
        }
    }
}

/// Maximum a borrower may have outstanding
///
/// ```text
/// limit = base_allowance * tierMultiplier / 10000 * (500 + score) / 1000
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BorrowLimitPolicy {
    pub base_allowance: Amount,
    pub multipliers: TierMultipliers,
}

impl Default for BorrowLimitPolicy {
    fn default() -> Self {
        Self {
            base_allowance: Amount::new(ONE_TOKEN),
            multipliers: TierMultipliers::default(),
        }
    }
}

impl BorrowLimitPolicy {
    pub fn new(base_allowance: Amount) -> Self {
        Self {
            base_allowance,
            ..Self::default()
        }
    }

    /// Total principal the score allows, ignoring existing loans
    pub fn limit_for(&self, score: &CreditScore) -> Result<Amount> {
        let multiplier = self.multipliers.for_tier(score.tier) as u128;
        let factor = SCORE_FACTOR_OFFSET + score.score as u128;
        let limit = self.base_allowance.mul_div_floor(
            multiplier * factor,
            acb_common::BPS_DENOMINATOR as u128 * SCORE_FACTOR_DENOMINATOR,
        )?;
        Ok(limit)
    }

    /// Principal still open on active loans
    pub fn outstanding(loans: &[Loan]) -> Result<Amount> {
        loans
            .iter()
            .filter(|l| l.status == LoanStatus::Active)
            .try_fold(Amount::ZERO, |acc, l| Ok(acc.checked_add(l.amount)?))
    }

    /// What the borrower can still take given their open loans
    pub fn max_borrow(&self, score: &CreditScore, loans: &[Loan]) -> Result<Amount> {
        let limit = self.limit_for(score)?;
        Ok(limit.saturating_sub(Self::outstanding(loans)?))
    }
}
