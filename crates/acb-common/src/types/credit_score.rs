//! CreditScore - Borrower creditworthiness (0-1000) and tier
//!
//! The score drives two things:
//! - Borrow limits (higher tier and score = larger allowance)
//! - Interest rates (lower tier = higher credit premium)
//!
//! It is only ever rewritten by the scoring engine after one of the user's
//! loans reaches a terminal state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserId;

/// Maximum possible credit score
pub const MAX_SCORE: u16 = 1000;

/// Minimum possible credit score
pub const MIN_SCORE: u16 = 0;

/// Starting score for new users
pub const NEUTRAL_SCORE: u16 = 500;

/// Lowest score in tier A
pub const TIER_A_MIN: u16 = 800;

/// Lowest score in tier B
pub const TIER_B_MIN: u16 = 650;

/// Lowest score in tier C
pub const TIER_C_MIN: u16 = 450;

/// Ordinal credit bucket, A best
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    A,
    B,
    C,
    D,
}

impl Tier {
    /// Derive tier from score via fixed thresholds
    pub fn from_score(score: u16) -> Self {
        match score {
            s if s >= TIER_A_MIN => Tier::A,
            s if s >= TIER_B_MIN => Tier::B,
            s if s >= TIER_C_MIN => Tier::C,
            _ => Tier::D,
        }
    }

    /// Penalty units used by the rate model (A=0 .. D=3)
    #[inline]
    pub fn penalty(&self) -> u32 {
        match self {
            Tier::A => 0,
            Tier::B => 1,
            Tier::C => 2,
            Tier::D => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::A => "A",
            Tier::B => "B",
            Tier::C => "C",
            Tier::D => "D",
        }
    }
}

impl Default for Tier {
    fn default() -> Self {
        Tier::from_score(NEUTRAL_SCORE)
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-user credit record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditScore {
    pub user_id: UserId,

    /// Composite score from 0-1000
    pub score: u16,

    /// Always `Tier::from_score(score)`
    pub tier: Tier,

    /// Terminal loans taken into account
    pub total_loans: u32,

    pub successful_repayments: u32,

    pub defaults: u32,

    pub last_calculated: DateTime<Utc>,
}

impl CreditScore {
    /// Neutral record for a user with no settled history
    pub fn neutral(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            score: NEUTRAL_SCORE,
            tier: Tier::from_score(NEUTRAL_SCORE),
            total_loans: 0,
            successful_repayments: 0,
            defaults: 0,
            last_calculated: now,
        }
    }

    /// Set score (clamped) and keep tier in step
    pub fn set_score(&mut self, score: i32) {
        let clamped = score.clamp(MIN_SCORE as i32, MAX_SCORE as i32) as u16;
        self.score = clamped;
        self.tier = Tier::from_score(clamped);
    }

    /// Same score, tier and counters, ignoring the timestamp
    pub fn same_standing(&self, other: &CreditScore) -> bool {
        self.score == other.score
            && self.tier == other.tier
            && self.total_loans == other.total_loans
            && self.successful_repayments == other.successful_repayments
            && self.defaults == other.defaults
    }
}

impl std::fmt::Display for CreditScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "CreditScore({}/1000, tier={}, repaid={}, defaults={})",
            self.score, self.tier, self.successful_repayments, self.defaults
        )
    }
}
