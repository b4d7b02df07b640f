//! Loan - Unsecured credit line drawn from the pool
//!
//! Status only moves forward: `Active -> Repaid` or `Active -> Defaulted`.
//! A settled loan is never reopened.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::amount::Amount;
use super::{LoanId, UserId};
use crate::error::ProtocolError;
use crate::BPS_DENOMINATOR;

pub const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Active,
    Repaid,
    Defaulted,
}

impl LoanStatus {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LoanStatus::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "active",
            LoanStatus::Repaid => "repaid",
            LoanStatus::Defaulted => "defaulted",
        }
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    pub id: LoanId,
    pub user_id: UserId,
    pub pool_id: u64,

    /// Principal in minor units
    pub amount: Amount,

    /// Term rate in basis points, fixed at issuance
    pub interest_rate_bps: u32,

    pub duration_days: u32,

    pub status: LoanStatus,

    pub borrowed_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,

    /// Set when the loan reaches a terminal state
    pub settled_at: Option<DateTime<Utc>>,

    /// Running total of repayments applied
    pub repaid_amount: Amount,

    pub credit_score_at_borrow: u16,

    pub updated_at: DateTime<Utc>,
}

impl Loan {
    /// New active loan due `duration_days` after `now`
    #[allow(clippy::too_many_arguments)]
    pub fn issue(
        id: LoanId,
        user_id: UserId,
        pool_id: u64,
        amount: Amount,
        interest_rate_bps: u32,
        duration_days: u32,
        credit_score_at_borrow: u16,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            pool_id,
            amount,
            interest_rate_bps,
            duration_days,
            status: LoanStatus::Active,
            borrowed_at: now,
            due_date: now + Duration::days(duration_days as i64),
            settled_at: None,
            repaid_amount: Amount::ZERO,
            credit_score_at_borrow,
            updated_at: now,
        }
    }

    /// Interest accrued up to `now`
    ///
    /// Simple proration of the term rate over the term length, rounded up.
    /// Keeps accruing linearly past the due date.
    pub fn interest_at(&self, now: DateTime<Utc>) -> Result<Amount, ProtocolError> {
        let elapsed = (now - self.borrowed_at).num_seconds().max(0) as u128;
        let term = (self.duration_days as u128 * SECONDS_PER_DAY as u128).max(1);
        let numerator = self.interest_rate_bps as u128 * elapsed;
        let denominator = BPS_DENOMINATOR as u128 * term;
        self.amount.mul_div_ceil(numerator, denominator)
    }

    /// Principal plus accrued interest at `now`
    pub fn total_owed_at(&self, now: DateTime<Utc>) -> Result<Amount, ProtocolError> {
        self.amount.checked_add(self.interest_at(now)?)
    }

    /// What is still owed at `now` after earlier partial repayments
    pub fn outstanding_at(&self, now: DateTime<Utc>) -> Result<Amount, ProtocolError> {
        Ok(self.total_owed_at(now)?.saturating_sub(self.repaid_amount))
    }

    #[inline]
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        now > self.due_date
    }

    /// Whether the loan was repaid no later than its due date
    pub fn repaid_on_time(&self) -> bool {
        self.status == LoanStatus::Repaid
            && self.settled_at.map_or(false, |at| at <= self.due_date)
    }

    /// Guard for operations that need an active loan
    pub fn ensure_active(&self) -> Result<(), ProtocolError> {
        if self.status.is_terminal() {
            return Err(ProtocolError::AlreadySettled {
                loan_id: self.id,
                status: self.status,
            });
        }
        Ok(())
    }

    /// Close the loan in a terminal state
    pub fn settle(&mut self, status: LoanStatus, now: DateTime<Utc>) -> Result<(), ProtocolError> {
        self.ensure_active()?;
        debug_assert!(status.is_terminal());
        self.status = status;
        self.settled_at = Some(now);
        self.updated_at = now;
        Ok(())
    }
}
