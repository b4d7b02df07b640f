//! Credit scoring - Replay a borrower's settled loans into a score
//!
//! Scoring is a pure fold over terminal loans, ordered by settlement time
//! then loan id, starting from the neutral score:
//!
//! | Outcome          | Adjustment                                   |
//! |------------------|----------------------------------------------|
//! | Repaid on time   | `+(base + size bonus + duration bonus)`      |
//! | Repaid late      | `-late_penalty` (still a successful repayment)|
//! | Defaulted        | `-default_penalty`                           |
//!
//! The score is clamped to 0-1000 after every step, so the result only
//! depends on the set of settled loans.

use acb_common::{
    Amount, CreditScore, Loan, LoanStatus, UserId, NEUTRAL_CREDIT_SCORE, ONE_TOKEN,
};
use acb_ledger::{Ledger, WriteTxn};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// Score adjustments per settled loan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoringPolicy {
    /// Starting point for users with no settled loans
    pub neutral_score: u16,
    /// Flat reward for an on-time repayment
    pub on_time_base: i32,
    /// Principal worth one bonus point
    pub size_unit: Amount,
    pub size_bonus_cap: i32,
    /// Loan days worth one bonus point
    pub duration_step_days: u32,
    pub duration_bonus_cap: i32,
    pub late_penalty: i32,
    pub default_penalty: i32,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            neutral_score: NEUTRAL_CREDIT_SCORE,
            on_time_base: 20,
            // 0.1 token
            size_unit: Amount::new(ONE_TOKEN / 10),
            size_bonus_cap: 20,
            duration_step_days: 15,
            duration_bonus_cap: 10,
            late_penalty: 15,
            default_penalty: 150,
        }
    }
}

impl ScoringPolicy {
    /// Signed adjustment for one loan, `None` while it is still active
    pub fn adjustment(&self, loan: &Loan) -> Option<i32> {
        match loan.status {
            LoanStatus::Active => None,
            LoanStatus::Defaulted => Some(-self.default_penalty),
            LoanStatus::Repaid if loan.repaid_on_time() => Some(
                self.on_time_base + self.size_bonus(loan.amount) + self.duration_bonus(loan.duration_days),
            ),
            LoanStatus::Repaid => Some(-self.late_penalty),
        }
    }

    fn size_bonus(&self, principal: Amount) -> i32 {
        let unit = self.size_unit.value().max(1);
        let points = principal.value() / unit;
        points.min(self.size_bonus_cap.max(0) as u128) as i32
    }

    fn duration_bonus(&self, duration_days: u32) -> i32 {
        let points = duration_days / self.duration_step_days.max(1);
        points.min(self.duration_bonus_cap.max(0) as u32) as i32
    }

    /// Fold a user's loans into a credit record
    ///
    /// Loans belonging to other users and active loans are ignored.
    pub fn score_history(&self, user_id: UserId, loans: &[Loan], now: DateTime<Utc>) -> CreditScore {
        let mut settled: Vec<&Loan> = loans
            .iter()
            .filter(|l| l.user_id == user_id && l.status.is_terminal())
            .collect();
        settled.sort_by_key(|l| (l.settled_at, l.id));

        let mut record = CreditScore::neutral(user_id, now);
        record.set_score(self.neutral_score as i32);

        for loan in settled {
            let Some(delta) = self.adjustment(loan) else {
                continue;
            };
            record.set_score(record.score as i32 + delta);
            record.total_loans += 1;
            match loan.status {
                LoanStatus::Repaid => record.successful_repayments += 1,
                LoanStatus::Defaulted => record.defaults += 1,
                LoanStatus::Active => {}
            }
        }

        record
    }
}

/// Reads and rewrites credit records
#[derive(Debug, Clone, Default)]
pub struct CreditScoringEngine {
    policy: ScoringPolicy,
}

impl CreditScoringEngine {
    pub fn new(policy: ScoringPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    /// Committed record, or a neutral one for users never scored
    pub fn current(&self, ledger: &Ledger, user_id: UserId) -> CreditScore {
        ledger
            .credit_score(user_id)
            .unwrap_or_else(|| self.neutral(user_id, ledger.now()))
    }

    /// Record as seen inside a write transaction
    pub fn current_in(&self, txn: &WriteTxn<'_>, user_id: UserId) -> CreditScore {
        txn.credit_score(user_id)
            .unwrap_or_else(|| self.neutral(user_id, txn.now()))
    }

    fn neutral(&self, user_id: UserId, now: DateTime<Utc>) -> CreditScore {
        let mut record = CreditScore::neutral(user_id, now);
        record.set_score(self.policy.neutral_score as i32);
        record
    }

    /// Recompute from the user's full loan history and stage the result
    ///
    /// Recomputing twice without a new settlement yields the same standing.
    /// Unknown users get the neutral record and nothing is staged.
    pub fn recompute(&self, txn: &mut WriteTxn<'_>, user_id: UserId) -> CreditScore {
        if txn.user(user_id).is_none() {
            debug!(user_id, "Skipping credit recompute for unknown user");
            return self.neutral(user_id, txn.now());
        }

        let loans = txn.user_loans(user_id);
        let record = self.policy.score_history(user_id, &loans, txn.now());

        match txn.credit_score(user_id) {
            Some(previous) if previous.same_standing(&record) => {
                debug!(user_id, score = record.score, "Credit standing unchanged");
            }
            Some(previous) => {
                info!(
                    user_id,
                    from = previous.score,
                    to = record.score,
                    tier = %record.tier,
                    "Credit score updated"
                );
            }
            None => {
                info!(user_id, score = record.score, tier = %record.tier, "Credit score created");
            }
        }

        txn.put_credit_score(record.clone());
        record
    }
}
