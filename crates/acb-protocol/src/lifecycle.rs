//! Loan lifecycle - Issue, repay, and default loans
//!
//! ```text
//!              requestLoan                 repayLoan (covers balance)
//!  (checks) ───────────────▶  Active  ───────────────────────────────▶  Repaid
//!                               │  ▲
//!                               │  └── repayLoan (partial)
//!                               │
//!                               └── markDefaulted (now > due) ───────▶  Defaulted
//! ```
//!
//! Each transition stages the loan, the pool and the audit record in the
//! same write transaction; terminal transitions also restage the borrower's
//! credit record.

use acb_common::{
    Amount, CreditScore, Entity, Loan, LoanId, LoanStatus, NewTransaction, Pool, ProtocolError,
    Result, Transaction, TransactionKind, TxHash, UserId, WriteOff, POOL_ID,
};
use acb_credit::{BorrowLimitPolicy, CreditScoringEngine, RateModel, RateQuote};
use acb_ledger::WriteTxn;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ProtocolConfig;
use crate::pool::PoolAccounting;

/// Rate and headroom a borrower would get right now
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowQuote {
    pub user_id: UserId,
    pub credit_score: CreditScore,
    pub rate: RateQuote,
    /// Limit for the score, ignoring open loans
    pub max_borrow: Amount,
    pub outstanding_principal: Amount,
    /// What a new loan may still be
    pub available_to_borrow: Amount,
    pub max_duration_days: u32,
}

/// Result of a loan request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowOutcome {
    pub loan: Loan,
    pub transaction: Transaction,
}

/// Result of a repayment
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepaymentOutcome {
    pub loan: Loan,
    /// Part of the offered amount actually taken
    pub applied: Amount,
    /// Balance left after this payment (zero once settled)
    pub remaining: Amount,
    pub settled: bool,
    pub transaction: Transaction,
    /// Present when the repayment settled the loan
    pub credit_score: Option<CreditScore>,
}

/// Result of marking a loan defaulted
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultOutcome {
    pub loan: Loan,
    /// False when the loan was already defaulted
    pub changed: bool,
    pub loss: Amount,
    pub absorbed_by_reserve: Amount,
    pub socialized: Amount,
    pub transaction: Option<Transaction>,
    pub credit_score: Option<CreditScore>,
}

/// Orchestrates loans against the pool and the scoring engine
#[derive(Debug, Clone)]
pub struct LoanLifecycle {
    limits: BorrowLimitPolicy,
    scoring: CreditScoringEngine,
    pool: PoolAccounting,
    max_duration_days: u32,
}

impl LoanLifecycle {
    pub fn new(config: &ProtocolConfig) -> Self {
        Self {
            limits: config.borrow_limits(),
            scoring: CreditScoringEngine::new(config.scoring.clone()),
            pool: PoolAccounting,
            max_duration_days: config.max_duration_days,
        }
    }

    pub fn scoring(&self) -> &CreditScoringEngine {
        &self.scoring
    }

    pub fn limits(&self) -> &BorrowLimitPolicy {
        &self.limits
    }

    /// Rate and limits for a borrower as seen by `txn`
    pub fn quote(&self, txn: &WriteTxn<'_>, user_id: UserId) -> Result<BorrowQuote> {
        txn.require_user(user_id)?;
        let credit_score = self.scoring.current_in(txn, user_id);
        self.quote_for(credit_score, &txn.user_loans(user_id), &txn.pool())
    }

    /// Rate and limits from already loaded rows
    pub fn quote_for(&self, credit_score: CreditScore, loans: &[Loan], pool: &Pool) -> Result<BorrowQuote> {
        let rate = RateModel::for_pool(pool).quote_for_pool(credit_score.tier, pool);
        let max_borrow = self.limits.limit_for(&credit_score)?;
        let outstanding_principal = BorrowLimitPolicy::outstanding(loans)?;

        Ok(BorrowQuote {
            user_id: credit_score.user_id,
            credit_score,
            rate,
            max_borrow,
            outstanding_principal,
            available_to_borrow: max_borrow.saturating_sub(outstanding_principal),
            max_duration_days: self.max_duration_days,
        })
    }

    /// Issue a loan from pool liquidity
    pub fn request_loan(
        &self,
        txn: &mut WriteTxn<'_>,
        user_id: UserId,
        amount: Amount,
        duration_days: u32,
        tx_hash: Option<TxHash>,
    ) -> Result<BorrowOutcome> {
        if amount.is_zero() {
            return Err(ProtocolError::InvalidAmount { amount }.into());
        }
        if duration_days == 0 || duration_days > self.max_duration_days {
            return Err(ProtocolError::InvalidDuration {
                days: duration_days,
                max: self.max_duration_days,
            }
            .into());
        }

        let quote = self.quote(txn, user_id)?;
        if amount > quote.available_to_borrow {
            warn!(
                user_id,
                requested = %amount,
                max = %quote.available_to_borrow,
                tier = %quote.credit_score.tier,
                "Loan request above borrow limit"
            );
            return Err(ProtocolError::ExceedsLimit {
                requested: amount,
                max: quote.available_to_borrow,
            }
            .into());
        }

        self.pool.reserve(txn, amount)?;

        let loan = Loan::issue(
            txn.next_loan_id(),
            user_id,
            POOL_ID,
            amount,
            quote.rate.rate_bps,
            duration_days,
            quote.credit_score.score,
            txn.now(),
        );
        txn.put_loan(loan.clone());
        let transaction = txn.append_transaction(
            NewTransaction::new(user_id, TransactionKind::Borrow, amount)
                .with_loan(loan.id)
                .with_pool(POOL_ID)
                .with_tx_hash(tx_hash),
        );

        info!(
            user_id,
            loan_id = loan.id,
            amount = %amount,
            rate_bps = loan.interest_rate_bps,
            duration_days,
            "Loan issued"
        );
        Ok(BorrowOutcome { loan, transaction })
    }

    /// Pay towards a loan; settles it once the balance is covered
    pub fn repay_loan(
        &self,
        txn: &mut WriteTxn<'_>,
        user_id: UserId,
        loan_id: LoanId,
        amount: Amount,
        tx_hash: Option<TxHash>,
    ) -> Result<RepaymentOutcome> {
        let mut loan = owned_loan(txn, user_id, loan_id)?;
        loan.ensure_active()?;
        if amount.is_zero() {
            return Err(ProtocolError::InvalidAmount { amount }.into());
        }

        let now = txn.now();
        let outstanding = loan.outstanding_at(now)?;
        let applied = amount.min(outstanding);
        let settled = applied == outstanding;

        loan.repaid_amount = loan.repaid_amount.checked_add(applied)?;
        loan.updated_at = now;

        let credit_score = if settled {
            loan.settle(LoanStatus::Repaid, now)?;
            let to_reserve = self
                .pool
                .settle_repayment(txn, loan.amount, loan.repaid_amount)?;
            txn.put_loan(loan.clone());
            let score = self.scoring.recompute(txn, user_id);
            info!(
                user_id,
                loan_id,
                repaid = %loan.repaid_amount,
                to_reserve = %to_reserve,
                on_time = loan.repaid_on_time(),
                "Loan repaid"
            );
            Some(score)
        } else {
            txn.put_loan(loan.clone());
            debug!(user_id, loan_id, applied = %applied, "Partial repayment recorded");
            None
        };

        let transaction = txn.append_transaction(
            NewTransaction::new(user_id, TransactionKind::Repay, applied)
                .with_loan(loan_id)
                .with_pool(POOL_ID)
                .with_tx_hash(tx_hash),
        );

        Ok(RepaymentOutcome {
            remaining: outstanding.saturating_sub(applied),
            loan,
            applied,
            settled,
            transaction,
            credit_score,
        })
    }

    /// Default an overdue loan; repeat calls on a defaulted loan are no-ops
    pub fn mark_defaulted(&self, txn: &mut WriteTxn<'_>, loan_id: LoanId) -> Result<DefaultOutcome> {
        let mut loan = txn
            .loan(loan_id)
            .ok_or_else(|| ProtocolError::not_found(Entity::Loan, loan_id))?;

        match loan.status {
            LoanStatus::Defaulted => {
                debug!(loan_id, "Loan already defaulted");
                return Ok(DefaultOutcome {
                    loan,
                    changed: false,
                    loss: Amount::ZERO,
                    absorbed_by_reserve: Amount::ZERO,
                    socialized: Amount::ZERO,
                    transaction: None,
                    credit_score: None,
                });
            }
            LoanStatus::Repaid => {
                return Err(ProtocolError::AlreadySettled {
                    loan_id,
                    status: loan.status,
                }
                .into());
            }
            LoanStatus::Active => {}
        }

        let now = txn.now();
        if !loan.is_overdue(now) {
            return Err(ProtocolError::NotOverdue {
                loan_id,
                due_date: loan.due_date,
            }
            .into());
        }

        loan.settle(LoanStatus::Defaulted, now)?;
        let WriteOff {
            loss,
            absorbed_by_reserve,
            socialized,
        } = self.pool.write_off(txn, loan.amount, loan.repaid_amount)?;
        txn.put_loan(loan.clone());
        let credit_score = self.scoring.recompute(txn, loan.user_id);

        let transaction = txn.append_transaction(
            NewTransaction::new(loan.user_id, TransactionKind::Liquidation, loan.amount)
                .with_loan(loan_id)
                .with_pool(POOL_ID),
        );

        warn!(
            user_id = loan.user_id,
            loan_id,
            loss = %loss,
            absorbed_by_reserve = %absorbed_by_reserve,
            socialized = %socialized,
            "Loan defaulted"
        );

        Ok(DefaultOutcome {
            loan,
            changed: true,
            loss,
            absorbed_by_reserve,
            socialized,
            transaction: Some(transaction),
            credit_score: Some(credit_score),
        })
    }
}

/// The loan if it exists and belongs to `user_id`
pub(crate) fn owned_loan(txn: &WriteTxn<'_>, user_id: UserId, loan_id: LoanId) -> Result<Loan> {
    txn.loan(loan_id)
        .filter(|l| l.user_id == user_id)
        .ok_or_else(|| ProtocolError::not_found(Entity::Loan, loan_id).into())
}
