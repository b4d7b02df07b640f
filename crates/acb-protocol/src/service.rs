//! LedgerService - The operations exposed to callers
//!
//! Writes open a ledger write transaction, run one component operation and
//! commit; any error drops the transaction with nothing applied. Reads go
//! straight to committed state without the writer lock.

use acb_common::{
    AcbError, Amount, Clock, CreditBadge, CreditScore, Entity, Loan, LoanId, LoanStatus,
    LpPosition, Pool, ProtocolError, Result, Role, Transaction, TxHash, User, UserId,
    UserProfile, ONE_TOKEN,
};
use acb_ledger::{Journal, Ledger, LedgerStats};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::config::ProtocolConfig;
use crate::lifecycle::{BorrowOutcome, BorrowQuote, DefaultOutcome, LoanLifecycle, RepaymentOutcome};
use crate::pool::{position_value, require_position, DepositOutcome, PoolAccounting, WithdrawOutcome};

/// Pool with its derived figures
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolView {
    #[serde(flatten)]
    pub pool: Pool,
    pub available_liquidity: Amount,
    pub utilization_bps: u32,
    /// Value of one whole LP token
    pub lp_token_value: Amount,
}

/// LP position with its current value
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LpPositionView {
    #[serde(flatten)]
    pub position: LpPosition,
    pub current_value: Amount,
    /// Current value above the cost basis
    pub unrealised_interest: Amount,
}

/// What a loan costs at a point in time
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwedView {
    pub loan_id: LoanId,
    pub principal: Amount,
    pub interest: Amount,
    pub total_owed: Amount,
    pub repaid_amount: Amount,
    pub outstanding: Amount,
    pub overdue: bool,
    pub as_of: DateTime<Utc>,
}

/// Operations facade over the ledger
pub struct LedgerService {
    ledger: Arc<Ledger>,
    lifecycle: LoanLifecycle,
    pool: PoolAccounting,
    config: ProtocolConfig,
}

impl LedgerService {
    pub fn new(ledger: Arc<Ledger>, config: ProtocolConfig) -> Self {
        Self {
            lifecycle: LoanLifecycle::new(&config),
            pool: PoolAccounting,
            ledger,
            config,
        }
    }

    /// Service over a fresh memory-only ledger
    pub fn in_memory(config: ProtocolConfig, clock: Arc<dyn Clock>) -> Self {
        let ledger = Ledger::in_memory(config.ledger_config(), clock);
        Self::new(Arc::new(ledger), config)
    }

    /// Service over a ledger replayed from `journal`
    pub async fn open(
        config: ProtocolConfig,
        clock: Arc<dyn Clock>,
        journal: Arc<dyn Journal>,
    ) -> Result<Self> {
        let ledger = Ledger::open(config.ledger_config(), clock, journal).await?;
        Ok(Self::new(Arc::new(ledger), config))
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn stats(&self) -> LedgerStats {
        self.ledger.stats()
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Create the user on first login, refresh the profile afterwards
    #[instrument(skip(self, profile), fields(external_id = %profile.external_id))]
    pub async fn upsert_user(&self, profile: UserProfile) -> Result<User> {
        let result = async {
            if profile.external_id.trim().is_empty() {
                return Err(ProtocolError::InvalidInput("external id is empty".into()).into());
            }

            let mut txn = self.ledger.begin().await?;
            let now = txn.now();
            let user = match txn.user_by_external_id(&profile.external_id) {
                Some(mut user) => {
                    user.refresh(profile, now);
                    user
                }
                None => {
                    let role = if self.config.owner_external_id.as_deref()
                        == Some(profile.external_id.as_str())
                    {
                        Role::Admin
                    } else {
                        Role::User
                    };
                    let user = User::register(txn.next_user_id(), profile, role, now);
                    txn.put_credit_score(CreditScore::neutral(user.id, now));
                    info!(user_id = user.id, role = ?role, "User registered");
                    user
                }
            };
            txn.put_user(user.clone());
            txn.commit().await?;
            Ok::<_, AcbError>(user)
        }
        .await;
        rejected("upsert_user", result)
    }

    pub fn get_user(&self, user_id: UserId) -> Result<User> {
        self.ledger
            .user(user_id)
            .ok_or_else(|| ProtocolError::not_found(Entity::User, user_id).into())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Committed credit record; neutral 500/C for users never scored
    pub fn get_credit_score(&self, user_id: UserId) -> CreditScore {
        self.lifecycle.scoring().current(&self.ledger, user_id)
    }

    pub fn get_pool(&self) -> Result<PoolView> {
        let pool = self.ledger.pool();
        Ok(PoolView {
            available_liquidity: pool.available(),
            utilization_bps: pool.utilization_bps(),
            lp_token_value: pool.value_of_shares(Amount::new(ONE_TOKEN))?,
            pool,
        })
    }

    pub fn get_lp_position(&self, user_id: UserId) -> Result<LpPositionView> {
        let position = require_position(self.ledger.lp_position(user_id), user_id)?;
        let current_value = position_value(&self.ledger.pool(), &position)?;
        Ok(LpPositionView {
            unrealised_interest: current_value.saturating_sub(position.deposited_amount),
            current_value,
            position,
        })
    }

    /// Current value of the user's LP tokens, zero without a position
    pub fn get_lp_value(&self, user_id: UserId) -> Result<Amount> {
        match self.ledger.lp_position(user_id) {
            Some(position) => position_value(&self.ledger.pool(), &position),
            None => Ok(Amount::ZERO),
        }
    }

    /// A user's loans in issue order
    pub fn get_user_loans(&self, user_id: UserId) -> Vec<Loan> {
        self.ledger.user_loans(user_id)
    }

    pub fn get_loan(&self, user_id: UserId, loan_id: LoanId) -> Result<Loan> {
        self.ledger
            .loan(loan_id)
            .filter(|l| l.user_id == user_id)
            .ok_or_else(|| ProtocolError::not_found(Entity::Loan, loan_id).into())
    }

    /// A user's audit records in append order
    pub fn get_transactions(&self, user_id: UserId) -> Vec<Transaction> {
        self.ledger.user_transactions(user_id)
    }

    /// Rate, limit and headroom for a new loan
    pub fn quote_borrow(&self, user_id: UserId) -> Result<BorrowQuote> {
        self.get_user(user_id)?;
        let quote = self.lifecycle.quote_for(
            self.get_credit_score(user_id),
            &self.ledger.user_loans(user_id),
            &self.ledger.pool(),
        )?;
        debug!(
            user_id,
            rate_bps = quote.rate.rate_bps,
            available = %quote.available_to_borrow,
            "Borrow quote"
        );
        Ok(quote)
    }

    /// Amount owed on a loan right now; settled loans stop accruing
    pub fn calculate_total_owed(&self, user_id: UserId, loan_id: LoanId) -> Result<OwedView> {
        let loan = self.get_loan(user_id, loan_id)?;
        let now = self.ledger.now();
        let as_of = loan.settled_at.map_or(now, |at| at.min(now));
        let interest = loan.interest_at(as_of)?;
        let total_owed = loan.amount.checked_add(interest)?;

        Ok(OwedView {
            loan_id,
            principal: loan.amount,
            interest,
            total_owed,
            repaid_amount: loan.repaid_amount,
            outstanding: total_owed.saturating_sub(loan.repaid_amount),
            overdue: loan.status == LoanStatus::Active && loan.is_overdue(now),
            as_of,
        })
    }

    // =========================================================================
    // Liquidity
    // =========================================================================

    #[instrument(skip(self, tx_hash))]
    pub async fn deposit(
        &self,
        user_id: UserId,
        amount: Amount,
        tx_hash: Option<TxHash>,
    ) -> Result<DepositOutcome> {
        let result = async {
            let mut txn = self.ledger.begin().await?;
            let outcome = self.pool.deposit(&mut txn, user_id, amount, tx_hash)?;
            txn.commit().await?;
            Ok::<_, AcbError>(outcome)
        }
        .await;
        rejected("deposit", result)
    }

    #[instrument(skip(self, tx_hash))]
    pub async fn withdraw(
        &self,
        user_id: UserId,
        lp_amount: Amount,
        tx_hash: Option<TxHash>,
    ) -> Result<WithdrawOutcome> {
        let result = async {
            let mut txn = self.ledger.begin().await?;
            let outcome = self.pool.withdraw(&mut txn, user_id, lp_amount, tx_hash)?;
            txn.commit().await?;
            Ok::<_, AcbError>(outcome)
        }
        .await;
        rejected("withdraw", result)
    }

    // =========================================================================
    // Loans
    // =========================================================================

    #[instrument(skip(self, tx_hash))]
    pub async fn request_loan(
        &self,
        user_id: UserId,
        amount: Amount,
        duration_days: u32,
        tx_hash: Option<TxHash>,
    ) -> Result<BorrowOutcome> {
        let result = async {
            let mut txn = self.ledger.begin().await?;
            let outcome =
                self.lifecycle
                    .request_loan(&mut txn, user_id, amount, duration_days, tx_hash)?;
            txn.commit().await?;
            Ok::<_, AcbError>(outcome)
        }
        .await;
        rejected("request_loan", result)
    }

    #[instrument(skip(self, tx_hash))]
    pub async fn repay_loan(
        &self,
        user_id: UserId,
        loan_id: LoanId,
        amount: Amount,
        tx_hash: Option<TxHash>,
    ) -> Result<RepaymentOutcome> {
        let result = async {
            let mut txn = self.ledger.begin().await?;
            let outcome = self
                .lifecycle
                .repay_loan(&mut txn, user_id, loan_id, amount, tx_hash)?;
            txn.commit().await?;
            Ok::<_, AcbError>(outcome)
        }
        .await;
        rejected("repay_loan", result)
    }

    /// Default an overdue loan; idempotent once defaulted
    #[instrument(skip(self))]
    pub async fn mark_defaulted(&self, loan_id: LoanId) -> Result<DefaultOutcome> {
        let result = async {
            let mut txn = self.ledger.begin().await?;
            let outcome = self.lifecycle.mark_defaulted(&mut txn, loan_id)?;
            txn.commit().await?;
            Ok::<_, AcbError>(outcome)
        }
        .await;
        rejected("mark_defaulted", result)
    }

    /// Rescore a user from their loan history
    #[instrument(skip(self))]
    pub async fn recompute_credit_score(&self, user_id: UserId) -> Result<CreditScore> {
        let result = async {
            let mut txn = self.ledger.begin().await?;
            let score = self.lifecycle.scoring().recompute(&mut txn, user_id);
            txn.commit().await?;
            Ok::<_, AcbError>(score)
        }
        .await;
        rejected("recompute_credit_score", result)
    }

    // =========================================================================
    // Verification and badge
    // =========================================================================

    /// Record the identity provider's nullifier for a user
    #[instrument(skip(self, nullifier))]
    pub async fn link_verification(&self, user_id: UserId, nullifier: &str) -> Result<User> {
        let result = async {
            let nullifier = nullifier.trim();
            if nullifier.is_empty() {
                return Err(ProtocolError::InvalidInput("nullifier is empty".into()).into());
            }

            let mut txn = self.ledger.begin().await?;
            let mut user = txn.require_user(user_id)?;

            match user.verification_nullifier.as_deref().map(|n| n == nullifier) {
                Some(true) => return Ok(user),
                Some(false) => return Err(ProtocolError::NullifierInUse.into()),
                None => {}
            }
            if txn.user_for_nullifier(nullifier).is_some() {
                return Err(ProtocolError::NullifierInUse.into());
            }

            user.verification_nullifier = Some(nullifier.to_string());
            user.updated_at = txn.now();
            txn.put_user(user.clone());
            txn.commit().await?;

            info!(user_id, "Verification linked");
            Ok::<_, AcbError>(user)
        }
        .await;
        rejected("link_verification", result)
    }

    pub fn is_linked_to_verification(&self, user_id: UserId) -> bool {
        self.ledger.user(user_id).map_or(false, |u| u.is_verified())
    }

    /// Record a one-time credit badge mint with a score snapshot
    #[instrument(skip(self))]
    pub async fn mint_credit_badge(&self, user_id: UserId, token_id: u64) -> Result<CreditBadge> {
        let result = async {
            let mut txn = self.ledger.begin().await?;
            let user = txn.require_user(user_id)?;
            let nullifier = user
                .verification_nullifier
                .ok_or(ProtocolError::VerificationRequired { user_id })?;

            if txn.badge(user_id).is_some() {
                return Err(ProtocolError::AlreadyMinted { user_id }.into());
            }
            if txn.badge_for_nullifier(&nullifier).is_some() {
                return Err(ProtocolError::NullifierInUse.into());
            }

            let score = self.lifecycle.scoring().current_in(&txn, user_id);
            let badge = CreditBadge {
                user_id,
                token_id,
                nullifier_hash: nullifier,
                credit_score: score.score,
                tier: score.tier,
                minted_at: txn.now(),
            };
            txn.put_badge(badge.clone());
            txn.commit().await?;

            info!(user_id, token_id, score = badge.credit_score, tier = %badge.tier, "Credit badge minted");
            Ok::<_, AcbError>(badge)
        }
        .await;
        rejected("mint_credit_badge", result)
    }

    pub fn get_credit_badge(&self, user_id: UserId) -> Result<CreditBadge> {
        self.ledger
            .badge(user_id)
            .ok_or_else(|| ProtocolError::not_found(Entity::Badge, user_id).into())
    }
}

/// Log a rejected write before handing it back
fn rejected<T>(op: &'static str, result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        warn!(op, kind = err.kind(), error = %err, "Operation rejected");
    }
    result
}
