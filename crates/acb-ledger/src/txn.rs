//! WriteTxn - Staged changes under the writer lock
//!
//! Reads inside a transaction see staged rows first, then committed ones.
//! Nothing reaches the ledger until [`WriteTxn::commit`]; dropping the
//! transaction discards every staged change.

use acb_common::{
    CreditBadge, CreditScore, Entity, Loan, LoanId, LpPosition, NewTransaction, Pool,
    ProtocolError, Result, Transaction, User, UserId,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::MutexGuard;
use tracing::debug;

use crate::journal::CommitBatch;
use crate::store::{Ledger, Sequences};

/// What a successful commit produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    pub sequence: u64,
    pub committed_at: DateTime<Utc>,
    pub transactions: Vec<Transaction>,
}

pub struct WriteTxn<'a> {
    ledger: &'a Ledger,
    guard: MutexGuard<'a, Sequences>,
    sequences: Sequences,
    now: DateTime<Utc>,

    users: BTreeMap<UserId, User>,
    credit_scores: BTreeMap<UserId, CreditScore>,
    lp_positions: BTreeMap<UserId, LpPosition>,
    loans: BTreeMap<LoanId, Loan>,
    transactions: Vec<Transaction>,
    badges: BTreeMap<UserId, CreditBadge>,
    pool: Option<Pool>,
}

impl<'a> WriteTxn<'a> {
    pub(crate) fn new(ledger: &'a Ledger, guard: MutexGuard<'a, Sequences>) -> Self {
        let sequences = *guard;
        Self {
            ledger,
            guard,
            sequences,
            now: ledger.clock.now(),
            users: BTreeMap::new(),
            credit_scores: BTreeMap::new(),
            lp_positions: BTreeMap::new(),
            loans: BTreeMap::new(),
            transactions: Vec::new(),
            badges: BTreeMap::new(),
            pool: None,
        }
    }

    /// Timestamp shared by every row this transaction writes
    #[inline]
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    // ----- users -----

    pub fn user(&self, user_id: UserId) -> Option<User> {
        self.users
            .get(&user_id)
            .cloned()
            .or_else(|| self.ledger.user(user_id))
    }

    /// The user, or `NotFound`
    pub fn require_user(&self, user_id: UserId) -> Result<User> {
        self.user(user_id)
            .ok_or_else(|| ProtocolError::not_found(Entity::User, user_id).into())
    }

    pub fn user_by_external_id(&self, external_id: &str) -> Option<User> {
        self.users
            .values()
            .find(|u| u.external_id == external_id)
            .cloned()
            .or_else(|| self.ledger.user_by_external_id(external_id))
    }

    /// Owner of a nullifier, staged links included
    pub fn user_for_nullifier(&self, nullifier: &str) -> Option<UserId> {
        self.users
            .values()
            .find(|u| u.verification_nullifier.as_deref() == Some(nullifier))
            .map(|u| u.id)
            .or_else(|| self.ledger.user_for_nullifier(nullifier))
    }

    pub fn next_user_id(&mut self) -> UserId {
        let id = self.sequences.next_user_id;
        self.sequences.next_user_id += 1;
        id
    }

    pub fn put_user(&mut self, user: User) {
        self.users.insert(user.id, user);
    }

    // ----- credit scores -----

    pub fn credit_score(&self, user_id: UserId) -> Option<CreditScore> {
        self.credit_scores
            .get(&user_id)
            .cloned()
            .or_else(|| self.ledger.credit_score(user_id))
    }

    pub fn put_credit_score(&mut self, score: CreditScore) {
        self.credit_scores.insert(score.user_id, score);
    }

    // ----- pool -----

    pub fn pool(&self) -> Pool {
        self.pool.clone().unwrap_or_else(|| self.ledger.pool())
    }

    /// Stage the pool, bumping its version
    pub fn put_pool(&mut self, mut pool: Pool) {
        pool.touch(self.now);
        self.pool = Some(pool);
    }

    // ----- lp positions -----

    pub fn lp_position(&self, user_id: UserId) -> Option<LpPosition> {
        self.lp_positions
            .get(&user_id)
            .cloned()
            .or_else(|| self.ledger.lp_position(user_id))
    }

    pub fn put_lp_position(&mut self, position: LpPosition) {
        self.lp_positions.insert(position.user_id, position);
    }

    // ----- loans -----

    pub fn loan(&self, loan_id: LoanId) -> Option<Loan> {
        self.loans
            .get(&loan_id)
            .cloned()
            .or_else(|| self.ledger.loan(loan_id))
    }

    /// A user's loans, staged versions taking precedence
    pub fn user_loans(&self, user_id: UserId) -> Vec<Loan> {
        let mut by_id: BTreeMap<LoanId, Loan> = self
            .ledger
            .user_loans(user_id)
            .into_iter()
            .map(|l| (l.id, l))
            .collect();
        for loan in self.loans.values().filter(|l| l.user_id == user_id) {
            by_id.insert(loan.id, loan.clone());
        }
        by_id.into_values().collect()
    }

    pub fn next_loan_id(&mut self) -> LoanId {
        let id = self.sequences.next_loan_id;
        self.sequences.next_loan_id += 1;
        id
    }

    pub fn put_loan(&mut self, loan: Loan) {
        self.loans.insert(loan.id, loan);
    }

    // ----- transactions -----

    /// Stage an audit record; ids are assigned here
    pub fn append_transaction(&mut self, tx: NewTransaction) -> Transaction {
        let id = self.sequences.next_transaction_id;
        self.sequences.next_transaction_id += 1;
        let record = tx.into_record(id, self.now);
        self.transactions.push(record.clone());
        record
    }

    // ----- badges -----

    pub fn badge(&self, user_id: UserId) -> Option<CreditBadge> {
        self.badges
            .get(&user_id)
            .cloned()
            .or_else(|| self.ledger.badge(user_id))
    }

    pub fn badge_for_nullifier(&self, nullifier: &str) -> Option<CreditBadge> {
        self.badges
            .values()
            .find(|b| b.nullifier_hash == nullifier)
            .cloned()
            .or_else(|| {
                self.ledger
                    .badges
                    .iter()
                    .find(|b| b.nullifier_hash == nullifier)
                    .map(|b| b.clone())
            })
    }

    pub fn put_badge(&mut self, badge: CreditBadge) {
        self.badges.insert(badge.user_id, badge);
    }

    // ----- commit -----

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
            && self.credit_scores.is_empty()
            && self.lp_positions.is_empty()
            && self.loans.is_empty()
            && self.transactions.is_empty()
            && self.badges.is_empty()
            && self.pool.is_none()
    }

    /// Persist every staged row as one batch
    ///
    /// Id counters only advance when the batch is durable, so a failed
    /// commit leaves no gap and no partial state.
    pub async fn commit(mut self) -> Result<CommitReceipt> {
        let now = self.now;
        if self.is_empty() {
            return Ok(CommitReceipt {
                sequence: self.guard.next_commit.saturating_sub(1),
                committed_at: now,
                transactions: Vec::new(),
            });
        }

        let sequence = self.sequences.next_commit;
        self.sequences.next_commit += 1;

        let batch = CommitBatch {
            sequence,
            committed_at: Some(now),
            users: std::mem::take(&mut self.users).into_values().collect(),
            credit_scores: std::mem::take(&mut self.credit_scores).into_values().collect(),
            lp_positions: std::mem::take(&mut self.lp_positions).into_values().collect(),
            loans: std::mem::take(&mut self.loans).into_values().collect(),
            transactions: std::mem::take(&mut self.transactions),
            badges: std::mem::take(&mut self.badges).into_values().collect(),
            pool: self.pool.take(),
        };

        self.ledger.commit_batch(&batch).await?;
        *self.guard = self.sequences;

        debug!(
            sequence,
            loans = batch.loans.len(),
            transactions = batch.transactions.len(),
            pool_changed = batch.pool.is_some(),
            "Committed ledger batch"
        );

        Ok(CommitReceipt {
            sequence,
            committed_at: now,
            transactions: batch.transactions,
        })
    }
}
