//! Ledger - Committed state and the writer gate
//!
//! Committed rows live in concurrent maps so reads never wait on writers.
//! Writers are serialized by one async mutex acquired with a bounded wait;
//! each writer stages its changes in a [`WriteTxn`] and commits them as a
//! single batch (journal first, then memory).

use acb_common::{
    AcbError, Clock, CreditBadge, CreditScore, Loan, LoanId, LpPosition, Pool, ProtocolError,
    RateParams, Result, Transaction, TransactionId, User, UserId,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::journal::{CommitBatch, Journal, LedgerEvent};
use crate::txn::WriteTxn;

/// Default bounded wait for the writer lock
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 2000;

/// Next ids to hand out; only advanced by a successful commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Sequences {
    pub next_user_id: UserId,
    pub next_loan_id: LoanId,
    pub next_transaction_id: TransactionId,
    pub next_commit: u64,
}

impl Default for Sequences {
    fn default() -> Self {
        Self {
            next_user_id: 1,
            next_loan_id: 1,
            next_transaction_id: 1,
            next_commit: 1,
        }
    }
}

/// Ledger construction options
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Rate curve for a fresh pool; a replayed pool keeps its own
    pub pool_params: RateParams,
    /// Bounded wait for the writer lock
    pub lock_timeout: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            pool_params: RateParams::default(),
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
        }
    }
}

/// Snapshot counts for health and metrics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerStats {
    pub users: usize,
    pub loans: usize,
    pub active_loans: usize,
    pub lp_positions: usize,
    pub transactions: usize,
    pub badges: usize,
    pub last_commit: u64,
}

/// The ledger store
pub struct Ledger {
    pub(crate) users: DashMap<UserId, User>,
    pub(crate) external_ids: DashMap<String, UserId>,
    pub(crate) nullifiers: DashMap<String, UserId>,
    pub(crate) credit_scores: DashMap<UserId, CreditScore>,
    pub(crate) lp_positions: DashMap<UserId, LpPosition>,
    pub(crate) loans: DashMap<LoanId, Loan>,
    pub(crate) loans_by_user: DashMap<UserId, Vec<LoanId>>,
    pub(crate) transactions: DashMap<TransactionId, Transaction>,
    pub(crate) transactions_by_user: DashMap<UserId, Vec<TransactionId>>,
    pub(crate) badges: DashMap<UserId, CreditBadge>,
    pub(crate) pool: RwLock<Pool>,
    last_commit: AtomicU64,

    /// Writer gate; the guarded value is the id allocator
    pub(crate) writer: Mutex<Sequences>,

    pub(crate) clock: Arc<dyn Clock>,
    journal: Option<Arc<dyn Journal>>,
    lock_timeout: Duration,
}

impl Ledger {
    /// Memory-only ledger with an empty pool
    pub fn in_memory(config: LedgerConfig, clock: Arc<dyn Clock>) -> Self {
        let pool = Pool::new(config.pool_params, clock.now());
        Self {
            users: DashMap::new(),
            external_ids: DashMap::new(),
            nullifiers: DashMap::new(),
            credit_scores: DashMap::new(),
            lp_positions: DashMap::new(),
            loans: DashMap::new(),
            loans_by_user: DashMap::new(),
            transactions: DashMap::new(),
            transactions_by_user: DashMap::new(),
            badges: DashMap::new(),
            pool: RwLock::new(pool),
            last_commit: AtomicU64::new(0),
            writer: Mutex::new(Sequences::default()),
            clock,
            journal: None,
            lock_timeout: config.lock_timeout,
        }
    }

    /// Ledger backed by a journal, rebuilt from its contents
    pub async fn open(
        config: LedgerConfig,
        clock: Arc<dyn Clock>,
        journal: Arc<dyn Journal>,
    ) -> Result<Self> {
        let mut ledger = Self::in_memory(config, clock);
        let events = journal.replay().await?;

        let mut sequences = Sequences::default();
        for event in &events {
            match event {
                LedgerEvent::Committed(batch) => {
                    ledger.apply(batch);
                    sequences.advance_past(batch);
                }
            }
        }
        *ledger.writer.get_mut() = sequences;
        ledger.journal = Some(journal);

        info!(
            batches = events.len(),
            users = ledger.users.len(),
            loans = ledger.loans.len(),
            "Ledger replayed from journal"
        );
        Ok(ledger)
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    #[inline]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// Start a write transaction
    ///
    /// Waits at most the configured lock timeout for concurrent writers to
    /// finish; on timeout the caller gets a retryable `Contention`.
    pub async fn begin(&self) -> Result<WriteTxn<'_>> {
        let started = Instant::now();
        match tokio::time::timeout(self.lock_timeout, self.writer.lock()).await {
            Ok(guard) => {
                let waited = started.elapsed();
                if waited > self.lock_timeout / 2 {
                    debug!(waited_ms = waited.as_millis() as u64, "Slow writer lock acquisition");
                }
                Ok(WriteTxn::new(self, guard))
            }
            Err(_) => {
                let waited_ms = started.elapsed().as_millis() as u64;
                warn!(waited_ms, "Writer lock timed out");
                Err(ProtocolError::Contention { waited_ms }.into())
            }
        }
    }

    /// Persist and apply a staged batch
    pub(crate) async fn commit_batch(&self, batch: &CommitBatch) -> Result<()> {
        if let Some(journal) = &self.journal {
            journal
                .append(&LedgerEvent::Committed(batch.clone()))
                .await
                .map_err(AcbError::from)?;
        }
        self.apply(batch);
        Ok(())
    }

    /// Write a batch into the maps
    fn apply(&self, batch: &CommitBatch) {
        for user in &batch.users {
            self.external_ids.insert(user.external_id.clone(), user.id);
            if let Some(nullifier) = &user.verification_nullifier {
                self.nullifiers.insert(nullifier.clone(), user.id);
            }
            self.users.insert(user.id, user.clone());
        }

        for score in &batch.credit_scores {
            self.credit_scores.insert(score.user_id, score.clone());
        }

        for position in &batch.lp_positions {
            self.lp_positions.insert(position.user_id, position.clone());
        }

        for loan in &batch.loans {
            let is_new = self.loans.insert(loan.id, loan.clone()).is_none();
            if is_new {
                self.loans_by_user.entry(loan.user_id).or_default().push(loan.id);
            }
        }

        for tx in &batch.transactions {
            self.transactions.insert(tx.id, tx.clone());
            self.transactions_by_user
                .entry(tx.user_id)
                .or_default()
                .push(tx.id);
        }

        for badge in &batch.badges {
            self.badges.insert(badge.user_id, badge.clone());
        }

        if let Some(pool) = &batch.pool {
            *self.pool.write() = pool.clone();
        }

        self.last_commit.fetch_max(batch.sequence, Ordering::Relaxed);
    }

    // ---------------------------------------------------------------
    // Reads (no writer lock; may observe a commit in progress)
    // ---------------------------------------------------------------

    pub fn user(&self, user_id: UserId) -> Option<User> {
        self.users.get(&user_id).map(|u| u.clone())
    }

    pub fn user_by_external_id(&self, external_id: &str) -> Option<User> {
        let user_id = self.external_ids.get(external_id).map(|id| *id)?;
        self.user(user_id)
    }

    pub fn user_for_nullifier(&self, nullifier: &str) -> Option<UserId> {
        self.nullifiers.get(nullifier).map(|id| *id)
    }

    pub fn credit_score(&self, user_id: UserId) -> Option<CreditScore> {
        self.credit_scores.get(&user_id).map(|s| s.clone())
    }

    pub fn pool(&self) -> Pool {
        self.pool.read().clone()
    }

    pub fn lp_position(&self, user_id: UserId) -> Option<LpPosition> {
        self.lp_positions.get(&user_id).map(|p| p.clone())
    }

    /// Every LP position (unordered)
    pub fn lp_positions(&self) -> Vec<LpPosition> {
        self.lp_positions.iter().map(|p| p.clone()).collect()
    }

    pub fn loan(&self, loan_id: LoanId) -> Option<Loan> {
        self.loans.get(&loan_id).map(|l| l.clone())
    }

    /// A user's loans in issue order
    pub fn user_loans(&self, user_id: UserId) -> Vec<Loan> {
        let ids = self
            .loans_by_user
            .get(&user_id)
            .map(|ids| ids.clone())
            .unwrap_or_default();
        ids.iter().filter_map(|id| self.loan(*id)).collect()
    }

    /// Every loan (unordered)
    pub fn loans(&self) -> Vec<Loan> {
        self.loans.iter().map(|l| l.clone()).collect()
    }

    /// A user's transactions in append order
    pub fn user_transactions(&self, user_id: UserId) -> Vec<Transaction> {
        let ids = self
            .transactions_by_user
            .get(&user_id)
            .map(|ids| ids.clone())
            .unwrap_or_default();
        ids.iter()
            .filter_map(|id| self.transactions.get(id).map(|t| t.clone()))
            .collect()
    }

    pub fn badge(&self, user_id: UserId) -> Option<CreditBadge> {
        self.badges.get(&user_id).map(|b| b.clone())
    }

    pub fn stats(&self) -> LedgerStats {
        let active_loans = self
            .loans
            .iter()
            .filter(|l| !l.status.is_terminal())
            .count();
        LedgerStats {
            users: self.users.len(),
            loans: self.loans.len(),
            active_loans,
            lp_positions: self.lp_positions.len(),
            transactions: self.transactions.len(),
            badges: self.badges.len(),
            last_commit: self.last_commit.load(Ordering::Relaxed),
        }
    }
}

impl Sequences {
    /// Move every counter past the ids used in `batch`
    pub(crate) fn advance_past(&mut self, batch: &CommitBatch) {
        for user in &batch.users {
            self.next_user_id = self.next_user_id.max(user.id + 1);
        }
        for loan in &batch.loans {
            self.next_loan_id = self.next_loan_id.max(loan.id + 1);
        }
        for tx in &batch.transactions {
            self.next_transaction_id = self.next_transaction_id.max(tx.id + 1);
        }
        self.next_commit = self.next_commit.max(batch.sequence + 1);
    }
}
