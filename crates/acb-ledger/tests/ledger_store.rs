//! Ledger store behaviour: atomic commits, bounded contention, replay

use std::sync::Arc;
use std::time::Duration;

use acb_common::{
    AcbError, Amount, Clock, CreditScore, LpPosition, ManualClock, NewTransaction,
    ProtocolError, Role, TransactionKind, User, UserProfile,
};
use acb_ledger::{
    FileJournal, Journal, JournalError, Ledger, LedgerConfig, LedgerEvent,
};
use async_trait::async_trait;

fn clock() -> Arc<dyn Clock> {
    Arc::new(ManualClock::default())
}

fn profile(external_id: &str) -> UserProfile {
    UserProfile {
        external_id: external_id.to_string(),
        ..Default::default()
    }
}

async fn register(ledger: &Ledger, external_id: &str) -> u64 {
    let mut txn = ledger.begin().await.unwrap();
    let id = txn.next_user_id();
    let now = txn.now();
    txn.put_user(User::register(id, profile(external_id), Role::User, now));
    txn.put_credit_score(CreditScore::neutral(id, now));
    txn.commit().await.unwrap();
    id
}

#[tokio::test]
async fn test_staged_rows_are_invisible_until_commit() {
    let ledger = Ledger::in_memory(LedgerConfig::default(), clock());
    let user_id = register(&ledger, "alice").await;

    let mut txn = ledger.begin().await.unwrap();
    let mut pool = txn.pool();
    pool.credit_deposit(Amount::new(1000), Amount::new(1000)).unwrap();
    txn.put_pool(pool);
    txn.append_transaction(NewTransaction::new(user_id, TransactionKind::Deposit, Amount::new(1000)));

    // Inside the transaction the staged pool is visible
    assert_eq!(txn.pool().total_liquidity, Amount::new(1000));
    // Outside it is not
    assert_eq!(ledger.pool().total_liquidity, Amount::ZERO);

    let receipt = txn.commit().await.unwrap();
    assert_eq!(receipt.transactions.len(), 1);
    assert_eq!(ledger.pool().total_liquidity, Amount::new(1000));
    assert_eq!(ledger.pool().version, 1);
    assert_eq!(ledger.user_transactions(user_id).len(), 1);
}

#[tokio::test]
async fn test_dropped_transaction_rolls_back_and_reuses_ids() {
    let ledger = Ledger::in_memory(LedgerConfig::default(), clock());
    let user_id = register(&ledger, "bob").await;

    {
        let mut txn = ledger.begin().await.unwrap();
        let tx = txn.append_transaction(NewTransaction::new(
            user_id,
            TransactionKind::Deposit,
            Amount::new(5),
        ));
        assert_eq!(tx.id, 1);
        // dropped without commit
    }

    assert!(ledger.user_transactions(user_id).is_empty());

    let mut txn = ledger.begin().await.unwrap();
    let tx = txn.append_transaction(NewTransaction::new(
        user_id,
        TransactionKind::Deposit,
        Amount::new(5),
    ));
    assert_eq!(tx.id, 1);
    txn.commit().await.unwrap();
}

#[tokio::test]
async fn test_writer_lock_times_out_with_contention() {
    let config = LedgerConfig {
        lock_timeout: Duration::from_millis(50),
        ..Default::default()
    };
    let ledger = Ledger::in_memory(config, clock());

    let _holder = ledger.begin().await.unwrap();
    let result = ledger.begin().await;

    match result {
        Err(AcbError::Protocol(ProtocolError::Contention { waited_ms })) => {
            assert!(waited_ms >= 40);
        }
        Err(other) => panic!("expected contention, got {other}"),
        Ok(_) => panic!("expected contention, got a transaction"),
    }
}

#[tokio::test]
async fn test_reads_do_not_wait_for_writers() {
    let ledger = Ledger::in_memory(LedgerConfig::default(), clock());
    let user_id = register(&ledger, "carol").await;

    let _holder = ledger.begin().await.unwrap();
    assert!(ledger.user(user_id).is_some());
    assert_eq!(ledger.pool().total_liquidity, Amount::ZERO);
}

struct FailingJournal;

#[async_trait]
impl Journal for FailingJournal {
    async fn append(&self, _event: &LedgerEvent) -> Result<(), JournalError> {
        Err(JournalError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk full",
        )))
    }

    async fn replay(&self) -> Result<Vec<LedgerEvent>, JournalError> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn test_journal_failure_leaves_memory_untouched() {
    let ledger = Ledger::open(LedgerConfig::default(), clock(), Arc::new(FailingJournal))
        .await
        .unwrap();

    let mut txn = ledger.begin().await.unwrap();
    let id = txn.next_user_id();
    let now = txn.now();
    txn.put_user(User::register(id, profile("dave"), Role::User, now));

    let result = txn.commit().await;
    assert!(matches!(result, Err(AcbError::Storage(_))));
    assert!(ledger.user(id).is_none());
    assert_eq!(ledger.stats().users, 0);
}

#[tokio::test]
async fn test_replay_rebuilds_state_and_sequences() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.jsonl");

    let user_id = {
        let journal = Arc::new(FileJournal::open(&path).await.unwrap());
        let ledger = Ledger::open(LedgerConfig::default(), clock(), journal)
            .await
            .unwrap();
        let user_id = register(&ledger, "erin").await;

        let mut txn = ledger.begin().await.unwrap();
        let now = txn.now();
        let mut position = LpPosition::new(user_id, 1, now);
        position.add(Amount::new(700), Amount::new(700), now).unwrap();
        txn.put_lp_position(position);
        let mut pool = txn.pool();
        pool.credit_deposit(Amount::new(700), Amount::new(700)).unwrap();
        txn.put_pool(pool);
        txn.append_transaction(NewTransaction::new(
            user_id,
            TransactionKind::Deposit,
            Amount::new(700),
        ));
        txn.commit().await.unwrap();
        user_id
    };

    let journal = Arc::new(FileJournal::open(&path).await.unwrap());
    let ledger = Ledger::open(LedgerConfig::default(), clock(), journal)
        .await
        .unwrap();

    assert_eq!(ledger.user_by_external_id("erin").map(|u| u.id), Some(user_id));
    assert_eq!(ledger.pool().total_liquidity, Amount::new(700));
    assert_eq!(
        ledger.lp_position(user_id).map(|p| p.lp_tokens),
        Some(Amount::new(700))
    );
    assert_eq!(ledger.stats().last_commit, 2);

    // New ids continue after the replayed ones
    let next = register(&ledger, "frank").await;
    assert_eq!(next, user_id + 1);

    let mut txn = ledger.begin().await.unwrap();
    let tx = txn.append_transaction(NewTransaction::new(next, TransactionKind::Deposit, Amount::new(1)));
    assert_eq!(tx.id, 2);
}
