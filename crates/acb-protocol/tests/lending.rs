//! End-to-end lending flows through the service facade

mod common;

use std::sync::Arc;

use acb_common::{Amount, Entity, LoanStatus, ProtocolError, Role, Tier, TransactionKind, TxHash};
use acb_ledger::FileJournal;
use acb_protocol::{LedgerService, ProtocolConfig};
use common::{profile, protocol, tenths, tokens, Harness};

// ============================================================================
// Liquidity
// ============================================================================

#[tokio::test]
async fn test_bootstrap_deposit_mints_one_to_one_and_withdraws_back() {
    let h = Harness::new();
    let lp = h.user("lp").await;

    let deposit = h.service.deposit(lp, Amount::new(1000), None).await.unwrap();
    assert_eq!(deposit.lp_tokens_minted, Amount::new(1000));
    assert_eq!(deposit.position.lp_tokens, Amount::new(1000));

    let withdraw = h.service.withdraw(lp, Amount::new(1000), None).await.unwrap();
    assert_eq!(withdraw.amount_out, Amount::new(1000));
    assert_eq!(withdraw.realised_gain, Amount::ZERO);

    let pool = h.service.get_pool().unwrap().pool;
    assert_eq!(pool.total_liquidity, Amount::ZERO);
    assert_eq!(pool.total_lp_tokens, Amount::ZERO);

    let kinds: Vec<_> = h.service.get_transactions(lp).iter().map(|t| t.kind).collect();
    assert_eq!(kinds, vec![TransactionKind::Deposit, TransactionKind::Withdraw]);
}

#[tokio::test]
async fn test_zero_deposit_is_rejected() {
    let h = Harness::new();
    let lp = h.user("lp").await;

    let err = protocol(h.service.deposit(lp, Amount::ZERO, None).await.unwrap_err());
    assert_eq!(err, ProtocolError::InvalidAmount { amount: Amount::ZERO });
    assert!(h.service.get_transactions(lp).is_empty());
}

#[tokio::test]
async fn test_withdraw_checks_position_then_liquidity() {
    let h = Harness::new();
    let lp = h.provider("lp", tokens(1)).await;
    let borrower = h.user("borrower").await;
    h.service.request_loan(borrower, tenths(6), 30, None).await.unwrap();

    let err = protocol(h.service.withdraw(lp, tokens(2), None).await.unwrap_err());
    assert_eq!(
        err,
        ProtocolError::InsufficientPosition {
            requested: tokens(2),
            available: tokens(1),
        }
    );

    let err = protocol(h.service.withdraw(lp, tokens(1), None).await.unwrap_err());
    assert_eq!(
        err,
        ProtocolError::InsufficientLiquidity {
            requested: tokens(1),
            available: tenths(4),
        }
    );

    // The unlent part can still leave
    let partial = h.service.withdraw(lp, tenths(4), None).await.unwrap();
    assert_eq!(partial.amount_out, tenths(4));
    assert_eq!(h.service.get_pool().unwrap().available_liquidity, Amount::ZERO);
}

#[tokio::test]
async fn test_withdraw_without_position_is_insufficient() {
    let h = Harness::new();
    let user = h.user("nobody").await;
    let err = protocol(h.service.withdraw(user, Amount::new(1), None).await.unwrap_err());
    assert!(matches!(err, ProtocolError::InsufficientPosition { .. }));
    assert!(matches!(
        protocol(h.service.get_lp_position(user).unwrap_err()),
        ProtocolError::NotFound { entity: Entity::LpPosition, .. }
    ));
    assert_eq!(h.service.get_lp_value(user).unwrap(), Amount::ZERO);
}

// ============================================================================
// Borrowing
// ============================================================================

#[tokio::test]
async fn test_request_above_limit_leaves_no_trace() {
    let h = Harness::new();
    h.provider("lp", tokens(10)).await;
    let borrower = h.user("borrower").await;
    assert_eq!(h.service.get_credit_score(borrower).tier, Tier::C);

    let err = protocol(
        h.service
            .request_loan(borrower, tokens(2), 30, None)
            .await
            .unwrap_err(),
    );
    assert_eq!(
        err,
        ProtocolError::ExceedsLimit {
            requested: tokens(2),
            max: tokens(1),
        }
    );

    assert!(h.service.get_user_loans(borrower).is_empty());
    assert!(h.service.get_transactions(borrower).is_empty());
    assert_eq!(h.service.get_pool().unwrap().pool.total_borrowed, Amount::ZERO);
}

#[tokio::test]
async fn test_request_above_pool_liquidity_is_rejected() {
    let h = Harness::new();
    h.provider("lp", tenths(3)).await;
    let borrower = h.user("borrower").await;

    let err = protocol(
        h.service
            .request_loan(borrower, tenths(5), 30, None)
            .await
            .unwrap_err(),
    );
    assert_eq!(
        err,
        ProtocolError::InsufficientLiquidity {
            requested: tenths(5),
            available: tenths(3),
        }
    );
    assert!(h.service.get_user_loans(borrower).is_empty());
}

#[tokio::test]
async fn test_request_validates_amount_and_duration() {
    let h = Harness::new();
    h.provider("lp", tokens(10)).await;
    let borrower = h.user("borrower").await;

    for days in [0, 366] {
        let err = protocol(
            h.service
                .request_loan(borrower, tenths(1), days, None)
                .await
                .unwrap_err(),
        );
        assert_eq!(err, ProtocolError::InvalidDuration { days, max: 365 });
    }

    let err = protocol(
        h.service
            .request_loan(borrower, Amount::ZERO, 30, None)
            .await
            .unwrap_err(),
    );
    assert!(matches!(err, ProtocolError::InvalidAmount { .. }));
}

#[tokio::test]
async fn test_unknown_user_cannot_borrow() {
    let h = Harness::new();
    h.provider("lp", tokens(10)).await;
    let err = protocol(h.service.request_loan(99, tenths(1), 30, None).await.unwrap_err());
    assert_eq!(err, ProtocolError::NotFound { entity: Entity::User, id: 99 });
}

#[tokio::test]
async fn test_loan_snapshots_rate_and_score() {
    let h = Harness::new();
    h.provider("lp", tokens(10)).await;
    let borrower = h.user("borrower").await;

    let quote = h.service.quote_borrow(borrower).unwrap();
    assert_eq!(quote.rate.rate_bps, 1500);
    assert_eq!(quote.max_borrow, tokens(1));
    assert_eq!(quote.available_to_borrow, tokens(1));

    let issued = h.service.request_loan(borrower, tenths(4), 30, None).await.unwrap();
    let loan = issued.loan;
    assert_eq!(loan.status, LoanStatus::Active);
    assert_eq!(loan.interest_rate_bps, 1500);
    assert_eq!(loan.credit_score_at_borrow, 500);
    assert_eq!(loan.due_date - loan.borrowed_at, chrono::Duration::days(30));
    assert_eq!(issued.transaction.kind, TransactionKind::Borrow);
    assert_eq!(issued.transaction.related_loan_id, Some(loan.id));

    // Headroom shrinks by the open principal, utilization is now 4%
    let quote = h.service.quote_borrow(borrower).unwrap();
    assert_eq!(quote.outstanding_principal, tenths(4));
    assert_eq!(quote.available_to_borrow, tenths(6));
    assert_eq!(quote.rate.utilization_bps, 400);
    assert_eq!(quote.rate.rate_bps, 1540);

    let err = protocol(
        h.service
            .request_loan(borrower, tenths(7), 30, None)
            .await
            .unwrap_err(),
    );
    assert_eq!(
        err,
        ProtocolError::ExceedsLimit {
            requested: tenths(7),
            max: tenths(6),
        }
    );
}

// ============================================================================
// Repayment
// ============================================================================

#[tokio::test]
async fn test_full_repayment_settles_and_rewards() {
    let h = Harness::new();
    h.provider("lp", tokens(10)).await;
    let borrower = h.user("borrower").await;
    let loan = h
        .service
        .request_loan(borrower, tenths(5), 30, None)
        .await
        .unwrap()
        .loan;

    h.advance_days(15);
    let owed = h.service.calculate_total_owed(borrower, loan.id).unwrap();
    // 15% over 30 days, half the term elapsed
    let interest = Amount::new(37_500_000_000_000_000);
    assert_eq!(owed.interest, interest);
    assert_eq!(owed.total_owed, tenths(5).checked_add(interest).unwrap());
    assert!(!owed.overdue);

    let repaid = h.service.repay_loan(borrower, loan.id, tokens(1), None).await.unwrap();
    assert!(repaid.settled);
    assert_eq!(repaid.applied, owed.total_owed);
    assert_eq!(repaid.remaining, Amount::ZERO);
    assert_eq!(repaid.loan.status, LoanStatus::Repaid);
    assert_eq!(repaid.transaction.amount, owed.total_owed);

    let pool = h.service.get_pool().unwrap().pool;
    assert_eq!(pool.total_borrowed, Amount::ZERO);
    assert_eq!(pool.total_liquidity, tokens(10).checked_add(interest).unwrap());
    assert_eq!(pool.risk_reserve, Amount::new(3_750_000_000_000_000));

    let score = h.service.get_credit_score(borrower);
    assert_eq!(score.successful_repayments, 1);
    assert_eq!(score.total_loans, 1);
    // +20 base, +5 size, +2 duration
    assert_eq!(score.score, 527);

    h.advance_days(30);
    let settled = h.service.calculate_total_owed(borrower, loan.id).unwrap();
    assert_eq!(settled.outstanding, Amount::ZERO);
    assert_eq!(settled.interest, interest);
    assert!(!settled.overdue);

    let err = protocol(
        h.service
            .repay_loan(borrower, loan.id, tokens(1), None)
            .await
            .unwrap_err(),
    );
    assert_eq!(
        err,
        ProtocolError::AlreadySettled {
            loan_id: loan.id,
            status: LoanStatus::Repaid,
        }
    );
}

#[tokio::test]
async fn test_partial_repayment_keeps_loan_active() {
    let h = Harness::new();
    h.provider("lp", tokens(10)).await;
    let borrower = h.user("borrower").await;
    let loan = h
        .service
        .request_loan(borrower, tenths(5), 30, None)
        .await
        .unwrap()
        .loan;
    h.advance_days(15);

    let first = h.service.repay_loan(borrower, loan.id, tenths(2), None).await.unwrap();
    assert!(!first.settled);
    assert_eq!(first.applied, tenths(2));
    assert_eq!(first.remaining, Amount::new(337_500_000_000_000_000));
    assert_eq!(first.loan.status, LoanStatus::Active);
    assert_eq!(first.loan.repaid_amount, tenths(2));
    assert!(first.credit_score.is_none());

    // Pool untouched until settlement
    let pool = h.service.get_pool().unwrap().pool;
    assert_eq!(pool.total_borrowed, tenths(5));
    assert_eq!(pool.total_liquidity, tokens(10));

    let second = h.service.repay_loan(borrower, loan.id, tokens(1), None).await.unwrap();
    assert!(second.settled);
    assert_eq!(second.applied, Amount::new(337_500_000_000_000_000));
    assert_eq!(second.loan.repaid_amount, Amount::new(537_500_000_000_000_000));

    let repays: Vec<_> = h
        .service
        .get_transactions(borrower)
        .into_iter()
        .filter(|t| t.kind == TransactionKind::Repay)
        .map(|t| t.amount)
        .collect();
    assert_eq!(repays, vec![tenths(2), Amount::new(337_500_000_000_000_000)]);
}

#[tokio::test]
async fn test_late_repayment_still_counts_but_costs_score() {
    let h = Harness::new();
    h.provider("lp", tokens(10)).await;
    let borrower = h.user("borrower").await;
    let loan = h
        .service
        .request_loan(borrower, tenths(5), 10, None)
        .await
        .unwrap()
        .loan;

    h.advance_days(12);
    assert!(h.service.calculate_total_owed(borrower, loan.id).unwrap().overdue);
    h.service.repay_loan(borrower, loan.id, tokens(1), None).await.unwrap();

    let score = h.service.get_credit_score(borrower);
    assert_eq!(score.successful_repayments, 1);
    assert_eq!(score.score, 485);
}

#[tokio::test]
async fn test_repay_requires_ownership() {
    let h = Harness::new();
    h.provider("lp", tokens(10)).await;
    let alice = h.user("alice").await;
    let mallory = h.user("mallory").await;
    let loan = h.service.request_loan(alice, tenths(1), 30, None).await.unwrap().loan;

    for (user, loan_id) in [(mallory, loan.id), (alice, 404)] {
        let err = protocol(
            h.service
                .repay_loan(user, loan_id, tenths(1), None)
                .await
                .unwrap_err(),
        );
        assert_eq!(err, ProtocolError::NotFound { entity: Entity::Loan, id: loan_id });
    }
    assert!(h.service.get_loan(mallory, loan.id).is_err());
}

// ============================================================================
// Default
// ============================================================================

#[tokio::test]
async fn test_default_is_gated_by_due_date_and_idempotent() {
    let h = Harness::new();
    h.provider("lp", tokens(10)).await;
    let borrower = h.user("borrower").await;
    let loan = h
        .service
        .request_loan(borrower, tenths(5), 10, None)
        .await
        .unwrap()
        .loan;

    let err = protocol(h.service.mark_defaulted(loan.id).await.unwrap_err());
    assert!(matches!(err, ProtocolError::NotOverdue { loan_id, .. } if loan_id == loan.id));

    h.advance_days(11);
    let outcome = h.service.mark_defaulted(loan.id).await.unwrap();
    assert!(outcome.changed);
    assert_eq!(outcome.loan.status, LoanStatus::Defaulted);
    assert_eq!(outcome.loss, tenths(5));
    assert_eq!(outcome.absorbed_by_reserve, Amount::ZERO);
    assert_eq!(outcome.socialized, tenths(5));

    let pool = h.service.get_pool().unwrap().pool;
    assert_eq!(pool.total_borrowed, Amount::ZERO);
    assert_eq!(pool.total_liquidity, Amount::new(9_500_000_000_000_000_000));

    let score = h.service.get_credit_score(borrower);
    assert_eq!(score.defaults, 1);
    assert_eq!(score.score, 350);
    assert_eq!(score.tier, Tier::D);

    // Second call is a no-op
    let again = h.service.mark_defaulted(loan.id).await.unwrap();
    assert!(!again.changed);
    assert!(again.transaction.is_none());
    let kinds: Vec<_> = h.service.get_transactions(borrower).iter().map(|t| t.kind).collect();
    assert_eq!(kinds, vec![TransactionKind::Borrow, TransactionKind::Liquidation]);

    let err = protocol(
        h.service
            .repay_loan(borrower, loan.id, tokens(1), None)
            .await
            .unwrap_err(),
    );
    assert!(matches!(err, ProtocolError::AlreadySettled { status: LoanStatus::Defaulted, .. }));
}

#[tokio::test]
async fn test_repaid_loan_cannot_default() {
    let h = Harness::new();
    h.provider("lp", tokens(10)).await;
    let borrower = h.user("borrower").await;
    let loan = h.service.request_loan(borrower, tenths(5), 10, None).await.unwrap().loan;
    h.service.repay_loan(borrower, loan.id, tokens(1), None).await.unwrap();

    h.advance_days(30);
    let err = protocol(h.service.mark_defaulted(loan.id).await.unwrap_err());
    assert_eq!(
        err,
        ProtocolError::AlreadySettled {
            loan_id: loan.id,
            status: LoanStatus::Repaid,
        }
    );
    assert!(matches!(
        protocol(h.service.mark_defaulted(12345).await.unwrap_err()),
        ProtocolError::NotFound { entity: Entity::Loan, .. }
    ));
}

#[tokio::test]
async fn test_risk_reserve_absorbs_default_first() {
    let h = Harness::new();
    h.provider("lp", tokens(10)).await;
    let borrower = h.user("borrower").await;

    let first = h.service.request_loan(borrower, tenths(5), 30, None).await.unwrap().loan;
    h.advance_days(15);
    h.service.repay_loan(borrower, first.id, tokens(1), None).await.unwrap();
    let reserve = h.service.get_pool().unwrap().pool.risk_reserve;
    assert_eq!(reserve, Amount::new(3_750_000_000_000_000));

    let second = h.service.request_loan(borrower, tenths(5), 10, None).await.unwrap().loan;
    h.advance_days(11);
    let outcome = h.service.mark_defaulted(second.id).await.unwrap();
    assert_eq!(outcome.absorbed_by_reserve, reserve);
    assert_eq!(outcome.socialized, tenths(5).checked_sub(reserve).unwrap());

    let pool = h.service.get_pool().unwrap().pool;
    assert_eq!(pool.risk_reserve, Amount::ZERO);
    assert_eq!(pool.total_liquidity, Amount::new(9_537_500_000_000_000_000));
    assert!(pool.is_solvent());
}

#[tokio::test]
async fn test_partial_repayments_are_recovered_on_default() {
    let h = Harness::new();
    h.provider("lp", tokens(10)).await;
    let borrower = h.user("borrower").await;
    let loan = h.service.request_loan(borrower, tenths(5), 10, None).await.unwrap().loan;

    h.service.repay_loan(borrower, loan.id, tenths(2), None).await.unwrap();
    h.advance_days(11);
    let outcome = h.service.mark_defaulted(loan.id).await.unwrap();
    assert_eq!(outcome.loss, tenths(3));

    let pool = h.service.get_pool().unwrap().pool;
    assert_eq!(pool.total_liquidity, Amount::new(9_700_000_000_000_000_000));
    assert_eq!(pool.total_borrowed, Amount::ZERO);
}

#[tokio::test]
async fn test_wiped_out_pool_refuses_new_deposits() {
    let h = Harness::new();
    let old_lp = h.provider("old-lp", tokens(1)).await;
    let borrower = h.user("borrower").await;
    let loan = h.service.request_loan(borrower, tokens(1), 30, None).await.unwrap().loan;

    h.advance_days(31);
    let outcome = h.service.mark_defaulted(loan.id).await.unwrap();
    assert_eq!(outcome.socialized, tokens(1));

    let pool = h.service.get_pool().unwrap().pool;
    assert_eq!(pool.total_liquidity, Amount::ZERO);
    assert_eq!(pool.total_lp_tokens, tokens(1));
    assert_eq!(h.service.get_lp_value(old_lp).unwrap(), Amount::ZERO);

    let new_lp = h.user("new-lp").await;
    let err = protocol(h.service.deposit(new_lp, tokens(1), None).await.unwrap_err());
    assert_eq!(err, ProtocolError::PoolInsolvent { lp_tokens: tokens(1) });

    // Nothing staged by the refused deposit survives
    assert_eq!(h.service.get_pool().unwrap().pool, pool);
    assert!(h.service.get_transactions(new_lp).is_empty());
    assert_eq!(h.service.get_lp_value(new_lp).unwrap(), Amount::ZERO);
    assert_eq!(h.service.get_lp_value(old_lp).unwrap(), Amount::ZERO);
}

#[tokio::test]
async fn test_total_borrowed_tracks_active_principal() {
    let h = Harness::new();
    h.provider("lp", tokens(20)).await;
    let users = [h.user("a").await, h.user("b").await, h.user("c").await];

    let mut loans = Vec::new();
    for (i, user) in users.iter().enumerate() {
        let loan = h
            .service
            .request_loan(*user, tenths(2 + i as u128), 10, None)
            .await
            .unwrap()
            .loan;
        loans.push(loan);
    }
    h.service.repay_loan(users[0], loans[0].id, tokens(1), None).await.unwrap();
    h.advance_days(11);
    h.service.mark_defaulted(loans[1].id).await.unwrap();

    let active_principal = users
        .iter()
        .flat_map(|u| h.service.get_user_loans(*u))
        .filter(|l| l.status == LoanStatus::Active)
        .fold(Amount::ZERO, |acc, l| acc.checked_add(l.amount).unwrap());
    let pool = h.service.get_pool().unwrap().pool;
    assert_eq!(pool.total_borrowed, active_principal);
    assert_eq!(active_principal, tenths(4));
}

// ============================================================================
// Credit score
// ============================================================================

#[tokio::test]
async fn test_recompute_is_idempotent() {
    let h = Harness::new();
    h.provider("lp", tokens(10)).await;
    let borrower = h.user("borrower").await;
    let loan = h.service.request_loan(borrower, tenths(5), 30, None).await.unwrap().loan;
    h.service.repay_loan(borrower, loan.id, tokens(1), None).await.unwrap();

    let stored = h.service.get_credit_score(borrower);
    let once = h.service.recompute_credit_score(borrower).await.unwrap();
    let twice = h.service.recompute_credit_score(borrower).await.unwrap();
    assert!(once.same_standing(&stored));
    assert!(twice.same_standing(&once));
}

#[tokio::test]
async fn test_unknown_user_scores_neutral() {
    let h = Harness::new();
    let score = h.service.recompute_credit_score(77).await.unwrap();
    assert_eq!(score.score, 500);
    assert_eq!(score.tier, Tier::C);
    assert_eq!(h.service.get_credit_score(77).score, 500);
    assert_eq!(h.service.stats().last_commit, 0);
}

// ============================================================================
// Users, verification, badge
// ============================================================================

#[tokio::test]
async fn test_upsert_registers_once_and_refreshes() {
    let config = ProtocolConfig {
        owner_external_id: Some("owner".to_string()),
        ..ProtocolConfig::default()
    };
    let h = Harness::with_config(config);

    let owner = h.service.upsert_user(profile("owner")).await.unwrap();
    assert_eq!(owner.role, Role::Admin);

    let first = h.service.upsert_user(profile("alice")).await.unwrap();
    assert_eq!(first.role, Role::User);
    assert_eq!(h.service.get_credit_score(first.id).score, 500);

    h.advance_days(1);
    let mut renamed = profile("alice");
    renamed.name = Some("Alice".to_string());
    let again = h.service.upsert_user(renamed).await.unwrap();
    assert_eq!(again.id, first.id);
    assert_eq!(again.name.as_deref(), Some("Alice"));
    assert!(again.last_signed_in > first.last_signed_in);
    assert_eq!(again.created_at, first.created_at);

    let err = protocol(h.service.upsert_user(profile("  ")).await.unwrap_err());
    assert!(matches!(err, ProtocolError::InvalidInput(_)));
}

#[tokio::test]
async fn test_verification_gates_badge_mint() {
    let h = Harness::new();
    let alice = h.user("alice").await;
    let bob = h.user("bob").await;

    assert!(!h.service.is_linked_to_verification(alice));
    let err = protocol(h.service.mint_credit_badge(alice, 1).await.unwrap_err());
    assert_eq!(err, ProtocolError::VerificationRequired { user_id: alice });

    h.service.link_verification(alice, "0xnullifier").await.unwrap();
    assert!(h.service.is_linked_to_verification(alice));
    // Same pair again is fine
    h.service.link_verification(alice, "0xnullifier").await.unwrap();

    let err = protocol(h.service.link_verification(bob, "0xnullifier").await.unwrap_err());
    assert_eq!(err, ProtocolError::NullifierInUse);
    let err = protocol(h.service.link_verification(alice, "0xother").await.unwrap_err());
    assert_eq!(err, ProtocolError::NullifierInUse);

    let badge = h.service.mint_credit_badge(alice, 7).await.unwrap();
    assert_eq!(badge.token_id, 7);
    assert_eq!(badge.credit_score, 500);
    assert_eq!(badge.tier, Tier::C);
    assert_eq!(badge.nullifier_hash, "0xnullifier");
    assert_eq!(h.service.get_credit_badge(alice).unwrap(), badge);

    let err = protocol(h.service.mint_credit_badge(alice, 8).await.unwrap_err());
    assert_eq!(err, ProtocolError::AlreadyMinted { user_id: alice });
    assert!(h.service.get_credit_badge(bob).is_err());
}

#[tokio::test]
async fn test_tx_hash_is_recorded() {
    let h = Harness::new();
    let lp = h.user("lp").await;
    let hash = TxHash::parse(&format!("0x{}", "ab".repeat(32))).unwrap();

    let deposit = h.service.deposit(lp, tokens(1), Some(hash.clone())).await.unwrap();
    assert_eq!(deposit.transaction.tx_hash, Some(hash));
}

// ============================================================================
// Persistence
// ============================================================================

#[tokio::test]
async fn test_journal_replay_restores_service_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.jsonl");
    let clock = Arc::new(acb_common::ManualClock::default());

    let (borrower, pool_before) = {
        let journal = Arc::new(FileJournal::open(&path).await.unwrap());
        let service = LedgerService::open(ProtocolConfig::default(), clock.clone(), journal)
            .await
            .unwrap();
        let lp = service.upsert_user(profile("lp")).await.unwrap().id;
        service.deposit(lp, tokens(5), None).await.unwrap();
        let borrower = service.upsert_user(profile("borrower")).await.unwrap().id;
        service.request_loan(borrower, tenths(4), 30, None).await.unwrap();
        (borrower, service.get_pool().unwrap().pool)
    };

    let journal = Arc::new(FileJournal::open(&path).await.unwrap());
    let service = LedgerService::open(ProtocolConfig::default(), clock.clone(), journal)
        .await
        .unwrap();

    assert_eq!(service.get_pool().unwrap().pool, pool_before);
    assert_eq!(service.get_user_loans(borrower).len(), 1);
    assert_eq!(service.get_transactions(borrower).len(), 1);

    let next = service.request_loan(borrower, tenths(1), 30, None).await.unwrap();
    assert_eq!(next.loan.id, 2);
    assert_eq!(next.transaction.id, 3);
}
