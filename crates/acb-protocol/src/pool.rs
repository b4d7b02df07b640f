//! Pool accounting - LP shares and the available/borrowed/reserve buckets
//!
//! Every operation works on the pool as staged in a ledger write
//! transaction, so a later failure in the same request discards it.

use acb_common::{
    Amount, Entity, LpPosition, NewTransaction, Pool, ProtocolError, Redemption, Result,
    Transaction, TransactionKind, TxHash, UserId, WriteOff, POOL_ID,
};
use acb_ledger::WriteTxn;
use serde::Serialize;
use tracing::{debug, info};

/// Result of a deposit
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositOutcome {
    pub lp_tokens_minted: Amount,
    pub position: LpPosition,
    pub pool: Pool,
    pub transaction: Transaction,
}

/// Result of a withdrawal
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawOutcome {
    pub lp_tokens_burned: Amount,
    pub amount_out: Amount,
    /// Realised gain over the cost basis of the burnt tokens
    pub realised_gain: Amount,
    pub position: LpPosition,
    pub pool: Pool,
    pub transaction: Transaction,
}

/// Pool-side bookkeeping for liquidity and loans
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolAccounting;

impl PoolAccounting {
    /// Add liquidity and mint LP tokens at the current share value
    pub fn deposit(
        &self,
        txn: &mut WriteTxn<'_>,
        user_id: UserId,
        amount: Amount,
        tx_hash: Option<TxHash>,
    ) -> Result<DepositOutcome> {
        txn.require_user(user_id)?;
        if amount.is_zero() {
            return Err(ProtocolError::InvalidAmount { amount }.into());
        }

        let mut pool = txn.pool();
        let minted = pool.shares_for_deposit(amount)?;
        if minted.is_zero() {
            // Too small to buy a single LP token unit
            return Err(ProtocolError::InvalidAmount { amount }.into());
        }
        pool.credit_deposit(amount, minted)?;

        let now = txn.now();
        let mut position = txn
            .lp_position(user_id)
            .unwrap_or_else(|| LpPosition::new(user_id, POOL_ID, now));
        position.add(amount, minted, now)?;

        txn.put_pool(pool);
        txn.put_lp_position(position.clone());
        let transaction = txn.append_transaction(
            NewTransaction::new(user_id, TransactionKind::Deposit, amount)
                .with_pool(POOL_ID)
                .with_tx_hash(tx_hash),
        );

        info!(user_id, amount = %amount, minted = %minted, "Liquidity deposited");

        Ok(DepositOutcome {
            lp_tokens_minted: minted,
            position,
            pool: txn.pool(),
            transaction,
        })
    }

    /// Burn LP tokens and pay out their current value
    pub fn withdraw(
        &self,
        txn: &mut WriteTxn<'_>,
        user_id: UserId,
        lp_amount: Amount,
        tx_hash: Option<TxHash>,
    ) -> Result<WithdrawOutcome> {
        txn.require_user(user_id)?;
        if lp_amount.is_zero() {
            return Err(ProtocolError::InvalidAmount { amount: lp_amount }.into());
        }

        let mut position = txn.lp_position(user_id).ok_or(ProtocolError::InsufficientPosition {
            requested: lp_amount,
            available: Amount::ZERO,
        })?;
        if lp_amount > position.lp_tokens {
            return Err(ProtocolError::InsufficientPosition {
                requested: lp_amount,
                available: position.lp_tokens,
            }
            .into());
        }

        let mut pool = txn.pool();
        let value = pool.value_of_shares(lp_amount)?;
        if value.is_zero() {
            // Burning tokens for nothing is never what the caller wants
            return Err(ProtocolError::InvalidAmount { amount: lp_amount }.into());
        }
        pool.debit_withdrawal(lp_amount, value)?;

        let now = txn.now();
        let Redemption { gain, .. } = position.redeem(lp_amount, value, now)?;

        txn.put_pool(pool);
        txn.put_lp_position(position.clone());
        let transaction = txn.append_transaction(
            NewTransaction::new(user_id, TransactionKind::Withdraw, value)
                .with_pool(POOL_ID)
                .with_tx_hash(tx_hash),
        );

        info!(user_id, lp_amount = %lp_amount, value = %value, gain = %gain, "Liquidity withdrawn");

        Ok(WithdrawOutcome {
            lp_tokens_burned: lp_amount,
            amount_out: value,
            realised_gain: gain,
            position,
            pool: txn.pool(),
            transaction,
        })
    }

    /// Move `amount` from available to borrowed
    pub fn reserve(&self, txn: &mut WriteTxn<'_>, amount: Amount) -> Result<Pool> {
        let mut pool = txn.pool();
        pool.reserve(amount)?;
        debug!(amount = %amount, borrowed = %pool.total_borrowed, "Liquidity reserved");
        txn.put_pool(pool);
        Ok(txn.pool())
    }

    /// Return `amount` from borrowed to available
    pub fn release(&self, txn: &mut WriteTxn<'_>, amount: Amount) -> Result<Pool> {
        let mut pool = txn.pool();
        pool.release(amount)?;
        debug!(amount = %amount, borrowed = %pool.total_borrowed, "Liquidity released");
        txn.put_pool(pool);
        Ok(txn.pool())
    }

    /// Close out a repaid loan: release principal and book the interest
    ///
    /// Returns the part of the interest routed to the risk reserve.
    pub fn settle_repayment(
        &self,
        txn: &mut WriteTxn<'_>,
        principal: Amount,
        collected: Amount,
    ) -> Result<Amount> {
        let mut pool = txn.pool();
        pool.release(principal)?;
        let interest = collected.saturating_sub(principal);
        let to_reserve = pool.collect_interest(interest)?;
        debug!(principal = %principal, interest = %interest, to_reserve = %to_reserve, "Loan settled into pool");
        txn.put_pool(pool);
        Ok(to_reserve)
    }

    /// Close out a defaulted loan, the risk reserve absorbing losses first
    pub fn write_off(
        &self,
        txn: &mut WriteTxn<'_>,
        principal: Amount,
        recovered: Amount,
    ) -> Result<WriteOff> {
        let mut pool = txn.pool();
        let write_off = pool.write_off(principal, recovered)?;
        txn.put_pool(pool);
        Ok(write_off)
    }
}

/// Value of a user's LP tokens at the committed pool state
pub fn position_value(pool: &Pool, position: &LpPosition) -> Result<Amount> {
    Ok(pool.value_of_shares(position.lp_tokens)?)
}

/// The user's position or `NotFound`
pub fn require_position(position: Option<LpPosition>, user_id: UserId) -> Result<LpPosition> {
    position.ok_or_else(|| ProtocolError::not_found(Entity::LpPosition, user_id).into())
}
