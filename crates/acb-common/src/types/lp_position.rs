//! LpPosition - A liquidity provider's claim on the pool

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::amount::Amount;
use super::UserId;
use crate::error::ProtocolError;

/// Per-user liquidity position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LpPosition {
    pub user_id: UserId,
    pub pool_id: u64,

    /// Cost basis of the LP tokens still held
    pub deposited_amount: Amount,

    pub lp_tokens: Amount,

    /// Realised gains from past withdrawals
    pub earned_interest: Amount,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What a withdrawal took out of a position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redemption {
    /// Cost basis attributed to the burnt tokens
    pub basis: Amount,
    /// Gain realised on top of the basis
    pub gain: Amount,
}

impl LpPosition {
    pub fn new(user_id: UserId, pool_id: u64, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            pool_id,
            deposited_amount: Amount::ZERO,
            lp_tokens: Amount::ZERO,
            earned_interest: Amount::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a deposit and the tokens it minted
    pub fn add(&mut self, amount: Amount, minted: Amount, now: DateTime<Utc>) -> Result<(), ProtocolError> {
        self.deposited_amount = self.deposited_amount.checked_add(amount)?;
        self.lp_tokens = self.lp_tokens.checked_add(minted)?;
        self.updated_at = now;
        Ok(())
    }

    /// Burn tokens worth `value`, moving the proportional basis out
    pub fn redeem(
        &mut self,
        lp_amount: Amount,
        value: Amount,
        now: DateTime<Utc>,
    ) -> Result<Redemption, ProtocolError> {
        if lp_amount > self.lp_tokens {
            return Err(ProtocolError::InsufficientPosition {
                requested: lp_amount,
                available: self.lp_tokens,
            });
        }

        let basis = if lp_amount == self.lp_tokens {
            self.deposited_amount
        } else {
            self.deposited_amount
                .mul_div_floor(lp_amount.value(), self.lp_tokens.value())?
        };
        let gain = value.saturating_sub(basis);

        self.lp_tokens = self.lp_tokens.checked_sub(lp_amount)?;
        self.deposited_amount = self.deposited_amount.checked_sub(basis)?;
        self.earned_interest = self.earned_interest.checked_add(gain)?;
        self.updated_at = now;

        Ok(Redemption { basis, gain })
    }
}
