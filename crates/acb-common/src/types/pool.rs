//! Pool - Singleton liquidity aggregate
//!
//! The pool splits its liquidity into three buckets:
//! - Borrowed: out on active loans
//! - Risk reserve: protocol-owned, never lent, absorbs defaults first
//! - Available: everything else, lendable and withdrawable
//!
//! Invariant after every committed operation:
//! `total_borrowed <= total_liquidity - risk_reserve`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::amount::{mul_div, Amount};
use crate::error::ProtocolError;
use crate::BPS_DENOMINATOR;

/// Id of the singleton pool row
pub const POOL_ID: u64 = 1;

/// Schema default base rate (5%)
pub const DEFAULT_BASE_RATE_BPS: u32 = 500;

/// Schema default utilization coefficient (k)
pub const DEFAULT_UTILIZATION_COEFFICIENT: u32 = 1000;

/// Schema default credit coefficient (c)
pub const DEFAULT_CREDIT_COEFFICIENT: u32 = 500;

/// Share of collected interest routed to the risk reserve (10%)
pub const DEFAULT_RESERVE_FACTOR_BPS: u32 = 1000;

/// Rate curve parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateParams {
    pub base_rate_bps: u32,
    pub utilization_coefficient: u32,
    pub credit_coefficient: u32,
    pub reserve_factor_bps: u32,
}

impl Default for RateParams {
    fn default() -> Self {
        Self {
            base_rate_bps: DEFAULT_BASE_RATE_BPS,
            utilization_coefficient: DEFAULT_UTILIZATION_COEFFICIENT,
            credit_coefficient: DEFAULT_CREDIT_COEFFICIENT,
            reserve_factor_bps: DEFAULT_RESERVE_FACTOR_BPS,
        }
    }
}

/// Outcome of writing off a defaulted loan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOff {
    /// Principal not covered by earlier partial repayments
    pub loss: Amount,
    /// Part of the loss taken by the risk reserve
    pub absorbed_by_reserve: Amount,
    /// Part of the loss borne by liquidity providers
    pub socialized: Amount,
}

/// Credit pool singleton
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pool {
    pub id: u64,

    /// All liquidity held by the pool, including borrowed funds and reserve
    pub total_liquidity: Amount,

    /// Principal of active loans
    pub total_borrowed: Amount,

    /// LP tokens outstanding
    pub total_lp_tokens: Amount,

    pub risk_reserve: Amount,

    pub params: RateParams,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Bumped on every committed change
    pub version: u64,
}

impl Pool {
    /// Empty pool with the given curve
    pub fn new(params: RateParams, now: DateTime<Utc>) -> Self {
        Self {
            id: POOL_ID,
            total_liquidity: Amount::ZERO,
            total_borrowed: Amount::ZERO,
            total_lp_tokens: Amount::ZERO,
            risk_reserve: Amount::ZERO,
            params,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Lendable and withdrawable liquidity
    #[inline]
    pub fn available(&self) -> Amount {
        self.total_liquidity
            .saturating_sub(self.total_borrowed)
            .saturating_sub(self.risk_reserve)
    }

    /// Liquidity claimed by LP tokens (everything but the reserve)
    #[inline]
    pub fn lp_owned_liquidity(&self) -> Amount {
        self.total_liquidity.saturating_sub(self.risk_reserve)
    }

    /// Borrowed share of liquidity in basis points, capped at 100%
    pub fn utilization_bps(&self) -> u32 {
        if self.total_liquidity.is_zero() {
            return 0;
        }
        let bps = mul_div(
            self.total_borrowed.value(),
            BPS_DENOMINATOR as u128,
            self.total_liquidity.value(),
            false,
        )
        .unwrap_or(BPS_DENOMINATOR as u128);
        bps.min(BPS_DENOMINATOR as u128) as u32
    }

    /// LP tokens minted for a deposit (1:1 while no tokens exist)
    ///
    /// Outstanding tokens with nothing behind them have no share price, so
    /// the deposit is refused rather than diluted into worthless tokens.
    pub fn shares_for_deposit(&self, amount: Amount) -> Result<Amount, ProtocolError> {
        if self.total_lp_tokens.is_zero() {
            return Ok(amount);
        }
        let owned = self.lp_owned_liquidity();
        if owned.is_zero() {
            return Err(ProtocolError::PoolInsolvent {
                lp_tokens: self.total_lp_tokens,
            });
        }
        amount.mul_div_floor(self.total_lp_tokens.value(), owned.value())
    }

    /// Liquidity claimed by `lp_amount` tokens, rounded down
    pub fn value_of_shares(&self, lp_amount: Amount) -> Result<Amount, ProtocolError> {
        if self.total_lp_tokens.is_zero() {
            return Ok(Amount::ZERO);
        }
        lp_amount.mul_div_floor(
            self.lp_owned_liquidity().value(),
            self.total_lp_tokens.value(),
        )
    }

    /// Add liquidity and mint tokens
    pub fn credit_deposit(&mut self, amount: Amount, minted: Amount) -> Result<(), ProtocolError> {
        if amount.is_zero() {
            return Err(ProtocolError::InvalidAmount { amount });
        }
        self.total_liquidity = self.total_liquidity.checked_add(amount)?;
        self.total_lp_tokens = self.total_lp_tokens.checked_add(minted)?;
        Ok(())
    }

    /// Burn tokens and pay out their value from available liquidity
    pub fn debit_withdrawal(&mut self, lp_amount: Amount, value: Amount) -> Result<(), ProtocolError> {
        let available = self.available();
        if value > available {
            return Err(ProtocolError::InsufficientLiquidity {
                requested: value,
                available,
            });
        }
        self.total_liquidity = self.total_liquidity.checked_sub(value)?;
        self.total_lp_tokens = self.total_lp_tokens.checked_sub(lp_amount)?;
        Ok(())
    }

    /// Move liquidity from available to borrowed
    pub fn reserve(&mut self, amount: Amount) -> Result<(), ProtocolError> {
        if amount.is_zero() {
            return Err(ProtocolError::InvalidAmount { amount });
        }
        let available = self.available();
        if amount > available {
            return Err(ProtocolError::InsufficientLiquidity {
                requested: amount,
                available,
            });
        }
        self.total_borrowed = self.total_borrowed.checked_add(amount)?;
        Ok(())
    }

    /// Move principal from borrowed back to available
    pub fn release(&mut self, amount: Amount) -> Result<(), ProtocolError> {
        self.total_borrowed = self.total_borrowed.checked_sub(amount)?;
        Ok(())
    }

    /// Book interest collected on a settled loan
    ///
    /// Returns the part routed to the risk reserve.
    pub fn collect_interest(&mut self, interest: Amount) -> Result<Amount, ProtocolError> {
        let to_reserve = interest.apply_bps(self.params.reserve_factor_bps)?;
        self.total_liquidity = self.total_liquidity.checked_add(interest)?;
        self.risk_reserve = self.risk_reserve.checked_add(to_reserve)?;
        Ok(to_reserve)
    }

    /// Release a defaulted principal and write off what was not recovered
    ///
    /// `recovered` is what the borrower paid before defaulting; anything
    /// above the principal is booked as interest.
    pub fn write_off(&mut self, principal: Amount, recovered: Amount) -> Result<WriteOff, ProtocolError> {
        self.release(principal)?;

        if recovered > principal {
            self.collect_interest(recovered.checked_sub(principal)?)?;
            return Ok(WriteOff {
                loss: Amount::ZERO,
                absorbed_by_reserve: Amount::ZERO,
                socialized: Amount::ZERO,
            });
        }

        let loss = principal.checked_sub(recovered)?;
        let absorbed = loss.min(self.risk_reserve);
        self.risk_reserve = self.risk_reserve.checked_sub(absorbed)?;
        self.total_liquidity = self.total_liquidity.checked_sub(loss)?;

        Ok(WriteOff {
            loss,
            absorbed_by_reserve: absorbed,
            socialized: loss.checked_sub(absorbed)?,
        })
    }

    /// Whether the borrowed/reserve invariant holds
    pub fn is_solvent(&self) -> bool {
        self.total_borrowed.value()
            <= self
                .total_liquidity
                .value()
                .saturating_sub(self.risk_reserve.value())
            && self.risk_reserve <= self.total_liquidity
    }

    /// Update version and timestamp
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = now;
    }
}

impl std::fmt::Display for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pool(liquidity={}, borrowed={}, reserve={}, utilization={}bps)",
            self.total_liquidity.to_display(),
            self.total_borrowed.to_display(),
            self.risk_reserve.to_display(),
            self.utilization_bps()
        )
    }
}
