//! Protocol parameters

use acb_common::{Amount, RateParams};
use acb_credit::{BorrowLimitPolicy, ScoringPolicy, TierMultipliers};
use acb_ledger::{LedgerConfig, DEFAULT_LOCK_TIMEOUT_MS};
use std::time::Duration;

/// Longest loan term accepted by default
pub const DEFAULT_MAX_DURATION_DAYS: u32 = 365;

/// Tunable protocol policy
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    /// Rate curve and reserve factor for a fresh pool
    pub rate_params: RateParams,
    /// Allowance a neutral tier C borrower gets
    pub base_allowance: Amount,
    pub tier_multipliers: TierMultipliers,
    pub scoring: ScoringPolicy,
    pub max_duration_days: u32,
    /// External id that gets the admin role on first login
    pub owner_external_id: Option<String>,
    /// Bounded wait for the ledger writer lock
    pub lock_timeout: Duration,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        let limits = BorrowLimitPolicy::default();
        Self {
            rate_params: RateParams::default(),
            base_allowance: limits.base_allowance,
            tier_multipliers: limits.multipliers,
            scoring: ScoringPolicy::default(),
            max_duration_days: DEFAULT_MAX_DURATION_DAYS,
            owner_external_id: None,
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
        }
    }
}

impl ProtocolConfig {
    pub fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            pool_params: self.rate_params,
            lock_timeout: self.lock_timeout,
        }
    }

    pub fn borrow_limits(&self) -> BorrowLimitPolicy {
        BorrowLimitPolicy {
            base_allowance: self.base_allowance,
            multipliers: self.tier_multipliers,
        }
    }
}
