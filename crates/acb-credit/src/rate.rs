//! Rate model - Borrower rate from utilization and credit tier
//!
//! ```text
//! rate = base + k * utilization + c * tierPenalty(tier)
//! ```
//!
//! All terms are integer basis points; utilization is scaled by 10000.

use acb_common::{Pool, RateParams, Tier, BPS_DENOMINATOR};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Quote with its inputs, for display and audit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateQuote {
    pub rate_bps: u32,
    pub utilization_bps: u32,
    pub tier: Tier,
}

/// Pure utilization/credit rate curve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateModel {
    params: RateParams,
}

impl RateModel {
    pub fn new(params: RateParams) -> Self {
        Self { params }
    }

    /// Curve stored on the pool
    pub fn for_pool(pool: &Pool) -> Self {
        Self::new(pool.params)
    }

    pub fn params(&self) -> &RateParams {
        &self.params
    }

    /// Rate in basis points for a tier at a utilization
    ///
    /// Utilization above 100% is treated as 100%.
    pub fn quote(&self, tier: Tier, utilization_bps: u32) -> u32 {
        let utilization = utilization_bps.min(BPS_DENOMINATOR) as u64;
        let utilization_term =
            self.params.utilization_coefficient as u64 * utilization / BPS_DENOMINATOR as u64;
        let credit_term = self.params.credit_coefficient as u64 * tier.penalty() as u64;
        let rate = self.params.base_rate_bps as u64 + utilization_term + credit_term;
        rate.min(u32::MAX as u64) as u32
    }

    /// Quote against the pool's current utilization
    pub fn quote_for_pool(&self, tier: Tier, pool: &Pool) -> RateQuote {
        let utilization_bps = pool.utilization_bps();
        let rate_bps = self.quote(tier, utilization_bps);
        debug!(%tier, utilization_bps, rate_bps, "Rate quoted");
        RateQuote {
            rate_bps,
            utilization_bps,
            tier,
        }
    }
}
