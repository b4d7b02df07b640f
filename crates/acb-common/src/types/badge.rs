//! CreditBadge - One-time mint record gated by identity verification

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::credit_score::Tier;
use super::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditBadge {
    pub user_id: UserId,
    pub token_id: u64,
    /// Nullifier that authorised the mint
    pub nullifier_hash: String,
    /// Score snapshot at mint time
    pub credit_score: u16,
    pub tier: Tier,
    pub minted_at: DateTime<Utc>,
}
