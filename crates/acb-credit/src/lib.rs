//! # ACB Credit
//!
//! Pricing and underwriting for the ACB lending pool.
//!
//! ## Components
//!
//! - **Scoring**: replays settled loans into a 0-1000 score and tier
//! - **Rate model**: utilization plus credit premium, in basis points
//! - **Limits**: how much principal a score allows outstanding
//!
//! Everything here is deterministic in its inputs; the only state touched
//! is the credit record staged through a ledger write transaction.

pub mod limits;
pub mod rate;
pub mod scoring;

pub use limits::{BorrowLimitPolicy, TierMultipliers};
pub use rate::{RateModel, RateQuote};
pub use scoring::{CreditScoringEngine, ScoringPolicy};
