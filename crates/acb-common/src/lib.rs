//! # ACB Common
//!
//! Shared types and errors for the ACB Protocol lending ledger.
//!
//! ## Core Types
//!
//! - [`Amount`]: minor-unit integer money, decimal-string on the wire
//! - [`CreditScore`]/[`Tier`]: 0-1000 borrower score and its A-D bucket
//! - [`Pool`]: singleton liquidity aggregate (available / borrowed / reserve)
//! - [`LpPosition`]: a provider's LP tokens and cost basis
//! - [`Loan`]: principal, fixed term rate, one-way status
//! - [`Transaction`]: append-only audit record
//!
//! ## Errors
//!
//! - [`ProtocolError`]: caller-recoverable rejections
//! - [`AcbError`]: protocol rejections plus storage/config failures

pub mod clock;
pub mod error;
pub mod types;

// Re-export commonly used types at crate root
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{AcbError, Entity, ProtocolError, Result};
pub use types::{
    amount::{Amount, ONE_TOKEN, TOKEN_DECIMALS},
    badge::CreditBadge,
    credit_score::{CreditScore, Tier},
    loan::{Loan, LoanStatus},
    lp_position::{LpPosition, Redemption},
    pool::{Pool, RateParams, WriteOff, POOL_ID},
    transaction::{NewTransaction, Transaction, TransactionKind, TxHash},
    user::{Role, User, UserProfile},
    LoanId, TransactionId, UserId,
};

/// ACB ledger version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Basis-point denominator (100%)
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Maximum credit score value
pub const MAX_CREDIT_SCORE: u16 = types::credit_score::MAX_SCORE;

/// Neutral credit score for new users
pub const NEUTRAL_CREDIT_SCORE: u16 = types::credit_score::NEUTRAL_SCORE;
