//! Core ledger entities

pub mod amount;
pub mod badge;
pub mod credit_score;
pub mod loan;
pub mod lp_position;
pub mod pool;
pub mod transaction;
pub mod user;

/// Surrogate user key
pub type UserId = u64;

/// Loan key
pub type LoanId = u64;

/// Transaction key
pub type TransactionId = u64;
