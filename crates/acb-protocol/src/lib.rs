//! # ACB Protocol
//!
//! The lending operations of the ACB pool on top of the ledger store.
//!
//! ## Components
//!
//! - **Pool accounting**: LP share minting/burning and the
//!   available / borrowed / reserve buckets
//! - **Loan lifecycle**: issue, repay (partial or full) and default
//! - **Service**: the operations facade; one write transaction per call
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     LedgerService                        │
//! ├──────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐  │
//! │  │ LoanLifecycle│──▶│PoolAccounting│   │ Verification │  │
//! │  │              │   └──────────────┘   │   / Badge    │  │
//! │  │              │──▶ acb-credit        └──────────────┘  │
//! │  └──────────────┘   (score, rate, limits)                │
//! ├──────────────────────────────────────────────────────────┤
//! │        acb-ledger: WriteTxn ─ commit ─▶ journal + maps    │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod lifecycle;
pub mod pool;
pub mod service;

pub use config::{ProtocolConfig, DEFAULT_MAX_DURATION_DAYS};
pub use lifecycle::{BorrowOutcome, BorrowQuote, DefaultOutcome, LoanLifecycle, RepaymentOutcome};
pub use pool::{DepositOutcome, PoolAccounting, WithdrawOutcome};
pub use service::{LedgerService, LpPositionView, OwedView, PoolView};
