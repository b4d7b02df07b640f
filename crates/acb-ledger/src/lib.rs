//! # ACB Ledger
//!
//! Ledger Store for the ACB Protocol: the only owner of persisted state.
//!
//! ## Components
//!
//! - **Ledger**: committed rows in concurrent maps, lock-free reads
//! - **WriteTxn**: staged changes under a single bounded-wait writer lock
//! - **Journal**: append-only JSON Lines log replayed on startup
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                       Ledger                         │
//! │  ┌──────────────┐   begin()   ┌───────────────────┐  │
//! │  │ writer mutex │────────────▶│     WriteTxn      │  │
//! │  │ (timeout →   │             │  staged rows +    │  │
//! │  │  Contention) │             │  id allocation    │  │
//! │  └──────────────┘             └─────────┬─────────┘  │
//! │                                 commit()│            │
//! │  ┌──────────────┐  append+fsync ┌───────▼─────────┐  │
//! │  │   Journal    │◀──────────────│   CommitBatch   │  │
//! │  └──────────────┘               └───────┬─────────┘  │
//! │                                    apply│            │
//! │  ┌──────────────────────────────────────▼─────────┐  │
//! │  │  DashMap tables + RwLock<Pool>  (reads)        │  │
//! │  └────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod journal;
pub mod store;
pub mod txn;

pub use journal::{CommitBatch, FileJournal, Journal, JournalError, LedgerEvent};
pub use store::{Ledger, LedgerConfig, LedgerStats, DEFAULT_LOCK_TIMEOUT_MS};
pub use txn::{CommitReceipt, WriteTxn};
