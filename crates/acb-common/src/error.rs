//! Error types for the ACB ledger
//!
//! `ProtocolError` holds every caller-recoverable rejection; `AcbError`
//! adds infrastructure failures on top.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::amount::Amount;
use crate::types::loan::LoanStatus;
use crate::types::{LoanId, UserId};

/// Result type alias using AcbError
pub type Result<T> = std::result::Result<T, AcbError>;

/// Unified error type for ledger operations
#[derive(Debug, Error)]
pub enum AcbError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AcbError {
    /// The protocol rejection, if this is one
    pub fn as_protocol(&self) -> Option<&ProtocolError> {
        match self {
            AcbError::Protocol(err) => Some(err),
            _ => None,
        }
    }

    /// Stable snake_case error code
    pub fn kind(&self) -> &'static str {
        match self {
            AcbError::Protocol(err) => err.kind(),
            AcbError::Storage(_) => "storage",
            AcbError::Config(_) => "config",
            AcbError::Serialization(_) => "serialization",
            AcbError::Internal(_) => "internal",
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.as_protocol().map_or(false, ProtocolError::is_retryable)
    }
}

/// Entities addressable by id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    User,
    Loan,
    LpPosition,
    Badge,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Entity::User => "user",
            Entity::Loan => "loan",
            Entity::LpPosition => "lp position",
            Entity::Badge => "badge",
        };
        f.write_str(name)
    }
}

/// Rejections reported synchronously to the caller
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Amount must be positive: {amount}")]
    InvalidAmount { amount: Amount },

    #[error("Malformed amount: {0:?}")]
    MalformedAmount(String),

    #[error("Malformed transaction hash: {0:?}")]
    MalformedTxHash(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Insufficient LP position: requested {requested}, held {available}")]
    InsufficientPosition { requested: Amount, available: Amount },

    #[error("Insufficient pool liquidity: requested {requested}, available {available}")]
    InsufficientLiquidity { requested: Amount, available: Amount },

    #[error("Pool has {lp_tokens} LP tokens outstanding but no liquidity backing them")]
    PoolInsolvent { lp_tokens: Amount },

    #[error("Borrow limit exceeded: requested {requested}, max {max}")]
    ExceedsLimit { requested: Amount, max: Amount },

    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: u64 },

    #[error("Loan {loan_id} already settled as {status}")]
    AlreadySettled { loan_id: LoanId, status: LoanStatus },

    #[error("Ledger busy, gave up after {waited_ms}ms")]
    Contention { waited_ms: u64 },

    #[error("Invalid loan duration: {days} days (allowed 1..={max})")]
    InvalidDuration { days: u32, max: u32 },

    #[error("Loan {loan_id} is not overdue until {due_date}")]
    NotOverdue { loan_id: LoanId, due_date: DateTime<Utc> },

    #[error("Verification nullifier already linked to another user")]
    NullifierInUse,

    #[error("User {user_id} already minted a credit badge")]
    AlreadyMinted { user_id: UserId },

    #[error("User {user_id} has no linked verification")]
    VerificationRequired { user_id: UserId },

    #[error("Arithmetic overflow")]
    Overflow,
}

impl ProtocolError {
    pub fn not_found(entity: Entity, id: u64) -> Self {
        ProtocolError::NotFound { entity, id }
    }

    /// Stable snake_case error code
    pub fn kind(&self) -> &'static str {
        match self {
            ProtocolError::InvalidAmount { .. } => "invalid_amount",
            ProtocolError::MalformedAmount(_) => "malformed_amount",
            ProtocolError::MalformedTxHash(_) => "malformed_tx_hash",
            ProtocolError::InvalidInput(_) => "invalid_input",
            ProtocolError::InsufficientPosition { .. } => "insufficient_position",
            ProtocolError::InsufficientLiquidity { .. } => "insufficient_liquidity",
            ProtocolError::PoolInsolvent { .. } => "pool_insolvent",
            ProtocolError::ExceedsLimit { .. } => "exceeds_limit",
            ProtocolError::NotFound { .. } => "not_found",
            ProtocolError::AlreadySettled { .. } => "already_settled",
            ProtocolError::Contention { .. } => "contention",
            ProtocolError::InvalidDuration { .. } => "invalid_duration",
            ProtocolError::NotOverdue { .. } => "not_overdue",
            ProtocolError::NullifierInUse => "nullifier_in_use",
            ProtocolError::AlreadyMinted { .. } => "already_minted",
            ProtocolError::VerificationRequired { .. } => "verification_required",
            ProtocolError::Overflow => "overflow",
        }
    }

    /// Only lock contention is worth retrying unchanged
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProtocolError::Contention { .. })
    }
}

impl From<serde_json::Error> for AcbError {
    fn from(err: serde_json::Error) -> Self {
        AcbError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AcbError {
    fn from(err: std::io::Error) -> Self {
        AcbError::Storage(err.to_string())
    }
}

impl From<anyhow::Error> for AcbError {
    fn from(err: anyhow::Error) -> Self {
        AcbError::Internal(err.to_string())
    }
}
