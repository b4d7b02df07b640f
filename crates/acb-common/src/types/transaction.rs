//! Transaction - Append-only audit record
//!
//! One record is written alongside every state-changing operation. Records
//! are never updated or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::amount::Amount;
use super::{LoanId, TransactionId, UserId};
use crate::error::ProtocolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdraw,
    Borrow,
    Repay,
    Liquidation,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdraw => "withdraw",
            TransactionKind::Borrow => "borrow",
            TransactionKind::Repay => "repay",
            TransactionKind::Liquidation => "liquidation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: Amount,
    pub related_loan_id: Option<LoanId>,
    pub related_pool_id: Option<u64>,
    /// External chain transaction hash, when the caller supplied one
    pub tx_hash: Option<TxHash>,
    pub created_at: DateTime<Utc>,
}

/// Transaction before the ledger assigns its id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub user_id: UserId,
    pub kind: TransactionKind,
    pub amount: Amount,
    pub related_loan_id: Option<LoanId>,
    pub related_pool_id: Option<u64>,
    pub tx_hash: Option<TxHash>,
}

impl NewTransaction {
    pub fn new(user_id: UserId, kind: TransactionKind, amount: Amount) -> Self {
        Self {
            user_id,
            kind,
            amount,
            related_loan_id: None,
            related_pool_id: None,
            tx_hash: None,
        }
    }

    pub fn with_loan(mut self, loan_id: LoanId) -> Self {
        self.related_loan_id = Some(loan_id);
        self
    }

    pub fn with_pool(mut self, pool_id: u64) -> Self {
        self.related_pool_id = Some(pool_id);
        self
    }

    pub fn with_tx_hash(mut self, tx_hash: Option<TxHash>) -> Self {
        self.tx_hash = tx_hash;
        self
    }

    pub fn into_record(self, id: TransactionId, created_at: DateTime<Utc>) -> Transaction {
        Transaction {
            id,
            user_id: self.user_id,
            kind: self.kind,
            amount: self.amount,
            related_loan_id: self.related_loan_id,
            related_pool_id: self.related_pool_id,
            tx_hash: self.tx_hash,
            created_at,
        }
    }
}

/// 0x-prefixed 32-byte hex hash
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TxHash(String);

impl TxHash {
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let valid = raw.len() == 66
            && raw.starts_with("0x")
            && raw[2..].bytes().all(|b| b.is_ascii_hexdigit());
        if !valid {
            return Err(ProtocolError::MalformedTxHash(raw.to_string()));
        }
        Ok(Self(raw.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TxHash {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TxHash> for String {
    fn from(value: TxHash) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_hash_validation() {
        let good = format!("0x{}", "aB".repeat(32));
        assert_eq!(TxHash::parse(&good).unwrap().as_str(), good.to_ascii_lowercase());

        assert!(TxHash::parse("0x1234").is_err());
        assert!(TxHash::parse(&"a".repeat(66)).is_err());
        assert!(TxHash::parse(&format!("0x{}", "zz".repeat(32))).is_err());
    }

    #[test]
    fn test_serialized_type_field() {
        let record = NewTransaction::new(3, TransactionKind::Borrow, Amount::new(5))
            .with_loan(9)
            .into_record(1, Utc::now());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "borrow");
        assert_eq!(json["amount"], "5");
        assert_eq!(json["relatedLoanId"], 9);
    }
}
