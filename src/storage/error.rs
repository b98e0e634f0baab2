use thiserror::Error;
use uuid::Uuid;

use crate::domain::{AccountId, Cents};

/// The two record kinds the ledger stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Account,
    Transaction,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Account => "account",
            RecordKind::Transaction => "transaction",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failure of a step inside a unit of work.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    Missing { kind: RecordKind, id: Uuid },

    #[error("account {account_id} would be overdrawn: balance {balance}, required {required}")]
    Overdrawn {
        account_id: AccountId,
        balance: Cents,
        required: Cents,
    },

    #[error("balance of account {account_id} out of range: {balance} + {delta}")]
    BalanceOverflow {
        account_id: AccountId,
        balance: Cents,
        delta: Cents,
    },

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    pub fn missing_account(id: AccountId) -> Self {
        StoreError::Missing {
            kind: RecordKind::Account,
            id,
        }
    }

    pub fn missing_transaction(id: Uuid) -> Self {
        StoreError::Missing {
            kind: RecordKind::Transaction,
            id,
        }
    }
}
