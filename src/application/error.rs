use thiserror::Error;
use uuid::Uuid;

use crate::domain::{AccountId, Cents, TransactionId};
use crate::storage::{RecordKind, StoreError};

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: RecordKind, id: Uuid },

    /// A transaction names an account that does not exist.
    #[error("Parent account not found: {0}")]
    ParentNotFound(AccountId),

    #[error("Invalid transaction type: {0:?} (expected deposit or withdrawal)")]
    InvalidType(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid account: {0}")]
    InvalidAccount(String),

    #[error("Insufficient funds in account {account_id}: balance {balance}, required {required}")]
    InsufficientFunds {
        account_id: AccountId,
        balance: Cents,
        required: Cents,
    },

    #[error("Storage failure: {0:#}")]
    StorageFailure(#[from] anyhow::Error),
}

impl LedgerError {
    pub fn account_not_found(id: AccountId) -> Self {
        LedgerError::NotFound {
            kind: RecordKind::Account,
            id,
        }
    }

    pub fn transaction_not_found(id: TransactionId) -> Self {
        LedgerError::NotFound {
            kind: RecordKind::Transaction,
            id,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, LedgerError::NotFound { .. })
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Missing { kind, id } => LedgerError::NotFound { kind, id },
            StoreError::Overdrawn {
                account_id,
                balance,
                required,
            } => LedgerError::InsufficientFunds {
                account_id,
                balance,
                required,
            },
            StoreError::BalanceOverflow {
                account_id,
                balance,
                delta,
            } => LedgerError::InvalidAmount(format!(
                "balance of account {account_id} would leave the supported range ({balance} + {delta})"
            )),
            StoreError::Backend(e) => LedgerError::StorageFailure(e),
        }
    }
}
