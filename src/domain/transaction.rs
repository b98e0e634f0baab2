use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Account, AccountId, Cents};

pub type TransactionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdrawal => "withdrawal",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "deposit" => Some(TransactionKind::Deposit),
            "withdrawal" => Some(TransactionKind::Withdrawal),
            _ => None,
        }
    }

    /// Apply the kind's sign to a positive amount.
    pub fn signed(&self, amount_cents: Cents) -> Cents {
        match self {
            TransactionKind::Deposit => amount_cents,
            TransactionKind::Withdrawal => -amount_cents,
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A deposit into or withdrawal from a single account.
/// The kind and the owning account never change; the amount may be corrected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub account_id: AccountId,
    pub kind: TransactionKind,
    /// Always positive
    pub amount_cents: Cents,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Parent account as of the last read. Not persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<Account>,
}

impl Transaction {
    pub fn new(account_id: AccountId, kind: TransactionKind, amount_cents: Cents) -> Self {
        assert!(amount_cents > 0, "Transaction amount must be positive");
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            account_id,
            kind,
            amount_cents,
            created_at: now,
            updated_at: now,
            account: None,
        }
    }

    pub fn with_account(mut self, account: Account) -> Self {
        self.account = Some(account);
        self
    }

    /// Contribution of this transaction to its account's balance.
    pub fn signed_amount(&self) -> Cents {
        self.kind.signed(self.amount_cents)
    }
}

/// Caller-supplied values for a new transaction. `kind` is raw text and is
/// validated by the engine.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTransaction {
    pub account_id: AccountId,
    pub kind: String,
    pub amount_cents: Cents,
}

impl NewTransaction {
    pub fn new(account_id: AccountId, kind: impl Into<String>, amount_cents: Cents) -> Self {
        Self {
            account_id,
            kind: kind.into(),
            amount_cents,
        }
    }

    pub fn deposit(account_id: AccountId, amount_cents: Cents) -> Self {
        Self::new(account_id, TransactionKind::Deposit.as_str(), amount_cents)
    }

    pub fn withdrawal(account_id: AccountId, amount_cents: Cents) -> Self {
        Self::new(account_id, TransactionKind::Withdrawal.as_str(), amount_cents)
    }
}

/// Amount correction for an existing transaction.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TransactionUpdate {
    pub id: TransactionId,
    pub amount_cents: Cents,
}
