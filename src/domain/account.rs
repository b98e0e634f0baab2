use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Cents;

pub type AccountId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Savings,
    Checking,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Savings => "savings",
            AccountType::Checking => "checking",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "savings" => Some(AccountType::Savings),
            "checking" => Some(AccountType::Checking),
            _ => None,
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub holder: String,
    pub account_type: AccountType,
    /// Current net value. Changed by applying transactions.
    pub balance_cents: Cents,
    /// Balance the account was opened with, plus any direct overrides.
    /// `balance_cents - opening_balance_cents` is always the signed sum of
    /// the account's transactions.
    pub opening_balance_cents: Cents,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(holder: String, account_type: AccountType, opening_balance_cents: Cents) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            holder,
            account_type,
            balance_cents: opening_balance_cents,
            opening_balance_cents,
            created_at: now,
            updated_at: now,
        }
    }

    /// Net effect of all transactions currently applied to this account.
    pub fn transaction_total(&self) -> Cents {
        self.balance_cents.saturating_sub(self.opening_balance_cents)
    }
}

/// Caller-supplied values for a new account. The account type is raw text
/// so that validation happens in one place.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAccount {
    pub holder: String,
    pub account_type: String,
    #[serde(default)]
    pub balance_cents: Cents,
}

impl NewAccount {
    pub fn new(holder: impl Into<String>, account_type: impl Into<String>) -> Self {
        Self {
            holder: holder.into(),
            account_type: account_type.into(),
            balance_cents: 0,
        }
    }

    pub fn with_balance(mut self, balance_cents: Cents) -> Self {
        self.balance_cents = balance_cents;
        self
    }
}

/// The mutable fields of an account. A `None` balance leaves it untouched.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountUpdate {
    pub id: AccountId,
    pub holder: String,
    pub balance_cents: Option<Cents>,
}

impl AccountUpdate {
    pub fn holder(id: AccountId, holder: impl Into<String>) -> Self {
        Self {
            id,
            holder: holder.into(),
            balance_cents: None,
        }
    }

    pub fn with_balance(mut self, balance_cents: Cents) -> Self {
        self.balance_cents = Some(balance_cents);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_type_parsing_is_case_insensitive() {
        assert_eq!(AccountType::from_str("Savings"), Some(AccountType::Savings));
        assert_eq!(AccountType::from_str(" CHECKING "), Some(AccountType::Checking));
        assert_eq!(AccountType::from_str("brokerage"), None);
        assert_eq!(AccountType::from_str(""), None);
    }

    #[test]
    fn test_new_account_starts_at_opening_balance() {
        let account = Account::new("Ada".into(), AccountType::Savings, 2500);
        assert_eq!(account.balance_cents, 2500);
        assert_eq!(account.opening_balance_cents, 2500);
        assert_eq!(account.transaction_total(), 0);
        assert_eq!(account.created_at, account.updated_at);
    }

    #[test]
    fn test_transaction_total_tracks_applied_delta() {
        let mut account = Account::new("Ada".into(), AccountType::Checking, 1000);
        account.balance_cents += 400;
        assert_eq!(account.transaction_total(), 400);
    }
}
