use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::domain::{
    build_audit, Account, AccountId, AccountType, AccountUpdate, LedgerAudit, NewAccount,
    Transaction,
};
use crate::storage::{Coordinator, Repository, Step, StepOutcome};

use super::LedgerError;

/// An account together with the transactions it owns.
#[derive(Debug, Clone, Serialize)]
pub struct AccountStatement {
    pub account: Account,
    pub transactions: Vec<Transaction>,
}

/// CRUD over accounts. Deleting an account always takes its transactions
/// with it, in the same unit of work.
#[derive(Clone)]
pub struct AccountService {
    repo: Repository,
    coordinator: Coordinator,
}

impl AccountService {
    pub fn new(repo: Repository) -> Self {
        Self {
            coordinator: repo.coordinator(),
            repo,
        }
    }

    /// Validate and persist a new account. The returned account carries the
    /// assigned id.
    #[instrument(skip(self, new_account), fields(holder = %new_account.holder), err)]
    pub async fn create(&self, new_account: NewAccount) -> Result<Account, LedgerError> {
        let holder = validate_holder(&new_account.holder)?;

        if new_account.account_type.trim().is_empty() {
            return Err(LedgerError::InvalidAccount(
                "account type must not be empty".to_string(),
            ));
        }
        let account_type = AccountType::from_str(&new_account.account_type).ok_or_else(|| {
            LedgerError::InvalidAccount(format!(
                "unknown account type {:?} (expected savings or checking)",
                new_account.account_type
            ))
        })?;

        if new_account.balance_cents < 0 {
            return Err(LedgerError::InvalidAccount(
                "opening balance must not be negative".to_string(),
            ));
        }

        let account = Account::new(holder, account_type, new_account.balance_cents);
        self.coordinator
            .run(None, vec![Step::InsertAccount(account.clone())])
            .await?;

        info!(account = %account.id, "account created");
        Ok(account)
    }

    pub async fn fetch_by_id(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.repo
            .get_account(id)
            .await?
            .ok_or_else(|| LedgerError::account_not_found(id))
    }

    pub async fn fetch_with_transactions(
        &self,
        id: AccountId,
    ) -> Result<AccountStatement, LedgerError> {
        let account = self.fetch_by_id(id).await?;
        let transactions = self.repo.find_by_parent(id).await?;
        Ok(AccountStatement {
            account,
            transactions,
        })
    }

    pub async fn list(&self) -> Result<Vec<Account>, LedgerError> {
        Ok(self.repo.list_accounts().await?)
    }

    /// Overwrite the holder and, when given, the balance.
    ///
    /// A balance override is the one way to set a balance without a
    /// transaction. The opening balance moves by the same amount, so the
    /// account still equals its opening balance plus its transactions.
    #[instrument(skip(self), fields(account = %update.id), err)]
    pub async fn update(&self, update: AccountUpdate) -> Result<Account, LedgerError> {
        let holder = validate_holder(&update.holder)?;
        if let Some(balance) = update.balance_cents {
            if balance < 0 {
                return Err(LedgerError::InvalidAccount(
                    "balance must not be negative".to_string(),
                ));
            }
        }

        let mut unit = self.coordinator.begin(Some(update.id)).await?;
        let mut account = unit
            .account(update.id)
            .await?
            .ok_or_else(|| LedgerError::account_not_found(update.id))?;

        account.holder = holder;
        if let Some(balance) = update.balance_cents {
            account.opening_balance_cents = balance
                .checked_sub(account.balance_cents)
                .and_then(|shift| account.opening_balance_cents.checked_add(shift))
                .ok_or_else(|| {
                    LedgerError::InvalidAccount(format!(
                        "balance override to {balance} leaves the supported range"
                    ))
                })?;
            account.balance_cents = balance;
        }
        account.updated_at = Utc::now();

        unit.apply(Step::SaveAccount(account.clone())).await?;
        unit.commit().await?;

        if update.balance_cents.is_some() {
            info!(account = %account.id, balance = account.balance_cents, "balance overridden");
        }
        Ok(account)
    }

    /// Delete an account and every transaction it owns, or nothing at all.
    /// Returns the number of transactions removed.
    #[instrument(skip(self), err)]
    pub async fn delete(&self, id: AccountId) -> Result<u64, LedgerError> {
        let outcomes = self
            .coordinator
            .run(
                Some(id),
                vec![Step::DeleteTransactionsFor(id), Step::DeleteAccount(id)],
            )
            .await?;

        let removed = match outcomes.first() {
            Some(StepOutcome::Deleted(n)) => *n,
            _ => 0,
        };
        info!(account = %id, transactions = removed, "account deleted");
        Ok(removed)
    }

    /// Recompute every balance from its transactions and report accounts
    /// whose stored balance disagrees.
    pub async fn audit(&self) -> Result<LedgerAudit, LedgerError> {
        let accounts = self.repo.list_accounts().await?;
        let sums = self.repo.transaction_sums().await?;
        let transaction_count = self.repo.count_transactions().await?;

        let audit = build_audit(&accounts, &sums, transaction_count);
        for drift in &audit.drift {
            warn!(
                account = %drift.account_id,
                stored = drift.stored_cents,
                expected = drift.expected_cents,
                "balance drift"
            );
        }
        Ok(audit)
    }
}

fn validate_holder(holder: &str) -> Result<String, LedgerError> {
    let holder = holder.trim();
    if holder.is_empty() {
        return Err(LedgerError::InvalidAccount(
            "holder must not be empty".to_string(),
        ));
    }
    Ok(holder.to_string())
}
