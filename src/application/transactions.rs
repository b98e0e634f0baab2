use chrono::Utc;
use tracing::{info, instrument};

use crate::config::OverdraftPolicy;
use crate::domain::{
    AccountId, Cents, NewTransaction, Transaction, TransactionId, TransactionKind,
    TransactionUpdate,
};
use crate::storage::{Coordinator, RecordKind, Repository, Step, StoreError, Unit};

use super::{AccountService, LedgerError};

/// Records deposits and withdrawals. Every change to a transaction moves
/// its account's balance by the same signed amount, inside one unit of work
/// that holds the account lock.
#[derive(Clone)]
pub struct TransactionEngine {
    accounts: AccountService,
    repo: Repository,
    coordinator: Coordinator,
    overdraft: OverdraftPolicy,
}

impl TransactionEngine {
    pub fn new(repo: Repository, accounts: AccountService, overdraft: OverdraftPolicy) -> Self {
        Self {
            accounts,
            coordinator: repo.coordinator(),
            repo,
            overdraft,
        }
    }

    pub fn overdraft_policy(&self) -> OverdraftPolicy {
        self.overdraft
    }

    /// Record a transaction and apply it to its account.
    ///
    /// Overdrafts follow the engine's [`OverdraftPolicy`]: with `Allow` a
    /// withdrawal may take the balance below zero; with `Reject` it fails
    /// with `InsufficientFunds`. The check runs against the balance read
    /// under the account lock.
    #[instrument(skip(self), err)]
    pub async fn create(&self, new_tx: NewTransaction) -> Result<Transaction, LedgerError> {
        if new_tx.amount_cents <= 0 {
            return Err(LedgerError::InvalidAmount(
                "Amount must be positive".to_string(),
            ));
        }

        let account_id = new_tx.account_id;
        self.accounts
            .fetch_by_id(account_id)
            .await
            .map_err(|e| parent_error(e, account_id))?;

        let kind = TransactionKind::from_str(&new_tx.kind)
            .ok_or_else(|| LedgerError::InvalidType(new_tx.kind.clone()))?;

        let transaction = Transaction::new(account_id, kind, new_tx.amount_cents);

        let mut unit = self
            .coordinator
            .begin(Some(account_id))
            .await
            .map_err(|e| parent_error(LedgerError::from(e), account_id))?;
        unit.apply(Step::InsertTransaction(transaction.clone()))
            .await?;
        unit.apply(self.adjust(account_id, transaction.signed_amount()))
            .await?;
        let transaction = with_parent(&mut unit, transaction).await?;
        unit.commit().await?;

        info!(
            transaction = %transaction.id,
            account = %account_id,
            kind = %kind,
            amount = transaction.amount_cents,
            "transaction recorded"
        );
        Ok(transaction)
    }

    /// Fetch a transaction with its parent account populated.
    pub async fn fetch_by_id(&self, id: TransactionId) -> Result<Transaction, LedgerError> {
        let transaction = self
            .repo
            .get_transaction(id)
            .await?
            .ok_or_else(|| LedgerError::transaction_not_found(id))?;

        match self.repo.get_account(transaction.account_id).await? {
            Some(account) => Ok(transaction.with_account(account)),
            None => Ok(transaction),
        }
    }

    pub async fn list(&self) -> Result<Vec<Transaction>, LedgerError> {
        Ok(self.repo.list_transactions().await?)
    }

    /// Transactions owned by one account. Fails with `NotFound` for an
    /// unknown account rather than returning an empty list.
    pub async fn list_by_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<Transaction>, LedgerError> {
        self.accounts.fetch_by_id(account_id).await?;
        Ok(self.repo.find_by_parent(account_id).await?)
    }

    /// Correct a transaction's amount and move the account balance by the
    /// difference.
    #[instrument(skip(self), err)]
    pub async fn update(&self, update: TransactionUpdate) -> Result<Transaction, LedgerError> {
        if update.amount_cents <= 0 {
            return Err(LedgerError::InvalidAmount(
                "Amount must be positive".to_string(),
            ));
        }

        let (mut unit, current) = self.lock_owner(update.id).await?;

        let delta = current.kind.signed(update.amount_cents) - current.signed_amount();
        let mut corrected = current;
        corrected.amount_cents = update.amount_cents;
        corrected.updated_at = Utc::now();

        unit.apply(Step::SaveTransaction(corrected.clone())).await?;
        unit.apply(self.adjust(corrected.account_id, delta)).await?;
        let corrected = with_parent(&mut unit, corrected).await?;
        unit.commit().await?;

        info!(transaction = %corrected.id, delta, "transaction amount corrected");
        Ok(corrected)
    }

    /// Delete a transaction and take its effect off the account balance.
    /// Returns the deleted transaction.
    #[instrument(skip(self), err)]
    pub async fn delete(&self, id: TransactionId) -> Result<Transaction, LedgerError> {
        let (mut unit, current) = self.lock_owner(id).await?;

        unit.apply(Step::DeleteTransaction(id)).await?;
        unit.apply(self.adjust(current.account_id, -current.signed_amount()))
            .await?;
        let deleted = with_parent(&mut unit, current).await?;
        unit.commit().await?;

        info!(transaction = %id, account = %deleted.account_id, "transaction deleted");
        Ok(deleted)
    }

    /// Open a unit locked on the transaction's account and re-read the
    /// transaction under that lock.
    async fn lock_owner(&self, id: TransactionId) -> Result<(Unit, Transaction), LedgerError> {
        let existing = self
            .repo
            .get_transaction(id)
            .await?
            .ok_or_else(|| LedgerError::transaction_not_found(id))?;

        let mut unit = self
            .coordinator
            .begin(Some(existing.account_id))
            .await
            .map_err(|e| owner_error(e, id))?;
        // Deleted while we were waiting for the lock.
        let current = unit
            .transaction(id)
            .await?
            .ok_or_else(|| LedgerError::transaction_not_found(id))?;
        Ok((unit, current))
    }

    fn adjust(&self, account_id: AccountId, delta: Cents) -> Step {
        Step::AdjustBalance {
            account_id,
            delta,
            allow_negative: self.overdraft.allows_negative(),
        }
    }
}

/// Attach the account as seen inside the unit, after this unit's writes.
async fn with_parent(
    unit: &mut Unit,
    transaction: Transaction,
) -> Result<Transaction, LedgerError> {
    let account = unit
        .account(transaction.account_id)
        .await?
        .ok_or_else(|| LedgerError::account_not_found(transaction.account_id))?;
    Ok(transaction.with_account(account))
}

/// A missing account, seen while creating a transaction, is a missing parent.
fn parent_error(err: LedgerError, account_id: AccountId) -> LedgerError {
    match err {
        LedgerError::NotFound {
            kind: RecordKind::Account,
            ..
        } => LedgerError::ParentNotFound(account_id),
        other => other,
    }
}

/// The owning account vanished before its lock was taken: the cascade that
/// removed it removed the transaction too.
fn owner_error(err: StoreError, id: TransactionId) -> LedgerError {
    match err {
        StoreError::Missing {
            kind: RecordKind::Account,
            ..
        } => LedgerError::transaction_not_found(id),
        other => other.into(),
    }
}
