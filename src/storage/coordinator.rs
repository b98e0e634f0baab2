use anyhow::Context;
use sqlx::{Sqlite, SqlitePool};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{Account, AccountId, Cents, Transaction, TransactionId};

use super::repository as rows;
use super::StoreError;

/// One mutation inside a unit of work.
#[derive(Debug, Clone)]
pub enum Step {
    InsertAccount(Account),
    /// Overwrite holder, balance, opening balance and `updated_at`.
    SaveAccount(Account),
    DeleteAccount(AccountId),
    InsertTransaction(Transaction),
    /// Overwrite amount and `updated_at`.
    SaveTransaction(Transaction),
    DeleteTransaction(TransactionId),
    /// Delete every transaction owned by the account in one statement.
    DeleteTransactionsFor(AccountId),
    /// Add `delta` to the account balance. With `allow_negative` unset, a
    /// negative delta that leaves the balance below zero fails the step.
    /// A sum outside the `Cents` range fails the step without writing.
    AdjustBalance {
        account_id: AccountId,
        delta: Cents,
        allow_negative: bool,
    },
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::InsertAccount(_) => "insert_account",
            Step::SaveAccount(_) => "save_account",
            Step::DeleteAccount(_) => "delete_account",
            Step::InsertTransaction(_) => "insert_transaction",
            Step::SaveTransaction(_) => "save_transaction",
            Step::DeleteTransaction(_) => "delete_transaction",
            Step::DeleteTransactionsFor(_) => "delete_transactions_for",
            Step::AdjustBalance { .. } => "adjust_balance",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Applied,
    /// Number of rows removed by a batch delete.
    Deleted(u64),
    /// Balance after an adjustment.
    Balance(Cents),
}

/// Runs groups of steps as single database transactions.
///
/// A unit scoped to an account locks that account's row with its first
/// statement and keeps the lock until commit or rollback, so read-modify-write
/// sequences on the same account never interleave.
#[derive(Clone)]
pub struct Coordinator {
    pool: SqlitePool,
}

impl Coordinator {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a unit. With a scope, the account is locked before this returns;
    /// a missing account fails with `StoreError::Missing`.
    pub async fn begin(&self, scope: Option<AccountId>) -> Result<Unit, StoreError> {
        let tx = self.pool.begin().await.context("Failed to begin unit")?;

        let mut unit = Unit {
            tx,
            id: Uuid::new_v4(),
            scope,
            applied: 0,
        };

        if let Some(account_id) = scope {
            if !rows::lock_account(&mut *unit.tx, account_id).await? {
                debug!(unit = %unit.id, account = %account_id, "lock target missing");
                return Err(StoreError::missing_account(account_id));
            }
        }

        debug!(unit = %unit.id, scope = ?scope, "unit opened");
        Ok(unit)
    }

    /// Apply `steps` in order and commit. If any step fails, nothing is
    /// kept and that step's error is returned as is.
    pub async fn run(
        &self,
        scope: Option<AccountId>,
        steps: Vec<Step>,
    ) -> Result<Vec<StepOutcome>, StoreError> {
        let mut unit = self.begin(scope).await?;
        let mut outcomes = Vec::with_capacity(steps.len());
        for step in steps {
            outcomes.push(unit.apply(step).await?);
        }
        unit.commit().await?;
        Ok(outcomes)
    }
}

/// An open unit of work. Dropping it without calling [`Unit::commit`]
/// rolls back every step applied so far, which also covers a caller that
/// abandons the future mid-way.
pub struct Unit {
    tx: sqlx::Transaction<'static, Sqlite>,
    id: Uuid,
    scope: Option<AccountId>,
    applied: usize,
}

impl Unit {
    pub fn scope(&self) -> Option<AccountId> {
        self.scope
    }

    /// Read an account inside the unit, seeing this unit's own writes.
    pub async fn account(&mut self, id: AccountId) -> Result<Option<Account>, StoreError> {
        Ok(rows::fetch_account(&mut *self.tx, id).await?)
    }

    /// Read a transaction inside the unit, seeing this unit's own writes.
    pub async fn transaction(
        &mut self,
        id: TransactionId,
    ) -> Result<Option<Transaction>, StoreError> {
        Ok(rows::fetch_transaction(&mut *self.tx, id).await?)
    }

    pub async fn apply(&mut self, step: Step) -> Result<StepOutcome, StoreError> {
        let name = step.name();
        match self.execute(step).await {
            Ok(outcome) => {
                self.applied += 1;
                debug!(unit = %self.id, step = name, ?outcome, "step applied");
                Ok(outcome)
            }
            Err(e) => {
                warn!(unit = %self.id, step = name, error = %e, "step failed, rolling back unit");
                Err(e)
            }
        }
    }

    async fn execute(&mut self, step: Step) -> Result<StepOutcome, StoreError> {
        let conn = &mut *self.tx;
        match step {
            Step::InsertAccount(account) => {
                rows::insert_account(conn, &account).await?;
                Ok(StepOutcome::Applied)
            }
            Step::SaveAccount(account) => {
                if !rows::save_account(conn, &account).await? {
                    return Err(StoreError::missing_account(account.id));
                }
                Ok(StepOutcome::Applied)
            }
            Step::DeleteAccount(id) => {
                if !rows::delete_account(conn, id).await? {
                    return Err(StoreError::missing_account(id));
                }
                Ok(StepOutcome::Applied)
            }
            Step::InsertTransaction(transaction) => {
                rows::insert_transaction(conn, &transaction).await?;
                Ok(StepOutcome::Applied)
            }
            Step::SaveTransaction(transaction) => {
                if !rows::save_transaction(conn, &transaction).await? {
                    return Err(StoreError::missing_transaction(transaction.id));
                }
                Ok(StepOutcome::Applied)
            }
            Step::DeleteTransaction(id) => {
                if !rows::delete_transaction(conn, id).await? {
                    return Err(StoreError::missing_transaction(id));
                }
                Ok(StepOutcome::Applied)
            }
            Step::DeleteTransactionsFor(account_id) => {
                let deleted = rows::delete_transactions_for_account(conn, account_id).await?;
                Ok(StepOutcome::Deleted(deleted))
            }
            Step::AdjustBalance {
                account_id,
                delta,
                allow_negative,
            } => {
                let current = rows::fetch_account(&mut *conn, account_id)
                    .await?
                    .ok_or_else(|| StoreError::missing_account(account_id))?
                    .balance_cents;

                let balance = current
                    .checked_add(delta)
                    .ok_or(StoreError::BalanceOverflow {
                        account_id,
                        balance: current,
                        delta,
                    })?;

                if !allow_negative && delta < 0 && balance < 0 {
                    return Err(StoreError::Overdrawn {
                        account_id,
                        balance: current,
                        required: -delta,
                    });
                }

                if !rows::set_balance(conn, account_id, balance).await? {
                    return Err(StoreError::missing_account(account_id));
                }
                Ok(StepOutcome::Balance(balance))
            }
        }
    }

    /// Make every applied step visible to other readers at once.
    pub async fn commit(self) -> Result<(), StoreError> {
        let Unit {
            tx,
            id,
            scope,
            applied,
        } = self;
        tx.commit().await.context("Failed to commit unit")?;
        debug!(unit = %id, scope = ?scope, steps = applied, "unit committed");
        Ok(())
    }

    /// Discard every applied step.
    pub async fn rollback(self) -> Result<(), StoreError> {
        let Unit {
            tx, id, applied, ..
        } = self;
        tx.rollback().await.context("Failed to roll back unit")?;
        debug!(unit = %id, steps = applied, "unit rolled back");
        Ok(())
    }
}
