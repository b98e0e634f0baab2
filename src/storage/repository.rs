use std::collections::HashMap;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Executor, Row, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::config::LedgerConfig;
use crate::domain::{
    Account, AccountId, AccountType, Cents, Transaction, TransactionId, TransactionKind,
};

use super::{Coordinator, MIGRATION_001_INITIAL};

/// Read access to accounts and transactions, and the factory for units of
/// work. Writes are only reachable through a [`Coordinator`].
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to an existing database.
    pub async fn connect(config: &LedgerConfig) -> Result<Self> {
        Self::open(config, false).await
    }

    /// Initialize a database (create if missing + migrate).
    pub async fn init(config: &LedgerConfig) -> Result<Self> {
        let repo = Self::open(config, true).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    async fn open(config: &LedgerConfig, create_if_missing: bool) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.database_url())
            .context("Invalid database path")?
            .create_if_missing(create_if_missing)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(config.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        debug!(path = %config.database_path, "database connected");
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// A coordinator sharing this repository's pool.
    pub fn coordinator(&self) -> Coordinator {
        Coordinator::new(self.pool.clone())
    }

    /// Close every pooled connection. Outstanding units finish first.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    // ========================
    // Account reads
    // ========================

    pub async fn get_account(&self, id: AccountId) -> Result<Option<Account>> {
        fetch_account(&self.pool, id).await
    }

    /// List all accounts, oldest first.
    pub async fn list_accounts(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query(
            r#"
            SELECT id, holder, account_type, balance_cents, opening_balance_cents, created_at, updated_at
            FROM accounts
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list accounts")?;

        rows.iter().map(row_to_account).collect()
    }

    // ========================
    // Transaction reads
    // ========================

    pub async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        fetch_transaction(&self.pool, id).await
    }

    pub async fn list_transactions(&self) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_id, kind, amount_cents, created_at, updated_at
            FROM transactions
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list transactions")?;

        rows.iter().map(row_to_transaction).collect()
    }

    /// All transactions owned by an account. Returns an empty list for an
    /// unknown account; existence is the caller's concern.
    pub async fn find_by_parent(&self, account_id: AccountId) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_id, kind, amount_cents, created_at, updated_at
            FROM transactions
            WHERE account_id = ?
            ORDER BY created_at, id
            "#,
        )
        .bind(account_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list transactions for account")?;

        rows.iter().map(row_to_transaction).collect()
    }

    /// Signed transaction total per account, computed in SQL.
    /// Accounts with no transactions are absent from the map.
    pub async fn transaction_sums(&self) -> Result<HashMap<AccountId, Cents>> {
        let rows = sqlx::query(
            r#"
            SELECT
                account_id,
                SUM(CASE WHEN kind = 'deposit' THEN amount_cents ELSE -amount_cents END) AS total
            FROM transactions
            GROUP BY account_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to sum transactions")?;

        let mut sums = HashMap::with_capacity(rows.len());
        for row in rows {
            let account_id: String = row.try_get("account_id")?;
            let account_id = Uuid::parse_str(&account_id).context("Invalid account ID")?;
            sums.insert(account_id, row.try_get::<i64, _>("total")?);
        }
        Ok(sums)
    }

    pub async fn count_transactions(&self) -> Result<i64> {
        let count = sqlx::query("SELECT COUNT(*) AS count FROM transactions")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count transactions")?
            .try_get("count")?;
        Ok(count)
    }
}

// ========================
// Row access shared by the pool and open units
// ========================

pub(crate) async fn fetch_account<'e, E>(executor: E, id: AccountId) -> Result<Option<Account>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"
        SELECT id, holder, account_type, balance_cents, opening_balance_cents, created_at, updated_at
        FROM accounts
        WHERE id = ?
        "#,
    )
    .bind(id.to_string())
    .fetch_optional(executor)
    .await
    .context("Failed to fetch account")?;

    row.as_ref().map(row_to_account).transpose()
}

pub(crate) async fn fetch_transaction<'e, E>(
    executor: E,
    id: TransactionId,
) -> Result<Option<Transaction>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"
        SELECT id, account_id, kind, amount_cents, created_at, updated_at
        FROM transactions
        WHERE id = ?
        "#,
    )
    .bind(id.to_string())
    .fetch_optional(executor)
    .await
    .context("Failed to fetch transaction")?;

    row.as_ref().map(row_to_transaction).transpose()
}

// ========================
// Write primitives, only called by the coordinator
// ========================

/// Touch the account row so this connection holds the write lock for the
/// rest of the unit. Returns false if the account does not exist.
pub(crate) async fn lock_account(conn: &mut SqliteConnection, id: AccountId) -> Result<bool> {
    let result = sqlx::query("UPDATE accounts SET revision = revision + 1 WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await
        .context("Failed to lock account")?;
    Ok(result.rows_affected() == 1)
}

pub(crate) async fn insert_account(conn: &mut SqliteConnection, account: &Account) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO accounts (id, holder, account_type, balance_cents, opening_balance_cents, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(account.id.to_string())
    .bind(&account.holder)
    .bind(account.account_type.as_str())
    .bind(account.balance_cents)
    .bind(account.opening_balance_cents)
    .bind(account.created_at.to_rfc3339())
    .bind(account.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await
    .context("Failed to save account")?;
    Ok(())
}

/// Overwrite the mutable fields of an account. `created_at`, the id and the
/// type are never written. Returns false if the account does not exist.
pub(crate) async fn save_account(conn: &mut SqliteConnection, account: &Account) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE accounts
        SET holder = ?, balance_cents = ?, opening_balance_cents = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&account.holder)
    .bind(account.balance_cents)
    .bind(account.opening_balance_cents)
    .bind(account.updated_at.to_rfc3339())
    .bind(account.id.to_string())
    .execute(&mut *conn)
    .await
    .context("Failed to update account")?;
    Ok(result.rows_affected() == 1)
}

/// Overwrite the balance with a value computed under the unit's lock.
/// Returns false if the account does not exist.
pub(crate) async fn set_balance(
    conn: &mut SqliteConnection,
    id: AccountId,
    balance_cents: Cents,
) -> Result<bool> {
    let result = sqlx::query("UPDATE accounts SET balance_cents = ?, updated_at = ? WHERE id = ?")
        .bind(balance_cents)
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&mut *conn)
        .await
        .context("Failed to update balance")?;
    Ok(result.rows_affected() == 1)
}

pub(crate) async fn delete_account(conn: &mut SqliteConnection, id: AccountId) -> Result<bool> {
    let result = sqlx::query("DELETE FROM accounts WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await
        .context("Failed to delete account")?;
    Ok(result.rows_affected() == 1)
}

pub(crate) async fn insert_transaction(
    conn: &mut SqliteConnection,
    transaction: &Transaction,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO transactions (id, account_id, kind, amount_cents, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(transaction.id.to_string())
    .bind(transaction.account_id.to_string())
    .bind(transaction.kind.as_str())
    .bind(transaction.amount_cents)
    .bind(transaction.created_at.to_rfc3339())
    .bind(transaction.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await
    .context("Failed to save transaction")?;
    Ok(())
}

/// Persist an amount correction. Kind and account are immutable and are
/// not written. Returns false if the transaction does not exist.
pub(crate) async fn save_transaction(
    conn: &mut SqliteConnection,
    transaction: &Transaction,
) -> Result<bool> {
    let result = sqlx::query("UPDATE transactions SET amount_cents = ?, updated_at = ? WHERE id = ?")
        .bind(transaction.amount_cents)
        .bind(transaction.updated_at.to_rfc3339())
        .bind(transaction.id.to_string())
        .execute(&mut *conn)
        .await
        .context("Failed to update transaction")?;
    Ok(result.rows_affected() == 1)
}

pub(crate) async fn delete_transaction(
    conn: &mut SqliteConnection,
    id: TransactionId,
) -> Result<bool> {
    let result = sqlx::query("DELETE FROM transactions WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await
        .context("Failed to delete transaction")?;
    Ok(result.rows_affected() == 1)
}

/// Delete every transaction of an account in one statement.
pub(crate) async fn delete_transactions_for_account(
    conn: &mut SqliteConnection,
    account_id: AccountId,
) -> Result<u64> {
    let result = sqlx::query("DELETE FROM transactions WHERE account_id = ?")
        .bind(account_id.to_string())
        .execute(&mut *conn)
        .await
        .context("Failed to delete transactions for account")?;
    Ok(result.rows_affected())
}

fn parse_timestamp(value: &str, what: &'static str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("Invalid {what} timestamp"))?
        .with_timezone(&Utc))
}

fn row_to_account(row: &SqliteRow) -> Result<Account> {
    let id_str: String = row.try_get("id")?;
    let account_type_str: String = row.try_get("account_type")?;
    let created_at_str: String = row.try_get("created_at")?;
    let updated_at_str: String = row.try_get("updated_at")?;

    Ok(Account {
        id: Uuid::parse_str(&id_str).context("Invalid account ID")?,
        holder: row.try_get("holder")?,
        account_type: AccountType::from_str(&account_type_str)
            .ok_or_else(|| anyhow::anyhow!("Invalid account type: {}", account_type_str))?,
        balance_cents: row.try_get("balance_cents")?,
        opening_balance_cents: row.try_get("opening_balance_cents")?,
        created_at: parse_timestamp(&created_at_str, "created_at")?,
        updated_at: parse_timestamp(&updated_at_str, "updated_at")?,
    })
}

fn row_to_transaction(row: &SqliteRow) -> Result<Transaction> {
    let id_str: String = row.try_get("id")?;
    let account_id_str: String = row.try_get("account_id")?;
    let kind_str: String = row.try_get("kind")?;
    let created_at_str: String = row.try_get("created_at")?;
    let updated_at_str: String = row.try_get("updated_at")?;

    Ok(Transaction {
        id: Uuid::parse_str(&id_str).context("Invalid transaction ID")?,
        account_id: Uuid::parse_str(&account_id_str).context("Invalid account ID")?,
        kind: TransactionKind::from_str(&kind_str)
            .ok_or_else(|| anyhow::anyhow!("Invalid transaction kind: {}", kind_str))?,
        amount_cents: row.try_get("amount_cents")?,
        created_at: parse_timestamp(&created_at_str, "created_at")?,
        updated_at: parse_timestamp(&updated_at_str, "updated_at")?,
        account: None,
    })
}
