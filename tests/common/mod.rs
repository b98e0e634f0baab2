// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use bursar::application::Ledger;
use bursar::config::{LedgerConfig, OverdraftPolicy};
use bursar::domain::{Account, NewAccount};
use tempfile::TempDir;

/// Helper to create a ledger over a temporary database
pub async fn test_ledger() -> Result<(Ledger, TempDir)> {
    test_ledger_with(OverdraftPolicy::Allow).await
}

/// Same as [`test_ledger`] with an explicit overdraft policy
pub async fn test_ledger_with(overdraft: OverdraftPolicy) -> Result<(Ledger, TempDir)> {
    let temp_dir = TempDir::new()?;
    let config = test_config(&temp_dir).with_overdraft(overdraft);
    let ledger = Ledger::init(&config).await?;
    Ok((ledger, temp_dir))
}

pub fn test_config(temp_dir: &TempDir) -> LedgerConfig {
    let db_path = temp_dir.path().join("test.db");
    LedgerConfig::new(db_path.to_str().unwrap())
}

/// Open an account with the given opening balance in cents
pub async fn open_account(
    ledger: &Ledger,
    holder: &str,
    account_type: &str,
    balance_cents: i64,
) -> Result<Account> {
    let account = ledger
        .accounts
        .create(NewAccount::new(holder, account_type).with_balance(balance_cents))
        .await?;
    Ok(account)
}
