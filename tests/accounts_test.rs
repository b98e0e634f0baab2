mod common;

use anyhow::Result;
use bursar::application::LedgerError;
use bursar::domain::{AccountType, AccountUpdate, NewAccount, NewTransaction};
use common::{open_account, test_ledger};
use uuid::Uuid;

#[tokio::test]
async fn test_create_account_assigns_id() -> Result<()> {
    let (ledger, _temp) = test_ledger().await?;

    let account = open_account(&ledger, "Alice", "savings", 10000).await?;
    assert_eq!(account.holder, "Alice");
    assert_eq!(account.account_type, AccountType::Savings);
    assert_eq!(account.balance_cents, 10000);
    assert_eq!(account.opening_balance_cents, 10000);

    let fetched = ledger.accounts.fetch_by_id(account.id).await?;
    assert_eq!(fetched.id, account.id);
    assert_eq!(fetched.holder, "Alice");
    assert_eq!(fetched.balance_cents, 10000);

    Ok(())
}

#[tokio::test]
async fn test_create_account_defaults_to_zero_balance() -> Result<()> {
    let (ledger, _temp) = test_ledger().await?;

    let account = ledger
        .accounts
        .create(NewAccount::new("Bob", "Checking"))
        .await?;
    assert_eq!(account.account_type, AccountType::Checking);
    assert_eq!(account.balance_cents, 0);

    Ok(())
}

#[tokio::test]
async fn test_create_account_rejects_invalid_input() -> Result<()> {
    let (ledger, _temp) = test_ledger().await?;

    let result = ledger.accounts.create(NewAccount::new("  ", "savings")).await;
    assert!(matches!(result, Err(LedgerError::InvalidAccount(_))));

    let result = ledger.accounts.create(NewAccount::new("Carol", "")).await;
    assert!(matches!(result, Err(LedgerError::InvalidAccount(_))));

    let result = ledger
        .accounts
        .create(NewAccount::new("Carol", "brokerage"))
        .await;
    assert!(matches!(result, Err(LedgerError::InvalidAccount(_))));

    let result = ledger
        .accounts
        .create(NewAccount::new("Carol", "savings").with_balance(-1))
        .await;
    assert!(matches!(result, Err(LedgerError::InvalidAccount(_))));

    // Nothing was stored
    assert!(ledger.accounts.list().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_fetch_unknown_account_is_not_found() -> Result<()> {
    let (ledger, _temp) = test_ledger().await?;

    let err = ledger.accounts.fetch_by_id(Uuid::new_v4()).await.unwrap_err();
    assert!(err.is_not_found());

    let err = ledger
        .accounts
        .fetch_with_transactions(Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    Ok(())
}

#[tokio::test]
async fn test_list_accounts() -> Result<()> {
    let (ledger, _temp) = test_ledger().await?;

    assert!(ledger.accounts.list().await?.is_empty());

    open_account(&ledger, "Alice", "savings", 0).await?;
    open_account(&ledger, "Bob", "checking", 500).await?;

    let accounts = ledger.accounts.list().await?;
    assert_eq!(accounts.len(), 2);
    let mut holders: Vec<_> = accounts.iter().map(|a| a.holder.as_str()).collect();
    holders.sort();
    assert_eq!(holders, vec!["Alice", "Bob"]);

    Ok(())
}

#[tokio::test]
async fn test_fetch_with_transactions() -> Result<()> {
    let (ledger, _temp) = test_ledger().await?;

    let account = open_account(&ledger, "Alice", "checking", 0).await?;
    let other = open_account(&ledger, "Bob", "checking", 0).await?;
    ledger
        .transactions
        .create(NewTransaction::deposit(account.id, 2500))
        .await?;
    ledger
        .transactions
        .create(NewTransaction::withdrawal(account.id, 500))
        .await?;
    ledger
        .transactions
        .create(NewTransaction::deposit(other.id, 100))
        .await?;

    let statement = ledger.accounts.fetch_with_transactions(account.id).await?;
    assert_eq!(statement.account.balance_cents, 2000);
    assert_eq!(statement.transactions.len(), 2);
    assert!(statement
        .transactions
        .iter()
        .all(|t| t.account_id == account.id));

    Ok(())
}

#[tokio::test]
async fn test_update_holder_keeps_balance() -> Result<()> {
    let (ledger, _temp) = test_ledger().await?;

    let account = open_account(&ledger, "Alice", "savings", 7500).await?;
    let updated = ledger
        .accounts
        .update(AccountUpdate::holder(account.id, "Alice Smith"))
        .await?;

    assert_eq!(updated.holder, "Alice Smith");
    assert_eq!(updated.balance_cents, 7500);
    assert_eq!(updated.created_at, account.created_at);

    let fetched = ledger.accounts.fetch_by_id(account.id).await?;
    assert_eq!(fetched.holder, "Alice Smith");

    Ok(())
}

#[tokio::test]
async fn test_balance_override_keeps_ledger_consistent() -> Result<()> {
    let (ledger, _temp) = test_ledger().await?;

    let account = open_account(&ledger, "Alice", "checking", 1000).await?;
    ledger
        .transactions
        .create(NewTransaction::deposit(account.id, 500))
        .await?;

    let updated = ledger
        .accounts
        .update(AccountUpdate::holder(account.id, "Alice").with_balance(4000))
        .await?;
    assert_eq!(updated.balance_cents, 4000);
    assert_eq!(updated.opening_balance_cents, 3500);

    let audit = ledger.accounts.audit().await?;
    assert!(audit.is_consistent());

    Ok(())
}

#[tokio::test]
async fn test_update_rejects_invalid_input() -> Result<()> {
    let (ledger, _temp) = test_ledger().await?;

    let account = open_account(&ledger, "Alice", "savings", 100).await?;

    let result = ledger
        .accounts
        .update(AccountUpdate::holder(account.id, ""))
        .await;
    assert!(matches!(result, Err(LedgerError::InvalidAccount(_))));

    let result = ledger
        .accounts
        .update(AccountUpdate::holder(account.id, "Alice").with_balance(-5))
        .await;
    assert!(matches!(result, Err(LedgerError::InvalidAccount(_))));

    let result = ledger
        .accounts
        .update(AccountUpdate::holder(Uuid::new_v4(), "Nobody"))
        .await;
    assert!(result.unwrap_err().is_not_found());

    let fetched = ledger.accounts.fetch_by_id(account.id).await?;
    assert_eq!(fetched.holder, "Alice");
    assert_eq!(fetched.balance_cents, 100);

    Ok(())
}

#[tokio::test]
async fn test_delete_account_cascades() -> Result<()> {
    let (ledger, _temp) = test_ledger().await?;

    let account = open_account(&ledger, "Alice", "savings", 0).await?;
    let other = open_account(&ledger, "Bob", "savings", 0).await?;
    for amount in [100, 200, 300] {
        ledger
            .transactions
            .create(NewTransaction::deposit(account.id, amount))
            .await?;
    }
    let kept = ledger
        .transactions
        .create(NewTransaction::deposit(other.id, 50))
        .await?;

    let removed = ledger.accounts.delete(account.id).await?;
    assert_eq!(removed, 3);

    assert!(ledger.accounts.fetch_by_id(account.id).await.unwrap_err().is_not_found());
    let remaining = ledger.transactions.list().await?;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, kept.id);

    Ok(())
}

#[tokio::test]
async fn test_delete_account_without_transactions() -> Result<()> {
    let (ledger, _temp) = test_ledger().await?;

    let account = open_account(&ledger, "Alice", "checking", 0).await?;
    assert_eq!(ledger.accounts.delete(account.id).await?, 0);
    assert!(ledger.accounts.list().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_delete_unknown_account_is_not_found() -> Result<()> {
    let (ledger, _temp) = test_ledger().await?;

    let err = ledger.accounts.delete(Uuid::new_v4()).await.unwrap_err();
    assert!(err.is_not_found());

    Ok(())
}

#[tokio::test]
async fn test_balance_override_out_of_range_is_rejected() -> Result<()> {
    let (ledger, _temp) = test_ledger().await?;
    let account = open_account(&ledger, "Ada", "checking", 0).await?;
    ledger
        .transactions
        .create(NewTransaction::withdrawal(account.id, 100))
        .await?;

    let result = ledger
        .accounts
        .update(AccountUpdate::holder(account.id, "Ada").with_balance(i64::MAX))
        .await;
    assert!(matches!(result, Err(LedgerError::InvalidAccount(_))));

    let fetched = ledger.accounts.fetch_by_id(account.id).await?;
    assert_eq!(fetched.balance_cents, -100);
    assert_eq!(fetched.opening_balance_cents, 0);
    assert!(ledger.accounts.audit().await?.is_consistent());

    Ok(())
}
