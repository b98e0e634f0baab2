use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use uuid::Uuid;

use crate::application::Ledger;
use crate::config::{
    LedgerConfig, OverdraftPolicy, DEFAULT_DATABASE_PATH, DEFAULT_MAX_CONNECTIONS,
};
use crate::domain::{
    format_cents, parse_cents, Account, AccountUpdate, NewAccount, NewTransaction, Transaction,
    TransactionUpdate,
};

/// Bursar - a minimal banking ledger
#[derive(Parser)]
#[command(name = "bursar")]
#[command(about = "Accounts, deposits and withdrawals with atomic balance updates")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "BURSAR_DATABASE", default_value = DEFAULT_DATABASE_PATH)]
    pub database: String,

    /// What a withdrawal may do to an account without funds: allow, reject
    #[arg(long, env = "BURSAR_OVERDRAFT", default_value = "allow", value_parser = parse_overdraft)]
    pub overdraft: OverdraftPolicy,

    /// Maximum number of pooled database connections
    #[arg(long, env = "BURSAR_MAX_CONNECTIONS", default_value_t = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: u32,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table, global = true)]
    pub format: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Account management commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Transaction commands
    #[command(subcommand)]
    Tx(TransactionCommands),

    /// Check every balance against its transactions
    Audit,
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open a new account
    Create {
        /// Account holder name
        holder: String,

        /// Account type: savings, checking
        #[arg(short = 't', long = "type")]
        account_type: String,

        /// Opening balance (e.g., "100.00")
        #[arg(short, long, default_value = "0")]
        balance: String,
    },

    /// List all accounts
    List,

    /// Show an account and its transactions
    Show {
        /// Account ID
        id: String,
    },

    /// Change the holder name, and optionally override the balance
    Update {
        /// Account ID
        id: String,

        /// New holder name
        #[arg(long)]
        holder: String,

        /// Balance override (bypasses transactions)
        #[arg(long)]
        balance: Option<String>,
    },

    /// Delete an account and all of its transactions
    Delete {
        /// Account ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum TransactionCommands {
    /// Record a deposit or withdrawal
    Create {
        /// Amount (e.g., "50.00" or "50")
        amount: String,

        /// Account ID
        #[arg(short, long)]
        account: String,

        /// Transaction type: deposit, withdrawal
        #[arg(short = 't', long = "type")]
        kind: String,
    },

    /// List transactions
    List {
        /// Only transactions of this account
        #[arg(short, long)]
        account: Option<String>,
    },

    /// Show a transaction
    Show {
        /// Transaction ID
        id: String,
    },

    /// Correct a transaction's amount
    Update {
        /// Transaction ID
        id: String,

        /// New amount
        amount: String,
    },

    /// Delete a transaction
    Delete {
        /// Transaction ID
        id: String,
    },
}

impl Cli {
    pub fn config(&self) -> LedgerConfig {
        LedgerConfig::new(&self.database)
            .with_max_connections(self.max_connections)
            .with_overdraft(self.overdraft)
    }

    pub async fn run(self) -> Result<()> {
        let config = self.config();

        if matches!(self.command, Commands::Init) {
            let ledger = Ledger::init(&config).await?;
            ledger.close().await;
            println!("Database initialized: {}", self.database);
            return Ok(());
        }

        let ledger = Ledger::connect(&config)
            .await
            .with_context(|| format!("Cannot open {} (run `bursar init` first?)", self.database))?;

        let result = match self.command {
            Commands::Init => Ok(()),
            Commands::Account(cmd) => run_account_command(&ledger, cmd, self.format).await,
            Commands::Tx(cmd) => run_transaction_command(&ledger, cmd, self.format).await,
            Commands::Audit => run_audit_command(&ledger, self.format).await,
        };

        ledger.close().await;
        result
    }
}

fn parse_overdraft(s: &str) -> std::result::Result<OverdraftPolicy, String> {
    OverdraftPolicy::from_str(s).ok_or_else(|| format!("expected allow or reject, got '{}'", s))
}

fn parse_id(id: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(id).with_context(|| format!("Invalid {} ID format (expected UUID)", what))
}

fn parse_amount(amount: &str) -> Result<i64> {
    parse_cents(amount).with_context(|| format!("Invalid amount '{}'. Use '50.00' or '50'", amount))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_account_command(
    ledger: &Ledger,
    cmd: AccountCommands,
    format: OutputFormat,
) -> Result<()> {
    let accounts = &ledger.accounts;
    match cmd {
        AccountCommands::Create {
            holder,
            account_type,
            balance,
        } => {
            let new_account =
                NewAccount::new(holder, account_type).with_balance(parse_amount(&balance)?);
            let account = accounts.create(new_account).await?;
            match format {
                OutputFormat::Json => print_json(&account)?,
                OutputFormat::Table => println!(
                    "Created {} account for {}: {}",
                    account.account_type, account.holder, account.id
                ),
            }
        }

        AccountCommands::List => {
            let list = accounts.list().await?;
            match format {
                OutputFormat::Json => print_json(&list)?,
                OutputFormat::Table if list.is_empty() => println!("No accounts found."),
                OutputFormat::Table => {
                    println!("{:<36}  {:<20} {:<9} {:>12}", "ID", "HOLDER", "TYPE", "BALANCE");
                    println!("{}", "-".repeat(80));
                    for account in &list {
                        print_account_row(account);
                    }
                }
            }
        }

        AccountCommands::Show { id } => {
            let statement = accounts
                .fetch_with_transactions(parse_id(&id, "account")?)
                .await?;
            match format {
                OutputFormat::Json => print_json(&statement)?,
                OutputFormat::Table => {
                    let account = &statement.account;
                    println!("Account: {}", account.id);
                    println!("  Holder:          {}", account.holder);
                    println!("  Type:            {}", account.account_type);
                    println!("  Balance:         {}", format_cents(account.balance_cents));
                    println!(
                        "  Opening balance: {}",
                        format_cents(account.opening_balance_cents)
                    );
                    println!(
                        "  Created:         {}",
                        account.created_at.format("%Y-%m-%d %H:%M:%S")
                    );
                    println!(
                        "  Updated:         {}",
                        account.updated_at.format("%Y-%m-%d %H:%M:%S")
                    );
                    println!();
                    println!("  Transactions:    {}", statement.transactions.len());
                    for transaction in &statement.transactions {
                        print!("    ");
                        print_transaction_row(transaction);
                    }
                }
            }
        }

        AccountCommands::Update {
            id,
            holder,
            balance,
        } => {
            let mut update = AccountUpdate::holder(parse_id(&id, "account")?, holder);
            if let Some(balance) = balance {
                update = update.with_balance(parse_amount(&balance)?);
            }
            let account = accounts.update(update).await?;
            match format {
                OutputFormat::Json => print_json(&account)?,
                OutputFormat::Table => println!(
                    "Updated account {}: holder {}, balance {}",
                    account.id,
                    account.holder,
                    format_cents(account.balance_cents)
                ),
            }
        }

        AccountCommands::Delete { id } => {
            let account_id = parse_id(&id, "account")?;
            let removed = accounts.delete(account_id).await?;
            match format {
                OutputFormat::Json => print_json(&serde_json::json!({
                    "deleted": account_id,
                    "transactions_removed": removed,
                }))?,
                OutputFormat::Table => println!(
                    "Deleted account {} and {} transaction(s)",
                    account_id, removed
                ),
            }
        }
    }
    Ok(())
}

async fn run_transaction_command(
    ledger: &Ledger,
    cmd: TransactionCommands,
    format: OutputFormat,
) -> Result<()> {
    let engine = &ledger.transactions;
    match cmd {
        TransactionCommands::Create {
            amount,
            account,
            kind,
        } => {
            let account_id = parse_id(&account, "account")?;
            let new_tx = NewTransaction::new(account_id, kind, parse_amount(&amount)?);
            let transaction = engine.create(new_tx).await?;
            match format {
                OutputFormat::Json => print_json(&transaction)?,
                OutputFormat::Table => {
                    println!(
                        "Recorded {} of {} ({})",
                        transaction.kind,
                        format_cents(transaction.amount_cents),
                        transaction.id
                    );
                    if let Some(account) = &transaction.account {
                        println!("  New balance: {}", format_cents(account.balance_cents));
                    }
                }
            }
        }

        TransactionCommands::List { account } => {
            let list = match account {
                Some(account) => engine.list_by_account(parse_id(&account, "account")?).await?,
                None => engine.list().await?,
            };
            match format {
                OutputFormat::Json => print_json(&list)?,
                OutputFormat::Table if list.is_empty() => println!("No transactions found."),
                OutputFormat::Table => {
                    for transaction in &list {
                        print_transaction_row(transaction);
                    }
                }
            }
        }

        TransactionCommands::Show { id } => {
            let transaction = engine.fetch_by_id(parse_id(&id, "transaction")?).await?;
            match format {
                OutputFormat::Json => print_json(&transaction)?,
                OutputFormat::Table => {
                    println!("Transaction: {}", transaction.id);
                    println!("  Account:  {}", transaction.account_id);
                    if let Some(account) = &transaction.account {
                        println!("  Holder:   {}", account.holder);
                    }
                    println!("  Type:     {}", transaction.kind);
                    println!("  Amount:   {}", format_cents(transaction.amount_cents));
                    println!(
                        "  Created:  {}",
                        transaction.created_at.format("%Y-%m-%d %H:%M:%S")
                    );
                }
            }
        }

        TransactionCommands::Update { id, amount } => {
            let update = TransactionUpdate {
                id: parse_id(&id, "transaction")?,
                amount_cents: parse_amount(&amount)?,
            };
            let transaction = engine.update(update).await?;
            match format {
                OutputFormat::Json => print_json(&transaction)?,
                OutputFormat::Table => println!(
                    "Updated transaction {}: amount {}",
                    transaction.id,
                    format_cents(transaction.amount_cents)
                ),
            }
        }

        TransactionCommands::Delete { id } => {
            let transaction = engine.delete(parse_id(&id, "transaction")?).await?;
            match format {
                OutputFormat::Json => print_json(&transaction)?,
                OutputFormat::Table => println!(
                    "Deleted {} of {} ({})",
                    transaction.kind,
                    format_cents(transaction.amount_cents),
                    transaction.id
                ),
            }
        }
    }
    Ok(())
}

async fn run_audit_command(ledger: &Ledger, format: OutputFormat) -> Result<()> {
    let audit = ledger.accounts.audit().await?;

    if format == OutputFormat::Json {
        print_json(&audit)?;
    } else {
        println!(
            "Checked {} account(s), {} transaction(s)",
            audit.accounts_checked, audit.transaction_count
        );
        if audit.is_consistent() {
            println!("Ledger is consistent.");
        }
        for drift in &audit.drift {
            println!(
                "  {} ({}): stored {}, expected {}, off by {}",
                drift.account_id,
                drift.holder,
                format_cents(drift.stored_cents),
                format_cents(drift.expected_cents),
                format_cents(drift.difference())
            );
        }
    }

    if !audit.is_consistent() {
        anyhow::bail!("{} account(s) out of balance", audit.drift.len());
    }
    Ok(())
}

fn print_account_row(account: &Account) {
    println!(
        "{:<36}  {:<20} {:<9} {:>12}",
        account.id,
        account.holder,
        account.account_type,
        format_cents(account.balance_cents)
    );
}

fn print_transaction_row(transaction: &Transaction) {
    println!(
        "{}  {}  {:<10} {:>12}  {}",
        transaction.id,
        transaction.created_at.format("%Y-%m-%d %H:%M"),
        transaction.kind,
        format_cents(transaction.amount_cents),
        transaction.account_id
    );
}
