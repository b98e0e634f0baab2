use crate::config::LedgerConfig;
use crate::storage::Repository;

use super::{AccountService, LedgerError, TransactionEngine};

/// Both services wired to one shared repository. This is what an entry
/// point builds once and hands to whatever drives the ledger.
#[derive(Clone)]
pub struct Ledger {
    pub accounts: AccountService,
    pub transactions: TransactionEngine,
    repo: Repository,
}

impl Ledger {
    pub fn new(repo: Repository, config: &LedgerConfig) -> Self {
        let accounts = AccountService::new(repo.clone());
        let transactions = TransactionEngine::new(repo.clone(), accounts.clone(), config.overdraft);
        Self {
            accounts,
            transactions,
            repo,
        }
    }

    /// Create the database if needed, migrate it and build the services.
    pub async fn init(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let repo = Repository::init(config).await?;
        Ok(Self::new(repo, config))
    }

    /// Connect to an existing database.
    pub async fn connect(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let repo = Repository::connect(config).await?;
        Ok(Self::new(repo, config))
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    pub async fn close(&self) {
        self.repo.close().await;
    }
}
