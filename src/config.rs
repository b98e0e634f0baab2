use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_DATABASE_PATH: &str = "bursar.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// What a withdrawal (or a correction that lowers the balance) may do to an
/// account that does not have the funds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverdraftPolicy {
    /// The balance may go negative.
    #[default]
    Allow,
    /// Fail with `InsufficientFunds` and leave the ledger untouched.
    Reject,
}

impl OverdraftPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverdraftPolicy::Allow => "allow",
            OverdraftPolicy::Reject => "reject",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "allow" => Some(OverdraftPolicy::Allow),
            "reject" => Some(OverdraftPolicy::Reject),
            _ => None,
        }
    }

    pub fn allows_negative(&self) -> bool {
        matches!(self, OverdraftPolicy::Allow)
    }
}

impl std::fmt::Display for OverdraftPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Path of the SQLite database file.
    pub database_path: String,
    pub max_connections: u32,
    /// How long a unit waits for another unit's write lock before failing.
    pub busy_timeout: Duration,
    pub overdraft: OverdraftPolicy,
}

impl LedgerConfig {
    pub fn new(database_path: impl Into<String>) -> Self {
        Self {
            database_path: database_path.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            overdraft: OverdraftPolicy::default(),
        }
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }

    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    pub fn with_overdraft(mut self, overdraft: OverdraftPolicy) -> Self {
        self.overdraft = overdraft;
        self
    }

    pub fn database_url(&self) -> String {
        format!("sqlite:{}", self.database_path)
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DATABASE_PATH)
    }
}
