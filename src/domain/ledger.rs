use std::collections::HashMap;

use serde::Serialize;

use super::{Account, AccountId, Cents};

/// An account whose stored balance disagrees with its transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceDrift {
    pub account_id: AccountId,
    pub holder: String,
    pub stored_cents: Cents,
    pub expected_cents: Cents,
}

impl BalanceDrift {
    pub fn difference(&self) -> Cents {
        self.stored_cents.saturating_sub(self.expected_cents)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LedgerAudit {
    pub accounts_checked: usize,
    pub transaction_count: i64,
    pub drift: Vec<BalanceDrift>,
}

impl LedgerAudit {
    pub fn is_consistent(&self) -> bool {
        self.drift.is_empty()
    }
}

/// Compare every account's stored balance with the signed sum of its
/// transactions. `sums` maps account id to that sum; missing entries mean
/// the account has no transactions.
pub fn build_audit(
    accounts: &[Account],
    sums: &HashMap<AccountId, Cents>,
    transaction_count: i64,
) -> LedgerAudit {
    let drift = accounts
        .iter()
        .filter_map(|account| {
            let recorded = sums.get(&account.id).copied().unwrap_or(0);
            (account.transaction_total() != recorded).then(|| BalanceDrift {
                account_id: account.id,
                holder: account.holder.clone(),
                stored_cents: account.balance_cents,
                expected_cents: account.opening_balance_cents.saturating_add(recorded),
            })
        })
        .collect();

    LedgerAudit {
        accounts_checked: accounts.len(),
        transaction_count,
        drift,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AccountType;

    fn account(opening: Cents) -> Account {
        Account::new("Ada".into(), AccountType::Savings, opening)
    }

    #[test]
    fn test_build_audit_consistent() {
        let mut a = account(0);
        a.balance_cents = 300;
        let sums = HashMap::from([(a.id, 300)]);

        let audit = build_audit(&[a], &sums, 2);
        assert!(audit.is_consistent());
        assert_eq!(audit.accounts_checked, 1);
        assert_eq!(audit.transaction_count, 2);
    }

    #[test]
    fn test_build_audit_reports_drift() {
        let mut a = account(0);
        a.balance_cents = 500;
        let b = account(100);

        let audit = build_audit(&[a.clone(), b], &HashMap::from([(a.id, 300)]), 1);

        assert!(!audit.is_consistent());
        assert_eq!(audit.drift.len(), 1);
        assert_eq!(audit.drift[0].account_id, a.id);
        assert_eq!(audit.drift[0].expected_cents, 300);
        assert_eq!(audit.drift[0].difference(), 200);
    }
}
