use std::fmt;

use serde::{Deserialize, Serialize};

use super::entry::EntryKind;

/// Fixed label used by internal transfers; not user-editable.
pub const TRANSFER_CATEGORY: &str = "Transfer";
/// Fixed label for deposit top-ups and withdrawals.
pub const DEPOSIT_CATEGORY: &str = "Deposit";
/// Fixed label for system-generated interest accruals.
pub const INTEREST_CATEGORY: &str = "Interest";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
/// Determines which entry kinds a category accepts and how its totals are
/// classified in summaries.
pub enum CategoryKind {
    Expense,
    Income,
    /// Internal money movements; neutral in income/expense summaries.
    System,
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CategoryKind::Expense => "Expense",
            CategoryKind::Income => "Income",
            CategoryKind::System => "System",
        };
        f.write_str(label)
    }
}

/// A spending or income category, identified by name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub kind: CategoryKind,
    #[serde(default)]
    pub subcategories: Vec<String>,
}

impl Category {
    pub fn new(name: impl Into<String>, kind: CategoryKind) -> Self {
        Self {
            name: name.into(),
            kind,
            subcategories: Vec::new(),
        }
    }

    pub fn with_subcategories(mut self, subcategories: Vec<String>) -> Self {
        self.subcategories = subcategories;
        self
    }

    /// Whether entries of `kind` may be filed under this category.
    pub fn accepts(&self, kind: EntryKind) -> bool {
        match self.kind {
            CategoryKind::Expense => kind == EntryKind::Expense,
            CategoryKind::Income => matches!(kind, EntryKind::Income | EntryKind::DepositInterest),
            CategoryKind::System => matches!(
                kind,
                EntryKind::Transfer | EntryKind::DepositTopUp | EntryKind::DepositWithdrawal
            ),
        }
    }

    /// The categories every store starts with.
    pub fn builtins() -> Vec<Category> {
        vec![
            Category::new(TRANSFER_CATEGORY, CategoryKind::System),
            Category::new(DEPOSIT_CATEGORY, CategoryKind::System),
            Category::new(INTEREST_CATEGORY, CategoryKind::Income),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expense_category_rejects_income_entries() {
        let groceries = Category::new("Groceries", CategoryKind::Expense);
        assert!(groceries.accepts(EntryKind::Expense));
        assert!(!groceries.accepts(EntryKind::Income));
        assert!(!groceries.accepts(EntryKind::Transfer));
    }

    #[test]
    fn income_category_accepts_interest_accruals() {
        let salary = Category::new("Salary", CategoryKind::Income);
        assert!(salary.accepts(EntryKind::Income));
        assert!(salary.accepts(EntryKind::DepositInterest));
        assert!(!salary.accepts(EntryKind::Expense));
    }

    #[test]
    fn builtins_cover_internal_movement_kinds() {
        let builtins = Category::builtins();
        let transfer = builtins.iter().find(|c| c.name == TRANSFER_CATEGORY).unwrap();
        assert!(transfer.accepts(EntryKind::Transfer));
        let deposit = builtins.iter().find(|c| c.name == DEPOSIT_CATEGORY).unwrap();
        assert!(deposit.accepts(EntryKind::DepositTopUp));
        assert!(deposit.accepts(EntryKind::DepositWithdrawal));
    }
}
