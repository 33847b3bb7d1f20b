//! In-process mutation events.
//!
//! Events scope the incremental work a mutation triggers (balance projection,
//! index maintenance, observer notification). They are never persisted;
//! durability comes from persisting the resulting entry set.

use std::collections::BTreeSet;

use crate::domain::{AccountId, EntryId, LedgerEntry};

/// The unit of mutation applied to the ledger.
#[derive(Debug, Clone)]
pub enum LedgerEvent {
    Added(LedgerEntry),
    Updated { old: LedgerEntry, new: LedgerEntry },
    Deleted(LedgerEntry),
    BulkAdded(Vec<LedgerEntry>),
}

impl LedgerEvent {
    pub fn kind(&self) -> ChangeKind {
        match self {
            LedgerEvent::Added(_) => ChangeKind::Added,
            LedgerEvent::Updated { .. } => ChangeKind::Updated,
            LedgerEvent::Deleted(_) => ChangeKind::Deleted,
            LedgerEvent::BulkAdded(_) => ChangeKind::BulkAdded,
        }
    }

    /// Every entry the event touches, old and new versions included.
    pub fn entries(&self) -> Vec<&LedgerEntry> {
        match self {
            LedgerEvent::Added(entry) | LedgerEvent::Deleted(entry) => vec![entry],
            LedgerEvent::Updated { old, new } => vec![old, new],
            LedgerEvent::BulkAdded(entries) => entries.iter().collect(),
        }
    }

    pub fn affected_accounts(&self) -> BTreeSet<AccountId> {
        let mut accounts = BTreeSet::new();
        for entry in self.entries() {
            accounts.insert(entry.account_id);
            if let Some(target) = entry.target_account_id {
                accounts.insert(target);
            }
        }
        accounts
    }

    pub fn affected_categories(&self) -> BTreeSet<String> {
        self.entries()
            .into_iter()
            .map(|entry| entry.category.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// What a completed mutation did, from an observer's point of view.
pub enum ChangeKind {
    Added,
    Updated,
    Deleted,
    BulkAdded,
}

/// Notification payload delivered once per completed mutation.
///
/// Carries the affected identifiers so observers can refresh selectively
/// instead of diffing full snapshots.
#[derive(Debug, Clone)]
pub struct LedgerChange {
    pub kind: ChangeKind,
    pub entry_ids: Vec<EntryId>,
    pub accounts: Vec<AccountId>,
    pub categories: Vec<String>,
}

impl LedgerChange {
    pub fn from_event(event: &LedgerEvent) -> Self {
        Self {
            kind: event.kind(),
            entry_ids: event.entries().into_iter().map(|e| e.id.clone()).collect(),
            accounts: event.affected_accounts().into_iter().collect(),
            categories: event.affected_categories().into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::CurrencyCode;
    use crate::domain::{EntryDraft, EntryKind};
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal::Decimal;

    fn entry(kind: EntryKind, target: Option<AccountId>) -> LedgerEntry {
        let mut draft = EntryDraft::new(
            NaiveDate::from_ymd_opt(2025, 4, 2).unwrap(),
            "Sample",
            Decimal::new(2500, 2),
            kind,
            CurrencyCode::new("USD"),
            AccountId::new(),
            "Groceries",
        );
        if let Some(target) = target {
            draft = draft.with_target(target, None, None);
        }
        draft.into_entry(Utc.with_ymd_and_hms(2025, 4, 2, 8, 0, 0).unwrap())
    }

    #[test]
    fn transfer_event_affects_both_accounts() {
        let target = AccountId::new();
        let entry = entry(EntryKind::Transfer, Some(target));
        let source = entry.account_id;
        let event = LedgerEvent::Added(entry);
        let accounts = event.affected_accounts();
        assert!(accounts.contains(&source));
        assert!(accounts.contains(&target));
        assert_eq!(accounts.len(), 2);
    }

    #[test]
    fn update_event_covers_old_and_new_categories() {
        let old = entry(EntryKind::Expense, None);
        let mut new = old.clone();
        new.category = "Dining".into();
        let event = LedgerEvent::Updated { old, new };
        let categories = event.affected_categories();
        assert!(categories.contains("Groceries"));
        assert!(categories.contains("Dining"));
    }
}
