//! Balance projection.
//!
//! The projector is the only authority on how an entry moves an account
//! balance. Direction comes from the entry kind and the account's role in the
//! entry; no other code may apply balance arithmetic.

use rust_decimal::Decimal;

use crate::domain::{EntryKind, LedgerEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The role an account plays in an entry.
pub enum AccountRole {
    /// The primary/debited party.
    Source,
    /// A transfer's destination. Credits the converted amount and never
    /// re-applies source-side logic.
    Target,
}

/// Computes the signed effect of entries on account balances.
pub struct BalanceProjector;

impl BalanceProjector {
    /// The signed delta `entry` contributes to an account holding `role`.
    pub fn signed_delta(entry: &LedgerEntry, role: AccountRole) -> Decimal {
        match role {
            AccountRole::Source => match entry.kind {
                EntryKind::Expense | EntryKind::DepositWithdrawal | EntryKind::Transfer => {
                    -entry.amount
                }
                EntryKind::Income | EntryKind::DepositTopUp | EntryKind::DepositInterest => {
                    entry.amount
                }
            },
            AccountRole::Target => entry.effective_target_amount(),
        }
    }

    pub fn apply(entry: &LedgerEntry, balance: Decimal, role: AccountRole) -> Decimal {
        balance + Self::signed_delta(entry, role)
    }

    /// Exact inverse of `apply`; used when reversing an entry's effect during
    /// update and delete.
    pub fn reverse(entry: &LedgerEntry, balance: Decimal, role: AccountRole) -> Decimal {
        balance - Self::signed_delta(entry, role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::CurrencyCode;
    use crate::domain::{AccountId, EntryDraft};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn entry(kind: EntryKind, amount: Decimal, target_amount: Option<Decimal>) -> LedgerEntry {
        let mut draft = EntryDraft::new(
            NaiveDate::from_ymd_opt(2025, 5, 10).unwrap(),
            "projection sample",
            amount,
            kind,
            CurrencyCode::new("USD"),
            AccountId::new(),
            "Groceries",
        );
        if kind.is_transfer() {
            draft = draft.with_target(
                AccountId::new(),
                target_amount.map(|_| CurrencyCode::new("EUR")),
                target_amount,
            );
        }
        draft.into_entry(Utc.with_ymd_and_hms(2025, 5, 10, 10, 0, 0).unwrap())
    }

    #[test]
    fn expense_debits_and_income_credits_the_source() {
        let hundred = Decimal::new(100, 0);
        let expense = entry(EntryKind::Expense, hundred, None);
        let income = entry(EntryKind::Income, hundred, None);
        let base = Decimal::new(1000, 0);
        assert_eq!(
            BalanceProjector::apply(&expense, base, AccountRole::Source),
            Decimal::new(900, 0)
        );
        assert_eq!(
            BalanceProjector::apply(&income, base, AccountRole::Source),
            Decimal::new(1100, 0)
        );
    }

    #[test]
    fn transfer_debits_source_and_credits_target() {
        let transfer = entry(EntryKind::Transfer, Decimal::new(100, 0), None);
        let source = BalanceProjector::apply(&transfer, Decimal::new(1000, 0), AccountRole::Source);
        let target = BalanceProjector::apply(&transfer, Decimal::new(500, 0), AccountRole::Target);
        assert_eq!(source, Decimal::new(900, 0));
        assert_eq!(target, Decimal::new(600, 0));
    }

    #[test]
    fn cross_currency_transfer_credits_converted_amount() {
        let transfer = entry(
            EntryKind::Transfer,
            Decimal::new(100, 0),
            Some(Decimal::new(92, 0)),
        );
        let target = BalanceProjector::apply(&transfer, Decimal::ZERO, AccountRole::Target);
        assert_eq!(target, Decimal::new(92, 0));
        let source = BalanceProjector::apply(&transfer, Decimal::ZERO, AccountRole::Source);
        assert_eq!(source, Decimal::new(-100, 0));
    }

    #[test]
    fn deposit_kinds_move_the_deposit_account() {
        let base = Decimal::new(100, 0);
        let ten = Decimal::new(10, 0);
        let top_up = entry(EntryKind::DepositTopUp, ten, None);
        let withdrawal = entry(EntryKind::DepositWithdrawal, ten, None);
        let interest = entry(EntryKind::DepositInterest, ten, None);
        assert_eq!(
            BalanceProjector::apply(&top_up, base, AccountRole::Source),
            Decimal::new(110, 0)
        );
        assert_eq!(
            BalanceProjector::apply(&withdrawal, base, AccountRole::Source),
            Decimal::new(90, 0)
        );
        assert_eq!(
            BalanceProjector::apply(&interest, base, AccountRole::Source),
            Decimal::new(110, 0)
        );
    }

    #[test]
    fn reverse_undoes_apply_for_every_kind_and_role() {
        let kinds = [
            EntryKind::Expense,
            EntryKind::Income,
            EntryKind::Transfer,
            EntryKind::DepositTopUp,
            EntryKind::DepositWithdrawal,
            EntryKind::DepositInterest,
        ];
        let balance = Decimal::new(123456, 2);
        for kind in kinds {
            let e = entry(kind, Decimal::new(3999, 2), None);
            for role in [AccountRole::Source, AccountRole::Target] {
                if role == AccountRole::Target && !kind.is_transfer() {
                    continue;
                }
                let applied = BalanceProjector::apply(&e, balance, role);
                assert_eq!(
                    BalanceProjector::reverse(&e, applied, role),
                    balance,
                    "round trip failed for {kind} as {role:?}"
                );
            }
        }
    }
}
