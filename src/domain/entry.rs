use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::account::AccountId;
use crate::currency::CurrencyCode;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
/// Classifies the direction and nature of a financial movement.
///
/// Amounts are always positive; sign and direction are derived from the kind
/// and the account's role, never from a negative amount.
pub enum EntryKind {
    Expense,
    Income,
    Transfer,
    DepositTopUp,
    DepositWithdrawal,
    DepositInterest,
}

impl EntryKind {
    pub fn is_transfer(self) -> bool {
        self == EntryKind::Transfer
    }

    /// System-generated kinds are immutable: update and delete reject them.
    pub fn is_system_generated(self) -> bool {
        self == EntryKind::DepositInterest
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntryKind::Expense => "expense",
            EntryKind::Income => "income",
            EntryKind::Transfer => "transfer",
            EntryKind::DepositTopUp => "deposit-top-up",
            EntryKind::DepositWithdrawal => "deposit-withdrawal",
            EntryKind::DepositInterest => "deposit-interest",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deterministic entry identifier.
///
/// Derived as a Sha256 digest over the identity fields, so re-importing the
/// same source data yields the same ID and bulk imports de-duplicate instead
/// of multiplying entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EntryId(String);

impl EntryId {
    /// Digest over `date|description|amount|kind|currency|created_at-millis`.
    ///
    /// The amount is normalized first so `100` and `100.00` derive the same
    /// identity.
    pub fn derive(
        date: NaiveDate,
        description: &str,
        amount: Decimal,
        kind: EntryKind,
        currency: &CurrencyCode,
        created_at: DateTime<Utc>,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}|{}|{}|{}|{}|{}",
            date,
            description,
            amount.normalize(),
            kind.as_str(),
            currency.as_str(),
            created_at.timestamp_millis()
        ));
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One immutable-by-replacement record of a financial movement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub kind: EntryKind,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    pub account_id: AccountId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_account_id: Option<AccountId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_currency: Option<CurrencyCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_series_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_occurrence_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn is_immutable(&self) -> bool {
        self.kind.is_system_generated()
    }

    /// The amount credited to a transfer's destination account.
    ///
    /// Cross-currency transfers carry the converted amount; same-currency
    /// transfers fall back to the source amount.
    pub fn effective_target_amount(&self) -> Decimal {
        self.target_amount.unwrap_or(self.amount)
    }

    pub fn involves_account(&self, id: AccountId) -> bool {
        self.account_id == id || self.target_account_id == Some(id)
    }
}

/// Input to `LedgerStore::add`: an entry without an identity yet.
#[derive(Debug, Clone)]
pub struct EntryDraft {
    pub date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub kind: EntryKind,
    pub category: String,
    pub subcategory: Option<String>,
    pub account_id: AccountId,
    pub target_account_id: Option<AccountId>,
    pub target_currency: Option<CurrencyCode>,
    pub target_amount: Option<Decimal>,
    pub recurring_series_id: Option<Uuid>,
    pub recurring_occurrence_id: Option<Uuid>,
}

impl EntryDraft {
    pub fn new(
        date: NaiveDate,
        description: impl Into<String>,
        amount: Decimal,
        kind: EntryKind,
        currency: CurrencyCode,
        account_id: AccountId,
        category: impl Into<String>,
    ) -> Self {
        Self {
            date,
            description: description.into(),
            amount,
            currency,
            kind,
            category: category.into(),
            subcategory: None,
            account_id,
            target_account_id: None,
            target_currency: None,
            target_amount: None,
            recurring_series_id: None,
            recurring_occurrence_id: None,
        }
    }

    pub fn with_subcategory(mut self, subcategory: impl Into<String>) -> Self {
        self.subcategory = Some(subcategory.into());
        self
    }

    pub fn with_target(
        mut self,
        target_account_id: AccountId,
        target_currency: Option<CurrencyCode>,
        target_amount: Option<Decimal>,
    ) -> Self {
        self.target_account_id = Some(target_account_id);
        self.target_currency = target_currency;
        self.target_amount = target_amount;
        self
    }

    pub fn with_series(mut self, series_id: Uuid, occurrence_id: Uuid) -> Self {
        self.recurring_series_id = Some(series_id);
        self.recurring_occurrence_id = Some(occurrence_id);
        self
    }

    /// Stamps the draft with `created_at` and derives its identity.
    pub fn into_entry(self, created_at: DateTime<Utc>) -> LedgerEntry {
        let id = EntryId::derive(
            self.date,
            &self.description,
            self.amount,
            self.kind,
            &self.currency,
            created_at,
        );
        LedgerEntry {
            id,
            date: self.date,
            description: self.description,
            amount: self.amount,
            currency: self.currency,
            kind: self.kind,
            category: self.category,
            subcategory: self.subcategory,
            account_id: self.account_id,
            target_account_id: self.target_account_id,
            target_currency: self.target_currency,
            target_amount: self.target_amount,
            recurring_series_id: self.recurring_series_id,
            recurring_occurrence_id: self.recurring_occurrence_id,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn stamp() -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(date(2025, 6, 1).and_hms_opt(9, 30, 0).unwrap(), Utc)
    }

    #[test]
    fn id_derivation_is_deterministic() {
        let usd = CurrencyCode::new("USD");
        let a = EntryId::derive(
            date(2025, 6, 1),
            "Coffee",
            Decimal::new(450, 2),
            EntryKind::Expense,
            &usd,
            stamp(),
        );
        let b = EntryId::derive(
            date(2025, 6, 1),
            "Coffee",
            Decimal::new(450, 2),
            EntryKind::Expense,
            &usd,
            stamp(),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn id_normalizes_amount_scale() {
        let usd = CurrencyCode::new("USD");
        let plain = EntryId::derive(
            date(2025, 6, 1),
            "Rent",
            Decimal::new(100, 0),
            EntryKind::Expense,
            &usd,
            stamp(),
        );
        let scaled = EntryId::derive(
            date(2025, 6, 1),
            "Rent",
            Decimal::new(10000, 2),
            EntryKind::Expense,
            &usd,
            stamp(),
        );
        assert_eq!(plain, scaled);
    }

    #[test]
    fn distinct_inputs_produce_distinct_ids() {
        let usd = CurrencyCode::new("USD");
        let a = EntryId::derive(
            date(2025, 6, 1),
            "Coffee",
            Decimal::new(450, 2),
            EntryKind::Expense,
            &usd,
            stamp(),
        );
        let b = EntryId::derive(
            date(2025, 6, 2),
            "Coffee",
            Decimal::new(450, 2),
            EntryKind::Expense,
            &usd,
            stamp(),
        );
        let c = EntryId::derive(
            date(2025, 6, 1),
            "Coffee",
            Decimal::new(450, 2),
            EntryKind::Income,
            &usd,
            stamp(),
        );
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn target_amount_falls_back_to_source_amount() {
        let draft = EntryDraft::new(
            date(2025, 6, 1),
            "Move savings",
            Decimal::new(100, 0),
            EntryKind::Transfer,
            CurrencyCode::new("USD"),
            AccountId::new(),
            "Transfer",
        )
        .with_target(AccountId::new(), None, None);
        let entry = draft.into_entry(stamp());
        assert_eq!(entry.effective_target_amount(), Decimal::new(100, 0));
    }
}
