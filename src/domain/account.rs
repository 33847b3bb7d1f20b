use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::currency::CurrencyCode;

/// Stable identifier for a financial account.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountId(pub Uuid);

impl AccountId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A financial account whose balance is a projection over ledger entries.
///
/// The balance starts from `opening_balance` (the anchor) and is only ever
/// moved through the store's apply/reverse funnel; no other code path may
/// write it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub currency: CurrencyCode,
    opening_balance: Decimal,
    balance: Decimal,
}

impl Account {
    /// Creates a new account with a zero balance.
    pub fn new(name: impl Into<String>, currency: CurrencyCode) -> Self {
        Self {
            id: AccountId::new(),
            name: name.into(),
            currency,
            opening_balance: Decimal::ZERO,
            balance: Decimal::ZERO,
        }
    }

    /// Sets the anchor balance the projection starts from.
    pub fn with_opening_balance(mut self, opening: Decimal) -> Self {
        self.opening_balance = opening;
        self.balance = opening;
        self
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn opening_balance(&self) -> Decimal {
        self.opening_balance
    }

    pub(crate) fn set_balance(&mut self, balance: Decimal) {
        self.balance = balance;
    }

    /// Resets the projection back to the anchor, ready for a replay.
    pub(crate) fn reset_to_opening(&mut self) {
        self.balance = self.opening_balance;
    }
}
