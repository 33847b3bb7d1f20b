//! Currency identifiers and the exchange-rate table used for conversions.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::{LedgerError, Result};

/// ISO 4217 currency representation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CurrencyCode {
    fn default() -> Self {
        Self::new("USD")
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single exchange rate quotation effective from `date` onward.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FxRate {
    pub from: CurrencyCode,
    pub to: CurrencyCode,
    pub rate: Decimal,
    pub date: NaiveDate,
}

/// Date-aware exchange-rate table.
///
/// Rates are stored per currency pair as a series keyed by effective date;
/// lookups take the most recent rate at or before the requested date and fall
/// back to inverting the opposite direction.
#[derive(Debug, Clone, Default)]
pub struct FxRates {
    rates: HashMap<(String, String), BTreeMap<NaiveDate, Decimal>>,
}

impl FxRates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_rate(&mut self, rate: FxRate) {
        let key = (rate.from.as_str().to_string(), rate.to.as_str().to_string());
        self.rates.entry(key).or_default().insert(rate.date, rate.rate);
    }

    /// Returns the rate converting one unit of `from` into `to` as of `date`.
    pub fn lookup(&self, from: &CurrencyCode, to: &CurrencyCode, date: NaiveDate) -> Result<Decimal> {
        if from == to {
            return Ok(Decimal::ONE);
        }
        let direct = (from.as_str().to_string(), to.as_str().to_string());
        if let Some(rate) = self.latest_at(&direct, date) {
            return Ok(rate);
        }
        let inverse = (to.as_str().to_string(), from.as_str().to_string());
        if let Some(rate) = self.latest_at(&inverse, date) {
            if !rate.is_zero() {
                return Ok(Decimal::ONE / rate);
            }
        }
        Err(LedgerError::MissingRate {
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        })
    }

    /// Converts `amount` from one currency to another as of `date`.
    pub fn convert(
        &self,
        amount: Decimal,
        from: &CurrencyCode,
        to: &CurrencyCode,
        date: NaiveDate,
    ) -> Result<Decimal> {
        if from == to {
            return Ok(amount);
        }
        let rate = self.lookup(from, to, date)?;
        Ok((amount * rate).normalize())
    }

    fn latest_at(&self, key: &(String, String), date: NaiveDate) -> Option<Decimal> {
        self.rates
            .get(key)
            .and_then(|series| series.range(..=date).next_back())
            .map(|(_, rate)| *rate)
    }
}
