//! Pre-computed per-category running totals.
//!
//! Four granularity tiers (all-time, yearly, monthly, daily) share one bucket
//! shape, disambiguated by zeroed period components. The daily tier is only
//! maintained for a rolling recency window so storage stays bounded; windows
//! it cannot answer exactly fall back to the store's entry scan.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::warn;

use crate::currency::CurrencyCode;
use crate::domain::window::next_month;
use crate::domain::{LedgerEntry, TimeWindow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Bucket time key. Zero components widen the tier: `0/0/0` is all-time,
/// `Y/0/0` a year, `Y/M/0` a month, `Y/M/D` a single day.
pub struct BucketPeriod {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl BucketPeriod {
    pub fn all_time() -> Self {
        Self { year: 0, month: 0, day: 0 }
    }

    pub fn yearly(year: i32) -> Self {
        Self { year, month: 0, day: 0 }
    }

    pub fn monthly(year: i32, month: u32) -> Self {
        Self { year, month, day: 0 }
    }

    pub fn daily(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
            day: date.day(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// Category dimension of a bucket. Entries with a subcategory land in the
/// `(category, Some(sub))` bucket; plain entries in `(category, None)`.
pub struct BucketScope {
    pub category: String,
    pub subcategory: Option<String>,
    pub currency: CurrencyCode,
}

impl BucketScope {
    fn for_entry(entry: &LedgerEntry) -> Self {
        Self {
            category: entry.category.clone(),
            subcategory: entry.subcategory.clone(),
            currency: entry.currency.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Running totals for one (period, scope) cell.
pub struct Bucket {
    pub total: Decimal,
    pub entry_count: u64,
    pub last_updated: DateTime<Utc>,
    pub last_entry_date: NaiveDate,
}

/// Incrementally maintained aggregate index over the entry set.
///
/// Derived state only: always reconstructible via `rebuild_from_entries`,
/// never the source of truth.
#[derive(Debug, Clone, Default)]
pub struct AggregateIndex {
    buckets: HashMap<BucketPeriod, HashMap<BucketScope, Bucket>>,
    daily_window_days: u32,
}

impl AggregateIndex {
    pub fn new(daily_window_days: u32) -> Self {
        Self {
            buckets: HashMap::new(),
            daily_window_days,
        }
    }

    /// First date still inside the daily-bucket horizon, as of `today`.
    pub fn horizon_start(&self, today: NaiveDate) -> NaiveDate {
        today - Duration::days(self.daily_window_days as i64 - 1)
    }

    fn in_daily_horizon(&self, date: NaiveDate, today: NaiveDate) -> bool {
        self.daily_window_days > 0 && date >= self.horizon_start(today)
    }

    fn periods_for(&self, date: NaiveDate, today: NaiveDate) -> Vec<BucketPeriod> {
        let mut periods = vec![
            BucketPeriod::all_time(),
            BucketPeriod::yearly(date.year()),
            BucketPeriod::monthly(date.year(), date.month()),
        ];
        if self.in_daily_horizon(date, today) {
            periods.push(BucketPeriod::daily(date));
        }
        periods
    }

    pub fn on_entry_added(&mut self, entry: &LedgerEntry, now: DateTime<Utc>, today: NaiveDate) {
        let scope = BucketScope::for_entry(entry);
        for period in self.periods_for(entry.date, today) {
            let bucket = self
                .buckets
                .entry(period)
                .or_default()
                .entry(scope.clone())
                .or_insert(Bucket {
                    total: Decimal::ZERO,
                    entry_count: 0,
                    last_updated: now,
                    last_entry_date: entry.date,
                });
            bucket.total += entry.amount;
            bucket.entry_count += 1;
            bucket.last_updated = now;
            bucket.last_entry_date = bucket.last_entry_date.max(entry.date);
        }
    }

    /// Symmetric decrement across the tiers the entry was counted in. The
    /// daily tier is decremented whenever its bucket still exists, even after
    /// the entry's date has aged out of the horizon.
    pub fn on_entry_removed(&mut self, entry: &LedgerEntry, now: DateTime<Utc>, today: NaiveDate) {
        let scope = BucketScope::for_entry(entry);
        let mut periods = self.periods_for(entry.date, today);
        let daily = BucketPeriod::daily(entry.date);
        if !periods.contains(&daily)
            && self
                .buckets
                .get(&daily)
                .is_some_and(|scopes| scopes.contains_key(&scope))
        {
            periods.push(daily);
        }
        for period in periods {
            let Some(scopes) = self.buckets.get_mut(&period) else {
                warn!(?period, category = %scope.category, "bucket tier missing during decrement");
                continue;
            };
            let Some(bucket) = scopes.get_mut(&scope) else {
                warn!(?period, category = %scope.category, "bucket missing during decrement");
                continue;
            };
            bucket.total -= entry.amount;
            bucket.entry_count = bucket.entry_count.saturating_sub(1);
            bucket.last_updated = now;
            if bucket.entry_count == 0 {
                scopes.remove(&scope);
            }
            if scopes.is_empty() {
                self.buckets.remove(&period);
            }
        }
    }

    /// Full recompute from scratch. Idempotent: applying it twice yields the
    /// same buckets as applying it once.
    pub fn rebuild_from_entries(
        &mut self,
        entries: &[LedgerEntry],
        now: DateTime<Utc>,
        today: NaiveDate,
    ) {
        self.buckets.clear();
        for entry in entries {
            self.on_entry_added(entry, now, today);
        }
    }

    /// Drops daily buckets that have aged out of the recency window.
    pub fn prune_daily(&mut self, today: NaiveDate) {
        let horizon = self.horizon_start(today);
        self.buckets.retain(|period, _| {
            if period.day == 0 {
                return true;
            }
            match NaiveDate::from_ymd_opt(period.year, period.month, period.day) {
                Some(date) => date >= horizon,
                None => false,
            }
        });
    }

    /// Per-scope totals for a window, or `None` when no exact bucket cover
    /// exists and the caller must scan entries instead.
    ///
    /// Covers: one bucket for all-time/year/month windows; daily buckets for
    /// ranges inside the recency horizon; monthly buckets for month-aligned
    /// ranges. Cost is O(buckets touched), never O(entries).
    pub fn scope_totals(
        &self,
        window: &TimeWindow,
        today: NaiveDate,
    ) -> Option<HashMap<BucketScope, Decimal>> {
        let periods = match *window {
            TimeWindow::AllTime => vec![BucketPeriod::all_time()],
            TimeWindow::Year { year } => vec![BucketPeriod::yearly(year)],
            TimeWindow::Month { year, month } => vec![BucketPeriod::monthly(year, month)],
            TimeWindow::Range { start, end } => self.range_cover(start, end, today)?,
        };
        let mut totals: HashMap<BucketScope, Decimal> = HashMap::new();
        for period in periods {
            if let Some(scopes) = self.buckets.get(&period) {
                for (scope, bucket) in scopes {
                    *totals.entry(scope.clone()).or_insert(Decimal::ZERO) += bucket.total;
                }
            }
        }
        Some(totals)
    }

    fn range_cover(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        today: NaiveDate,
    ) -> Option<Vec<BucketPeriod>> {
        if self.in_daily_horizon(start, today) {
            let days = start.iter_days().take_while(|d| *d < end);
            return Some(days.map(BucketPeriod::daily).collect());
        }
        if start.day() == 1 && end.day() == 1 {
            let mut periods = Vec::new();
            let mut cursor = start;
            while cursor < end {
                periods.push(BucketPeriod::monthly(cursor.year(), cursor.month()));
                cursor = next_month(cursor);
            }
            return Some(periods);
        }
        None
    }

    /// Total for one calendar day, restricted to scopes matching `filter`.
    /// `None` when the date is outside the daily horizon.
    pub fn daily_scope_totals(
        &self,
        date: NaiveDate,
        today: NaiveDate,
    ) -> Option<HashMap<BucketScope, Decimal>> {
        if !self.in_daily_horizon(date, today) {
            return None;
        }
        let mut totals = HashMap::new();
        if let Some(scopes) = self.buckets.get(&BucketPeriod::daily(date)) {
            for (scope, bucket) in scopes {
                totals.insert(scope.clone(), bucket.total);
            }
        }
        Some(totals)
    }

    pub fn bucket(&self, period: BucketPeriod, scope: &BucketScope) -> Option<&Bucket> {
        self.buckets.get(&period)?.get(scope)
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.values().map(|scopes| scopes.len()).sum()
    }

    /// Consistency check: every bucket total must equal the sum over matching
    /// entries. Returns a description of the first divergence found.
    pub fn verify(
        &self,
        entries: &[LedgerEntry],
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> std::result::Result<(), String> {
        let mut expected = AggregateIndex::new(self.daily_window_days);
        expected.rebuild_from_entries(entries, now, today);
        for (period, scopes) in &expected.buckets {
            for (scope, bucket) in scopes {
                match self.bucket(*period, scope) {
                    None => {
                        return Err(format!(
                            "missing bucket for {}/{}/{} {}",
                            period.year, period.month, period.day, scope.category
                        ))
                    }
                    Some(actual) => {
                        if actual.total != bucket.total || actual.entry_count != bucket.entry_count
                        {
                            return Err(format!(
                                "bucket {}/{}/{} {} holds {} ({} entries), expected {} ({} entries)",
                                period.year,
                                period.month,
                                period.day,
                                scope.category,
                                actual.total,
                                actual.entry_count,
                                bucket.total,
                                bucket.entry_count
                            ));
                        }
                    }
                }
            }
        }
        // Stale daily buckets are tolerated; anything else lingering is drift.
        for (period, scopes) in &self.buckets {
            if period.day != 0 && !expected.buckets.contains_key(period) {
                continue;
            }
            let expected_scopes = expected.buckets.get(period);
            for scope in scopes.keys() {
                if !expected_scopes.is_some_and(|s| s.contains_key(scope)) {
                    return Err(format!(
                        "orphan bucket {}/{}/{} {}",
                        period.year, period.month, period.day, scope.category
                    ));
                }
            }
        }
        Ok(())
    }
}
