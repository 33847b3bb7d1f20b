//! Bounded cache for derived read results.
//!
//! Keys encode the full query shape so distinct queries never collide.
//! Invalidation is wholesale only: every mutation clears the cache. Partial
//! invalidation under-invalidated in practice and is not offered.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::domain::TimeWindow;
use crate::store::LedgerSummary;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// Identity of a cached query result.
pub enum QueryKey {
    Summary(TimeWindow),
    CategoryTotals(TimeWindow, Option<String>),
    DailyTotal(NaiveDate),
}

#[derive(Debug, Clone)]
/// A cached query result.
pub enum QueryValue {
    Summary(LedgerSummary),
    Totals(BTreeMap<String, Decimal>),
    Amount(Decimal),
}

#[derive(Debug)]
struct Slot {
    value: QueryValue,
    tick: u64,
}

/// Least-recently-used cache with a fixed capacity.
#[derive(Debug)]
pub struct QueryCache {
    slots: HashMap<QueryKey, Slot>,
    capacity: usize,
    tick: u64,
}

impl QueryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: HashMap::new(),
            capacity: capacity.max(1),
            tick: 0,
        }
    }

    pub fn get(&mut self, key: &QueryKey) -> Option<QueryValue> {
        self.tick += 1;
        let tick = self.tick;
        let slot = self.slots.get_mut(key)?;
        slot.tick = tick;
        Some(slot.value.clone())
    }

    pub fn insert(&mut self, key: QueryKey, value: QueryValue) {
        self.tick += 1;
        if self.slots.len() >= self.capacity && !self.slots.contains_key(&key) {
            self.evict_oldest();
        }
        self.slots.insert(
            key,
            Slot {
                value,
                tick: self.tick,
            },
        );
    }

    pub fn invalidate_all(&mut self) {
        self.slots.clear();
    }

    /// Drops every cached result whose key matches the predicate.
    ///
    /// The store never uses this on mutations (partial invalidation
    /// under-invalidates too easily; mutations always clear everything), but
    /// callers layering their own caching policy on top may scope drops to
    /// one query family.
    pub fn invalidate_matching(&mut self, predicate: impl Fn(&QueryKey) -> bool) {
        self.slots.retain(|key, _| !predicate(key));
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .slots
            .iter()
            .min_by_key(|(_, slot)| slot.tick)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            self.slots.remove(&key);
        }
    }
}
