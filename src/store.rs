//! The ledger store: sole mutator and primary query surface.
//!
//! Every mutation funnels through one apply pipeline that updates the
//! in-memory entry set, projects account balances, maintains the aggregate
//! index, invalidates the query cache, persists the entry set, and then
//! notifies observers. There is no other code path that can change ledger
//! state.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::{QueryCache, QueryKey, QueryValue};
use crate::currency::{CurrencyCode, FxRate, FxRates};
use crate::domain::{
    Account, AccountId, Category, CategoryKind, EntryDraft, EntryId, EntryKind, LedgerEntry,
    TimeWindow, TRANSFER_CATEGORY,
};
use crate::errors::{LedgerError, Result};
use crate::event::{ChangeKind, LedgerChange, LedgerEvent};
use crate::index::AggregateIndex;
use crate::projector::{AccountRole, BalanceProjector};
use crate::storage::EntryRepository;
use crate::time::{Clock, SystemClock};

/// Tunables owned by the store; never ambient globals.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Currency all query results are expressed in.
    pub base_currency: CurrencyCode,
    /// Length of the rolling window daily buckets are maintained for.
    pub daily_window_days: u32,
    /// Maximum number of cached query results.
    pub cache_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_currency: CurrencyCode::default(),
            daily_window_days: 90,
            cache_capacity: 1000,
        }
    }
}

/// Aggregate income/expense/net for a time window, in the base currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerSummary {
    pub total_income: Decimal,
    pub total_expense: Decimal,
    pub net_flow: Decimal,
}

/// Outcome of a bulk import.
#[derive(Debug, Clone, Default)]
pub struct BulkReport {
    pub added: Vec<EntryId>,
    /// Drafts whose derived ID already existed; skipped, not duplicated.
    pub skipped: Vec<EntryId>,
}

pub type ObserverId = u64;

type ObserverFn = Box<dyn Fn(&LedgerChange) + Send>;

/// The transactional ledger core.
pub struct LedgerStore {
    config: StoreConfig,
    entries: Vec<LedgerEntry>,
    ids: HashSet<EntryId>,
    accounts: HashMap<AccountId, Account>,
    categories: HashMap<String, Category>,
    rates: FxRates,
    index: AggregateIndex,
    cache: Mutex<QueryCache>,
    repository: Box<dyn EntryRepository>,
    clock: Box<dyn Clock>,
    observers: Vec<(ObserverId, ObserverFn)>,
    next_observer: ObserverId,
}

impl LedgerStore {
    pub fn new(repository: Box<dyn EntryRepository>) -> Self {
        Self::with_config(repository, StoreConfig::default())
    }

    pub fn with_config(repository: Box<dyn EntryRepository>, config: StoreConfig) -> Self {
        Self::with_clock(repository, config, Box::new(SystemClock))
    }

    pub fn with_clock(
        repository: Box<dyn EntryRepository>,
        config: StoreConfig,
        clock: Box<dyn Clock>,
    ) -> Self {
        let mut categories = HashMap::new();
        for category in Category::builtins() {
            categories.insert(category.name.clone(), category);
        }
        let index = AggregateIndex::new(config.daily_window_days);
        let cache = Mutex::new(QueryCache::new(config.cache_capacity));
        Self {
            config,
            entries: Vec::new(),
            ids: HashSet::new(),
            accounts: HashMap::new(),
            categories,
            rates: FxRates::new(),
            index,
            cache,
            repository,
            clock,
            observers: Vec::new(),
            next_observer: 0,
        }
    }

    // ---- registries -------------------------------------------------------

    /// Registers an account so entries may reference it. Account CRUD lives
    /// outside this core; only the balance projection is owned here.
    pub fn register_account(&mut self, account: Account) -> AccountId {
        let id = account.id;
        self.accounts.insert(id, account);
        id
    }

    /// Removes an account that no entry references.
    pub fn remove_account(&mut self, id: AccountId) -> Result<Account> {
        if self.entries.iter().any(|entry| entry.involves_account(id)) {
            return Err(LedgerError::AccountInUse(id));
        }
        self.accounts
            .remove(&id)
            .ok_or(LedgerError::AccountNotFound(id))
    }

    pub fn account(&self, id: AccountId) -> Option<&Account> {
        self.accounts.get(&id)
    }

    pub fn balance(&self, id: AccountId) -> Result<Decimal> {
        self.accounts
            .get(&id)
            .map(Account::balance)
            .ok_or(LedgerError::AccountNotFound(id))
    }

    pub fn register_category(&mut self, category: Category) {
        self.categories.insert(category.name.clone(), category);
    }

    pub fn category(&self, name: &str) -> Option<&Category> {
        self.categories.get(name)
    }

    /// Changes the reporting currency. Cached results are expressed in the
    /// old currency, so the cache is cleared like on any mutation.
    pub fn set_base_currency(&mut self, currency: CurrencyCode) {
        self.config.base_currency = currency;
        self.cache_guard().invalidate_all();
    }

    pub fn set_rate(&mut self, rate: FxRate) {
        self.rates.set_rate(rate);
        self.cache_guard().invalidate_all();
    }

    // ---- entry access -----------------------------------------------------

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn entry(&self, id: &EntryId) -> Option<&LedgerEntry> {
        self.entries.iter().find(|entry| &entry.id == id)
    }

    pub fn entries_for_series(&self, series_id: Uuid) -> Vec<&LedgerEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.recurring_series_id == Some(series_id))
            .collect()
    }

    // ---- observers --------------------------------------------------------

    /// Subscribes to change notifications, fired exactly once per completed
    /// mutation.
    pub fn subscribe(&mut self, observer: impl Fn(&LedgerChange) + Send + 'static) -> ObserverId {
        let id = self.next_observer;
        self.next_observer += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer_id, _)| *observer_id != id);
        self.observers.len() != before
    }

    // ---- mutations --------------------------------------------------------

    /// Validates and appends a new entry, returning its assigned ID.
    pub fn add(&mut self, draft: EntryDraft) -> Result<EntryId> {
        let entry = self.prepare(draft)?;
        let id = entry.id.clone();
        self.commit_add(entry)?;
        Ok(id)
    }

    /// Replaces the entry identified by `id` wholesale: the old entry's
    /// effect is fully reversed before the new entry's effect is applied.
    pub fn update(&mut self, id: &EntryId, new_entry: LedgerEntry) -> Result<()> {
        let old = self
            .entry(id)
            .cloned()
            .ok_or_else(|| LedgerError::EntryNotFound(id.clone()))?;
        if old.is_immutable() || new_entry.kind.is_system_generated() {
            return Err(LedgerError::ImmutableEntry(id.clone()));
        }
        if &new_entry.id != id {
            return Err(LedgerError::IdMismatch {
                expected: id.clone(),
                actual: new_entry.id,
            });
        }
        self.validate_entry(&new_entry)?;
        self.apply_event(LedgerEvent::Updated { old, new: new_entry })
    }

    /// Removes an entry from memory and the durable store in one call.
    pub fn delete(&mut self, id: &EntryId) -> Result<LedgerEntry> {
        let entry = self
            .entry(id)
            .cloned()
            .ok_or_else(|| LedgerError::EntryNotFound(id.clone()))?;
        if entry.is_immutable() {
            return Err(LedgerError::ImmutableEntry(id.clone()));
        }
        self.apply_event(LedgerEvent::Deleted(entry.clone()))?;
        Ok(entry)
    }

    /// Deletes every entry of a recurring series with a single persist.
    pub fn remove_series(&mut self, series_id: Uuid) -> Result<Vec<EntryId>> {
        let victims: Vec<LedgerEntry> = self
            .entries
            .iter()
            .filter(|entry| {
                entry.recurring_series_id == Some(series_id) && !entry.is_immutable()
            })
            .cloned()
            .collect();
        if victims.is_empty() {
            return Err(LedgerError::SeriesNotFound(series_id));
        }
        let mut accounts = HashSet::new();
        let mut categories = HashSet::new();
        let mut entry_ids = Vec::new();
        for victim in &victims {
            accounts.insert(victim.account_id);
            if let Some(target) = victim.target_account_id {
                accounts.insert(target);
            }
            categories.insert(victim.category.clone());
            entry_ids.push(victim.id.clone());
            self.detach(&victim.id);
        }
        let change = LedgerChange {
            kind: ChangeKind::Deleted,
            entry_ids: entry_ids.clone(),
            accounts: accounts.into_iter().collect(),
            categories: categories.into_iter().collect(),
        };
        self.finish_mutation(change)?;
        Ok(entry_ids)
    }

    /// Moves money between two accounts by constructing one internal-transfer
    /// entry and feeding it through the same `add` path, so both roles get
    /// directional projector calls. Target currency and amount are resolved
    /// here, once.
    pub fn transfer(
        &mut self,
        source: AccountId,
        target: AccountId,
        amount: Decimal,
        currency: CurrencyCode,
        date: NaiveDate,
        description: &str,
    ) -> Result<LedgerEntry> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(amount));
        }
        if !self.accounts.contains_key(&source) {
            return Err(LedgerError::AccountNotFound(source));
        }
        let target_currency = match self.accounts.get(&target) {
            Some(account) => account.currency.clone(),
            None => return Err(LedgerError::TargetNotFound(target)),
        };
        let mut draft = EntryDraft::new(
            date,
            description,
            amount,
            EntryKind::Transfer,
            currency.clone(),
            source,
            TRANSFER_CATEGORY,
        );
        draft = if target_currency != currency {
            let converted = self.rates.convert(amount, &currency, &target_currency, date)?;
            draft.with_target(target, Some(target_currency), Some(converted))
        } else {
            draft.with_target(target, None, None)
        };
        let entry = self.prepare(draft)?;
        self.commit_add(entry.clone())?;
        Ok(entry)
    }

    /// Imports a batch of entries as one event with one persist. Drafts whose
    /// derived ID already exists are skipped and reported, which is what
    /// makes re-importing the same source data idempotent.
    pub fn bulk_add(&mut self, drafts: Vec<EntryDraft>) -> Result<BulkReport> {
        let mut prepared = Vec::with_capacity(drafts.len());
        for draft in drafts {
            prepared.push(self.prepare(draft)?);
        }
        let mut report = BulkReport::default();
        let mut batch_ids = HashSet::new();
        let mut added = Vec::new();
        for entry in prepared {
            if self.ids.contains(&entry.id) || !batch_ids.insert(entry.id.clone()) {
                report.skipped.push(entry.id);
                continue;
            }
            report.added.push(entry.id.clone());
            added.push(entry);
        }
        if added.is_empty() {
            return Ok(report);
        }
        self.apply_event(LedgerEvent::BulkAdded(added))?;
        Ok(report)
    }

    // ---- persistence lifecycle -------------------------------------------

    /// Replaces in-memory state with the durable entry set, replays balances
    /// from each account's anchor, and rebuilds the index.
    pub fn load(&mut self) -> Result<()> {
        let entries = self.repository.load()?;
        self.ids = entries.iter().map(|entry| entry.id.clone()).collect();
        self.entries = entries;
        self.log_unknown_references();
        self.replay_balances();
        self.rebuild_index();
        debug!(entries = self.entries.len(), "ledger loaded from durable store");
        Ok(())
    }

    /// Recomputes all buckets from the entry set and clears the cache.
    pub fn rebuild_index(&mut self) {
        let now = self.clock.now();
        let today = self.clock.today();
        self.index.rebuild_from_entries(&self.entries, now, today);
        self.index.prune_daily(today);
        self.cache_guard().invalidate_all();
    }

    /// Checks that every index bucket matches the entry-set truth.
    pub fn verify_integrity(&self) -> Result<()> {
        self.index
            .verify(&self.entries, self.clock.now(), self.clock.today())
            .map_err(LedgerError::Integrity)
    }

    /// Runs the consistency check and rebuilds on divergence. Returns whether
    /// a repair was needed.
    pub fn check_and_repair(&mut self) -> bool {
        match self.verify_integrity() {
            Ok(()) => false,
            Err(err) => {
                warn!(%err, "aggregate index diverged; rebuilding from entries");
                self.rebuild_index();
                true
            }
        }
    }

    // ---- queries ----------------------------------------------------------

    /// Income/expense/net totals for a window, in the base currency.
    pub fn summary(&self, window: &TimeWindow) -> Result<LedgerSummary> {
        let window = window.normalized();
        let key = QueryKey::Summary(window);
        if let Some(QueryValue::Summary(summary)) = self.cache_guard().get(&key) {
            return Ok(summary);
        }
        let summary = self.compute_summary(&window)?;
        self.cache_guard()
            .insert(key, QueryValue::Summary(summary.clone()));
        Ok(summary)
    }

    /// Per-category totals for a window, in the base currency.
    pub fn category_totals(
        &self,
        window: &TimeWindow,
        category: Option<&str>,
    ) -> Result<BTreeMap<String, Decimal>> {
        let window = window.normalized();
        let key = QueryKey::CategoryTotals(window, category.map(str::to_string));
        if let Some(QueryValue::Totals(totals)) = self.cache_guard().get(&key) {
            return Ok(totals);
        }
        let totals = self.compute_category_totals(&window, category)?;
        self.cache_guard()
            .insert(key, QueryValue::Totals(totals.clone()));
        Ok(totals)
    }

    /// Expense total for one calendar day, in the base currency.
    pub fn daily_total(&self, date: NaiveDate) -> Result<Decimal> {
        let key = QueryKey::DailyTotal(date);
        if let Some(QueryValue::Amount(amount)) = self.cache_guard().get(&key) {
            return Ok(amount);
        }
        let amount = self.compute_daily_total(date)?;
        self.cache_guard().insert(key, QueryValue::Amount(amount));
        Ok(amount)
    }

    /// Number of query results currently cached.
    pub fn cached_query_count(&self) -> usize {
        self.cache_guard().len()
    }

    // ---- internals --------------------------------------------------------

    /// Coerces, stamps, and validates a draft. Pure with respect to store
    /// state: validation failures leave nothing to roll back.
    fn prepare(&self, mut draft: EntryDraft) -> Result<LedgerEntry> {
        if draft.kind.is_transfer() {
            draft.category = TRANSFER_CATEGORY.into();
        }
        let entry = draft.into_entry(self.clock.now());
        self.validate_entry(&entry)?;
        Ok(entry)
    }

    fn validate_entry(&self, entry: &LedgerEntry) -> Result<()> {
        if entry.amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(entry.amount));
        }
        if let Some(target_amount) = entry.target_amount {
            if target_amount <= Decimal::ZERO {
                return Err(LedgerError::InvalidAmount(target_amount));
            }
        }
        if !self.accounts.contains_key(&entry.account_id) {
            return Err(LedgerError::AccountNotFound(entry.account_id));
        }
        if entry.kind.is_transfer() {
            let target = entry
                .target_account_id
                .ok_or(LedgerError::MissingTransferTarget)?;
            if !self.accounts.contains_key(&target) {
                return Err(LedgerError::TargetNotFound(target));
            }
        }
        let category = self
            .categories
            .get(&entry.category)
            .ok_or_else(|| LedgerError::CategoryNotFound(entry.category.clone()))?;
        if !category.accepts(entry.kind) {
            return Err(LedgerError::KindMismatch {
                category: entry.category.clone(),
                kind: entry.kind,
            });
        }
        if let Some(subcategory) = &entry.subcategory {
            if !category.subcategories.iter().any(|s| s == subcategory) {
                return Err(LedgerError::CategoryNotFound(format!(
                    "{}/{}",
                    entry.category, subcategory
                )));
            }
        }
        Ok(())
    }

    fn commit_add(&mut self, entry: LedgerEntry) -> Result<()> {
        if self.ids.contains(&entry.id) {
            return Err(LedgerError::DuplicateEntry(entry.id));
        }
        self.apply_event(LedgerEvent::Added(entry))
    }

    fn apply_event(&mut self, event: LedgerEvent) -> Result<()> {
        let change = LedgerChange::from_event(&event);
        match event {
            LedgerEvent::Added(entry) => self.attach(entry),
            LedgerEvent::Updated { old, new } => {
                self.detach(&old.id);
                self.attach(new);
            }
            LedgerEvent::Deleted(entry) => {
                self.detach(&entry.id);
            }
            LedgerEvent::BulkAdded(entries) => {
                for entry in entries {
                    self.attach(entry);
                }
            }
        }
        self.finish_mutation(change)
    }

    /// Appends an entry: balances projected, index incremented.
    fn attach(&mut self, entry: LedgerEntry) {
        self.project(&entry, false);
        self.index
            .on_entry_added(&entry, self.clock.now(), self.clock.today());
        self.ids.insert(entry.id.clone());
        self.entries.push(entry);
    }

    /// Removes an entry: balances reversed, index decremented.
    fn detach(&mut self, id: &EntryId) -> Option<LedgerEntry> {
        let position = self.entries.iter().position(|entry| &entry.id == id)?;
        let entry = self.entries.remove(position);
        self.ids.remove(&entry.id);
        self.project(&entry, true);
        self.index
            .on_entry_removed(&entry, self.clock.now(), self.clock.today());
        Some(entry)
    }

    /// Routes the entry through the projector for each account role it
    /// touches. The target role is applied only for transfers.
    fn project(&mut self, entry: &LedgerEntry, reverse: bool) {
        let step = |balance, role| {
            if reverse {
                BalanceProjector::reverse(entry, balance, role)
            } else {
                BalanceProjector::apply(entry, balance, role)
            }
        };
        match self.accounts.get_mut(&entry.account_id) {
            Some(account) => {
                let next = step(account.balance(), AccountRole::Source);
                account.set_balance(next);
            }
            None => warn!(account = %entry.account_id, "entry references unknown account"),
        }
        if entry.kind.is_transfer() {
            if let Some(target_id) = entry.target_account_id {
                match self.accounts.get_mut(&target_id) {
                    Some(account) => {
                        let next = step(account.balance(), AccountRole::Target);
                        account.set_balance(next);
                    }
                    None => warn!(account = %target_id, "transfer references unknown target"),
                }
            }
        }
    }

    /// Tail of every mutation: cache cleared first so read-your-writes holds
    /// even when the persist fails, then the entry set is written, then
    /// observers fire. A persist failure is returned to the caller without
    /// rolling back memory; observers are not notified for a mutation that
    /// did not complete.
    fn finish_mutation(&mut self, change: LedgerChange) -> Result<()> {
        self.cache_guard().invalidate_all();
        self.repository.save(&self.entries)?;
        debug!(
            kind = ?change.kind,
            entries = change.entry_ids.len(),
            accounts = change.accounts.len(),
            "mutation persisted"
        );
        for (_, observer) in &self.observers {
            observer(&change);
        }
        Ok(())
    }

    fn replay_balances(&mut self) {
        for account in self.accounts.values_mut() {
            account.reset_to_opening();
        }
        let entries = std::mem::take(&mut self.entries);
        for entry in &entries {
            self.project(entry, false);
        }
        self.entries = entries;
    }

    fn log_unknown_references(&self) {
        for entry in &self.entries {
            if !self.accounts.contains_key(&entry.account_id) {
                warn!(entry = %entry.id, account = %entry.account_id, "unknown account on load");
            }
            if let Some(target) = entry.target_account_id {
                if !self.accounts.contains_key(&target) {
                    warn!(entry = %entry.id, account = %target, "unknown target account on load");
                }
            }
            if !self.categories.contains_key(&entry.category) {
                warn!(entry = %entry.id, category = %entry.category, "unknown category on load");
            }
        }
    }

    fn to_base(&self, amount: Decimal, currency: &CurrencyCode) -> Result<Decimal> {
        self.rates
            .convert(amount, currency, &self.config.base_currency, self.clock.today())
    }

    fn compute_summary(&self, window: &TimeWindow) -> Result<LedgerSummary> {
        let mut income = Decimal::ZERO;
        let mut expense = Decimal::ZERO;
        match self.index.scope_totals(window, self.clock.today()) {
            Some(scopes) => {
                for (scope, total) in scopes {
                    let Some(category) = self.categories.get(&scope.category) else {
                        continue;
                    };
                    let converted = self.to_base(total, &scope.currency)?;
                    match category.kind {
                        CategoryKind::Expense => expense += converted,
                        CategoryKind::Income => income += converted,
                        CategoryKind::System => {}
                    }
                }
            }
            None => {
                for entry in self.entries.iter().filter(|e| window.contains(e.date)) {
                    let converted = self.to_base(entry.amount, &entry.currency)?;
                    match entry.kind {
                        EntryKind::Expense => expense += converted,
                        EntryKind::Income | EntryKind::DepositInterest => income += converted,
                        _ => {}
                    }
                }
            }
        }
        Ok(LedgerSummary {
            total_income: income,
            total_expense: expense,
            net_flow: income - expense,
        })
    }

    fn compute_category_totals(
        &self,
        window: &TimeWindow,
        filter: Option<&str>,
    ) -> Result<BTreeMap<String, Decimal>> {
        let mut totals: BTreeMap<String, Decimal> = BTreeMap::new();
        match self.index.scope_totals(window, self.clock.today()) {
            Some(scopes) => {
                for (scope, total) in scopes {
                    if filter.is_some_and(|name| name != scope.category) {
                        continue;
                    }
                    let converted = self.to_base(total, &scope.currency)?;
                    *totals.entry(scope.category).or_insert(Decimal::ZERO) += converted;
                }
            }
            None => {
                for entry in self.entries.iter().filter(|e| window.contains(e.date)) {
                    if filter.is_some_and(|name| name != entry.category) {
                        continue;
                    }
                    let converted = self.to_base(entry.amount, &entry.currency)?;
                    *totals
                        .entry(entry.category.clone())
                        .or_insert(Decimal::ZERO) += converted;
                }
            }
        }
        Ok(totals)
    }

    fn compute_daily_total(&self, date: NaiveDate) -> Result<Decimal> {
        let mut total = Decimal::ZERO;
        match self.index.daily_scope_totals(date, self.clock.today()) {
            Some(scopes) => {
                for (scope, amount) in scopes {
                    let is_expense = self
                        .categories
                        .get(&scope.category)
                        .is_some_and(|c| c.kind == CategoryKind::Expense);
                    if is_expense {
                        total += self.to_base(amount, &scope.currency)?;
                    }
                }
            }
            None => {
                for entry in self
                    .entries
                    .iter()
                    .filter(|e| e.date == date && e.kind == EntryKind::Expense)
                {
                    total += self.to_base(entry.amount, &entry.currency)?;
                }
            }
        }
        Ok(total)
    }

    fn cache_guard(&self) -> MutexGuard<'_, QueryCache> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
