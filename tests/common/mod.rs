use std::sync::Mutex;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use pocketledger::{
    Account, AccountId, Category, CategoryKind, CurrencyCode, EntryDraft, EntryKind,
    JsonRepository, LedgerStore, MemoryRepository, StoreConfig,
};
use pocketledger::time::FixedClock;
use rust_decimal::Decimal;
use tempfile::TempDir;

/// Holds TempDir guards so temporary folders live for the duration of the test run.
static TEST_DIRS: Lazy<Mutex<Vec<TempDir>>> = Lazy::new(|| Mutex::new(Vec::new()));

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
}

/// The reference "today" every fixed-clock store runs at.
pub fn today() -> NaiveDate {
    date(2025, 2, 5)
}

pub fn usd() -> CurrencyCode {
    CurrencyCode::new("USD")
}

fn base_store(repository: Box<dyn pocketledger::EntryRepository>) -> LedgerStore {
    let mut store = LedgerStore::with_clock(
        repository,
        StoreConfig::default(),
        Box::new(FixedClock::at_date(today())),
    );
    store.register_category(Category::new("Groceries", CategoryKind::Expense));
    store.register_category(Category::new("Music", CategoryKind::Expense));
    store.register_category(Category::new("Salary", CategoryKind::Income));
    store
}

/// Store backed by shared memory, plus the repository handle for inspecting
/// persisted state and injecting save failures.
pub fn memory_store() -> (LedgerStore, MemoryRepository) {
    let repo = MemoryRepository::new();
    (base_store(Box::new(repo.clone())), repo)
}

/// Store persisting to a JSON file in a unique temp directory. Returns the
/// repository so a second store can reload the same file.
pub fn json_store() -> (LedgerStore, JsonRepository) {
    let temp = TempDir::new().expect("create temp dir");
    let repo = JsonRepository::new(temp.path().join("entries.json"), Some(3))
        .expect("create json repository");
    TEST_DIRS.lock().expect("lock temp dir registry").push(temp);
    (base_store(Box::new(repo.clone())), repo)
}

/// A second store over an existing repository, as after a process restart.
pub fn reopened_store(repository: Box<dyn pocketledger::EntryRepository>) -> LedgerStore {
    base_store(repository)
}

/// Registers the usual checking/savings pair with known opening balances.
pub fn checking_and_savings(store: &mut LedgerStore) -> (AccountId, AccountId, Account, Account) {
    let checking = Account::new("Checking", usd()).with_opening_balance(Decimal::new(1000, 0));
    let savings = Account::new("Savings", usd()).with_opening_balance(Decimal::new(500, 0));
    let checking_id = store.register_account(checking.clone());
    let savings_id = store.register_account(savings.clone());
    (checking_id, savings_id, checking, savings)
}

pub fn expense(account: AccountId, day: NaiveDate, amount: i64, category: &str) -> EntryDraft {
    EntryDraft::new(
        day,
        format!("{category} {amount} on {day}"),
        Decimal::new(amount, 0),
        EntryKind::Expense,
        usd(),
        account,
        category,
    )
}
