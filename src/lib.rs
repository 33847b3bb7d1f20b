#![doc(test(attr(deny(warnings))))]

//! Pocketledger is an embedded transactional ledger core for personal
//! finance apps: a single-writer store for financial entries with projected
//! account balances, pre-aggregated category totals, and a bounded query
//! cache, persisted as one durable entry set.

pub mod cache;
pub mod currency;
pub mod domain;
pub mod errors;
pub mod event;
pub mod index;
pub mod projector;
pub mod storage;
pub mod store;
pub mod time;

pub use currency::{CurrencyCode, FxRate, FxRates};
pub use domain::{
    Account, AccountId, Category, CategoryKind, EntryDraft, EntryId, EntryKind, LedgerEntry,
    TimeWindow,
};
pub use errors::{LedgerError, Result};
pub use event::{ChangeKind, LedgerChange, LedgerEvent};
pub use projector::{AccountRole, BalanceProjector};
pub use storage::{EntryRepository, JsonRepository, MemoryRepository};
pub use store::{BulkReport, LedgerStore, LedgerSummary, ObserverId, StoreConfig};

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter =
            EnvFilter::from_default_env().add_directive("pocketledger=info".parse().expect("valid directive"));
        fmt().with_env_filter(filter).init();
        tracing::info!("Pocketledger tracing initialized.");
    });
}
