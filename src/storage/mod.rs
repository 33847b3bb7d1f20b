//! Durable persistence of the entry set.

pub mod json_repository;
pub mod memory;

use crate::domain::LedgerEntry;
use crate::errors::Result;

/// Abstraction over the durable store for ledger entries.
///
/// Deliberately narrow: the store persists the full entry set on every
/// mutation and reloads it on startup. Account balances are never persisted;
/// they are re-derived from entries.
pub trait EntryRepository: Send + Sync {
    fn load(&self) -> Result<Vec<LedgerEntry>>;
    fn save(&self, entries: &[LedgerEntry]) -> Result<()>;
}

pub use json_repository::JsonRepository;
pub use memory::MemoryRepository;
