//! In-memory repository used by tests and ephemeral sessions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::domain::LedgerEntry;
use crate::errors::{LedgerError, Result};
use crate::storage::EntryRepository;

#[derive(Default)]
struct Inner {
    saved: Mutex<Vec<LedgerEntry>>,
    fail_saves: AtomicBool,
}

/// Repository backed by process memory. Clones share the same backing store,
/// so a test can keep a handle to inspect what the ledger persisted or to
/// inject save failures.
#[derive(Clone, Default)]
pub struct MemoryRepository {
    inner: Arc<Inner>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populates the backing store, as if a previous session had saved.
    pub fn seed(&self, entries: Vec<LedgerEntry>) {
        *self.inner.saved.lock().unwrap_or_else(|e| e.into_inner()) = entries;
    }

    /// Snapshot of the durably "saved" entry set.
    pub fn saved(&self) -> Vec<LedgerEntry> {
        self.inner
            .saved
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// When set, every `save` fails without touching the backing store.
    pub fn set_fail_saves(&self, fail: bool) {
        self.inner.fail_saves.store(fail, Ordering::SeqCst);
    }
}

impl EntryRepository for MemoryRepository {
    fn load(&self) -> Result<Vec<LedgerEntry>> {
        Ok(self.saved())
    }

    fn save(&self, entries: &[LedgerEntry]) -> Result<()> {
        if self.inner.fail_saves.load(Ordering::SeqCst) {
            return Err(LedgerError::Persistence("simulated save failure".into()));
        }
        *self.inner.saved.lock().unwrap_or_else(|e| e.into_inner()) = entries.to_vec();
        Ok(())
    }
}
