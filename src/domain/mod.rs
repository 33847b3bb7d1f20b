//! Domain models for ledger entries, accounts, categories, and time windows.

pub mod account;
pub mod category;
pub mod entry;
pub mod window;

pub use account::{Account, AccountId};
pub use category::{Category, CategoryKind, DEPOSIT_CATEGORY, INTEREST_CATEGORY, TRANSFER_CATEGORY};
pub use entry::{EntryDraft, EntryId, EntryKind, LedgerEntry};
pub use window::TimeWindow;
