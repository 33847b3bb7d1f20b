use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{AccountId, EntryId, EntryKind};

/// Error type that captures ledger validation, persistence, and integrity failures.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid amount: {0} (amounts must be positive)")]
    InvalidAmount(Decimal),
    #[error("window end must be after start")]
    InvalidWindow,
    #[error("invalid month: {0}")]
    InvalidMonth(u32),
    #[error("account not found: {0}")]
    AccountNotFound(AccountId),
    #[error("transfer target account not found: {0}")]
    TargetNotFound(AccountId),
    #[error("transfer requires a target account")]
    MissingTransferTarget,
    #[error("category not found: {0}")]
    CategoryNotFound(String),
    #[error("category `{category}` does not accept {kind} entries")]
    KindMismatch { category: String, kind: EntryKind },
    #[error("entry not found: {0}")]
    EntryNotFound(EntryId),
    #[error("entry id mismatch: expected {expected}, got {actual}")]
    IdMismatch { expected: EntryId, actual: EntryId },
    #[error("entry {0} is system-generated and cannot be modified")]
    ImmutableEntry(EntryId),
    #[error("duplicate entry: {0}")]
    DuplicateEntry(EntryId),
    #[error("account {0} still has ledger entries")]
    AccountInUse(AccountId),
    #[error("recurring series not found: {0}")]
    SeriesNotFound(Uuid),
    #[error("no exchange rate from {from} to {to}")]
    MissingRate { from: String, to: String },
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("aggregate index out of sync: {0}")]
    Integrity(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Persistence(err.to_string())
    }
}
