use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::domain::LedgerEntry;
use crate::errors::{LedgerError, Result};
use crate::storage::EntryRepository;

const BACKUP_EXTENSION: &str = "json";
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const TMP_SUFFIX: &str = "tmp";
const DEFAULT_RETENTION: usize = 5;

/// File-backed repository storing the entry set as pretty JSON.
///
/// Saves are atomic: the new set is written to a temporary file and renamed
/// over the previous one, so a crash mid-write leaves the old set intact.
/// Before each overwrite the previous file is copied into a backups
/// directory with bounded retention.
#[derive(Debug, Clone)]
pub struct JsonRepository {
    path: PathBuf,
    backups_dir: PathBuf,
    retention: usize,
}

impl JsonRepository {
    pub fn new(path: PathBuf, retention: Option<usize>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }
        let backups_dir = match path.parent() {
            Some(parent) => parent.join("backups"),
            None => PathBuf::from("backups"),
        };
        Ok(Self {
            path,
            backups_dir,
            retention: retention.unwrap_or(DEFAULT_RETENTION).max(1),
        })
    }

    /// Repository at the platform's per-user data directory.
    pub fn default_location() -> Result<Self> {
        let base = dirs::data_dir()
            .ok_or_else(|| LedgerError::Persistence("no user data directory".into()))?;
        Self::new(base.join("pocketledger").join("entries.json"), None)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn backup_existing_file(&self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        ensure_dir(&self.backups_dir)?;
        let timestamp = Utc::now().format(BACKUP_TIMESTAMP_FORMAT).to_string();
        let backup_name = format!("entries_{}.{}", timestamp, BACKUP_EXTENSION);
        fs::copy(&self.path, self.backups_dir.join(backup_name))?;
        self.prune_backups()?;
        Ok(())
    }

    fn prune_backups(&self) -> Result<()> {
        let mut backups = self.list_backups()?;
        if backups.len() <= self.retention {
            return Ok(());
        }
        backups.sort_by(|a, b| b.cmp(a));
        for stale in backups.iter().skip(self.retention) {
            let _ = fs::remove_file(self.backups_dir.join(stale));
        }
        Ok(())
    }

    pub fn list_backups(&self) -> Result<Vec<String>> {
        if !self.backups_dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.backups_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(BACKUP_EXTENSION) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
                entries.push(name.to_string());
            }
        }
        entries.sort_by(|a, b| b.cmp(a));
        Ok(entries)
    }
}

impl EntryRepository for JsonRepository {
    fn load(&self) -> Result<Vec<LedgerEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let data = fs::read_to_string(&self.path)?;
        let entries: Vec<LedgerEntry> = serde_json::from_str(&data)?;
        Ok(entries)
    }

    fn save(&self, entries: &[LedgerEntry]) -> Result<()> {
        self.backup_existing_file()?;
        let json = serde_json::to_string_pretty(entries)?;
        let tmp = tmp_path(&self.path);
        write_file(&tmp, &json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

fn write_file(path: &Path, data: &str) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::CurrencyCode;
    use crate::domain::{AccountId, EntryDraft, EntryKind};
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    fn repository_with_temp_dir() -> (JsonRepository, TempDir) {
        let temp = TempDir::new().expect("temp dir");
        let repo = JsonRepository::new(temp.path().join("entries.json"), Some(3))
            .expect("json repository");
        (repo, temp)
    }

    fn sample_entries() -> Vec<LedgerEntry> {
        let created = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        vec![
            EntryDraft::new(
                NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
                "Groceries run",
                Decimal::new(5450, 2),
                EntryKind::Expense,
                CurrencyCode::new("USD"),
                AccountId::new(),
                "Groceries",
            )
            .into_entry(created),
            EntryDraft::new(
                NaiveDate::from_ymd_opt(2025, 3, 2).unwrap(),
                "Salary",
                Decimal::new(250000, 2),
                EntryKind::Income,
                CurrencyCode::new("USD"),
                AccountId::new(),
                "Salary",
            )
            .into_entry(created),
        ]
    }

    #[test]
    fn save_and_load_roundtrip() {
        let (repo, _guard) = repository_with_temp_dir();
        let entries = sample_entries();
        repo.save(&entries).expect("save entries");
        let loaded = repo.load().expect("load entries");
        assert_eq!(loaded, entries);
    }

    #[test]
    fn load_of_missing_file_is_empty() {
        let (repo, _guard) = repository_with_temp_dir();
        assert!(repo.load().expect("load").is_empty());
    }

    #[test]
    fn no_tmp_artifacts_survive_a_save() {
        let (repo, guard) = repository_with_temp_dir();
        repo.save(&sample_entries()).expect("save entries");
        let leftovers: Vec<_> = std::fs::read_dir(guard.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext == TMP_SUFFIX)
            })
            .collect();
        assert!(leftovers.is_empty(), "tmp files left behind: {leftovers:?}");
    }

    #[test]
    fn overwrite_keeps_a_backup() {
        let (repo, _guard) = repository_with_temp_dir();
        let entries = sample_entries();
        repo.save(&entries).expect("first save");
        repo.save(&entries[..1]).expect("second save");
        let backups = repo.list_backups().expect("list backups");
        assert!(!backups.is_empty(), "expected a backup after overwrite");
    }
}
