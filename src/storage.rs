// Manages local file storage for the alarm collection.
//
// The whole collection is one JSON blob (`alarms.json`). Reads and writes
// go through an exclusive lock file and writes are atomic (tmp + rename).
//
// ⚠️ VERSION BUMP REQUIRED:
// Changes to AlarmRecord serialization require incrementing
// LOCAL_STORAGE_VERSION below.
use crate::context::AppContext;
use crate::model::AlarmRecord;
use anyhow::{Context, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

// Version history:
// - v1: versioned wrapper around the alarm list
const LOCAL_STORAGE_VERSION: u32 = 1;

#[derive(Serialize)]
struct LocalStorageData<'a> {
    version: u32,
    alarms: &'a [AlarmRecord],
}

#[derive(Deserialize)]
struct RawStorageData {
    #[serde(default)]
    version: u32,
    alarms: Vec<Value>,
}

pub struct LocalStorage;

impl LocalStorage {
    fn get_lock_path(file_path: &Path) -> PathBuf {
        let mut lock_path = file_path.to_path_buf();
        if let Some(ext) = lock_path.extension() {
            let mut new_ext = ext.to_os_string();
            new_ext.push(".lock");
            lock_path.set_extension(new_ext);
        } else {
            lock_path.set_extension("lock");
        }
        lock_path
    }

    /// Runs `f` while holding an exclusive lock on `<file>.lock`.
    pub fn with_lock<F, T>(file_path: &Path, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let lock_path = Self::get_lock_path(file_path);
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file {:?}", lock_path))?;

        file.lock_exclusive()?;
        let result = f();
        file.unlock()?;
        result
    }

    /// Atomic write: Write to .tmp file then rename
    pub fn atomic_write<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, contents: C) -> Result<()> {
        let path = path.as_ref();
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, contents)?;
        fs::rename(tmp_path, path)?;
        Ok(())
    }

    fn read_unlocked(path: &Path) -> Result<Vec<AlarmRecord>> {
        if !path.exists() {
            return Ok(vec![]);
        }
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if json.trim().is_empty() {
            return Ok(vec![]);
        }

        let value: Value = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        let records = if value.is_array() {
            // Unversioned blob: a bare array of records.
            log::info!(
                "Read unversioned alarm list from {}; it will be upgraded on next save",
                path.display()
            );
            serde_json::from_value::<Vec<Value>>(value)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            let data: RawStorageData = serde_json::from_value(value)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            if data.version > LOCAL_STORAGE_VERSION {
                anyhow::bail!(
                    "{} was written by a newer version (v{}), refusing to read it",
                    path.display(),
                    data.version
                );
            }
            data.alarms
        };

        Ok(Self::decode_records(path, records))
    }

    /// Decodes each record on its own. A record that does not fit
    /// `AlarmRecord` is logged and left out; the rest still load.
    fn decode_records(path: &Path, records: Vec<Value>) -> Vec<AlarmRecord> {
        records
            .into_iter()
            .enumerate()
            .filter_map(|(idx, raw)| match serde_json::from_value::<AlarmRecord>(raw) {
                Ok(alarm) => Some(alarm),
                Err(e) => {
                    log::warn!(
                        "Skipping unreadable alarm #{} in {}: {}",
                        idx,
                        path.display(),
                        e
                    );
                    None
                }
            })
            .collect()
    }

    fn write_unlocked(path: &Path, alarms: &[AlarmRecord]) -> Result<()> {
        let data = LocalStorageData {
            version: LOCAL_STORAGE_VERSION,
            alarms,
        };
        let json = serde_json::to_string_pretty(&data)?;
        Self::atomic_write(path, json)
    }

    pub fn load_alarms(ctx: &dyn AppContext) -> Result<Vec<AlarmRecord>> {
        let path = ctx.get_alarms_path()?;
        Self::with_lock(&path, || Self::read_unlocked(&path))
    }

    pub fn save_alarms(ctx: &dyn AppContext, alarms: &[AlarmRecord]) -> Result<()> {
        let path = ctx.get_alarms_path()?;
        Self::with_lock(&path, || Self::write_unlocked(&path, alarms))
    }

    /// Read-modify-write under a single lock so concurrent writers do not
    /// drop each other's changes. Returns the collection as written.
    pub fn modify_alarms<F>(ctx: &dyn AppContext, f: F) -> Result<Vec<AlarmRecord>>
    where
        F: FnOnce(&mut Vec<AlarmRecord>),
    {
        let path = ctx.get_alarms_path()?;
        Self::with_lock(&path, || {
            let mut alarms = Self::read_unlocked(&path)?;
            f(&mut alarms);
            Self::write_unlocked(&path, &alarms)?;
            Ok(alarms)
        })
    }
}
