//! Key/value settings storage.
//!
//! `SettingsProvider` is the seam between the switcher and wherever settings
//! actually live. Values are `toml::Value`s so numbers, strings, and booleans
//! keep their type. Two implementations are provided:
//!
//! - `TomlSettings`: a TOML file on disk, re-read on access and rewritten
//!   atomically on `set`
//! - `MemorySettings`: an in-process table, for tests and embedding

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use toml::{Table, Value};

use crate::logger::Log;

/// Read/write access to a flat table of settings.
pub trait SettingsProvider: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    fn set(&self, key: &str, value: Value) -> Result<()>;

    fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }
}

fn lock_table(table: &Mutex<Table>) -> MutexGuard<'_, Table> {
    // A panic while holding the lock cannot leave a Table half-written.
    table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Settings backed by a TOML file.
///
/// The file is shared with its owner, so every `get` and `set` starts from
/// what is on disk now. A missing file reads as an empty table; the file is
/// created on first `set`.
#[derive(Debug)]
pub struct TomlSettings {
    path: PathBuf,
    // Last table read successfully, served when the file is briefly unreadable.
    table: Mutex<Table>,
}

impl TomlSettings {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let table = read_table(&path)?;
        Ok(Self {
            path,
            table: Mutex::new(table),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn refresh(&self, table: &mut Table) {
        match read_table(&self.path) {
            Ok(fresh) => *table = fresh,
            Err(e) => Log::log_debug(&format!("Using cached settings: {:#}", e)),
        }
    }
}

fn read_table(path: &Path) -> Result<Table> {
    if !path.exists() {
        return Ok(Table::new());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
    content
        .parse::<Table>()
        .with_context(|| format!("Failed to parse settings file: {}", path.display()))
}

/// Write `table` to `path` via a temporary file in the same directory.
fn write_table_atomically(path: &Path, table: &Table) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    let content = toml::to_string(table).context("Failed to serialize settings")?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    tmp.write_all(content.as_bytes())
        .context("Failed to write settings")?;
    tmp.persist(path)
        .with_context(|| format!("Failed to replace settings file: {}", path.display()))?;
    Ok(())
}

impl SettingsProvider for TomlSettings {
    fn get(&self, key: &str) -> Option<Value> {
        let mut table = lock_table(&self.table);
        self.refresh(&mut table);
        table.get(key).cloned()
    }

    /// Re-reads the file under the lock and changes only `key`.
    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut table = lock_table(&self.table);
        let mut updated = read_table(&self.path)?;
        updated.insert(key.to_string(), value);
        write_table_atomically(&self.path, &updated)?;
        *table = updated;
        Ok(())
    }
}

/// Settings held only in memory.
#[derive(Debug, Default)]
pub struct MemorySettings {
    table: Mutex<Table>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_table(table: Table) -> Self {
        Self {
            table: Mutex::new(table),
        }
    }

    /// Builder-style insert.
    pub fn with(self, key: &str, value: impl Into<Value>) -> Self {
        lock_table(&self.table).insert(key.to_string(), value.into());
        self
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        lock_table(&self.table).remove(key)
    }
}

impl SettingsProvider for MemorySettings {
    fn get(&self, key: &str) -> Option<Value> {
        lock_table(&self.table).get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        lock_table(&self.table).insert(key.to_string(), value);
        Ok(())
    }
}
