// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session persistence behind a key/value adapter.
//!
//! The session store never touches a storage mechanism directly; it reads and
//! writes string values through [`SessionStorage`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

/// Synchronous key/value storage for session fields.
pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
    fn remove(&self, key: &str) -> anyhow::Result<()>;
}

/// In-process storage; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.values.lock().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.values.lock().remove(key);
        Ok(())
    }
}

/// Storage backed by a single JSON object file.
///
/// Values are cached in memory and the whole file is rewritten on every
/// change (write tmp + rename).
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open (or lazily create) the storage file at `path`.
    ///
    /// A missing file is an empty store. An unreadable or corrupt file is an
    /// error so a bad session file is never silently overwritten.
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, values: Mutex::new(values) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrite the session file from `values`.
    ///
    /// The snapshot is staged in a temp file next to the target and renamed
    /// over it, so readers see either the previous or the new set of session
    /// fields. On unix the temp file is created owner-only (0600), which the
    /// tokens inherit.
    fn flush(&self, values: &BTreeMap<String, String>) -> anyhow::Result<()> {
        let dir = match self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                dir
            }
            None => Path::new("."),
        };
        let mut staged = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut staged, values)?;
        staged.as_file().sync_all()?;
        staged.persist(&self.path)?;
        Ok(())
    }
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut values = self.values.lock();
        values.insert(key.to_owned(), value.to_owned());
        self.flush(&values)
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        let mut values = self.values.lock();
        if values.remove(key).is_some() {
            self.flush(&values)?;
        }
        Ok(())
    }
}

/// Directory holding the session file.
///
/// `STAFFDESK_STATE_DIR` wins, then `$XDG_STATE_HOME/staffdesk`, then
/// `$HOME/.local/state/staffdesk`. Unset and empty variables are skipped; with
/// none available the session lives in `./.staffdesk`.
pub fn state_dir() -> PathBuf {
    let var = |name: &str| std::env::var_os(name).filter(|v| !v.is_empty()).map(PathBuf::from);
    var("STAFFDESK_STATE_DIR")
        .or_else(|| var("XDG_STATE_HOME").map(|xdg| xdg.join("staffdesk")))
        .or_else(|| var("HOME").map(|home| home.join(".local/state/staffdesk")))
        .unwrap_or_else(|| PathBuf::from(".staffdesk"))
}

#[cfg(test)]
#[path = "storage_tests.rs"]
mod tests;
