//! Durable state behind every component
//!
//! All mutations go through [`Store::transact`], which runs a closure against a
//! draft of the state and commits only if the closure succeeds. Uniqueness checks
//! (one active event, one submission per guardian, decoded output written once)
//! are done inside the closure, so they are atomic with the write they guard.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{EventId, GuardianId, ItemId};
use crate::error::{Error, Result};
use crate::model::{EncryptedItem, Guardian, ProtectedEvent};

/// Everything that is persisted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultState {
    /// Guardian roster in registration order
    pub guardians: Vec<Guardian>,
    /// Candidate item pool
    pub items: BTreeMap<ItemId, EncryptedItem>,
    pub events: BTreeMap<EventId, ProtectedEvent>,
}

impl VaultState {
    #[must_use]
    pub fn guardian(&self, id: &GuardianId) -> Option<&Guardian> {
        self.guardians.iter().find(|g| &g.id == id)
    }

    /// # Errors
    /// Returns [`Error::NotFound`] for an unknown id
    pub fn event(&self, id: EventId) -> Result<&ProtectedEvent> {
        self.events
            .get(&id)
            .ok_or_else(|| Error::not_found(format!("event {id}")))
    }

    /// # Errors
    /// Returns [`Error::NotFound`] for an unknown id
    pub fn event_mut(&mut self, id: EventId) -> Result<&mut ProtectedEvent> {
        self.events
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(format!("event {id}")))
    }

    /// The Scheduled or InProgress event, if there is one
    #[must_use]
    pub fn active_event(&self) -> Option<&ProtectedEvent> {
        self.events.values().find(|e| e.status().is_active())
    }
}

/// Snapshot reads and all-or-nothing transactions over [`VaultState`]
pub trait Store: Send + Sync {
    /// Runs `f` against a consistent snapshot
    ///
    /// # Errors
    /// Returns an error if the state cannot be read
    fn read<R>(&self, f: impl FnOnce(&VaultState) -> R) -> Result<R>;

    /// Runs `f` against a draft and commits it only if `f` returns `Ok`
    ///
    /// Transactions on one store are serialized.
    ///
    /// # Errors
    /// Returns whatever `f` returns, or a storage error if the commit fails
    fn transact<R>(&self, f: impl FnOnce(&mut VaultState) -> Result<R>) -> Result<R>;
}

/// In-process store, used by tests and embedders that persist elsewhere
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<VaultState>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_state(state: VaultState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }
}

impl Store for MemoryStore {
    fn read<R>(&self, f: impl FnOnce(&VaultState) -> R) -> Result<R> {
        Ok(f(&self.state.lock()))
    }

    fn transact<R>(&self, f: impl FnOnce(&mut VaultState) -> Result<R>) -> Result<R> {
        let mut state = self.state.lock();
        let mut draft = state.clone();
        let out = f(&mut draft)?;
        *state = draft;
        Ok(out)
    }
}

/// JSON file store shared by every process that opens the same path
///
/// Each read and transaction takes an advisory lock on a `<state>.lock` sidecar
/// (shared for reads, exclusive for transactions) and loads the file afresh, so
/// a commit from another process is never overwritten with stale state. Commits
/// go through a temp file and rename, so a crash mid-write leaves the previous
/// state intact.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileStore {
    /// Opens `path`, starting from an empty state if it does not exist yet
    ///
    /// # Errors
    /// Returns a storage error if the file exists but cannot be read or parsed
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut lock_name = path.file_name().unwrap_or_default().to_os_string();
        lock_name.push(".lock");
        let store = Self {
            lock_path: path.with_file_name(lock_name),
            path,
        };
        store.create_parent()?;
        store.read(|_| ())?;
        Ok(store)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn create_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    /// The lock is released when the returned file is dropped
    fn lock(&self, exclusive: bool) -> Result<File> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)?;
        if exclusive {
            FileExt::lock_exclusive(&file)?;
        } else {
            FileExt::lock_shared(&file)?;
        }
        Ok(file)
    }

    fn load(&self) -> Result<VaultState> {
        match fs::read(&self.path) {
            Ok(raw) => Ok(serde_json::from_slice(&raw)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "state file missing, starting empty");
                Ok(VaultState::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn persist(&self, state: &VaultState) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(state)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl Store for FileStore {
    fn read<R>(&self, f: impl FnOnce(&VaultState) -> R) -> Result<R> {
        let _lock = self.lock(false)?;
        let state = self.load()?;
        Ok(f(&state))
    }

    fn transact<R>(&self, f: impl FnOnce(&mut VaultState) -> Result<R>) -> Result<R> {
        let _lock = self.lock(true)?;
        let mut draft = self.load()?;
        let out = f(&mut draft)?;
        self.persist(&draft)?;
        Ok(out)
    }
}
