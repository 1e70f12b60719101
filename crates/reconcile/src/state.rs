//! Persisted record of the last-applied spec per resource
//!
//! On disk the record is a JSON array of single-entry objects, so insertion
//! order survives every rewrite:
//!
//! ```json
//! [{"web1": {"host": "10.0.0.5", "password": "", "files": [], "packages": [], "command": []}}]
//! ```
//!
//! A freshly initialized store holds the `{}` sentinel, which reads as empty.
//! Concurrent invocations of the tool against the same file are unsafe: the
//! whole file is overwritten by whichever process writes last.

use crate::error::{Error, Result};
use crate::types::{ResourceSpec, StateChange};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

/// Sentinel written on first initialization
pub const EMPTY_STATE: &[u8] = b"{}";

/// Raw byte storage behind a [`StateStore`].
pub trait StateBackend: Send + Sync {
    /// Read the stored bytes, `None` if nothing was stored yet
    fn read(&self) -> Result<Option<Vec<u8>>>;

    /// Replace the stored bytes as a whole
    fn write(&self, data: &[u8]) -> Result<()>;

    /// Human-readable location for messages
    fn describe(&self) -> String;
}

/// State kept in a file, replaced atomically on every write
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StateBackend for FileBackend {
    fn read(&self) -> Result<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::state_io(
                format!("failed to read {}", self.path.display()),
                e,
            )),
        }
    }

    fn write(&self, data: &[u8]) -> Result<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(|e| {
            Error::state_io(format!("failed to create {}", parent.display()), e)
        })?;

        // Same directory as the target so the rename stays on one filesystem
        let mut tmp = tempfile::NamedTempFile::new_in(&parent)
            .map_err(|e| Error::state_io("failed to create temp state file", e))?;
        tmp.write_all(data)
            .map_err(|e| Error::state_io("failed to write temp state file", e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| Error::state_io("failed to sync temp state file", e))?;
        tmp.persist(&self.path).map_err(|e| {
            Error::state_io(
                format!("failed to replace {}", self.path.display()),
                e.error,
            )
        })?;

        log::debug!("Wrote state to {}", self.path.display());
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// State kept in memory, for tests and throwaway runs
#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: Mutex<Option<Vec<u8>>>,
    writes: Mutex<usize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing bytes
    pub fn with_data(data: &[u8]) -> Self {
        Self {
            data: Mutex::new(Some(data.to_vec())),
            writes: Mutex::new(0),
        }
    }

    /// Number of writes performed so far
    pub fn write_count(&self) -> usize {
        *lock(&self.writes)
    }
}

impl StateBackend for MemoryBackend {
    fn read(&self) -> Result<Option<Vec<u8>>> {
        Ok(lock(&self.data).clone())
    }

    fn write(&self, data: &[u8]) -> Result<()> {
        *lock(&self.data) = Some(data.to_vec());
        *lock(&self.writes) += 1;
        Ok(())
    }

    fn describe(&self) -> String {
        "<memory>".to_string()
    }
}

impl<B: StateBackend + ?Sized> StateBackend for std::sync::Arc<B> {
    fn read(&self) -> Result<Option<Vec<u8>>> {
        (**self).read()
    }

    fn write(&self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Ordered record of last-applied specs, one entry per resource name.
///
/// Every mutation holds the writer lock across its read-modify-write, so a
/// store shared between worker threads keeps whole-file rewrites serialized.
pub struct StateStore {
    backend: Box<dyn StateBackend>,
    writer: Mutex<()>,
}

impl StateStore {
    pub fn new(backend: impl StateBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            writer: Mutex::new(()),
        }
    }

    /// Store backed by a JSON file at `path`
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self::new(FileBackend::new(path))
    }

    /// Store that lives only as long as this value
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    /// Where the state lives, for messages
    pub fn location(&self) -> String {
        self.backend.describe()
    }

    /// Write the empty sentinel if nothing is stored yet.
    ///
    /// Returns true when the store was initialized by this call.
    pub fn init(&self) -> Result<bool> {
        let _guard = lock(&self.writer);
        if self.backend.read()?.is_some() {
            return Ok(false);
        }
        self.backend.write(EMPTY_STATE)?;
        log::info!("Initialized empty state at {}", self.location());
        Ok(true)
    }

    /// All entries in insertion order
    pub fn load(&self) -> Result<Vec<(String, ResourceSpec)>> {
        let Some(data) = self.backend.read()? else {
            log::debug!(
                "No state at {}, treating this as the first run",
                self.location()
            );
            return Ok(Vec::new());
        };
        decode(&data, &self.location())
    }

    /// The stored spec for `name`, if any
    pub fn get_one(&self, name: &str) -> Result<Option<ResourceSpec>> {
        Ok(self
            .load()?
            .into_iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, spec)| spec))
    }

    /// Add an entry that must not exist yet
    pub fn insert(&self, name: &str, spec: &ResourceSpec) -> Result<()> {
        let _guard = lock(&self.writer);
        let mut entries = self.load()?;
        if entries.iter().any(|(entry, _)| entry == name) {
            return Err(Error::state(format!(
                "resource {name} is already present in state"
            )));
        }
        entries.push((name.to_string(), spec.clone()));
        self.save(&entries)
    }

    /// Record `spec` as the last-applied spec for `name`.
    ///
    /// A changed entry is moved to the end of the record. An unchanged
    /// entry causes no write at all.
    pub fn upsert(&self, name: &str, spec: &ResourceSpec) -> Result<StateChange> {
        let _guard = lock(&self.writer);
        let mut entries = self.load()?;

        let change = match entries.iter().position(|(entry, _)| entry == name) {
            Some(idx) if entries[idx].1 == *spec => {
                log::info!("Resource {name} is in sync, state unchanged");
                return Ok(StateChange::Unchanged);
            }
            Some(idx) => {
                log::info!("Resource {name} has changes, updating state");
                entries.remove(idx);
                StateChange::Updated
            }
            None => {
                log::info!("Adding resource {name} to state");
                StateChange::Added
            }
        };

        entries.push((name.to_string(), spec.clone()));
        self.save(&entries)?;
        Ok(change)
    }

    /// Delete the entry for `name`
    pub fn remove(&self, name: &str) -> Result<ResourceSpec> {
        let _guard = lock(&self.writer);
        let mut entries = self.load()?;
        let idx = entries
            .iter()
            .position(|(entry, _)| entry == name)
            .ok_or_else(|| Error::NotFound {
                name: name.to_string(),
            })?;
        let (_, removed) = entries.remove(idx);
        self.save(&entries)?;
        log::info!("Removed resource {name} from state");
        Ok(removed)
    }

    fn save(&self, entries: &[(String, ResourceSpec)]) -> Result<()> {
        let data = encode(entries)?;
        self.backend.write(&data)
    }
}

fn decode(data: &[u8], location: &str) -> Result<Vec<(String, ResourceSpec)>> {
    let trimmed = data.trim_ascii();
    if trimmed == EMPTY_STATE {
        return Ok(Vec::new());
    }

    let raw: Vec<BTreeMap<String, ResourceSpec>> = serde_json::from_slice(trimmed)
        .map_err(|e| Error::state(format!("failed to parse state at {location}: {e}")))?;

    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(raw.len());
    for object in raw {
        if object.len() != 1 {
            return Err(Error::state(format!(
                "state at {location} has an entry with {} keys, expected one",
                object.len()
            )));
        }
        for (name, spec) in object {
            if !seen.insert(name.clone()) {
                return Err(Error::state(format!(
                    "state at {location} lists resource {name} more than once"
                )));
            }
            entries.push((name, spec));
        }
    }
    Ok(entries)
}

fn encode(entries: &[(String, ResourceSpec)]) -> Result<Vec<u8>> {
    let raw: Vec<BTreeMap<&str, &ResourceSpec>> = entries
        .iter()
        .map(|(name, spec)| BTreeMap::from([(name.as_str(), spec)]))
        .collect();
    serde_json::to_vec_pretty(&raw)
        .map_err(|e| Error::state(format!("failed to serialize state: {e}")))
}
