//! Durable key/value storage for session state.
//!
//! Every backend stores a flat map of string keys to string values. Writes
//! replace whole values and `remove_many` drops a set of keys in one step, so
//! a reader never observes a half-cleared session.

use crate::core::keyring::KeyringAccessError;
use directories::ProjectDirs;
use keyring::Entry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;
use tracing::warn;

const KEYRING_SERVICE: &str = "parlor";
const KEYRING_USER: &str = "session";

type Snapshot = BTreeMap<String, String>;

/// Writes start from an empty map when the stored one cannot be parsed, so a
/// corrupt session is overwritten instead of blocking every later write.
fn snapshot_for_write(
    loaded: Result<Snapshot, StorageError>,
) -> Result<Snapshot, StorageError> {
    match loaded {
        Err(StorageError::Json(err)) => {
            warn!("Discarding corrupt session storage: {err}");
            Ok(Snapshot::new())
        }
        other => other,
    }
}

#[derive(Debug)]
pub enum StorageError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Keyring(KeyringAccessError),
    NoDataDir,
    Poisoned,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(err) => write!(f, "session storage I/O failed: {err}"),
            StorageError::Json(err) => write!(f, "session storage is corrupt: {err}"),
            StorageError::Keyring(err) => write!(f, "{err}"),
            StorageError::NoDataDir => write!(f, "could not determine a data directory"),
            StorageError::Poisoned => write!(f, "session storage lock poisoned"),
        }
    }
}

impl StdError for StorageError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            StorageError::Io(err) => Some(err),
            StorageError::Json(err) => Some(err),
            StorageError::Keyring(err) => Some(err),
            StorageError::NoDataDir | StorageError::Poisoned => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Json(err)
    }
}

impl From<keyring::Error> for StorageError {
    fn from(err: keyring::Error) -> Self {
        StorageError::Keyring(KeyringAccessError::from(err))
    }
}

/// Which durable backend holds the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

impl StorageBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageBackend::File => "file",
            StorageBackend::Keyring => "keyring",
            StorageBackend::Memory => "memory",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "file" => Some(StorageBackend::File),
            "keyring" => Some(StorageBackend::Keyring),
            "memory" => Some(StorageBackend::Memory),
            _ => None,
        }
    }

    /// Open the backend at its default location.
    pub fn open(self) -> Result<Box<dyn SessionStorage>, StorageError> {
        Ok(match self {
            StorageBackend::File => Box::new(FileStorage::open(FileStorage::default_path()?)),
            StorageBackend::Keyring => Box::new(KeyringStorage::new()),
            StorageBackend::Memory => Box::new(MemoryStorage::new()),
        })
    }
}

pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes every listed key as a single replacement of the stored state.
    fn remove_many(&self, keys: &[String]) -> Result<(), StorageError>;

    fn keys(&self) -> Result<Vec<String>, StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.remove_many(&[key.to_string()])
    }
}

/// In-process storage. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<Snapshot>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_many(&self, keys: &[String]) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.keys().cloned().collect())
    }
}

/// A JSON object on disk, rewritten atomically on every mutation.
///
/// The file is re-read on each access so a second process sharing the same
/// path sees fresh state, the way a browser tab sees another tab's writes.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn default_path() -> Result<PathBuf, StorageError> {
        let proj_dirs =
            ProjectDirs::from("org", "parlor", "parlor").ok_or(StorageError::NoDataDir)?;
        Ok(proj_dirs.data_dir().join("session.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Snapshot, StorageError> {
        if !self.path.exists() {
            return Ok(Snapshot::new());
        }
        let contents = fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(Snapshot::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        let parent = self
            .path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty());

        if let Some(dir) = parent {
            fs::create_dir_all(dir)?;
        }

        let contents = serde_json::to_string_pretty(snapshot)?;
        let mut temp_file = match parent {
            Some(dir) => NamedTempFile::new_in(dir)?,
            None => NamedTempFile::new()?,
        };

        temp_file.write_all(contents.as_bytes())?;
        temp_file.as_file_mut().sync_all()?;
        temp_file
            .persist(&self.path)
            .map_err(|err| StorageError::Io(err.error))?;
        Ok(())
    }

    fn update(&self, apply: impl FnOnce(&mut Snapshot)) -> Result<(), StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        let mut snapshot = snapshot_for_write(self.load())?;
        apply(&mut snapshot);
        self.save(&snapshot)
    }
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.update(|snapshot| {
            snapshot.insert(key.to_string(), value.to_string());
        })
    }

    fn remove_many(&self, keys: &[String]) -> Result<(), StorageError> {
        self.update(|snapshot| {
            for key in keys {
                snapshot.remove(key);
            }
        })
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(self.load()?.into_keys().collect())
    }
}

/// Keeps the whole session map as one secret in the platform keyring.
#[derive(Debug)]
pub struct KeyringStorage {
    service: String,
    user: String,
    lock: Mutex<()>,
}

impl Default for KeyringStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyringStorage {
    pub fn new() -> Self {
        Self::with_entry(KEYRING_SERVICE, KEYRING_USER)
    }

    pub fn with_entry(service: &str, user: &str) -> Self {
        Self {
            service: service.to_string(),
            user: user.to_string(),
            lock: Mutex::new(()),
        }
    }

    fn entry(&self) -> Result<Entry, StorageError> {
        Ok(Entry::new(&self.service, &self.user)?)
    }

    fn load(&self) -> Result<Snapshot, StorageError> {
        match self.entry()?.get_password() {
            Ok(secret) => Ok(serde_json::from_str(&secret)?),
            Err(keyring::Error::NoEntry) => Ok(Snapshot::new()),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        let entry = self.entry()?;
        if snapshot.is_empty() {
            return match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
                Err(err) => Err(err.into()),
            };
        }
        entry.set_password(&serde_json::to_string(snapshot)?)?;
        Ok(())
    }

    fn update(&self, apply: impl FnOnce(&mut Snapshot)) -> Result<(), StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        let mut snapshot = snapshot_for_write(self.load())?;
        apply(&mut snapshot);
        self.save(&snapshot)
    }
}

impl SessionStorage for KeyringStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.update(|snapshot| {
            snapshot.insert(key.to_string(), value.to_string());
        })
    }

    fn remove_many(&self, keys: &[String]) -> Result<(), StorageError> {
        self.update(|snapshot| {
            for key in keys {
                snapshot.remove(key);
            }
        })
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(self.load()?.into_keys().collect())
    }
}
