use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};

/// Persisted key/value store remembering the last good manifest version.
///
/// `get` never fails: a missing or unreadable key is version `0`.
pub trait VersionStore: Send + Sync {
    fn get(&self, key: &str) -> u32;

    fn set(&self, key: &str, version: u32) -> Result<()>;
}

/// Process-local store; forgets everything on drop.
#[derive(Debug, Default)]
pub struct MemoryVersionStore {
    versions: Mutex<BTreeMap<String, u32>>,
}

impl MemoryVersionStore {
    pub fn new() -> Self { Self::default() }

    /// Seed a version, e.g. to emulate a previous session.
    #[must_use]
    pub fn with_version(self, key: impl Into<String>, version: u32) -> Self {
        lock(&self.versions).insert(key.into(), version);
        self
    }
}

impl VersionStore for MemoryVersionStore {
    fn get(&self, key: &str) -> u32 { lock(&self.versions).get(key).copied().unwrap_or(0) }

    fn set(&self, key: &str, version: u32) -> Result<()> {
        lock(&self.versions).insert(key.to_string(), version);
        Ok(())
    }
}

/// Store backed by a small JSON object on disk.
///
/// Every `set` rewrites the file through a temporary sibling that is renamed
/// into place, so a crash never leaves a half-written store behind.
#[derive(Debug)]
pub struct JsonVersionStore {
    path:     PathBuf,
    versions: Mutex<BTreeMap<String, u32>>,
}

impl JsonVersionStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let versions = match std::fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| Error::StoreCorrupt {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(Error::StoreRead { path, source }),
        };

        Ok(Self {
            path,
            versions: Mutex::new(versions),
        })
    }

    pub fn path(&self) -> &Path { &self.path }

    fn persist(&self, versions: &BTreeMap<String, u32>) -> Result<()> {
        let write_err = |source| Error::StoreWrite {
            path: self.path.clone(),
            source,
        };
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(write_err)?;

        let bytes = serde_json::to_vec_pretty(versions).map_err(std::io::Error::from).map_err(write_err)?;
        let mut staged = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        staged.write_all(&bytes).map_err(write_err)?;
        staged.as_file().sync_all().map_err(write_err)?;
        staged.persist(&self.path).map_err(|e| write_err(e.error))?;
        Ok(())
    }
}

impl VersionStore for JsonVersionStore {
    fn get(&self, key: &str) -> u32 { lock(&self.versions).get(key).copied().unwrap_or(0) }

    fn set(&self, key: &str, version: u32) -> Result<()> {
        let mut versions = lock(&self.versions);
        versions.insert(key.to_string(), version);
        self.persist(&versions)?;
        tracing::debug!(key, version, path = %self.path.display(), "persisted manifest version");
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> { mutex.lock().unwrap_or_else(PoisonError::into_inner) }
