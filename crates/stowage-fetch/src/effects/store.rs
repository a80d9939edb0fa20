use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use sha2::{Digest, Sha256};
use stowage_manifest::Fingerprint;

use crate::error::{Error, Result};

/// Read-side view of a fingerprint-keyed bundle cache.
///
/// The manifest resolver uses this to skip manifest versions that are already
/// cached and to purge versions that are no longer current.
pub trait CacheIndex: Send + Sync {
    fn is_cached(&self, name: &str, fingerprint: &Fingerprint) -> bool;

    /// Remove every cached version of `name` except `keep`. Returns how many
    /// versions were removed.
    fn clear_other_versions(&self, name: &str, keep: &Fingerprint) -> usize;
}

/// A cache that never holds anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl CacheIndex for NoCache {
    fn is_cached(&self, _name: &str, _fingerprint: &Fingerprint) -> bool { false }

    fn clear_other_versions(&self, _name: &str, _keep: &Fingerprint) -> usize { 0 }
}

/// On-disk bundle cache.
///
/// Layout: `<root>/<key(name)>/<fingerprint>`, where `key` is a 16-digit
/// SHA-256 prefix of the bundle name so names may contain path separators.
/// Unversioned payloads are never stored.
#[derive(Debug, Clone)]
pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    pub fn root(&self) -> &Path { &self.root }

    fn bundle_dir(&self, name: &str) -> PathBuf {
        let hash = Sha256::digest(name.as_bytes());
        self.root.join(hex::encode(&hash[..8]))
    }

    fn entry_path(&self, name: &str, fingerprint: &Fingerprint) -> PathBuf {
        self.bundle_dir(name).join(fingerprint.as_str())
    }

    /// Cached payload for `name` at `fingerprint`.
    ///
    /// A present but empty entry is returned as an empty payload; callers
    /// decide what an empty cache hit means.
    pub async fn read(&self, name: &str, fingerprint: &Fingerprint) -> Option<Bytes> {
        if fingerprint.is_unversioned() {
            return None;
        }
        let path = self.entry_path(name, fingerprint);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Some(Bytes::from(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(bundle = name, path = %path.display(), error = %e, "unreadable cache entry");
                None
            }
        }
    }

    /// Store a payload. The entry appears atomically: it is staged next to
    /// its final path and renamed into place.
    pub async fn write(&self, name: &str, fingerprint: &Fingerprint, payload: &[u8]) -> Result<()> {
        if fingerprint.is_unversioned() {
            return Ok(());
        }
        let dir = self.bundle_dir(name);
        let path = self.entry_path(name, fingerprint);
        let staging = path.with_extension("part");
        let cache_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| Error::CacheIo { path, source }
        };

        tokio::fs::create_dir_all(&dir).await.map_err(cache_err(&dir))?;
        tokio::fs::write(&staging, payload).await.map_err(cache_err(&staging))?;
        tokio::fs::rename(&staging, &path).await.map_err(cache_err(&path))?;
        Ok(())
    }
}

impl CacheIndex for DiskCache {
    fn is_cached(&self, name: &str, fingerprint: &Fingerprint) -> bool {
        !fingerprint.is_unversioned() && self.entry_path(name, fingerprint).is_file()
    }

    fn clear_other_versions(&self, name: &str, keep: &Fingerprint) -> usize {
        let dir = self.bundle_dir(name);
        let Ok(entries) = std::fs::read_dir(&dir) else { return 0 };

        let mut removed = 0;
        for entry in entries.flatten() {
            if entry.file_name().to_str() == Some(keep.as_str()) {
                continue;
            }
            match std::fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::warn!(bundle = name, path = %entry.path().display(), error = %e, "failed to purge cache entry")
                }
            }
        }
        removed
    }
}
