//! Error types for stowage-manifest.

use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid fingerprint: {0:?}")]
    InvalidFingerprint(String),

    #[error("malformed manifest document: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("bundle '{0}' is listed more than once")]
    DuplicateBundle(String),

    #[error("version store at '{path}' is unreadable: {source}")]
    StoreRead { path: PathBuf, source: io::Error },

    #[error("version store at '{path}' is corrupt: {source}")]
    StoreCorrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to persist version store to '{path}': {source}")]
    StoreWrite { path: PathBuf, source: io::Error },
}

pub type Result<T> = std::result::Result<T, Error>;
