//! Error types for stowage-fetch.
//!
//! Only setup and cache bookkeeping can fail with these; the fetch path
//! itself reports absence instead of errors.

use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid endpoint URL '{url}': {source}")]
    InvalidEndpoint {
        url:    String,
        source: url::ParseError,
    },

    #[error("bundle cache I/O failed at '{path}': {source}")]
    CacheIo { path: PathBuf, source: io::Error },

    #[cfg(feature = "reqwest")]
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
