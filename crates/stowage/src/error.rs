//! Error types for stowage.

use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No manifest has been resolved or accepted yet.
    #[error("bundle manager is not initialized")]
    NotInitialized,

    #[error("dependency cycle while loading '{name}': {}", .cycle.join(" -> "))]
    DependencyCycle { name: String, cycle: Vec<String> },

    /// The fetch chain resolved without a bundle.
    #[error("bundle '{name}' is unavailable")]
    Unavailable { name: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read configuration '{path}': {source}")]
    ConfigRead { path: PathBuf, source: io::Error },

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error(transparent)]
    Fetch(#[from] stowage_fetch::Error),

    #[error(transparent)]
    Manifest(#[from] stowage_manifest::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
