//! Persisted state owned by the manifest layer.

mod version_store;

pub use version_store::{JsonVersionStore, MemoryVersionStore, VersionStore};
