//! Versioned bundle manifest for stowage.
//!
//! # Architecture
//!
//! This crate follows the three-layer pattern:
//! - [`data`] - Fingerprints, bundle descriptors and the manifest itself
//! - [`core`] - Pure dependency-graph analysis
//! - [`effects`] - Persisted "last known good" manifest versions
//!
//! The manifest is loaded wholesale and replaced wholesale; nothing in this
//! crate mutates a manifest once it has been handed out.

pub mod core;
pub mod data;
pub mod effects;
mod error;

pub use data::{BundleDescriptor, Fingerprint, Manifest};
pub use effects::{JsonVersionStore, MemoryVersionStore, VersionStore};
pub use error::{Error, Result};
