//! Immutable manifest types.
//!
//! A [`Manifest`] maps bundle names to [`BundleDescriptor`]s. Descriptors are
//! never edited in place; a new manifest document replaces the old one.

mod fingerprint;
mod manifest;

pub use fingerprint::Fingerprint;
pub use manifest::{BundleDescriptor, Manifest};
