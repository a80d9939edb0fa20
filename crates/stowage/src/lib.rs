//! Reference-counted, dependency-aware bundle loading over a versioned
//! manifest.
//!
//! # Architecture
//!
//! This crate follows the three-layer pattern:
//! - [`data`] - Manifest origins, resolutions and cache settings
//! - [`core`] - Pure manifest version policy
//! - [`effects`] - Endpoint failover, manifest resolution and the bundle cache
//!
//! [`BundleManager`] ties them together, and [`Config`] describes a
//! production setup in TOML.
//!
//! # Request flow
//!
//! ```text
//! BundleManager -> BundleCache -> LocalFirstResolver -> EndpointFailover -> DownloadScheduler -> TransferChannel
//! ```
//!
//! Below the cache nothing fails loudly: handlers resolve to a bundle or to
//! nothing, with diagnostics in `tracing`. The cache turns absence into
//! [`Error::Unavailable`].

pub mod config;
pub mod core;
pub mod data;
pub mod effects;
mod error;
mod manager;

pub use crate::core::{BASELINE_VERSION, VersionFallback};
pub use config::Config;
pub use data::{CacheSetting, ManifestOrigin, Resolution};
pub use effects::{BundleCache, EndpointFailover, ManifestResolver};
pub use error::{Error, Result};
pub use manager::{BundleManager, ManagerParts};
