//! Bundle downloads with bounded concurrency, retries and local-first resolution.
//!
//! # Architecture
//!
//! This crate follows the three-layer pattern:
//! - [`data`] - Commands, bundle handles, transfer requests and options
//! - [`core`] - Pure retry and progress policy
//! - [`effects`] - Fetch handlers, the transfer channel seam and the disk cache
//!
//! # Fetch handler chain
//!
//! Everything that can satisfy a [`DownloadCommand`] implements
//! [`FetchHandler`]. Handlers compose by wrapping:
//!
//! ```text
//! LocalFirstResolver -> DownloadScheduler -> TransferChannel
//! ```
//!
//! A handler always resolves exactly once, to `Some(bundle)` or `None`.
//! Transfer errors never escape as `Err`; they are logged and turned into
//! `None`.

pub mod core;
pub mod data;
pub mod effects;
mod error;

pub use crate::core::{ProgressGate, RetryPolicy, retry_delay};
pub use data::{
    Backoff, Bundle, BundleOrigin, DownloadCommand, LocalOptions, LocalStrategy, ProgressSink,
    SchedulerOptions, TransferOutcome, TransferRequest,
};
pub use effects::{
    Admission, CacheIndex, DiskCache, DownloadScheduler, FetchHandler, FsLoader, LocalFirstResolver,
    LocalLoader, NoCache, SessionState, TransferChannel, endpoint_url,
};
pub use error::{Error, Result};

#[cfg(feature = "reqwest")]
pub use effects::HttpChannel;
