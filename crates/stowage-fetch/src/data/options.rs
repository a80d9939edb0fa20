use std::path::PathBuf;

use serde::Deserialize;

use crate::core::RetryPolicy;

/// How the delay between retries grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    /// Same delay before every retry.
    #[default]
    Fixed,

    /// `delay * 2^retry`, saturating.
    Exponential,
}

/// Configuration for a [`DownloadScheduler`](crate::DownloadScheduler).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use stowage_fetch::{RetryPolicy, SchedulerOptions};
///
/// let options = SchedulerOptions::default()
///     .max_concurrent(2)
///     .retry(RetryPolicy::default().max_retries(5).delay(Duration::from_millis(250)));
/// assert_eq!(options.max_concurrent, 2);
/// assert_eq!(options.retry.max_retries, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// Upper bound on transfers in flight across every scheduler sharing the
    /// same admission. Values below 1 are treated as 1.
    ///
    /// Default: 4
    pub max_concurrent: usize,

    /// Retry policy for transient transfer failures.
    pub retry: RetryPolicy,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            retry:          RetryPolicy::default(),
        }
    }
}

impl SchedulerOptions {
    #[must_use]
    pub fn max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    #[must_use]
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// When the local-first resolver serves a bundle from its local copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalStrategy {
    /// Always try the local copy first.
    #[default]
    PreferLocal,

    /// Use the local copy only when its fingerprint equals the requested one.
    MatchingFingerprint,
}

/// Configuration for a [`LocalFirstResolver`](crate::LocalFirstResolver).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalOptions {
    /// Directory holding the pre-seeded bundles.
    pub root: PathBuf,

    /// Name of the manifest bundle. Never served locally.
    pub manifest_name: String,

    pub strategy: LocalStrategy,
}

impl LocalOptions {
    pub fn new(root: impl Into<PathBuf>, manifest_name: impl Into<String>) -> Self {
        Self {
            root:          root.into(),
            manifest_name: manifest_name.into(),
            strategy:      LocalStrategy::default(),
        }
    }

    #[must_use]
    pub fn strategy(mut self, strategy: LocalStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}
