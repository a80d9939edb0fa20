//! TOML configuration for a [`BundleManager`](crate::BundleManager).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use stowage_fetch::{Backoff, LocalStrategy, RetryPolicy, SchedulerOptions, endpoint_url};

use crate::core::VersionFallback;
use crate::error::{Error, Result};

/// Manager configuration.
///
/// ```
/// let config = stowage::Config::from_toml_str(r#"
///     manifest = "StandaloneLinux64"
///
///     [[endpoints]]
///     url = "https://cdn.example.com/bundles/"
/// "#).unwrap();
/// assert_eq!(config.scheduler.max_concurrent, 4);
/// assert!(config.want_fresh);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Name of the manifest bundle.
    pub manifest: String,

    /// Root of the on-disk fingerprint cache. No cache when absent.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// File remembering the last good manifest version across sessions.
    /// Kept in memory when absent.
    #[serde(default)]
    pub version_file: Option<PathBuf>,

    /// Default for [`BundleManager::initialize_default`](crate::BundleManager::initialize_default).
    #[serde(default = "default_want_fresh")]
    pub want_fresh: bool,

    pub endpoints: Vec<EndpointConfig>,

    #[serde(default)]
    pub local: Option<LocalConfig>,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub manifest_fallback: FallbackConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointConfig {
    pub url: String,

    /// Lower is tried first. Ties keep file order.
    #[serde(default)]
    pub priority: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalConfig {
    /// Directory holding the pre-seeded bundles and their manifest.
    pub root: PathBuf,

    #[serde(default)]
    pub strategy: LocalStrategy,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    pub max_concurrent:     usize,
    pub max_retries:        u32,
    pub retry_delay_ms:     u64,
    pub backoff:            Backoff,
    pub transient_statuses: Vec<u16>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            max_concurrent:     SchedulerOptions::default().max_concurrent,
            max_retries:        retry.max_retries,
            retry_delay_ms:     retry.delay.as_millis() as u64,
            backoff:            retry.backoff,
            transient_statuses: retry.transient_statuses,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FallbackConfig {
    pub max_versions: Option<u32>,
}

fn default_want_fresh() -> bool { true }

impl Config {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&s)
    }

    pub fn validate(&self) -> Result<()> {
        if self.manifest.trim().is_empty() {
            return Err(Error::InvalidConfig("manifest name is empty".into()));
        }
        if self.endpoints.is_empty() {
            return Err(Error::InvalidConfig("at least one endpoint is required".into()));
        }
        if self.scheduler.max_concurrent == 0 {
            return Err(Error::InvalidConfig("scheduler.max_concurrent must be at least 1".into()));
        }
        for endpoint in &self.endpoints {
            endpoint_url(&endpoint.url)?;
        }
        Ok(())
    }

    /// Endpoints in the order they are tried.
    pub fn sorted_endpoints(&self) -> Vec<&EndpointConfig> {
        let mut endpoints: Vec<&EndpointConfig> = self.endpoints.iter().collect();
        endpoints.sort_by_key(|endpoint| endpoint.priority);
        endpoints
    }

    pub fn scheduler_options(&self) -> SchedulerOptions {
        let s = &self.scheduler;
        SchedulerOptions::default().max_concurrent(s.max_concurrent).retry(
            RetryPolicy::default()
                .max_retries(s.max_retries)
                .delay(Duration::from_millis(s.retry_delay_ms))
                .backoff(s.backoff)
                .transient_statuses(s.transient_statuses.clone()),
        )
    }

    pub fn version_fallback(&self) -> VersionFallback {
        VersionFallback {
            max_versions: self.manifest_fallback.max_versions,
        }
    }
}
