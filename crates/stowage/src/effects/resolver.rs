use std::sync::Arc;

use stowage_fetch::{CacheIndex, DownloadCommand, LocalFirstResolver, NoCache};
use stowage_manifest::{Fingerprint, Manifest, MemoryVersionStore, VersionStore};

use super::failover::EndpointFailover;
use crate::core::{BASELINE_VERSION, VersionFallback};
use crate::data::{ManifestOrigin, Resolution};

/// Obtains the manifest through the endpoint chains.
///
/// Two independent axes: [`EndpointFailover`] walks the endpoints for one
/// version, [`VersionFallback`] walks the versions. The manifest for version
/// `v` is requested with [`Fingerprint::from_version`]`(v)`, so a previously
/// fetched version can be served by the channel's cache. When every remote
/// attempt fails, the local-first resolver's manifest is the last resort.
pub struct ManifestResolver {
    manifest_name: String,
    endpoints:     Arc<EndpointFailover>,
    local:         Option<Arc<LocalFirstResolver>>,
    versions:      Arc<dyn VersionStore>,
    cache:         Arc<dyn CacheIndex>,
    fallback:      VersionFallback,
}

impl ManifestResolver {
    /// Resolver with an in-memory version store and no cache index.
    pub fn new(manifest_name: impl Into<String>, endpoints: Arc<EndpointFailover>) -> Self {
        Self {
            manifest_name: manifest_name.into(),
            endpoints,
            local: None,
            versions: Arc::new(MemoryVersionStore::new()),
            cache: Arc::new(NoCache),
            fallback: VersionFallback::default(),
        }
    }

    #[must_use]
    pub fn with_local(mut self, local: Arc<LocalFirstResolver>) -> Self {
        self.local = Some(local);
        self
    }

    #[must_use]
    pub fn with_version_store(mut self, versions: Arc<dyn VersionStore>) -> Self {
        self.versions = versions;
        self
    }

    #[must_use]
    pub fn with_cache_index(mut self, cache: Arc<dyn CacheIndex>) -> Self {
        self.cache = cache;
        self
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: VersionFallback) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn manifest_name(&self) -> &str { &self.manifest_name }

    /// Resolve the manifest.
    ///
    /// On a remote success the version is persisted as last known good and
    /// every other cached version of the manifest is purged.
    pub async fn resolve(&self, want_fresh: bool) -> Resolution {
        let name = self.manifest_name.as_str();
        let last_good = self.versions.get(name);
        let start = self.fallback.start(want_fresh, last_good, |version| {
            self.cache.is_cached(name, &Fingerprint::from_version(version))
        });
        tracing::debug!(manifest = name, want_fresh, last_good, start, "resolving manifest");

        for version in self.fallback.versions(start) {
            if let Some(manifest) = self.fetch_version(version).await {
                let origin = if version == start {
                    ManifestOrigin::RemoteFresh
                } else {
                    ManifestOrigin::RemoteCachedFallback
                };
                tracing::info!(manifest = name, version, bundles = manifest.len(), %origin, "manifest resolved");
                self.record_success(version);
                return Resolution::remote(manifest, origin, version);
            }
            if version > BASELINE_VERSION {
                tracing::warn!(manifest = name, version, "manifest version failed on every endpoint; falling back");
            }
        }

        if let Some(manifest) = self.local.as_ref().and_then(|local| local.local_manifest()) {
            tracing::warn!(manifest = name, bundles = manifest.len(), "remote manifest unavailable; using local copy");
            return Resolution::local(manifest);
        }

        tracing::error!(manifest = name, endpoints = self.endpoints.len(), "no manifest could be resolved");
        Resolution::none()
    }

    async fn fetch_version(&self, version: u32) -> Option<Manifest> {
        let command = DownloadCommand::new(self.manifest_name.clone(), Fingerprint::from_version(version));
        self.endpoints
            .first_accepted(&command, |endpoint, bundle| {
                let parsed = Manifest::from_json(bundle.payload());
                bundle.release(false);
                match parsed {
                    Ok(manifest) => Some(manifest),
                    Err(e) => {
                        tracing::warn!(endpoint, version, error = %e, "unparseable manifest");
                        None
                    }
                }
            })
            .await
    }

    fn record_success(&self, version: u32) {
        let name = self.manifest_name.as_str();
        if let Err(e) = self.versions.set(name, version) {
            tracing::warn!(manifest = name, version, error = %e, "failed to persist manifest version");
        }
        let removed = self.cache.clear_other_versions(name, &Fingerprint::from_version(version));
        if removed > 0 {
            tracing::debug!(manifest = name, removed, "purged stale manifest versions");
        }
    }
}
