//! The façade callers use: one manifest resolver plus one bundle cache.

use std::sync::{Arc, Mutex, PoisonError};

use stowage_fetch::{Bundle, CacheIndex, FetchHandler, LocalFirstResolver, NoCache, ProgressSink, SessionState};
use stowage_manifest::{Manifest, MemoryVersionStore, VersionStore};

use crate::core::VersionFallback;
use crate::data::{CacheSetting, ManifestOrigin};
use crate::effects::{BundleCache, EndpointFailover, ManifestResolver};
use crate::error::Result;

/// Everything a [`BundleManager`] is assembled from.
///
/// `local`, when present, must wrap `endpoints`; it becomes the fetch chain
/// for bundles and supplies the last-resort manifest.
pub struct ManagerParts {
    pub manifest_name: String,
    pub endpoints:     Arc<EndpointFailover>,
    pub local:         Option<Arc<LocalFirstResolver>>,
    pub versions:      Arc<dyn VersionStore>,
    pub cache_index:   Arc<dyn CacheIndex>,
    pub fallback:      VersionFallback,
    pub session:       Arc<SessionState>,
    pub want_fresh:    bool,
}

impl ManagerParts {
    /// Parts with an in-memory version store, no cache index and no local
    /// copy.
    pub fn new(manifest_name: impl Into<String>, endpoints: Arc<EndpointFailover>) -> Self {
        Self {
            manifest_name: manifest_name.into(),
            endpoints,
            local: None,
            versions: Arc::new(MemoryVersionStore::new()),
            cache_index: Arc::new(NoCache),
            fallback: VersionFallback::default(),
            session: Arc::new(SessionState::new()),
            want_fresh: true,
        }
    }
}

/// Resolves the manifest once, then serves reference-counted bundles.
///
/// Until [`initialize`](Self::initialize) succeeds or
/// [`accept_missing_manifest`](Self::accept_missing_manifest) is called,
/// every bundle request fails with
/// [`Error::NotInitialized`](crate::Error::NotInitialized) without touching
/// the network.
pub struct BundleManager {
    resolver:   ManifestResolver,
    cache:      BundleCache,
    session:    Arc<SessionState>,
    origin:     Mutex<ManifestOrigin>,
    want_fresh: bool,
}

impl BundleManager {
    pub fn new(parts: ManagerParts) -> Self {
        let handler: Arc<dyn FetchHandler> = match &parts.local {
            Some(local) => Arc::clone(local) as Arc<dyn FetchHandler>,
            None => Arc::clone(&parts.endpoints) as Arc<dyn FetchHandler>,
        };

        let mut resolver = ManifestResolver::new(parts.manifest_name, parts.endpoints)
            .with_version_store(parts.versions)
            .with_cache_index(parts.cache_index)
            .with_fallback(parts.fallback);
        if let Some(local) = parts.local {
            resolver = resolver.with_local(local);
        }

        Self {
            resolver,
            cache: BundleCache::new(handler),
            session: parts.session,
            origin: Mutex::new(ManifestOrigin::NoManifest),
            want_fresh: parts.want_fresh,
        }
    }

    /// Build the production stack described by `config`: an HTTP channel
    /// with an optional disk cache, one scheduler per endpoint sharing
    /// admission, the local copy if configured and the version store.
    #[cfg(feature = "reqwest")]
    pub async fn from_config(config: &crate::Config) -> Result<Self> {
        use stowage_fetch::{
            DiskCache, DownloadScheduler, FsLoader, HttpChannel, LocalOptions, TransferChannel, endpoint_url,
        };
        use stowage_manifest::JsonVersionStore;

        use crate::error::Error;

        config.validate()?;

        let disk = config.cache_dir.as_ref().map(|dir| Arc::new(DiskCache::new(dir)));
        let mut channel = HttpChannel::new()?;
        if let Some(disk) = &disk {
            channel = channel.with_cache(Arc::clone(disk));
        }
        let channel: Arc<dyn TransferChannel> = Arc::new(channel);

        let urls = config
            .sorted_endpoints()
            .into_iter()
            .map(|endpoint| endpoint_url(&endpoint.url))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let Some(first) = urls.first() else {
            return Err(Error::InvalidConfig("at least one endpoint is required".into()));
        };

        let session = Arc::new(SessionState::new());
        let primary =
            DownloadScheduler::new(channel, first.clone(), config.scheduler_options(), Arc::clone(&session));
        let handlers: Vec<Arc<dyn FetchHandler>> = urls
            .iter()
            .map(|url| Arc::new(primary.with_base_uri(url.clone())) as Arc<dyn FetchHandler>)
            .collect();
        let endpoints = Arc::new(EndpointFailover::new(handlers));

        let local = match &config.local {
            Some(local) => {
                let options = LocalOptions::new(&local.root, &config.manifest).strategy(local.strategy);
                let inner: Arc<dyn FetchHandler> = endpoints.clone();
                Some(Arc::new(LocalFirstResolver::load(inner, options, Arc::new(FsLoader)).await))
            }
            None => None,
        };

        let versions: Arc<dyn VersionStore> = match &config.version_file {
            Some(path) => Arc::new(JsonVersionStore::open(path)?),
            None => Arc::new(MemoryVersionStore::new()),
        };
        let cache_index: Arc<dyn CacheIndex> = match disk {
            Some(disk) => disk as Arc<dyn CacheIndex>,
            None => Arc::new(NoCache),
        };

        tracing::info!(
            manifest = %config.manifest,
            endpoints = endpoints.len(),
            local = local.is_some(),
            "bundle manager configured"
        );

        Ok(Self::new(ManagerParts {
            manifest_name: config.manifest.clone(),
            endpoints,
            local,
            versions,
            cache_index,
            fallback: config.version_fallback(),
            session,
            want_fresh: config.want_fresh,
        }))
    }

    /// Resolve the manifest and make it current.
    ///
    /// A failed resolution leaves any previously installed manifest in place.
    pub async fn initialize(&self, want_fresh: bool) -> ManifestOrigin {
        let resolution = self.resolver.resolve(want_fresh).await;
        if let Some(manifest) = resolution.manifest {
            self.cache.set_manifest(manifest);
        }
        *self.origin.lock().unwrap_or_else(PoisonError::into_inner) = resolution.origin;
        resolution.origin
    }

    /// [`initialize`](Self::initialize) with the configured freshness.
    pub async fn initialize_default(&self) -> ManifestOrigin { self.initialize(self.want_fresh).await }

    /// Proceed without a manifest: bundles are requested unversioned and
    /// without dependencies.
    pub fn accept_missing_manifest(&self) {
        tracing::warn!(manifest = self.resolver.manifest_name(), "continuing without a manifest");
        self.cache.set_manifest(Manifest::new());
    }

    pub fn is_initialized(&self) -> bool { self.cache.is_initialized() }

    /// Origin reported by the last [`initialize`](Self::initialize).
    pub fn origin(&self) -> ManifestOrigin { *self.origin.lock().unwrap_or_else(PoisonError::into_inner) }

    pub async fn get_bundle(&self, name: &str) -> Result<Bundle> {
        self.cache.get_bundle(name, CacheSetting::UseManifest).await
    }

    /// Request `name` with an explicit cache setting, optionally observing
    /// download progress. See [`BundleCache::get_bundle_with_progress`] for
    /// how progress is shared between concurrent requests.
    pub async fn get_bundle_with(
        &self,
        name: &str,
        setting: CacheSetting,
        progress: Option<ProgressSink>,
    ) -> Result<Bundle> {
        self.cache.get_bundle_with_progress(name, setting, progress).await
    }

    pub fn unload_bundle(&self, name: &str, destroy_loaded_objects: bool, force: bool) -> usize {
        self.cache.unload_bundle(name, destroy_loaded_objects, force)
    }

    pub fn dispose(&self) { self.cache.dispose() }

    pub fn cache(&self) -> &BundleCache { &self.cache }

    pub fn resolver(&self) -> &ManifestResolver { &self.resolver }

    pub fn session(&self) -> &Arc<SessionState> { &self.session }
}
