use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use stowage_manifest::Manifest;

use super::handler::FetchHandler;
use crate::core::ProgressGate;
use crate::data::{Bundle, BundleOrigin, DownloadCommand, LocalOptions, LocalStrategy};

/// Loads pre-seeded bundle payloads from local storage.
#[async_trait]
pub trait LocalLoader: Send + Sync {
    /// Payload at `path`, or `None` if it cannot be loaded.
    async fn load_from_path(&self, path: &Path) -> Option<Bytes>;
}

/// Reads payloads straight from the filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsLoader;

#[async_trait]
impl LocalLoader for FsLoader {
    async fn load_from_path(&self, path: &Path) -> Option<Bytes> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Some(Bytes::from(bytes)),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "local load failed");
                None
            }
        }
    }
}

/// Fetch handler that serves bundles from a pre-seeded local copy when it
/// can and delegates everything else to the wrapped handler.
///
/// The local manifest is loaded once, at construction. If that fails the
/// resolver stays disabled for its whole lifetime and only delegates. A local
/// load that fails at request time also falls back to delegation; the
/// resolver never fails a request on its own.
pub struct LocalFirstResolver {
    inner:    Arc<dyn FetchHandler>,
    loader:   Arc<dyn LocalLoader>,
    options:  LocalOptions,
    manifest: Option<Arc<Manifest>>,
}

impl LocalFirstResolver {
    /// Wrap `inner`, loading the local manifest from
    /// `<options.root>/<options.manifest_name>`.
    pub async fn load(
        inner: Arc<dyn FetchHandler>,
        options: LocalOptions,
        loader: Arc<dyn LocalLoader>,
    ) -> Self {
        let path = options.root.join(&options.manifest_name);
        let manifest = match loader.load_from_path(&path).await {
            Some(bytes) => match Manifest::from_json(&bytes) {
                Ok(manifest) => {
                    tracing::info!(
                        path = %path.display(),
                        bundles = manifest.len(),
                        strategy = ?options.strategy,
                        "local manifest loaded"
                    );
                    Some(Arc::new(manifest))
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "local manifest unreadable; local copies disabled");
                    None
                }
            },
            None => {
                tracing::info!(path = %path.display(), "no local manifest; local copies disabled");
                None
            }
        };

        Self {
            inner,
            loader,
            options,
            manifest,
        }
    }

    /// The manifest shipped with the local copy, if it loaded.
    pub fn local_manifest(&self) -> Option<Arc<Manifest>> { self.manifest.clone() }

    pub fn is_enabled(&self) -> bool { self.manifest.is_some() }

    pub fn options(&self) -> &LocalOptions { &self.options }

    /// Whether `command` should be tried against the local copy first.
    pub fn prefers_local(&self, command: &DownloadCommand) -> bool {
        let Some(manifest) = &self.manifest else {
            return false;
        };
        if command.name == self.options.manifest_name {
            return false;
        }
        match self.options.strategy {
            LocalStrategy::PreferLocal => true,
            LocalStrategy::MatchingFingerprint => manifest.fingerprint_of(&command.name) == command.fingerprint,
        }
    }

    fn local_path(&self, name: &str) -> PathBuf { self.options.root.join(name) }

    async fn load_local(&self, command: &DownloadCommand) -> Option<Bundle> {
        let manifest = self.manifest.as_ref()?;
        let payload = self.loader.load_from_path(&self.local_path(&command.name)).await?;
        if payload.is_empty() {
            return None;
        }
        Some(Bundle::new(
            command.name.clone(),
            manifest.fingerprint_of(&command.name),
            payload,
            BundleOrigin::Local,
        ))
    }
}

#[async_trait]
impl FetchHandler for LocalFirstResolver {
    async fn handle(&self, command: DownloadCommand) -> Option<Bundle> {
        if self.prefers_local(&command) {
            if let Some(bundle) = self.load_local(&command).await {
                tracing::debug!(bundle = %command.name, "served from local copy");
                ProgressGate::new(command.progress.clone()).finish();
                return Some(bundle);
            }
            tracing::debug!(bundle = %command.name, "local copy unavailable; delegating");
        }
        self.inner.handle(command).await
    }
}
