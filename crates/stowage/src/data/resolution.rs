use std::fmt;
use std::sync::Arc;

use stowage_manifest::Manifest;

/// Where the manifest in use came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestOrigin {
    /// Nothing could be resolved; bundle requests fail fast.
    NoManifest,
    /// The requested fresh version was fetched.
    RemoteFresh,
    /// A lower, previously published version was fetched after the fresh one
    /// failed on every endpoint.
    RemoteCachedFallback,
    /// Every remote attempt failed; the pre-seeded local manifest is used.
    LocalFallback,
}

impl ManifestOrigin {
    pub fn is_resolved(self) -> bool { self != Self::NoManifest }
}

impl fmt::Display for ManifestOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoManifest => "no manifest",
            Self::RemoteFresh => "remote (fresh)",
            Self::RemoteCachedFallback => "remote (fallback version)",
            Self::LocalFallback => "local copy",
        };
        f.write_str(s)
    }
}

/// Outcome of one manifest resolution.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub manifest: Option<Arc<Manifest>>,
    pub origin:   ManifestOrigin,

    /// Remote version that was fetched. `None` for local and failed
    /// resolutions.
    pub version: Option<u32>,
}

impl Resolution {
    pub(crate) fn remote(manifest: Manifest, origin: ManifestOrigin, version: u32) -> Self {
        Self {
            manifest: Some(Arc::new(manifest)),
            origin,
            version: Some(version),
        }
    }

    pub(crate) fn local(manifest: Arc<Manifest>) -> Self {
        Self {
            manifest: Some(manifest),
            origin:   ManifestOrigin::LocalFallback,
            version:  None,
        }
    }

    pub(crate) fn none() -> Self {
        Self {
            manifest: None,
            origin:   ManifestOrigin::NoManifest,
            version:  None,
        }
    }
}
