/// How the requested bundle's fingerprint is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheSetting {
    /// Request the fingerprint the manifest lists, so the channel may serve
    /// a cached copy.
    #[default]
    UseManifest,

    /// Request unversioned, which always goes to the network. Applies to
    /// the requested bundle only; its dependencies still use the manifest.
    Bypass,
}
