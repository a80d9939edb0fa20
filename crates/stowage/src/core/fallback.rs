/// Lowest manifest version ever requested. Also the only version requested
/// when a fresh manifest is not wanted.
pub const BASELINE_VERSION: u32 = 1;

/// Version axis of manifest resolution.
///
/// Starting from a fresh version, each version is tried once against every
/// endpoint; when all endpoints fail the next lower version is tried, down to
/// [`BASELINE_VERSION`]. The walk never climbs back up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VersionFallback {
    /// Upper bound on the number of versions tried in one resolution,
    /// including the starting one. `None` walks all the way to the baseline.
    pub max_versions: Option<u32>,
}

impl VersionFallback {
    pub fn new() -> Self { Self::default() }

    #[must_use]
    pub fn max_versions(mut self, max_versions: u32) -> Self {
        self.max_versions = Some(max_versions);
        self
    }

    /// First version to request.
    ///
    /// Fresh: one past `last_good`, skipping versions `is_cached` reports as
    /// already present. Otherwise the baseline.
    ///
    /// ```
    /// use stowage::VersionFallback;
    ///
    /// let policy = VersionFallback::new();
    /// assert_eq!(policy.start(true, 2, |_| false), 3);
    /// assert_eq!(policy.start(true, 2, |v| v == 3), 4);
    /// assert_eq!(policy.start(false, 2, |_| false), 1);
    /// ```
    pub fn start(&self, want_fresh: bool, last_good: u32, is_cached: impl Fn(u32) -> bool) -> u32 {
        if !want_fresh {
            return BASELINE_VERSION;
        }
        let mut version = last_good.saturating_add(1).max(BASELINE_VERSION);
        while version < u32::MAX && is_cached(version) {
            version += 1;
        }
        version
    }

    /// Versions to try, newest first.
    pub fn versions(&self, start: u32) -> impl Iterator<Item = u32> + use<> {
        let start = start.max(BASELINE_VERSION);
        let count = (start - BASELINE_VERSION + 1) as usize;
        let limit = self.max_versions.map_or(count, |max| (max.max(1) as usize).min(count));
        (BASELINE_VERSION..=start).rev().take(limit)
    }
}
