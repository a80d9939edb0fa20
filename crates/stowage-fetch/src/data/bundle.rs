use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use stowage_manifest::Fingerprint;

/// Where a bundle's payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleOrigin {
    /// Fetched through the transfer channel (network or its cache).
    Remote,
    /// Loaded from the pre-seeded local copy.
    Local,
}

/// Handle to one loaded bundle.
///
/// Clones share the same underlying resource; [`Bundle::same_resource`]
/// tells whether two handles point at it. Release is explicit and
/// idempotent: only the first [`Bundle::release`] call has any effect.
#[derive(Clone)]
pub struct Bundle {
    inner: Arc<BundleInner>,
}

struct BundleInner {
    name:              String,
    fingerprint:       Fingerprint,
    payload:           Bytes,
    origin:            BundleOrigin,
    released:          AtomicBool,
    objects_destroyed: AtomicBool,
}

impl Bundle {
    pub fn new(
        name: impl Into<String>,
        fingerprint: Fingerprint,
        payload: Bytes,
        origin: BundleOrigin,
    ) -> Self {
        Self {
            inner: Arc::new(BundleInner {
                name: name.into(),
                fingerprint,
                payload,
                origin,
                released: AtomicBool::new(false),
                objects_destroyed: AtomicBool::new(false),
            }),
        }
    }

    pub fn name(&self) -> &str { &self.inner.name }

    pub fn fingerprint(&self) -> &Fingerprint { &self.inner.fingerprint }

    pub fn payload(&self) -> &Bytes { &self.inner.payload }

    pub fn origin(&self) -> BundleOrigin { self.inner.origin }

    /// Release the resource. Returns `true` if this call performed the
    /// release, `false` if it had already been released.
    pub fn release(&self, destroy_loaded_objects: bool) -> bool {
        if self.inner.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        if destroy_loaded_objects {
            self.inner.objects_destroyed.store(true, Ordering::Release);
        }
        true
    }

    pub fn is_released(&self) -> bool { self.inner.released.load(Ordering::Acquire) }

    /// Whether the release also destroyed objects instantiated from it.
    pub fn loaded_objects_destroyed(&self) -> bool { self.inner.objects_destroyed.load(Ordering::Acquire) }

    pub fn same_resource(&self, other: &Bundle) -> bool { Arc::ptr_eq(&self.inner, &other.inner) }
}

impl fmt::Debug for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bundle")
            .field("name", &self.inner.name)
            .field("fingerprint", &self.inner.fingerprint)
            .field("payload_len", &self.inner.payload.len())
            .field("origin", &self.inner.origin)
            .field("released", &self.is_released())
            .finish()
    }
}
