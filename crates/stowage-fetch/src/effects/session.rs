use std::sync::atomic::{AtomicBool, Ordering};

/// Mutable state shared by every scheduler of one manager instance.
#[derive(Debug, Default)]
pub struct SessionState {
    caching_disabled: AtomicBool,
}

impl SessionState {
    pub fn new() -> Self { Self::default() }

    /// Whether cache use has been switched off for the rest of the session.
    pub fn caching_disabled(&self) -> bool { self.caching_disabled.load(Ordering::Acquire) }

    /// Switch cache use off. Returns `true` only for the call that flipped
    /// the flag; the flag is never switched back on.
    pub fn disable_caching(&self) -> bool { !self.caching_disabled.swap(true, Ordering::AcqRel) }
}
