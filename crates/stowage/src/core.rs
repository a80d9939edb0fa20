//! Pure manifest version policy.

mod fallback;

pub use fallback::{BASELINE_VERSION, VersionFallback};
