//! Result and request types shared by the resolver, the cache and the manager.

mod resolution;
mod setting;

pub use resolution::{ManifestOrigin, Resolution};
pub use setting::CacheSetting;
