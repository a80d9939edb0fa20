//! Manifest resolution and the bundle cache.

mod cache;
mod failover;
mod resolver;

pub use cache::BundleCache;
pub use failover::EndpointFailover;
pub use resolver::ManifestResolver;
