use std::sync::Arc;

use async_trait::async_trait;

use crate::data::{Bundle, DownloadCommand};

/// Anything that can satisfy a [`DownloadCommand`].
///
/// `handle` resolves exactly once: `Some` with the loaded bundle, or `None`
/// for a logical failure. Implementations may invoke the command's progress
/// sink any number of times before resolving.
///
/// # Implementations
///
/// - [`DownloadScheduler`](crate::DownloadScheduler): drives a transfer channel
/// - [`LocalFirstResolver`](crate::LocalFirstResolver): serves pre-seeded
///   copies and delegates the rest
#[async_trait]
pub trait FetchHandler: Send + Sync {
    async fn handle(&self, command: DownloadCommand) -> Option<Bundle>;
}

#[async_trait]
impl<H: FetchHandler + ?Sized> FetchHandler for Arc<H> {
    async fn handle(&self, command: DownloadCommand) -> Option<Bundle> { (**self).handle(command).await }
}
