use std::sync::Arc;

use async_trait::async_trait;
use stowage_fetch::{Bundle, DownloadCommand, FetchHandler};

/// Endpoint axis of resolution: one fetch chain per endpoint, tried in order.
///
/// As a [`FetchHandler`] it returns the first endpoint's bundle. The manifest
/// resolver uses [`EndpointFailover::first_accepted`] instead, so a payload
/// that does not parse counts as that endpoint failing.
pub struct EndpointFailover {
    endpoints: Vec<Arc<dyn FetchHandler>>,
}

impl EndpointFailover {
    /// `endpoints` in priority order, highest first.
    pub fn new(endpoints: Vec<Arc<dyn FetchHandler>>) -> Self { Self { endpoints } }

    pub fn len(&self) -> usize { self.endpoints.len() }

    pub fn is_empty(&self) -> bool { self.endpoints.is_empty() }

    /// Run `command` against each endpoint until `accept` takes a bundle.
    pub async fn first_accepted<T>(
        &self,
        command: &DownloadCommand,
        mut accept: impl FnMut(usize, Bundle) -> Option<T> + Send,
    ) -> Option<T> {
        for (index, endpoint) in self.endpoints.iter().enumerate() {
            match endpoint.handle(command.clone()).await {
                Some(bundle) => {
                    if let Some(value) = accept(index, bundle) {
                        return Some(value);
                    }
                }
                None => tracing::info!(bundle = %command.name, endpoint = index, "endpoint failed"),
            }
        }
        None
    }
}

#[async_trait]
impl FetchHandler for EndpointFailover {
    async fn handle(&self, command: DownloadCommand) -> Option<Bundle> {
        self.first_accepted(&command, |_, bundle| Some(bundle)).await
    }
}
