use std::sync::Arc;

use async_trait::async_trait;
use bytes::BytesMut;
use futures_util::StreamExt;

use super::store::DiskCache;
use super::transfer::TransferChannel;
use crate::core::ProgressGate;
use crate::data::{TransferOutcome, TransferRequest};
use crate::error::Result;

/// Upper bound on the buffer reserved up front from `Content-Length`.
const MAX_PREALLOC: u64 = 64 * 1024 * 1024;

/// Production transfer channel over HTTP(S) using `reqwest`.
///
/// Versioned requests that allow cache use are answered from, and written
/// back to, the optional [`DiskCache`].
pub struct HttpChannel {
    client: reqwest::Client,
    cache:  Option<Arc<DiskCache>>,
}

impl HttpChannel {
    /// Create a channel with a default `reqwest` client and no cache.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self { Self { client, cache: None } }

    #[must_use]
    pub fn with_cache(mut self, cache: Arc<DiskCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    async fn download(&self, request: &TransferRequest, progress: &ProgressGate) -> TransferOutcome {
        let response = match self.client.get(request.uri.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                return TransferOutcome::Failed {
                    status:  e.status().map(|s| s.as_u16()),
                    message: e.to_string(),
                };
            }
        };

        let status = response.status();
        if !status.is_success() {
            return TransferOutcome::status(status.as_u16());
        }

        let total = response.content_length().filter(|&n| n > 0);
        let mut body = BytesMut::with_capacity(total.unwrap_or(0).min(MAX_PREALLOC) as usize);
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(chunk) => {
                    body.extend_from_slice(&chunk);
                    if let Some(total) = total {
                        progress.report(body.len() as f32 / total as f32);
                    }
                }
                Err(e) => return TransferOutcome::connection(e.to_string()),
            }
        }

        TransferOutcome::Completed(body.freeze())
    }
}

#[async_trait]
impl TransferChannel for HttpChannel {
    async fn transfer(&self, request: &TransferRequest, progress: &ProgressGate) -> TransferOutcome {
        let cache = self.cache.as_deref().filter(|_| request.is_cacheable());

        if let Some(cache) = cache
            && let Some(payload) = cache.read(&request.name, &request.fingerprint).await
        {
            tracing::debug!(bundle = %request.name, fingerprint = %request.fingerprint, "cache hit");
            return TransferOutcome::Completed(payload);
        }

        let outcome = self.download(request, progress).await;

        if let (Some(cache), TransferOutcome::Completed(payload)) = (cache, &outcome)
            && !payload.is_empty()
            && let Err(e) = cache.write(&request.name, &request.fingerprint, payload).await
        {
            tracing::warn!(bundle = %request.name, error = %e, "failed to fill cache");
        }

        outcome
    }
}
