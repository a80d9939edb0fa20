use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Semaphore, SemaphorePermit};
use url::Url;

use super::handler::FetchHandler;
use super::session::SessionState;
use super::transfer::TransferChannel;
use crate::core::{ProgressGate, RetryPolicy};
use crate::data::{Bundle, BundleOrigin, DownloadCommand, SchedulerOptions, TransferOutcome, TransferRequest};
use crate::error::{Error, Result};

/// Parse an endpoint base URL, making sure bundle names join beneath it.
///
/// ```
/// use stowage_fetch::endpoint_url;
///
/// let base = endpoint_url("https://cdn.example.com/bundles").unwrap();
/// assert_eq!(base.as_str(), "https://cdn.example.com/bundles/");
/// assert_eq!(base.join("ui/menu").unwrap().as_str(), "https://cdn.example.com/bundles/ui/menu");
/// ```
pub fn endpoint_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw).map_err(|source| Error::InvalidEndpoint {
        url: raw.to_string(),
        source,
    })?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Admission control for transfers: at most `limit` in flight, the rest wait
/// in FIFO order.
#[derive(Debug)]
pub struct Admission {
    permits: Semaphore,
    limit:   usize,
}

impl Admission {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            permits: Semaphore::new(limit),
            limit,
        }
    }

    pub fn limit(&self) -> usize { self.limit }

    /// Transfers currently holding a slot.
    pub fn active(&self) -> usize { self.limit - self.permits.available_permits() }

    async fn acquire(&self) -> Option<SemaphorePermit<'_>> { self.permits.acquire().await.ok() }
}

/// Fetch handler that owns a [`TransferChannel`].
///
/// Per command: `Queued -> Sending -> {Success, RetryWait -> Sending, Failure}`.
/// A command waits for an admission slot, performs one attempt, and gives the
/// slot back before deciding what happens next, so a command waiting out a
/// retry delay never blocks others.
///
/// Failures are classified as:
/// - transient (status in the retry policy): retried after a delay until the
///   retry budget is spent
/// - cache corruption (success with an empty payload on a cacheable
///   request): caching is disabled for the session and the command is
///   resubmitted bypassing the cache; this happens at most once per session,
///   and every attempt rereads the session flag before it is sent
/// - anything else: reported as `None` immediately
pub struct DownloadScheduler {
    channel:   Arc<dyn TransferChannel>,
    base_uri:  Url,
    admission: Arc<Admission>,
    session:   Arc<SessionState>,
    retry:     RetryPolicy,
}

impl DownloadScheduler {
    pub fn new(
        channel: Arc<dyn TransferChannel>,
        base_uri: Url,
        options: SchedulerOptions,
        session: Arc<SessionState>,
    ) -> Self {
        Self {
            channel,
            base_uri,
            admission: Arc::new(Admission::new(options.max_concurrent)),
            session,
            retry: options.retry,
        }
    }

    /// A scheduler for another endpoint that shares this one's channel,
    /// admission slots, session state and retry policy.
    #[must_use]
    pub fn with_base_uri(&self, base_uri: Url) -> Self {
        Self {
            channel: Arc::clone(&self.channel),
            base_uri,
            admission: Arc::clone(&self.admission),
            session: Arc::clone(&self.session),
            retry: self.retry.clone(),
        }
    }

    pub fn base_uri(&self) -> &Url { &self.base_uri }

    pub fn admission(&self) -> &Arc<Admission> { &self.admission }

    pub fn session(&self) -> &Arc<SessionState> { &self.session }

    async fn run(&self, command: &DownloadCommand, progress: &ProgressGate) -> Option<Bundle> {
        let name = command.name.as_str();
        let uri = match self.base_uri.join(name) {
            Ok(uri) => uri,
            Err(e) => {
                tracing::error!(bundle = name, base = %self.base_uri, error = %e, "cannot build bundle URI");
                return None;
            }
        };

        let mut budget = self.retry.budget();
        let mut bypass_cache = false;

        loop {
            // Another command may have disabled caching while this one waited.
            bypass_cache |= self.session.caching_disabled();
            let request = TransferRequest {
                uri:         uri.clone(),
                name:        command.name.clone(),
                fingerprint: command.fingerprint.clone(),
                use_cache:   !bypass_cache,
            };

            let outcome = {
                let Some(_permit) = self.admission.acquire().await else {
                    tracing::error!(bundle = name, "admission closed");
                    return None;
                };
                tracing::debug!(bundle = name, uri = %request.uri, use_cache = request.use_cache, "sending");
                self.channel.transfer(&request, progress).await
            };

            match outcome {
                TransferOutcome::Completed(payload) if !payload.is_empty() => {
                    tracing::debug!(bundle = name, bytes = payload.len(), "transfer complete");
                    return Some(Bundle::new(
                        command.name.clone(),
                        command.fingerprint.clone(),
                        payload,
                        BundleOrigin::Remote,
                    ));
                }
                TransferOutcome::Completed(_) if request.is_cacheable() => {
                    if !self.session.disable_caching() {
                        tracing::error!(bundle = name, "empty payload after caching was already disabled");
                        return None;
                    }
                    tracing::warn!(
                        bundle = name,
                        "empty payload reported as success; disabling cache for the rest of the session"
                    );
                    bypass_cache = true;
                }
                // The cache was bypassed for this attempt. Unversioned requests
                // never read the cache, so their empty payload cannot come from
                // a stale entry and does not disable caching.
                TransferOutcome::Completed(_) => {
                    tracing::error!(bundle = name, use_cache = request.use_cache, "empty payload without cache");
                    return None;
                }
                TransferOutcome::Failed { status, message } if self.retry.is_transient(status) => {
                    let Some(retry) = budget.try_consume() else {
                        tracing::error!(
                            bundle = name,
                            status,
                            retries = budget.used(),
                            error = %message,
                            "transient failure persisted after all retries"
                        );
                        return None;
                    };
                    let delay = self.retry.delay_for(retry);
                    tracing::warn!(
                        bundle = name,
                        status,
                        attempt = retry + 1,
                        max_retries = self.retry.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                TransferOutcome::Failed { status, message } => {
                    tracing::error!(bundle = name, status, error = %message, "transfer failed");
                    return None;
                }
            }
        }
    }
}

#[async_trait]
impl FetchHandler for DownloadScheduler {
    async fn handle(&self, command: DownloadCommand) -> Option<Bundle> {
        let progress = ProgressGate::new(command.progress.clone());
        let bundle = self.run(&command, &progress).await;
        progress.finish();
        bundle
    }
}
