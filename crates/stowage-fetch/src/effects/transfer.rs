use async_trait::async_trait;

use crate::core::ProgressGate;
use crate::data::{TransferOutcome, TransferRequest};

/// The transport that performs one fetch of a byte payload.
///
/// A channel performs exactly one attempt per call and never retries on its
/// own; retry and cache remediation belong to the
/// [`DownloadScheduler`](crate::DownloadScheduler). Whatever the channel
/// holds for the attempt is owned by the returned future and released when it
/// completes.
#[async_trait]
pub trait TransferChannel: Send + Sync {
    /// Perform one attempt, reporting raw progress through `progress`.
    async fn transfer(&self, request: &TransferRequest, progress: &ProgressGate) -> TransferOutcome;
}
