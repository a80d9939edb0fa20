use bytes::Bytes;
use stowage_manifest::Fingerprint;
use url::Url;

/// One attempt handed to a [`TransferChannel`](crate::TransferChannel).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub uri:         Url,
    pub name:        String,
    pub fingerprint: Fingerprint,

    /// Whether the channel may answer from, and fill, its cache.
    /// Meaningless for unversioned requests, which always go to the network.
    pub use_cache: bool,
}

impl TransferRequest {
    /// True when the channel may consult its cache for this request.
    pub fn is_cacheable(&self) -> bool { self.use_cache && !self.fingerprint.is_unversioned() }
}

/// Terminal state of one transfer attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The channel reported success. The payload may be empty, which the
    /// scheduler treats as a cache-corruption symptom.
    Completed(Bytes),

    /// The channel reported an error. `status` carries the HTTP-like status
    /// code when there was one; connection failures have none.
    Failed { status: Option<u16>, message: String },
}

impl TransferOutcome {
    pub fn status(code: u16) -> Self {
        Self::Failed {
            status:  Some(code),
            message: format!("HTTP {code}"),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::Failed {
            status:  None,
            message: message.into(),
        }
    }
}
