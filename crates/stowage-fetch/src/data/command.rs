use std::fmt;
use std::sync::Arc;

use stowage_manifest::Fingerprint;

/// Receives download progress in `[0, 1]`.
pub type ProgressSink = Arc<dyn Fn(f32) + Send + Sync>;

/// One request to a [`FetchHandler`](crate::FetchHandler).
///
/// The command is immutable for the lifetime of a request: retries resubmit
/// the same command.
#[derive(Clone)]
pub struct DownloadCommand {
    /// Bundle to fetch.
    pub name: String,

    /// Fingerprint the payload is validated against. Unversioned means the
    /// payload is always fetched fresh.
    pub fingerprint: Fingerprint,

    /// Optional progress observer.
    pub progress: Option<ProgressSink>,
}

impl DownloadCommand {
    pub fn new(name: impl Into<String>, fingerprint: Fingerprint) -> Self {
        Self {
            name: name.into(),
            fingerprint,
            progress: None,
        }
    }

    /// Attach a progress observer.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use stowage_fetch::DownloadCommand;
    /// use stowage_manifest::Fingerprint;
    ///
    /// let command = DownloadCommand::new("levels/forest", Fingerprint::unversioned())
    ///     .on_progress(Arc::new(|p| println!("forest: {:.0}%", p * 100.0)));
    /// assert!(command.progress.is_some());
    /// ```
    #[must_use]
    pub fn on_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }
}

impl fmt::Debug for DownloadCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadCommand")
            .field("name", &self.name)
            .field("fingerprint", &self.fingerprint)
            .field("progress", &self.progress.as_ref().map(|_| "{ ... }"))
            .finish()
    }
}
