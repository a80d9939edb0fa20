//! Immutable types passed through the fetch handler chain.

mod bundle;
mod command;
mod options;
mod transfer;

pub use bundle::{Bundle, BundleOrigin};
pub use command::{DownloadCommand, ProgressSink};
pub use options::{Backoff, LocalOptions, LocalStrategy, SchedulerOptions};
pub use transfer::{TransferOutcome, TransferRequest};
