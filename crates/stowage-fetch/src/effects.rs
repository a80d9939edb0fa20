//! Fetch handlers and the I/O they drive.

mod handler;
#[cfg(feature = "reqwest")]
mod http;
mod local;
mod scheduler;
mod session;
mod store;
mod transfer;

pub use handler::FetchHandler;
#[cfg(feature = "reqwest")]
pub use http::HttpChannel;
pub use local::{FsLoader, LocalFirstResolver, LocalLoader};
pub use scheduler::{Admission, DownloadScheduler, endpoint_url};
pub use session::SessionState;
pub use store::{CacheIndex, DiskCache, NoCache};
pub use transfer::TransferChannel;
