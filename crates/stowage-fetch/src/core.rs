//! Pure retry and progress policy.

mod progress;
mod retry;

pub use progress::ProgressGate;
pub use retry::{RetryBudget, RetryPolicy, retry_delay};
