use std::time::Duration;

use crate::data::Backoff;

/// Status codes retried by default: request timeout, too many requests and
/// the transient 5xx family.
pub const DEFAULT_TRANSIENT_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Calculate the delay before a retry attempt using exponential backoff.
///
/// The delay formula is: `base * 2^retry_count`
///
/// # Arguments
///
/// * `retry_count` - The current retry number (0-indexed: 0 = first retry)
/// * `base` - The base delay duration
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use stowage_fetch::retry_delay;
///
/// assert_eq!(retry_delay(0, Duration::from_millis(100)), Duration::from_millis(100));
/// assert_eq!(retry_delay(1, Duration::from_millis(100)), Duration::from_millis(200));
/// assert_eq!(retry_delay(2, Duration::from_millis(100)), Duration::from_millis(400));
/// ```
pub fn retry_delay(retry_count: u32, base: Duration) -> Duration {
    let multiplier = 2_u32.saturating_pow(retry_count);
    base.saturating_mul(multiplier)
}

/// Which failures are retried, how often and how long to wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt. Total attempts = 1 + max_retries.
    ///
    /// Default: 3
    pub max_retries: u32,

    /// Base wait before a retry.
    ///
    /// Default: 1s
    pub delay: Duration,

    /// Default: [`Backoff::Fixed`]
    pub backoff: Backoff,

    /// Status codes classified as transient. Everything else, including
    /// failures without a status, is fatal.
    pub transient_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries:        3,
            delay:              Duration::from_secs(1),
            backoff:            Backoff::Fixed,
            transient_statuses: DEFAULT_TRANSIENT_STATUSES.to_vec(),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    #[must_use]
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    #[must_use]
    pub fn transient_statuses(mut self, statuses: impl Into<Vec<u16>>) -> Self {
        self.transient_statuses = statuses.into();
        self
    }

    pub fn is_transient(&self, status: Option<u16>) -> bool {
        status.is_some_and(|code| self.transient_statuses.contains(&code))
    }

    /// Wait before retry number `retry_count` (0 = first retry).
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential => retry_delay(retry_count, self.delay),
        }
    }

    /// Fresh attempt counter for one logical request.
    pub fn budget(&self) -> RetryBudget {
        RetryBudget {
            used: 0,
            max:  self.max_retries,
        }
    }
}

/// Retry attempts consumed by one logical request. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    used: u32,
    max:  u32,
}

impl RetryBudget {
    /// Consume one retry. Returns its 0-based index, or `None` once the
    /// budget is exhausted.
    pub fn try_consume(&mut self) -> Option<u32> {
        if self.used >= self.max {
            return None;
        }
        let index = self.used;
        self.used += 1;
        Some(index)
    }

    pub fn used(&self) -> u32 { self.used }

    pub fn remaining(&self) -> u32 { self.max - self.used }
}
