use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::data::ProgressSink;

/// Filters raw channel progress into what a [`ProgressSink`] may observe.
///
/// Forwarded values are clamped to `[0, 1]` and strictly increasing; values
/// at or above `1.0` are held back until [`ProgressGate::finish`], which
/// emits exactly one `1.0`. Retries that restart a transfer from zero are
/// therefore invisible to the observer.
pub struct ProgressGate {
    sink:     Option<ProgressSink>,
    last:     Mutex<f32>,
    finished: AtomicBool,
}

impl ProgressGate {
    pub fn new(sink: Option<ProgressSink>) -> Self {
        Self {
            sink,
            last: Mutex::new(0.0),
            finished: AtomicBool::new(false),
        }
    }

    /// Report raw progress. Non-finite, regressing and completing values are
    /// dropped.
    pub fn report(&self, value: f32) {
        let Some(sink) = &self.sink else { return };
        if !value.is_finite() || self.finished.load(Ordering::Acquire) {
            return;
        }

        let value = value.max(0.0);
        if value >= 1.0 {
            return;
        }

        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if value > *last {
            *last = value;
            sink(value);
        }
    }

    /// Emit the final `1.0`. Only the first call has any effect.
    pub fn finish(&self) {
        if self.finished.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(sink) = &self.sink {
            let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
            *last = 1.0;
            sink(1.0);
        }
    }

    pub fn is_finished(&self) -> bool { self.finished.load(Ordering::Acquire) }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn recording() -> (ProgressGate, Arc<Mutex<Vec<f32>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let gate = ProgressGate::new(Some(Arc::new(move |p| sink_seen.lock().unwrap().push(p))));
        (gate, seen)
    }

    #[test]
    fn forwards_increasing_values_and_ends_with_one() {
        let (gate, seen) = recording();
        gate.report(0.1);
        gate.report(0.5);
        gate.finish();
        assert_eq!(*seen.lock().unwrap(), [0.1_f32, 0.5, 1.0]);
    }

    #[test]
    fn drops_regressions_from_restarted_attempts() {
        let (gate, seen) = recording();
        gate.report(0.6);
        gate.report(0.0);
        gate.report(0.3);
        gate.report(0.7);
        gate.finish();
        assert_eq!(*seen.lock().unwrap(), [0.6_f32, 0.7, 1.0]);
    }

    #[test]
    fn holds_back_completion_until_finish() {
        let (gate, seen) = recording();
        gate.report(1.0);
        gate.report(3.5);
        gate.report(f32::NAN);
        assert!(seen.lock().unwrap().is_empty());
        gate.finish();
        gate.finish();
        gate.report(0.9);
        assert_eq!(*seen.lock().unwrap(), [1.0_f32]);
        assert!(gate.is_finished());
    }

    #[test]
    fn no_sink_is_a_no_op() {
        let gate = ProgressGate::new(None);
        gate.report(0.5);
        gate.finish();
        assert!(gate.is_finished());
    }
}
