//! Periodic progress sampling and observer dispatch.

use std::sync::Arc;
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::observer::{notify_progress, BatchMeta, JobObserver, Snapshot};

/// Live counters sampled on every tick: (completed bytes, connections).
pub(crate) type SampleFn<'a> = dyn Fn() -> (i64, usize) + 'a;

/// Ticks every `interval` until the token fires, building a snapshot from
/// the sampled counters and dispatching it to the observers. Speed is the
/// per-tick delta extrapolated to one second.
pub(crate) fn run_reporter(
    observers: &mut [Box<dyn JobObserver>],
    sample: &SampleFn<'_>,
    total_size: i64,
    meta: &Arc<BatchMeta>,
    interval: Duration,
    token: &CancelToken,
) {
    let interval = if interval.is_zero() {
        Duration::from_millis(500)
    } else {
        interval
    };
    let per_second = 1_000.0 / interval.as_millis().max(1) as f64;

    let (mut previous, _) = sample();
    loop {
        if token.sleep(interval) {
            return;
        }
        let (completed, connections) = sample();
        let delta = completed - previous;
        previous = completed;
        let snapshot = Snapshot {
            total_size,
            completed,
            speed: (delta as f64 * per_second) as i64,
            connections,
            meta: Arc::clone(meta),
        };
        notify_progress(observers, &snapshot);
    }
}
