//! Progress observers.
//!
//! An `Observer` is a factory registered on the engine; `init` runs once per
//! started batch and returns the per-job instance that receives ticks, so
//! observers can carry per-job state without shared mutation. Observer
//! failures after `init` are logged, never fatal.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::DownError;
use crate::request::DownloadRequest;

pub type ObserverError = Box<dyn std::error::Error + Send + Sync>;

/// Jobs being observed: the frozen requests, their resolved output paths,
/// and the config snapshot they run under.
#[derive(Debug)]
pub struct BatchMeta {
    pub requests: Vec<DownloadRequest>,
    pub outputs: Vec<PathBuf>,
    pub config: EngineConfig,
}

/// State delivered on every tick and at termination.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Sum of all jobs' total sizes.
    pub total_size: i64,
    /// Sum of all jobs' completed counters.
    pub completed: i64,
    /// Bytes/second over the last tick (linear extrapolation).
    pub speed: i64,
    /// Live connections across all jobs.
    pub connections: usize,
    pub meta: Arc<BatchMeta>,
}

/// Factory side: registered once, asked for a fresh per-job observer at
/// every start.
pub trait Observer: Send + Sync {
    fn init(&self, snapshot: &Snapshot) -> Result<Box<dyn JobObserver>, ObserverError>;
}

/// Per-job side: receives progress ticks and the terminal event.
pub trait JobObserver: Send {
    fn on_progress(&mut self, snapshot: &Snapshot) -> Result<(), ObserverError>;
    fn on_finish(&mut self, error: Option<&DownError>, snapshot: &Snapshot)
        -> Result<(), ObserverError>;
}

/// Runs `init` for every registered observer, in registration order.
pub(crate) fn make_observers(
    observers: &[Arc<dyn Observer>],
    snapshot: &Snapshot,
) -> Result<Vec<Box<dyn JobObserver>>, DownError> {
    let mut out = Vec::with_capacity(observers.len());
    for ob in observers {
        match ob.init(snapshot) {
            Ok(job_ob) => out.push(job_ob),
            Err(e) => return Err(DownError::Observer(e.to_string())),
        }
    }
    Ok(out)
}

/// Dispatches a tick; failures are logged and skipped.
pub(crate) fn notify_progress(observers: &mut [Box<dyn JobObserver>], snapshot: &Snapshot) {
    for ob in observers.iter_mut() {
        if let Err(e) = ob.on_progress(snapshot) {
            tracing::warn!(error = %e, "progress observer failed");
        }
    }
}

/// Dispatches the terminal event; failures are logged and skipped.
pub(crate) fn notify_finish(
    observers: &mut [Box<dyn JobObserver>],
    error: Option<&DownError>,
    snapshot: &Snapshot,
) {
    for ob in observers.iter_mut() {
        if let Err(e) = ob.on_finish(error, snapshot) {
            tracing::warn!(error = %e, "finish observer failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        ticks: Arc<AtomicUsize>,
        finishes: Arc<AtomicUsize>,
    }

    struct CountingFactory {
        ticks: Arc<AtomicUsize>,
        finishes: Arc<AtomicUsize>,
    }

    impl Observer for CountingFactory {
        fn init(&self, _snapshot: &Snapshot) -> Result<Box<dyn JobObserver>, ObserverError> {
            Ok(Box::new(Counting {
                ticks: Arc::clone(&self.ticks),
                finishes: Arc::clone(&self.finishes),
            }))
        }
    }

    impl JobObserver for Counting {
        fn on_progress(&mut self, _s: &Snapshot) -> Result<(), ObserverError> {
            self.ticks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn on_finish(&mut self, _e: Option<&DownError>, _s: &Snapshot) -> Result<(), ObserverError> {
            self.finishes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;
    impl JobObserver for Failing {
        fn on_progress(&mut self, _s: &Snapshot) -> Result<(), ObserverError> {
            Err("boom".into())
        }
        fn on_finish(&mut self, _e: Option<&DownError>, _s: &Snapshot) -> Result<(), ObserverError> {
            Err("boom".into())
        }
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            total_size: 100,
            completed: 0,
            speed: 0,
            connections: 0,
            meta: Arc::new(BatchMeta {
                requests: vec![],
                outputs: vec![],
                config: EngineConfig::default(),
            }),
        }
    }

    #[test]
    fn chain_runs_in_order_and_survives_failures() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let finishes = Arc::new(AtomicUsize::new(0));
        let factory = CountingFactory {
            ticks: Arc::clone(&ticks),
            finishes: Arc::clone(&finishes),
        };

        let snap = snapshot();
        let mut chain: Vec<Box<dyn JobObserver>> = vec![
            Box::new(Failing),
            factory.init(&snap).unwrap(),
        ];
        notify_progress(&mut chain, &snap);
        notify_progress(&mut chain, &snap);
        notify_finish(&mut chain, Some(&DownError::Cancelled), &snap);
        // The failing observer did not stop the counting one.
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
        assert_eq!(finishes.load(Ordering::SeqCst), 1);
    }
}
