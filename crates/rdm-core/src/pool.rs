//! Bounded worker pool with error fan-in.
//!
//! `acquire` blocks until a slot frees up; worker failures are published on a
//! fan-in channel, and `wait_all_async` arranges a terminal `None` once every
//! acquired slot has been released. Consumers keep draining after the first
//! error so in-flight workers can wind down.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex};

use crate::error::DownError;

struct PoolInner {
    capacity: usize,
    in_flight: Mutex<usize>,
    cond: Condvar,
    done_tx: Sender<Option<DownError>>,
}

pub struct WorkerPool {
    inner: Arc<PoolInner>,
    done_rx: Mutex<Receiver<Option<DownError>>>,
}

impl WorkerPool {
    /// Callers always pass the configured thread count, which is at least 1.
    pub fn new(capacity: usize) -> WorkerPool {
        let (done_tx, done_rx) = channel();
        WorkerPool {
            inner: Arc::new(PoolInner {
                capacity: capacity.max(1),
                in_flight: Mutex::new(0),
                cond: Condvar::new(),
                done_tx,
            }),
            done_rx: Mutex::new(done_rx),
        }
    }

    /// Blocks until a slot is free, then claims it.
    pub fn acquire(&self) {
        let mut n = self.inner.in_flight.lock().unwrap();
        while *n >= self.inner.capacity {
            n = self.inner.cond.wait(n).unwrap();
        }
        *n += 1;
    }

    /// Releases a slot claimed with `acquire`.
    pub fn release(&self) {
        let mut n = self.inner.in_flight.lock().unwrap();
        *n -= 1;
        self.inner.cond.notify_all();
    }

    /// Live slot occupancy, for connection-count telemetry.
    pub fn count(&self) -> usize {
        *self.inner.in_flight.lock().unwrap()
    }

    /// Publishes a worker error on the fan-in channel.
    pub fn report_error(&self, err: DownError) {
        let _ = self.inner.done_tx.send(Some(err));
    }

    /// Emits the terminal `None` once all acquired slots have been released.
    /// Call after every `acquire` of the dispatch phase has happened.
    pub fn wait_all_async(&self) {
        let inner = Arc::clone(&self.inner);
        std::thread::spawn(move || {
            let mut n = inner.in_flight.lock().unwrap();
            while *n > 0 {
                n = inner.cond.wait(n).unwrap();
            }
            drop(n);
            let _ = inner.done_tx.send(None);
        });
    }

    /// Next fan-in event: `Some(err)` for a worker failure, `None` once all
    /// workers have finished.
    pub fn next_event(&self) -> Option<DownError> {
        let rx = self.done_rx.lock().unwrap();
        match rx.recv() {
            Ok(ev) => ev,
            Err(_) => None,
        }
    }
}
