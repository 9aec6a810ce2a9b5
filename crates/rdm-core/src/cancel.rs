//! Job cancellation tokens.
//!
//! One token per job; derived tokens add an optional deadline (total timeout)
//! and an independent flag so cancelling a job does not cancel its siblings.
//! Sleeps are bounded slices so a parent cancel is observed within ~100 ms
//! even by waiters parked on a child token.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::DownError;

const WAIT_SLICE: Duration = Duration::from_millis(100);

struct Inner {
    cancelled: AtomicBool,
    lock: Mutex<()>,
    cond: Condvar,
    deadline: Option<Instant>,
    parent: Option<Arc<Inner>>,
}

impl Inner {
    fn fired(&self) -> bool {
        if self.cancelled.load(Ordering::Relaxed) {
            return true;
        }
        if let Some(d) = self.deadline {
            if Instant::now() >= d {
                return true;
            }
        }
        match &self.parent {
            Some(p) => p.fired(),
            None => false,
        }
    }

    fn timed_out(&self) -> bool {
        if let Some(d) = self.deadline {
            if Instant::now() >= d && !self.cancelled.load(Ordering::Relaxed) {
                return true;
            }
        }
        match &self.parent {
            Some(p) => p.timed_out(),
            None => false,
        }
    }
}

/// Cancellation token shared by a job's workers, autosave loop, and reporter.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self::with_parts(None, None)
    }

    fn with_parts(deadline: Option<Instant>, parent: Option<Arc<Inner>>) -> Self {
        CancelToken {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                lock: Mutex::new(()),
                cond: Condvar::new(),
                deadline,
                parent,
            }),
        }
    }

    /// Derive a token that fires when this one does, but whose own `cancel`
    /// does not propagate upward.
    pub fn child(&self) -> CancelToken {
        Self::with_parts(None, Some(Arc::clone(&self.inner)))
    }

    /// Derive a child that additionally fires after `timeout`. A zero timeout
    /// means no deadline.
    pub fn child_with_timeout(&self, timeout: Duration) -> CancelToken {
        let deadline = if timeout.is_zero() {
            None
        } else {
            Some(Instant::now() + timeout)
        };
        Self::with_parts(deadline, Some(Arc::clone(&self.inner)))
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Relaxed);
        let _guard = self.inner.lock.lock().unwrap();
        self.inner.cond.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.fired()
    }

    /// The error this token's firing represents, if it has fired.
    /// A deadline firing without an explicit cancel is a timeout.
    pub fn reason(&self) -> Option<DownError> {
        if !self.inner.fired() {
            return None;
        }
        if self.inner.timed_out() {
            Some(DownError::Timeout)
        } else {
            Some(DownError::Cancelled)
        }
    }

    /// Sleep for `dur` or until cancelled, whichever comes first.
    /// Returns true if the token fired.
    pub fn sleep(&self, dur: Duration) -> bool {
        let deadline = Instant::now() + dur;
        loop {
            if self.inner.fired() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let slice = (deadline - now).min(WAIT_SLICE);
            let guard = self.inner.lock.lock().unwrap();
            let _ = self.inner.cond.wait_timeout(guard, slice).unwrap();
        }
    }

    /// Err(reason) if the token has fired, Ok otherwise.
    pub fn check(&self) -> Result<(), DownError> {
        match self.reason() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn cancel_wakes_sleeper() {
        let token = CancelToken::new();
        let t2 = token.clone();
        let h = thread::spawn(move || t2.sleep(Duration::from_secs(10)));
        thread::sleep(Duration::from_millis(20));
        token.cancel();
        assert!(h.join().unwrap());
        assert!(matches!(token.reason(), Some(DownError::Cancelled)));
    }

    #[test]
    fn child_sees_parent_cancel() {
        let parent = CancelToken::new();
        let child = parent.child();
        assert!(!child.is_cancelled());
        parent.cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn child_cancel_does_not_propagate_up() {
        let parent = CancelToken::new();
        let child = parent.child();
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn deadline_reports_timeout() {
        let parent = CancelToken::new();
        let child = parent.child_with_timeout(Duration::from_millis(10));
        thread::sleep(Duration::from_millis(30));
        assert!(child.is_cancelled());
        assert!(matches!(child.reason(), Some(DownError::Timeout)));
        // Explicit cancel wins over the deadline for the reason.
        let c2 = parent.child_with_timeout(Duration::from_millis(10));
        c2.cancel();
        assert!(matches!(c2.reason(), Some(DownError::Cancelled)));
    }

    #[test]
    fn zero_timeout_means_none() {
        let token = CancelToken::new().child_with_timeout(Duration::ZERO);
        assert!(!token.is_cancelled());
        assert!(!token.sleep(Duration::from_millis(5)));
    }
}
