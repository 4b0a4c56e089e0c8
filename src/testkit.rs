//! Helpers for testing actors.
//!
//! Actors are fire-and-forget, so tests observe them through side effects. A
//! [`Probe`] is a thread-safe recorder that behaviors write into and tests
//! wait on.

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared, cloneable event recorder.
///
/// ```rust
/// use actor_runtime::testkit::Probe;
/// use std::time::Duration;
///
/// let probe = Probe::new();
/// let writer = probe.clone();
/// std::thread::spawn(move || writer.record("done"));
/// assert!(probe.wait_for(1, Duration::from_secs(1)));
/// assert_eq!(probe.snapshot(), vec!["done"]);
/// ```
pub struct Probe<T> {
    inner: Arc<ProbeInner<T>>,
}

struct ProbeInner<T> {
    events: Mutex<Vec<T>>,
    changed: Condvar,
}

impl<T> Probe<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ProbeInner {
                events: Mutex::new(Vec::new()),
                changed: Condvar::new(),
            }),
        }
    }

    pub fn record(&self, event: T) {
        self.inner.events.lock().push(event);
        self.inner.changed.notify_all();
    }

    pub fn len(&self) -> usize {
        self.inner.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Blocks until at least `count` events were recorded. Returns `false`
    /// if `timeout` elapsed first.
    pub fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut events = self.inner.events.lock();
        while events.len() < count {
            if self
                .inner
                .changed
                .wait_until(&mut events, deadline)
                .timed_out()
            {
                return events.len() >= count;
            }
        }
        true
    }

    /// Runs `f` over the recorded events without copying them.
    pub fn with_events<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.inner.events.lock())
    }
}

impl<T: Clone> Probe<T> {
    pub fn snapshot(&self) -> Vec<T> {
        self.inner.events.lock().clone()
    }
}

impl<T> Clone for Probe<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Probe<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for Probe<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Probe").field(&*self.inner.events.lock()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_for_times_out() {
        let probe: Probe<u8> = Probe::new();
        assert!(!probe.wait_for(1, Duration::from_millis(10)));
        probe.record(1);
        assert!(probe.wait_for(1, Duration::ZERO));
        assert_eq!(probe.with_events(|events| events.iter().sum::<u8>()), 1);
    }
}
