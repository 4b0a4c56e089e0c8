//! Deterministic scheduler driven by a virtual clock.
//!
//! Nothing runs until the test moves time: [`TestScheduler::advance_by`],
//! [`TestScheduler::advance_to`] or [`TestScheduler::trigger_actions`] execute
//! every due task synchronously on the calling thread, in fire-time order
//! (ties in submission order).

use super::{PeriodicTask, Scheduler, Task, TaskHandle, Worker};
use crate::error::SchedulerError;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

enum Job {
    Once(Task),
    Periodic { task: PeriodicTask, period: Duration },
}

struct Pending {
    job: Job,
    handle: TaskHandle,
    worker_disposed: Arc<AtomicBool>,
}

impl Pending {
    fn is_live(&self) -> bool {
        !self.handle.is_disposed() && !self.worker_disposed.load(Ordering::Acquire)
    }
}

#[derive(Default)]
struct ClockState {
    now: Duration,
    /// Time the current (possibly nested) advance is running up to.
    horizon: Duration,
    queue: BTreeMap<(Duration, u64), Pending>,
    next_seq: u64,
    draining: bool,
    down: bool,
}

#[derive(Default)]
struct VirtualClock {
    state: Mutex<ClockState>,
}

impl VirtualClock {
    fn enqueue(&self, at: Duration, pending: Pending) {
        let mut state = self.state.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.queue.insert((at, seq), pending);
    }

    fn now(&self) -> Duration {
        self.state.lock().now
    }
}

/// Resets the draining flag even if a task panics.
struct DrainGuard<'a>(&'a VirtualClock);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.state.lock().draining = false;
    }
}

/// Scheduler with a virtual clock for deterministic tests.
///
/// Clones share the same clock and queue.
///
/// ```rust
/// use actor_runtime::scheduler::{Scheduler, TestScheduler};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let scheduler = TestScheduler::new();
/// let worker = scheduler.create_worker().unwrap();
/// let fired = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&fired);
/// worker.schedule_after(Duration::from_secs(5), Box::new(move || {
///     counter.fetch_add(1, Ordering::SeqCst);
/// }));
///
/// scheduler.advance_by(Duration::from_secs(4));
/// assert_eq!(fired.load(Ordering::SeqCst), 0);
/// scheduler.advance_by(Duration::from_secs(1));
/// assert_eq!(fired.load(Ordering::SeqCst), 1);
/// ```
#[derive(Clone, Default)]
pub struct TestScheduler {
    clock: Arc<VirtualClock>,
}

impl TestScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time, measured from the scheduler's creation.
    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    /// Moves the clock forward by `delta`, running every task that becomes due.
    pub fn advance_by(&self, delta: Duration) {
        let target = {
            let state = self.clock.state.lock();
            state.horizon.max(state.now) + delta
        };
        self.advance_to(target);
    }

    /// Moves the clock to `target` (never backwards), running every due task.
    ///
    /// Called from inside a running task, this only extends how far the
    /// outer advance goes; it does not start a second draining loop.
    pub fn advance_to(&self, target: Duration) {
        {
            let mut state = self.clock.state.lock();
            if target > state.horizon {
                state.horizon = target;
            }
            if state.draining {
                return;
            }
            state.draining = true;
        }
        let _guard = DrainGuard(&self.clock);
        loop {
            let (fire_at, pending) = {
                let mut state = self.clock.state.lock();
                let horizon = state.horizon;
                let due = state
                    .queue
                    .first_key_value()
                    .map(|(key, _)| *key)
                    .filter(|(at, _)| *at <= horizon);
                let Some(key) = due else {
                    state.now = state.now.max(horizon);
                    break;
                };
                let Some(pending) = state.queue.remove(&key) else {
                    continue;
                };
                state.now = state.now.max(key.0);
                (key.0, pending)
            };
            if !pending.is_live() {
                continue;
            }
            match pending.job {
                Job::Once(task) => task(),
                Job::Periodic { mut task, period } => {
                    task();
                    let next = Pending {
                        job: Job::Periodic { task, period },
                        handle: pending.handle,
                        worker_disposed: pending.worker_disposed,
                    };
                    if next.is_live() {
                        self.clock.enqueue(fire_at + period, next);
                    }
                }
            }
        }
    }

    /// Runs every task due at the current time without moving the clock.
    pub fn trigger_actions(&self) {
        self.advance_by(Duration::ZERO);
    }

    /// Number of queued tasks that have not been cancelled.
    pub fn pending_tasks(&self) -> usize {
        self.clock
            .state
            .lock()
            .queue
            .values()
            .filter(|p| p.is_live())
            .count()
    }
}

impl Scheduler for TestScheduler {
    fn create_worker(&self) -> Result<Arc<dyn Worker>, SchedulerError> {
        if self.is_shutdown() {
            return Err(SchedulerError::Shutdown);
        }
        Ok(Arc::new(TestWorker {
            clock: Arc::clone(&self.clock),
            disposed: Arc::new(AtomicBool::new(false)),
        }))
    }

    fn shutdown(&self) {
        let dropped = {
            let mut state = self.clock.state.lock();
            state.down = true;
            std::mem::take(&mut state.queue)
        };
        drop(dropped);
    }

    fn is_shutdown(&self) -> bool {
        self.clock.state.lock().down
    }
}

struct TestWorker {
    clock: Arc<VirtualClock>,
    disposed: Arc<AtomicBool>,
}

impl TestWorker {
    fn submit(&self, delay: Duration, job: Job) -> TaskHandle {
        if self.is_disposed() {
            return TaskHandle::disposed();
        }
        let handle = TaskHandle::new();
        let at = self.clock.now() + delay;
        self.clock.enqueue(
            at,
            Pending {
                job,
                handle: handle.clone(),
                worker_disposed: Arc::clone(&self.disposed),
            },
        );
        handle
    }
}

impl Worker for TestWorker {
    fn schedule(&self, task: Task) -> TaskHandle {
        self.submit(Duration::ZERO, Job::Once(task))
    }

    fn schedule_after(&self, delay: Duration, task: Task) -> TaskHandle {
        self.submit(delay, Job::Once(task))
    }

    fn schedule_periodically(
        &self,
        initial: Duration,
        period: Duration,
        task: PeriodicTask,
    ) -> Result<TaskHandle, SchedulerError> {
        if period.is_zero() {
            return Err(SchedulerError::ZeroPeriod);
        }
        Ok(self.submit(initial, Job::Periodic { task, period }))
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire) || self.clock.state.lock().down
    }
}
