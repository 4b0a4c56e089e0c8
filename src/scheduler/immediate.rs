use super::{PeriodicTask, Scheduler, Task, TaskHandle, Worker};
use crate::error::SchedulerError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Scheduler that runs every task synchronously on the calling thread.
///
/// `schedule_after` blocks the caller for the delay before running the task.
/// Periodic scheduling needs a background timer, which this scheduler does
/// not have, so it fails with [`SchedulerError::Unsupported`].
///
/// Actors on this scheduler are drained on whichever thread sends to them;
/// the drain loop's in-flight counter turns nested sends into a trampoline
/// instead of recursion.
#[derive(Default)]
pub struct ImmediateScheduler {
    down: Arc<AtomicBool>,
}

impl ImmediateScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scheduler for ImmediateScheduler {
    fn create_worker(&self) -> Result<Arc<dyn Worker>, SchedulerError> {
        if self.is_shutdown() {
            return Err(SchedulerError::Shutdown);
        }
        Ok(Arc::new(ImmediateWorker {
            disposed: AtomicBool::new(false),
            scheduler_down: Arc::clone(&self.down),
        }))
    }

    fn shutdown(&self) {
        self.down.store(true, Ordering::Release);
    }

    fn is_shutdown(&self) -> bool {
        self.down.load(Ordering::Acquire)
    }
}

struct ImmediateWorker {
    disposed: AtomicBool,
    scheduler_down: Arc<AtomicBool>,
}

impl Worker for ImmediateWorker {
    fn schedule(&self, task: Task) -> TaskHandle {
        if self.is_disposed() {
            return TaskHandle::disposed();
        }
        task();
        TaskHandle::new()
    }

    fn schedule_after(&self, delay: Duration, task: Task) -> TaskHandle {
        if self.is_disposed() {
            return TaskHandle::disposed();
        }
        std::thread::sleep(delay);
        // The worker may have been disposed by another thread while we slept.
        if self.is_disposed() {
            return TaskHandle::disposed();
        }
        task();
        TaskHandle::new()
    }

    fn schedule_periodically(
        &self,
        _initial: Duration,
        _period: Duration,
        _task: PeriodicTask,
    ) -> Result<TaskHandle, SchedulerError> {
        Err(SchedulerError::Unsupported(
            "periodic scheduling on the immediate scheduler",
        ))
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire) || self.scheduler_down.load(Ordering::Acquire)
    }
}
