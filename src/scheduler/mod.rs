//! # Schedulers and Workers
//!
//! A [`Scheduler`] owns execution resources; a [`Worker`] is a sequencing
//! handle bound to one of them. Actors never own threads: each actor holds a
//! Worker and submits its drain task to it every time a message arrives.
//!
//! | Scheduler | Resource | Notes |
//! |-----------|----------|-------|
//! | [`ThreadPoolScheduler::computation`] | fixed pool, one thread per core | default for actors |
//! | [`ThreadPoolScheduler::io`] | elastic blocking pool | for actors that block |
//! | [`ThreadPoolScheduler::single`] | one shared thread | |
//! | [`StickyScheduler`] | one dedicated thread per Worker | per-actor thread affinity |
//! | [`ExecutorScheduler`] | a caller-owned tokio runtime | custom executors |
//! | [`ImmediateScheduler`] | the calling thread | synchronous, no timers |
//! | [`TestScheduler`] | a virtual clock | deterministic tests |
//!
//! Per-actor ordering never depends on thread affinity: the drain loop's
//! in-flight counter serializes message processing even when a Worker
//! forwards to a shared pool.
//!
//! Every scheduling call returns a [`TaskHandle`]. Once a Worker is disposed,
//! further calls do nothing and return an already-disposed handle.

mod handle;
mod immediate;
mod pool;
mod registry;
mod virtual_time;

pub use handle::TaskHandle;
pub use immediate::ImmediateScheduler;
pub use pool::{ExecutorScheduler, StickyScheduler, ThreadPoolScheduler};
pub use registry::{SchedulerKind, SchedulerRegistry};
pub use virtual_time::TestScheduler;

pub(crate) use handle::Gate;

use crate::error::SchedulerError;
use std::sync::Arc;
use std::time::Duration;

/// A one-shot unit of work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A repeating unit of work.
pub type PeriodicTask = Box<dyn FnMut() + Send + 'static>;

/// Factory and owner of Workers.
pub trait Scheduler: Send + Sync {
    /// Returns a Worker bound to this scheduler's execution resource.
    fn create_worker(&self) -> Result<Arc<dyn Worker>, SchedulerError>;

    /// Releases the execution resources. Workers created earlier stop
    /// accepting tasks.
    fn shutdown(&self);

    fn is_shutdown(&self) -> bool;
}

/// Sequencing handle on which tasks are submitted.
pub trait Worker: Send + Sync {
    /// Runs `task` as soon as the resource allows.
    fn schedule(&self, task: Task) -> TaskHandle;

    /// Runs `task` once `delay` has elapsed.
    fn schedule_after(&self, delay: Duration, task: Task) -> TaskHandle;

    /// Runs `task` after `initial`, then every `period` measured from the
    /// previous fire time.
    fn schedule_periodically(
        &self,
        initial: Duration,
        period: Duration,
        task: PeriodicTask,
    ) -> Result<TaskHandle, SchedulerError>;

    /// Rejects all further scheduling and cancels pending tasks.
    fn dispose(&self);

    fn is_disposed(&self) -> bool;
}
