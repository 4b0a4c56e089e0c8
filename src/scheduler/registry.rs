use super::{ImmediateScheduler, Scheduler, ThreadPoolScheduler};
use crate::config::RuntimeConfig;
use crate::error::SchedulerError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Named scheduler pools that can be selected from configuration.
///
/// The deterministic [`TestScheduler`](super::TestScheduler) and custom
/// executors are injected as values instead, see
/// [`Props::with_scheduler`](crate::actor::Props::with_scheduler).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerKind {
    #[default]
    Computation,
    Io,
    Single,
    Immediate,
}

type Slot = Mutex<Option<Arc<ThreadPoolScheduler>>>;

/// Owner of the shared scheduler pools of one actor system.
///
/// Pools are created lazily on first use and released together by
/// [`shutdown`](Self::shutdown). Each actor system owns its own registry, so
/// tests can run isolated systems side by side.
pub struct SchedulerRegistry {
    computation_threads: usize,
    io_max_threads: usize,
    io_keep_alive: Duration,
    prefix: String,
    computation: Slot,
    io: Slot,
    single: Slot,
    immediate: Arc<ImmediateScheduler>,
    down: AtomicBool,
}

impl SchedulerRegistry {
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            computation_threads: config.computation_threads(),
            io_max_threads: config.io_max_threads,
            io_keep_alive: Duration::from_millis(config.io_keep_alive_ms),
            prefix: config.thread_name_prefix.clone(),
            computation: Mutex::new(None),
            io: Mutex::new(None),
            single: Mutex::new(None),
            immediate: Arc::new(ImmediateScheduler::new()),
            down: AtomicBool::new(false),
        }
    }

    /// Returns the scheduler for `kind`, starting its pool if needed.
    pub fn resolve(&self, kind: SchedulerKind) -> Result<Arc<dyn Scheduler>, SchedulerError> {
        if self.down.load(Ordering::Acquire) {
            return Err(SchedulerError::Shutdown);
        }
        let scheduler: Arc<dyn Scheduler> = match kind {
            SchedulerKind::Computation => self.pool(&self.computation, || {
                ThreadPoolScheduler::computation(self.computation_threads, &self.prefix)
            })?,
            SchedulerKind::Io => self.pool(&self.io, || {
                ThreadPoolScheduler::io(self.io_max_threads, self.io_keep_alive, &self.prefix)
            })?,
            SchedulerKind::Single => {
                self.pool(&self.single, || ThreadPoolScheduler::single(&self.prefix))?
            }
            SchedulerKind::Immediate => self.immediate.clone(),
        };
        Ok(scheduler)
    }

    fn pool<F>(&self, slot: &Slot, start: F) -> Result<Arc<ThreadPoolScheduler>, SchedulerError>
    where
        F: FnOnce() -> Result<ThreadPoolScheduler, SchedulerError>,
    {
        let mut slot = slot.lock();
        if let Some(pool) = slot.as_ref() {
            return Ok(Arc::clone(pool));
        }
        let pool = Arc::new(start()?);
        *slot = Some(Arc::clone(&pool));
        Ok(pool)
    }

    /// Shuts down every pool that was started. Idempotent.
    pub fn shutdown(&self) {
        if self.down.swap(true, Ordering::AcqRel) {
            return;
        }
        for slot in [&self.computation, &self.io, &self.single] {
            if let Some(pool) = slot.lock().take() {
                pool.shutdown();
            }
        }
        self.immediate.shutdown();
        info!("Scheduler registry shut down");
    }

    pub fn is_shutdown(&self) -> bool {
        self.down.load(Ordering::Acquire)
    }
}

impl Drop for SchedulerRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}
