//! Tokio-backed schedulers.
//!
//! All thread-based schedulers run on tokio runtimes: a Worker forwards each
//! task to a runtime handle, timers use `tokio::time`, and cancellation aborts
//! the tokio task while it is parked on a timer. Tasks themselves are plain
//! synchronous closures, so an abort never interrupts a task mid-run.

use super::{Gate, PeriodicTask, Scheduler, Task, TaskHandle, Worker};
use crate::error::SchedulerError;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::AbortHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

/// How a Worker hands a task to its runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dispatch {
    /// Run on a runtime worker thread.
    Async,
    /// Run on the runtime's elastic blocking pool.
    Blocking,
}

/// Worker forwarding to a tokio runtime handle.
struct RuntimeWorker {
    handle: Handle,
    dispatch: Dispatch,
    disposed: Arc<AtomicBool>,
    scheduler_down: Arc<AtomicBool>,
    /// Delayed and periodic tasks still parked on a timer.
    timers: Mutex<Vec<AbortHandle>>,
    /// Dedicated runtime owned by this worker (sticky scheduling only).
    owned: Mutex<Option<Runtime>>,
}

impl RuntimeWorker {
    fn new(handle: Handle, dispatch: Dispatch, scheduler_down: Arc<AtomicBool>) -> Self {
        Self {
            handle,
            dispatch,
            disposed: Arc::new(AtomicBool::new(false)),
            scheduler_down,
            timers: Mutex::new(Vec::new()),
            owned: Mutex::new(None),
        }
    }

    fn dedicated(runtime: Runtime, scheduler_down: Arc<AtomicBool>) -> Self {
        let worker = Self::new(runtime.handle().clone(), Dispatch::Async, scheduler_down);
        *worker.owned.lock() = Some(runtime);
        worker
    }

    fn accepting(&self) -> bool {
        !self.disposed.load(Ordering::Acquire) && !self.scheduler_down.load(Ordering::Acquire)
    }

    fn gate(&self, handle: &TaskHandle) -> Gate {
        Gate::new(handle.clone(), Arc::clone(&self.disposed))
    }

    /// Remembers a timer task so `dispose` can abort it, releasing whatever
    /// its closure captured without waiting for the timer to fire.
    fn track(&self, timer: AbortHandle) {
        let mut timers = self.timers.lock();
        if self.disposed.load(Ordering::Acquire) {
            timer.abort();
            return;
        }
        timers.retain(|parked| !parked.is_finished());
        timers.push(timer);
    }
}

impl Worker for RuntimeWorker {
    fn schedule(&self, task: Task) -> TaskHandle {
        if !self.accepting() {
            return TaskHandle::disposed();
        }
        let handle = TaskHandle::new();
        let gate = self.gate(&handle);
        let join = match self.dispatch {
            Dispatch::Async => self.handle.spawn(async move { gate.run(task) }),
            Dispatch::Blocking => self.handle.spawn_blocking(move || gate.run(task)),
        };
        handle.attach(join.abort_handle());
        handle
    }

    fn schedule_after(&self, delay: Duration, task: Task) -> TaskHandle {
        if !self.accepting() {
            return TaskHandle::disposed();
        }
        let handle = TaskHandle::new();
        let gate = self.gate(&handle);
        let dispatch = self.dispatch;
        let join = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if !gate.is_open() {
                return;
            }
            match dispatch {
                Dispatch::Async => gate.run(task),
                Dispatch::Blocking => {
                    let _ = tokio::task::spawn_blocking(move || gate.run(task)).await;
                }
            }
        });
        handle.attach(join.abort_handle());
        self.track(join.abort_handle());
        handle
    }

    fn schedule_periodically(
        &self,
        initial: Duration,
        period: Duration,
        mut task: PeriodicTask,
    ) -> Result<TaskHandle, SchedulerError> {
        if period.is_zero() {
            return Err(SchedulerError::ZeroPeriod);
        }
        if !self.accepting() {
            return Ok(TaskHandle::disposed());
        }
        let handle = TaskHandle::new();
        let gate = self.gate(&handle);
        let dispatch = self.dispatch;
        let join = self.handle.spawn(async move {
            let mut ticks = tokio::time::interval_at(Instant::now() + initial, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                if !gate.is_open() {
                    break;
                }
                match dispatch {
                    Dispatch::Async => task(),
                    Dispatch::Blocking => {
                        let run = tokio::task::spawn_blocking(move || {
                            task();
                            task
                        });
                        match run.await {
                            Ok(returned) => task = returned,
                            Err(_) => break,
                        }
                    }
                }
            }
        });
        handle.attach(join.abort_handle());
        self.track(join.abort_handle());
        Ok(handle)
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let timers = std::mem::take(&mut *self.timers.lock());
        if !timers.is_empty() {
            debug!(timers = timers.len(), "Aborting parked timers");
        }
        for timer in timers {
            timer.abort();
        }
        if let Some(runtime) = self.owned.lock().take() {
            runtime.shutdown_background();
        }
    }

    fn is_disposed(&self) -> bool {
        !self.accepting()
    }
}

fn numbered_threads(builder: &mut Builder, prefix: String) -> &mut Builder {
    let counter = Arc::new(AtomicUsize::new(0));
    builder.thread_name_fn(move || {
        let n = counter.fetch_add(1, Ordering::Relaxed);
        format!("{prefix}-{n}")
    })
}

fn unavailable(e: std::io::Error) -> SchedulerError {
    SchedulerError::Unavailable(e.to_string())
}

/// Scheduler owning a tokio runtime whose threads are shared by all its Workers.
pub struct ThreadPoolScheduler {
    name: String,
    runtime: Mutex<Option<Runtime>>,
    handle: Handle,
    dispatch: Dispatch,
    down: Arc<AtomicBool>,
}

impl ThreadPoolScheduler {
    /// Fixed-size pool for CPU-bound actors.
    pub fn computation(threads: usize, prefix: &str) -> Result<Self, SchedulerError> {
        let threads = threads.max(1);
        let mut builder = Builder::new_multi_thread();
        builder.worker_threads(threads).enable_all();
        let runtime = numbered_threads(&mut builder, format!("{prefix}-computation"))
            .build()
            .map_err(unavailable)?;
        info!(threads, "Computation scheduler started");
        Ok(Self::from_runtime("computation", runtime, Dispatch::Async))
    }

    /// Elastic pool for actors that block: threads are created on demand up to
    /// `max_threads` and retire after `keep_alive` idle time.
    pub fn io(max_threads: usize, keep_alive: Duration, prefix: &str) -> Result<Self, SchedulerError> {
        let max_threads = max_threads.max(1);
        let mut builder = Builder::new_multi_thread();
        builder
            .worker_threads(1)
            .max_blocking_threads(max_threads)
            .thread_keep_alive(keep_alive)
            .enable_all();
        let runtime = numbered_threads(&mut builder, format!("{prefix}-io"))
            .build()
            .map_err(unavailable)?;
        info!(max_threads, "IO scheduler started");
        Ok(Self::from_runtime("io", runtime, Dispatch::Blocking))
    }

    /// One thread shared by every Worker.
    pub fn single(prefix: &str) -> Result<Self, SchedulerError> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name(format!("{prefix}-single"))
            .enable_all()
            .build()
            .map_err(unavailable)?;
        info!("Single-thread scheduler started");
        Ok(Self::from_runtime("single", runtime, Dispatch::Async))
    }

    fn from_runtime(name: &str, runtime: Runtime, dispatch: Dispatch) -> Self {
        Self {
            name: name.to_string(),
            handle: runtime.handle().clone(),
            runtime: Mutex::new(Some(runtime)),
            dispatch,
            down: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Scheduler for ThreadPoolScheduler {
    fn create_worker(&self) -> Result<Arc<dyn Worker>, SchedulerError> {
        if self.is_shutdown() {
            return Err(SchedulerError::Shutdown);
        }
        Ok(Arc::new(RuntimeWorker::new(
            self.handle.clone(),
            self.dispatch,
            Arc::clone(&self.down),
        )))
    }

    fn shutdown(&self) {
        if self.down.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(runtime) = self.runtime.lock().take() {
            runtime.shutdown_background();
        }
        info!(scheduler = %self.name, "Scheduler shut down");
    }

    fn is_shutdown(&self) -> bool {
        self.down.load(Ordering::Acquire)
    }
}

impl Drop for ThreadPoolScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Scheduler pinning every Worker to its own dedicated thread for the
/// Worker's lifetime. Disposing the Worker stops the thread.
pub struct StickyScheduler {
    prefix: String,
    spawned: AtomicUsize,
    down: Arc<AtomicBool>,
}

impl StickyScheduler {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: format!("{prefix}-sticky"),
            spawned: AtomicUsize::new(0),
            down: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Scheduler for StickyScheduler {
    fn create_worker(&self) -> Result<Arc<dyn Worker>, SchedulerError> {
        if self.is_shutdown() {
            return Err(SchedulerError::Shutdown);
        }
        let n = self.spawned.fetch_add(1, Ordering::Relaxed);
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name(format!("{}-{n}", self.prefix))
            .enable_all()
            .build()
            .map_err(unavailable)?;
        debug!(worker = n, "Sticky worker thread started");
        Ok(Arc::new(RuntimeWorker::dedicated(runtime, Arc::clone(&self.down))))
    }

    fn shutdown(&self) {
        self.down.store(true, Ordering::Release);
    }

    fn is_shutdown(&self) -> bool {
        self.down.load(Ordering::Acquire)
    }
}

/// Scheduler forwarding to a tokio runtime owned by the caller.
///
/// Shutting it down only stops new Workers and tasks; the runtime itself
/// belongs to whoever built it.
pub struct ExecutorScheduler {
    handle: Handle,
    dispatch: Dispatch,
    down: Arc<AtomicBool>,
}

impl ExecutorScheduler {
    /// Runs tasks on the runtime's worker threads.
    pub fn new(handle: Handle) -> Self {
        Self::with_dispatch(handle, Dispatch::Async)
    }

    /// Runs tasks on the runtime's blocking pool.
    pub fn blocking(handle: Handle) -> Self {
        Self::with_dispatch(handle, Dispatch::Blocking)
    }

    /// Uses the runtime the caller is currently running on.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    fn with_dispatch(handle: Handle, dispatch: Dispatch) -> Self {
        Self {
            handle,
            dispatch,
            down: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Scheduler for ExecutorScheduler {
    fn create_worker(&self) -> Result<Arc<dyn Worker>, SchedulerError> {
        if self.is_shutdown() {
            return Err(SchedulerError::Shutdown);
        }
        Ok(Arc::new(RuntimeWorker::new(
            self.handle.clone(),
            self.dispatch,
            Arc::clone(&self.down),
        )))
    }

    fn shutdown(&self) {
        self.down.store(true, Ordering::Release);
    }

    fn is_shutdown(&self) -> bool {
        self.down.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn pool() -> ThreadPoolScheduler {
        ThreadPoolScheduler::computation(2, "test").unwrap()
    }

    #[test]
    fn schedule_runs_on_pool_thread() {
        let scheduler = pool();
        let worker = scheduler.create_worker().unwrap();
        let (tx, rx) = mpsc::channel();
        worker.schedule(Box::new(move || {
            let name = std::thread::current().name().map(str::to_string);
            tx.send(name).unwrap();
        }));
        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
        assert!(name.starts_with("test-computation-"), "ran on {name}");
    }

    #[test]
    fn disposed_handle_prevents_delayed_task() {
        let scheduler = pool();
        let worker = scheduler.create_worker().unwrap();
        let (tx, rx) = mpsc::channel::<()>();
        let handle = worker.schedule_after(
            Duration::from_millis(200),
            Box::new(move || tx.send(()).unwrap()),
        );
        handle.dispose();
        assert!(rx.recv_timeout(Duration::from_millis(500)).is_err());
    }

    #[test]
    fn periodic_task_repeats_until_disposed() {
        let scheduler = pool();
        let worker = scheduler.create_worker().unwrap();
        let (tx, rx) = mpsc::channel();
        let handle = worker
            .schedule_periodically(
                Duration::from_millis(5),
                Duration::from_millis(5),
                Box::new(move || {
                    let _ = tx.send(());
                }),
            )
            .unwrap();
        for _ in 0..3 {
            rx.recv_timeout(Duration::from_secs(5)).unwrap();
        }
        handle.dispose();
        assert!(handle.is_disposed());
    }

    #[test]
    fn zero_period_is_rejected() {
        let scheduler = pool();
        let worker = scheduler.create_worker().unwrap();
        let result = worker.schedule_periodically(Duration::ZERO, Duration::ZERO, Box::new(|| {}));
        assert_eq!(result.err(), Some(SchedulerError::ZeroPeriod));
    }

    #[test]
    fn dispose_releases_parked_timers() {
        let scheduler = pool();
        let worker = scheduler.create_worker().unwrap();
        let captured = Arc::new(());
        let (once, periodic) = (Arc::clone(&captured), Arc::clone(&captured));
        worker.schedule_after(
            Duration::from_secs(60),
            Box::new(move || drop(once)),
        );
        worker
            .schedule_periodically(
                Duration::from_secs(60),
                Duration::from_secs(60),
                Box::new(move || {
                    let _ = &periodic;
                }),
            )
            .unwrap();
        assert_eq!(Arc::strong_count(&captured), 3);

        worker.dispose();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while Arc::strong_count(&captured) > 1 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(Arc::strong_count(&captured), 1);
    }

    #[test]
    fn disposed_worker_refuses_tasks() {
        let scheduler = pool();
        let worker = scheduler.create_worker().unwrap();
        worker.dispose();
        assert!(worker.is_disposed());
        let handle = worker.schedule(Box::new(|| panic!("must not run")));
        assert!(handle.is_disposed());
    }

    #[test]
    fn shutdown_scheduler_refuses_workers() {
        let scheduler = pool();
        let worker = scheduler.create_worker().unwrap();
        scheduler.shutdown();
        assert!(scheduler.is_shutdown());
        assert!(worker.is_disposed());
        assert!(matches!(scheduler.create_worker(), Err(SchedulerError::Shutdown)));
    }

    #[test]
    fn sticky_workers_have_distinct_threads() {
        let scheduler = StickyScheduler::new("test");
        let (tx, rx) = mpsc::channel();
        let workers: Vec<_> = (0..2).map(|_| scheduler.create_worker().unwrap()).collect();
        for worker in &workers {
            let tx = tx.clone();
            worker.schedule(Box::new(move || {
                tx.send(std::thread::current().id()).unwrap();
            }));
        }
        let first = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let second = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_ne!(first, second);
        for worker in workers {
            worker.dispose();
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn executor_scheduler_uses_callers_runtime() {
        let scheduler = ExecutorScheduler::current();
        let worker = scheduler.create_worker().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();
        worker.schedule_after(
            Duration::from_millis(10),
            Box::new(move || {
                let _ = tx.send(42);
            }),
        );
        assert_eq!(rx.await.unwrap(), 42);
    }
}
