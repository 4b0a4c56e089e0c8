use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::AbortHandle;

struct HandleInner {
    cancelled: AtomicBool,
    abort: Mutex<Option<AbortHandle>>,
}

/// Cancellation handle returned by every scheduling call.
///
/// Disposing is idempotent and best-effort: a task that has not started yet
/// will not run, a task that is already running is left to finish. Clones
/// share the same cancellation state.
#[derive(Clone)]
pub struct TaskHandle {
    inner: Arc<HandleInner>,
}

impl TaskHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HandleInner {
                cancelled: AtomicBool::new(false),
                abort: Mutex::new(None),
            }),
        }
    }

    /// A handle that is already disposed, returned by disposed workers.
    pub fn disposed() -> Self {
        let handle = Self::new();
        handle.inner.cancelled.store(true, Ordering::Release);
        handle
    }

    pub fn dispose(&self) {
        if self.inner.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(abort) = self.inner.abort.lock().take() {
            abort.abort();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Links the tokio task backing this handle so disposal can abort it while
    /// it is parked on a timer.
    pub(crate) fn attach(&self, abort: AbortHandle) {
        let mut slot = self.inner.abort.lock();
        if self.is_disposed() {
            abort.abort();
        } else {
            *slot = Some(abort);
        }
    }
}

impl Default for TaskHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Decides at run time whether a scheduled task may still execute.
#[derive(Clone)]
pub(crate) struct Gate {
    handle: TaskHandle,
    worker_disposed: Arc<AtomicBool>,
}

impl Gate {
    pub(crate) fn new(handle: TaskHandle, worker_disposed: Arc<AtomicBool>) -> Self {
        Self {
            handle,
            worker_disposed,
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        !self.handle.is_disposed() && !self.worker_disposed.load(Ordering::Acquire)
    }

    pub(crate) fn run(&self, task: impl FnOnce()) {
        if self.is_open() {
            task();
        }
    }
}
