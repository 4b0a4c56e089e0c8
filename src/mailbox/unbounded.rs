use super::{Mailbox, Redelivery};
use crate::queue::MpscQueue;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// FIFO mailbox that never refuses a message until it is closed.
///
/// Producers go straight to the lock-free [`MpscQueue`]. The redelivery slot
/// sits behind a mutex that only the consumer ever touches, so offers never
/// contend on it. An offer racing with [`Mailbox::close`] may still land
/// behind the closing value.
pub struct UnboundedMailbox<T> {
    queue: MpscQueue<T>,
    redelivery: Mutex<Redelivery<T>>,
    closed: AtomicBool,
}

impl<T: Clone + Send> UnboundedMailbox<T> {
    pub fn new() -> Self {
        Self {
            queue: MpscQueue::new(),
            redelivery: Mutex::new(Redelivery::new()),
            closed: AtomicBool::new(false),
        }
    }
}

impl<T: Clone + Send> Default for UnboundedMailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send> Mailbox<T> for UnboundedMailbox<T> {
    fn offer(&self, value: T) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        self.queue.offer(value);
        true
    }

    fn poll(&self) -> Option<T> {
        let mut redelivery = self.redelivery.lock();
        if let Some(value) = redelivery.take_armed() {
            return Some(value);
        }
        let value = self.queue.poll()?;
        let _previous = redelivery.record(&value);
        Some(value)
    }

    fn retry_latest(&self) {
        self.redelivery.lock().arm();
    }

    fn clear(&self) {
        let _latest = self.redelivery.lock().reset();
        self.queue.clear();
    }

    fn is_empty(&self) -> bool {
        self.queue.is_empty() && !self.redelivery.lock().is_armed()
    }

    fn close(&self, last: T) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.queue.offer(last);
        true
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
