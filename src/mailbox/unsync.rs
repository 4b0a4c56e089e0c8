use super::{Mailbox, Redelivery};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::thread::{self, ThreadId};

struct UnsyncState<T> {
    items: VecDeque<T>,
    redelivery: Redelivery<T>,
    closed: bool,
}

/// FIFO mailbox with no synchronization at all.
///
/// Only valid for an actor confined to the thread that created it, typically
/// one driven by the [`ImmediateScheduler`](crate::scheduler::ImmediateScheduler).
/// Every operation checks the calling thread and panics on a foreign one, so a
/// misconfigured actor fails loudly instead of racing.
pub struct UnsyncMailbox<T> {
    state: RefCell<UnsyncState<T>>,
    owner: ThreadId,
}

// SAFETY: `state` is only ever touched from `owner` (checked on every access),
// so the `RefCell` is never borrowed from two threads. Moving or dropping the
// mailbox elsewhere only requires `T: Send`.
unsafe impl<T: Send> Sync for UnsyncMailbox<T> {}

impl<T: Clone + Send> UnsyncMailbox<T> {
    /// Creates a mailbox owned by the current thread.
    pub fn new() -> Self {
        Self {
            state: RefCell::new(UnsyncState {
                items: VecDeque::new(),
                redelivery: Redelivery::new(),
                closed: false,
            }),
            owner: thread::current().id(),
        }
    }

    fn check_owner(&self) {
        let current = thread::current().id();
        assert!(
            current == self.owner,
            "unsynchronized mailbox used from {current:?}, owned by {:?}",
            self.owner
        );
    }
}

impl<T: Clone + Send> Default for UnsyncMailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send> Mailbox<T> for UnsyncMailbox<T> {
    fn offer(&self, value: T) -> bool {
        self.check_owner();
        let mut state = self.state.borrow_mut();
        if state.closed {
            return false;
        }
        state.items.push_back(value);
        true
    }

    fn poll(&self) -> Option<T> {
        self.check_owner();
        let (value, previous) = {
            let mut state = self.state.borrow_mut();
            if let Some(value) = state.redelivery.take_armed() {
                return Some(value);
            }
            let value = state.items.pop_front()?;
            let previous = state.redelivery.record(&value);
            (value, previous)
        };
        drop(previous);
        Some(value)
    }

    fn retry_latest(&self) {
        self.check_owner();
        self.state.borrow_mut().redelivery.arm();
    }

    fn clear(&self) {
        self.check_owner();
        let (items, latest) = {
            let mut state = self.state.borrow_mut();
            (std::mem::take(&mut state.items), state.redelivery.reset())
        };
        drop(items);
        drop(latest);
    }

    fn is_empty(&self) -> bool {
        self.check_owner();
        let state = self.state.borrow();
        state.items.is_empty() && !state.redelivery.is_armed()
    }

    fn close(&self, last: T) -> bool {
        self.check_owner();
        let mut state = self.state.borrow_mut();
        if state.closed {
            return false;
        }
        state.closed = true;
        state.items.push_back(last);
        true
    }

    fn is_closed(&self) -> bool {
        self.check_owner();
        self.state.borrow().closed
    }
}
