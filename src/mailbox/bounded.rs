use super::{Mailbox, OverflowStrategy, Redelivery};
use parking_lot::Mutex;
use std::collections::VecDeque;

struct BoundedState<T> {
    items: VecDeque<T>,
    /// Closing value; outside the bound, delivered once `items` is drained.
    last: Option<T>,
    closed: bool,
    redelivery: Redelivery<T>,
}

/// FIFO mailbox holding at most `capacity` pending messages.
///
/// The mutex covers only queue bookkeeping; behaviors never run under it.
/// A capacity of zero is treated as one. The value passed to
/// [`Mailbox::close`] is kept apart from the bounded queue, so overflow
/// handling can neither refuse nor evict it.
pub struct BoundedMailbox<T> {
    state: Mutex<BoundedState<T>>,
    capacity: usize,
    overflow: OverflowStrategy,
}

impl<T: Clone + Send> BoundedMailbox<T> {
    pub fn new(capacity: usize, overflow: OverflowStrategy) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(BoundedState {
                items: VecDeque::with_capacity(capacity.min(1024)),
                last: None,
                closed: false,
                redelivery: Redelivery::new(),
            }),
            capacity,
            overflow,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Pending messages, not counting a closing value.
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }
}

impl<T: Clone + Send> Mailbox<T> for BoundedMailbox<T> {
    fn offer(&self, value: T) -> bool {
        let evicted = {
            let mut state = self.state.lock();
            if state.closed {
                return false;
            }
            if state.items.len() < self.capacity {
                state.items.push_back(value);
                return true;
            }
            match self.overflow {
                OverflowStrategy::RejectNewest => return false,
                OverflowStrategy::DropOldest => {
                    let evicted = state.items.pop_front();
                    state.items.push_back(value);
                    evicted
                }
            }
        };
        tracing::warn!(capacity = self.capacity, "Mailbox full, evicted oldest message");
        drop(evicted);
        true
    }

    fn poll(&self) -> Option<T> {
        let mut state = self.state.lock();
        if let Some(value) = state.redelivery.take_armed() {
            return Some(value);
        }
        let value = match state.items.pop_front() {
            Some(value) => value,
            None => state.last.take()?,
        };
        let _previous = state.redelivery.record(&value);
        Some(value)
    }

    fn retry_latest(&self) {
        self.state.lock().redelivery.arm();
    }

    fn clear(&self) {
        let (items, last, latest) = {
            let mut state = self.state.lock();
            (
                std::mem::take(&mut state.items),
                state.last.take(),
                state.redelivery.reset(),
            )
        };
        drop(items);
        drop(last);
        drop(latest);
    }

    fn is_empty(&self) -> bool {
        let state = self.state.lock();
        state.items.is_empty() && state.last.is_none() && !state.redelivery.is_armed()
    }

    fn close(&self, last: T) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }
        state.closed = true;
        state.last = Some(last);
        true
    }

    fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

#[cfg(test)]
mod tests {
    use super::super::contract;
    use super::*;

    #[test]
    fn satisfies_mailbox_contract() {
        let fresh = || BoundedMailbox::new(16, OverflowStrategy::RejectNewest);
        contract::fifo(&fresh());
        contract::retry_latest(&fresh());
        contract::retry_before_poll_is_noop(&fresh());
        contract::clear(&fresh());
        contract::close(&fresh());
    }

    #[test]
    fn drop_oldest_keeps_the_newest_messages() {
        let mailbox = BoundedMailbox::new(3, OverflowStrategy::DropOldest);
        for i in 1..=5 {
            assert!(mailbox.offer(i));
        }
        assert_eq!(mailbox.len(), 3);
        let drained: Vec<_> = std::iter::from_fn(|| mailbox.poll()).collect();
        assert_eq!(drained, vec![3, 4, 5]);
    }

    #[test]
    fn reject_newest_refuses_when_full() {
        let mailbox = BoundedMailbox::new(3, OverflowStrategy::RejectNewest);
        assert!(mailbox.offer(1));
        assert!(mailbox.offer(2));
        assert!(mailbox.offer(3));
        assert!(!mailbox.offer(4));
        assert!(!mailbox.offer(5));
        let drained: Vec<_> = std::iter::from_fn(|| mailbox.poll()).collect();
        assert_eq!(drained, vec![1, 2, 3]);
    }

    #[test]
    fn zero_capacity_behaves_as_one() {
        let mailbox = BoundedMailbox::new(0, OverflowStrategy::RejectNewest);
        assert_eq!(mailbox.capacity(), 1);
        assert!(mailbox.offer(1));
        assert!(!mailbox.offer(2));
    }

    #[test]
    fn redelivery_does_not_count_against_capacity() {
        let mailbox = BoundedMailbox::new(2, OverflowStrategy::RejectNewest);
        assert!(mailbox.offer(1));
        assert!(mailbox.offer(2));
        assert_eq!(mailbox.poll(), Some(1));
        mailbox.retry_latest();
        assert!(mailbox.offer(3));
        let drained: Vec<_> = std::iter::from_fn(|| mailbox.poll()).collect();
        assert_eq!(drained, vec![1, 2, 3]);
    }

    #[test]
    fn close_bypasses_a_full_mailbox() {
        for overflow in [OverflowStrategy::RejectNewest, OverflowStrategy::DropOldest] {
            let mailbox = BoundedMailbox::new(2, overflow);
            assert!(mailbox.offer(1));
            assert!(mailbox.offer(2));
            assert!(mailbox.close(99));
            assert_eq!(mailbox.len(), 2);
            // nothing offered afterwards can get in, nor push anything out
            assert!(!mailbox.offer(3));
            let drained: Vec<_> = std::iter::from_fn(|| mailbox.poll()).collect();
            assert_eq!(drained, vec![1, 2, 99], "{overflow:?}");
        }
    }

    #[test]
    fn clear_discards_the_closing_value() {
        let mailbox = BoundedMailbox::new(2, OverflowStrategy::DropOldest);
        assert!(mailbox.offer(1));
        assert!(mailbox.close(99));
        mailbox.clear();
        assert!(mailbox.is_empty());
        assert!(mailbox.is_closed());
        assert_eq!(mailbox.poll(), None);
    }
}
