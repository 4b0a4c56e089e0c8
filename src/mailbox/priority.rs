use super::{Comparator, Mailbox, Redelivery};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

/// Heap entry; the greatest entry is the one delivered next.
struct Ranked<T> {
    value: T,
    seq: u64,
    comparator: Comparator<T>,
}

impl<T> Ord for Ranked<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Both orders are reversed: the smallest value wins, then the oldest.
        (self.comparator)(&other.value, &self.value).then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<T> PartialOrd for Ranked<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> PartialEq for Ranked<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for Ranked<T> {}

struct PriorityState<T> {
    heap: BinaryHeap<Ranked<T>>,
    next_seq: u64,
    last: Option<T>,
    closed: bool,
    redelivery: Redelivery<T>,
}

/// Unbounded mailbox that delivers the smallest message first.
///
/// Messages the comparator considers equal come out in the order they were
/// offered: each entry carries an insertion sequence number that breaks ties.
/// A closing value is never ranked; it comes out after the heap is empty.
pub struct PriorityMailbox<T> {
    state: Mutex<PriorityState<T>>,
    comparator: Comparator<T>,
}

impl<T: Clone + Send> PriorityMailbox<T> {
    pub fn new<F>(comparator: F) -> Self
    where
        F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        Self::with_comparator(Arc::new(comparator))
    }

    pub fn with_comparator(comparator: Comparator<T>) -> Self {
        Self {
            state: Mutex::new(PriorityState {
                heap: BinaryHeap::new(),
                next_seq: 0,
                last: None,
                closed: false,
                redelivery: Redelivery::new(),
            }),
            comparator,
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().heap.len()
    }
}

impl<T: Clone + Send> Mailbox<T> for PriorityMailbox<T> {
    fn offer(&self, value: T) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.heap.push(Ranked {
            value,
            seq,
            comparator: Arc::clone(&self.comparator),
        });
        true
    }

    fn poll(&self) -> Option<T> {
        let mut state = self.state.lock();
        if let Some(value) = state.redelivery.take_armed() {
            return Some(value);
        }
        let value = match state.heap.pop() {
            Some(top) => top.value,
            None => state.last.take()?,
        };
        let _previous = state.redelivery.record(&value);
        Some(value)
    }

    fn retry_latest(&self) {
        self.state.lock().redelivery.arm();
    }

    fn clear(&self) {
        let (heap, last, latest) = {
            let mut state = self.state.lock();
            (
                std::mem::take(&mut state.heap),
                state.last.take(),
                state.redelivery.reset(),
            )
        };
        drop(heap);
        drop(last);
        drop(latest);
    }

    fn is_empty(&self) -> bool {
        let state = self.state.lock();
        state.heap.is_empty() && state.last.is_none() && !state.redelivery.is_armed()
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
